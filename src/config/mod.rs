//! Configuration management

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "ROON_MPRIS";
const ROON_STATE_FILE: &str = "roon_state.json";

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Zone to pin: zone id, zone name, or output name (case-insensitive)
    #[serde(default)]
    pub zone: Option<String>,

    /// Verbose logging
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// The zone preference, if it is set to something other than whitespace.
    pub fn preference(&self) -> Option<&str> {
        self.zone
            .as_deref()
            .map(str::trim)
            .filter(|z| !z.is_empty())
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "roon-mpris")
}

pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Where the Roon pairing token is persisted
pub fn roon_state_path() -> PathBuf {
    config_dir().join(ROON_STATE_FILE)
}

/// Artwork cache directory. Falls back to the temp dir when no cache
/// directory can be determined for the user.
pub fn artwork_cache_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().join("artwork"))
        .unwrap_or_else(|| std::env::temp_dir().join("roon-mpris").join("artwork"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_dir())
}

/// Layering: `<dir>/config.{toml,json,yaml}` if present, then environment
/// (`ROON_MPRIS_ZONE`, `ROON_MPRIS_DEBUG`).
pub fn load_config_from(dir: &Path) -> Result<Config> {
    let config = ::config::Config::builder()
        .set_default("debug", false)?
        .add_source(
            ::config::File::with_name(&dir.join("config").to_string_lossy()).required(false),
        )
        .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .context("Failed to read configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Invalid configuration")?;
    config.zone = config.preference().map(str::to_string);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        std::env::remove_var("ROON_MPRIS_ZONE");
        std::env::remove_var("ROON_MPRIS_DEBUG");
    }

    #[test]
    #[serial]
    fn test_defaults_without_file_or_env() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let config = load_config_from(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.preference(), None);
    }

    #[test]
    #[serial]
    fn test_file_then_env_override() {
        clear_env();
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "zone = \"Kitchen\"\n").unwrap();

        let config = load_config_from(dir.path()).unwrap();
        assert_eq!(config.preference(), Some("Kitchen"));
        assert!(!config.debug);

        std::env::set_var("ROON_MPRIS_ZONE", "Living Room");
        std::env::set_var("ROON_MPRIS_DEBUG", "true");
        let config = load_config_from(dir.path()).unwrap();
        clear_env();

        assert_eq!(config.zone.as_deref(), Some("Living Room"));
        assert!(config.debug);
    }

    #[test]
    #[serial]
    fn test_blank_zone_is_unset() {
        clear_env();
        std::env::set_var("ROON_MPRIS_ZONE", "   ");
        let dir = TempDir::new().unwrap();
        let config = load_config_from(dir.path()).unwrap();
        clear_env();

        assert_eq!(config.zone, None);
    }

    #[test]
    fn test_artwork_dir_is_named() {
        assert!(artwork_cache_dir().ends_with("artwork"));
        assert!(roon_state_path().ends_with(ROON_STATE_FILE));
    }
}
