//! Error taxonomy for the zone synchronizer.
//!
//! None of these are fatal. Each kind is either dropped quietly (logged at
//! debug) or logged as a warning and otherwise ignored.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A command arrived while no Roon Core is paired.
    #[error("no remote session")]
    TransportUnavailable,

    /// No zone could be selected for a command.
    #[error("no zone available")]
    ZoneUnresolved,

    /// The core rejected (or never received) a control or seek call.
    #[error("command {command} on zone {zone_id} failed: {source}")]
    CommandFailed {
        zone_id: String,
        command: String,
        #[source]
        source: anyhow::Error,
    },

    /// Image fetch or cache write failed; the track shows no artwork.
    #[error("artwork {key} unavailable: {reason}")]
    ArtworkFetchFailed { key: String, reason: String },

    /// SetPosition named a track other than the one currently projected.
    #[error("stale seek target {requested} (current track is {current})")]
    StaleSeekTarget { requested: String, current: String },

    /// The artwork cache directory could not be created.
    #[error("artwork cache disabled: {0}")]
    CacheUnavailable(String),
}

impl SyncError {
    /// Whether this error is expected in normal operation and only worth a
    /// debug line.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::TransportUnavailable | Self::ZoneUnresolved | Self::StaleSeekTarget { .. }
        )
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
