//! Chooses the single zone exposed on the control surface.

use crate::sync::registry::ZoneRegistry;
use crate::zone::{Zone, ZoneState};

/// Pick the zone to expose. First match wins:
///
/// 1. `preference` equals (case-insensitively) the zone id, its display
///    name, or the id/name of any of its outputs
/// 2. a playing zone (registry order; among several playing zones the
///    winner depends on the order the core reported them)
/// 3. the currently active zone, if still present
/// 4. the first zone
///
/// Returns `None` only for an empty registry.
pub fn select(
    registry: &ZoneRegistry,
    preference: Option<&str>,
    current_active_id: Option<&str>,
) -> Option<String> {
    let preference = preference.map(str::trim).filter(|p| !p.is_empty());

    let preferred = preference.and_then(|p| registry.iter().find(|z| matches_preference(z, p)));
    let playing = || registry.iter().find(|z| z.state == ZoneState::Playing);
    let sticky = || current_active_id.and_then(|id| registry.get(id));
    let first = || registry.iter().next();

    preferred
        .or_else(playing)
        .or_else(sticky)
        .or_else(first)
        .map(|z| z.id.clone())
}

/// Whether `zone` answers to `preference` by id, name, or any output.
pub fn matches_preference(zone: &Zone, preference: &str) -> bool {
    let preference = preference.to_lowercase();
    let eq = |candidate: &str| candidate.to_lowercase() == preference;

    eq(&zone.id)
        || eq(&zone.display_name)
        || zone
            .outputs
            .iter()
            .any(|o| eq(&o.id) || eq(&o.display_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{playing_zone, zone, zone_with_output};

    fn registry(zones: Vec<Zone>) -> ZoneRegistry {
        let mut r = ZoneRegistry::new();
        r.replace_all(zones);
        r
    }

    #[test]
    fn test_empty_registry_selects_nothing() {
        assert_eq!(select(&ZoneRegistry::new(), Some("x"), Some("y")), None);
    }

    #[test]
    fn test_playing_zone_wins_without_preference() {
        let r = registry(vec![
            zone("a"),
            playing_zone("b", "Song", 0.0, 100.0),
            zone("c"),
        ]);
        assert_eq!(select(&r, None, None).as_deref(), Some("b"));
        // Deterministic for fixed inputs
        assert_eq!(select(&r, None, None), select(&r, None, None));
    }

    #[test]
    fn test_preference_matches_name_and_outputs_case_insensitively() {
        let mut kitchen = zone("k1");
        kitchen.display_name = "Kitchen".into();
        let r = registry(vec![
            playing_zone("p", "Song", 0.0, 100.0),
            kitchen,
            zone_with_output("z3", "o-77", "Living Room DAC"),
        ]);

        assert_eq!(select(&r, Some("kitchen"), None).as_deref(), Some("k1"));
        assert_eq!(select(&r, Some("K1"), None).as_deref(), Some("k1"));
        assert_eq!(
            select(&r, Some("living room dac"), None).as_deref(),
            Some("z3")
        );
        assert_eq!(select(&r, Some("O-77"), None).as_deref(), Some("z3"));
    }

    #[test]
    fn test_unmatched_preference_falls_through() {
        let r = registry(vec![zone("a"), playing_zone("b", "Song", 0.0, 1.0)]);
        assert_eq!(select(&r, Some("Garage"), None).as_deref(), Some("b"));
        assert_eq!(select(&r, Some("   "), Some("a")).as_deref(), Some("b"));
    }

    #[test]
    fn test_current_zone_is_sticky_when_nothing_plays() {
        let r = registry(vec![zone("a"), zone("b")]);
        assert_eq!(select(&r, None, Some("b")).as_deref(), Some("b"));
        assert_eq!(select(&r, None, Some("gone")).as_deref(), Some("a"));
    }

    #[test]
    fn test_non_ascii_preference() {
        let mut z = zone("s");
        z.display_name = "Küche".into();
        let r = registry(vec![zone("a"), z]);
        assert_eq!(select(&r, Some("KÜCHE"), None).as_deref(), Some("s"));
    }
}
