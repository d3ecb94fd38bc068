//! Live set of remote zones, mutated only by the subscription feed.

use crate::zone::Zone;

/// Zones keyed by id, kept in insertion order.
///
/// Zone counts are small (a handful per core), so lookups are linear. A
/// zone that is removed and re-added moves to the end.
#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full snapshot; nothing from the previous mapping survives.
    pub fn replace_all(&mut self, zones: Vec<Zone>) {
        self.zones.clear();
        for zone in zones {
            self.upsert(zone);
        }
    }

    /// Insert, or overwrite in place by id.
    pub fn upsert(&mut self, zone: Zone) {
        match self.zones.iter_mut().find(|z| z.id == zone.id) {
            Some(existing) => *existing = zone,
            None => self.zones.push(zone),
        }
    }

    /// Remove by id. Returns the removed zone, if it was known.
    pub fn remove(&mut self, id: &str) -> Option<Zone> {
        let index = self.zones.iter().position(|z| z.id == id)?;
        Some(self.zones.remove(index))
    }

    /// Patch only `now_playing.seek_position` (and the zone's queue time).
    /// Returns false for unknown ids and for zones with nothing playing.
    pub fn apply_seek_delta(
        &mut self,
        id: &str,
        seek_position_seconds: Option<f64>,
        queue_time_remaining: Option<f64>,
    ) -> bool {
        let Some(zone) = self.zones.iter_mut().find(|z| z.id == id) else {
            return false;
        };
        if queue_time_remaining.is_some() {
            zone.queue_time_remaining = queue_time_remaining;
        }
        let Some(now_playing) = zone.now_playing.as_mut() else {
            return false;
        };
        now_playing.seek_position_seconds = seek_position_seconds;
        true
    }

    pub fn get(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}
