//! Playback position extrapolation between sparse seek updates.

use tokio::sync::watch;
use tokio::time::Instant;

use crate::zone::{Zone, ZoneState};

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Last known (position, wall-clock time, playing?) triple.
///
/// Replaced wholesale whenever the active zone is (re)projected or seeks;
/// never patched in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekAnchor {
    pub anchor_seconds: f64,
    pub anchored_at: Instant,
    pub playing: bool,
    pub length_seconds: Option<f64>,
}

impl SeekAnchor {
    /// Anchor for the idle projection: frozen at zero.
    pub fn idle(now: Instant) -> Self {
        Self {
            anchor_seconds: 0.0,
            anchored_at: now,
            playing: false,
            length_seconds: None,
        }
    }

    /// Recompute from a zone snapshot.
    pub fn from_zone(zone: &Zone, now: Instant) -> Self {
        Self {
            anchor_seconds: zone.seek_position().unwrap_or(0.0),
            anchored_at: now,
            playing: zone.state == ZoneState::Playing,
            length_seconds: zone.length(),
        }
    }

    /// Extrapolated position in whole microseconds, clamped to
    /// `[0, length]`.
    pub fn position_micros(&self, now: Instant) -> i64 {
        let mut elapsed = self.anchor_seconds;
        if self.playing {
            elapsed += now.saturating_duration_since(self.anchored_at).as_secs_f64();
        }
        if let Some(length) = self.length_seconds {
            elapsed = elapsed.min(length);
        }
        seconds_to_micros(elapsed.max(0.0))
    }
}

/// Seconds to integer microseconds, floored. Non-finite input maps to 0.
pub fn seconds_to_micros(seconds: f64) -> i64 {
    if !seconds.is_finite() {
        return 0;
    }
    (seconds * MICROS_PER_SECOND).floor() as i64
}

pub fn micros_to_seconds(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_SECOND
}

/// Write side of the anchor, held by the synchronizer.
pub type AnchorSender = watch::Sender<SeekAnchor>;

/// A fresh idle anchor and its read handle.
pub fn anchor_channel() -> (AnchorSender, PositionHandle) {
    let (tx, rx) = watch::channel(SeekAnchor::idle(Instant::now()));
    (tx, PositionHandle { rx })
}

/// Read side of the anchor, for pull-style position queries from the
/// control surface.
#[derive(Clone)]
pub struct PositionHandle {
    rx: watch::Receiver<SeekAnchor>,
}

impl PositionHandle {
    pub fn current_micros(&self) -> i64 {
        self.rx.borrow().position_micros(Instant::now())
    }
}
