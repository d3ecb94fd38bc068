//! Zone and playback types mirrored from the Roon Core.
//!
//! These types deserialize the remote transport's zone JSON directly. Fields
//! the core omits stay `None`/default, they are never carried over from an
//! earlier snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A remote, independently controllable playback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Zone {
    /// Opaque stable identifier
    #[serde(rename = "zone_id")]
    pub id: String,

    /// Human-readable zone name
    #[serde(default)]
    pub display_name: String,

    /// Current playback state
    #[serde(default)]
    pub state: ZoneState,

    /// Currently playing track (if any)
    #[serde(default)]
    pub now_playing: Option<NowPlaying>,

    /// Transport commands the zone currently accepts
    #[serde(flatten)]
    pub capabilities: Capabilities,

    /// Shuffle/loop settings (if reported)
    #[serde(default)]
    pub settings: Option<ZoneSettings>,

    /// Outputs grouped into this zone, in remote order
    #[serde(default)]
    pub outputs: Vec<Output>,

    /// Seconds left in the play queue
    #[serde(default)]
    pub queue_time_remaining: Option<f64>,
}

impl Zone {
    /// Numeric seek position in seconds, if currently known.
    pub fn seek_position(&self) -> Option<f64> {
        self.now_playing
            .as_ref()
            .and_then(|np| np.seek_position_seconds)
            .filter(|p| p.is_finite())
    }

    /// Track length in seconds, if currently known.
    pub fn length(&self) -> Option<f64> {
        self.now_playing
            .as_ref()
            .and_then(|np| np.length_seconds)
            .filter(|l| l.is_finite())
    }

    pub fn image_key(&self) -> Option<&str> {
        self.now_playing
            .as_ref()
            .and_then(|np| np.image_key.as_deref())
            .filter(|k| !k.is_empty())
    }
}

/// Playback state enumeration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ZoneState {
    Playing,
    Paused,
    Loading,
    #[default]
    #[serde(other)]
    Stopped,
}

impl std::fmt::Display for ZoneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::Loading => write!(f, "loading"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Transport flags as reported by the core.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capabilities {
    #[serde(rename = "is_play_allowed", default)]
    pub can_play: bool,
    #[serde(rename = "is_pause_allowed", default)]
    pub can_pause: bool,
    #[serde(rename = "is_seek_allowed", default)]
    pub can_seek: bool,
    #[serde(rename = "is_next_allowed", default)]
    pub can_go_next: bool,
    #[serde(rename = "is_previous_allowed", default)]
    pub can_go_previous: bool,
}

/// Zone playback settings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZoneSettings {
    #[serde(default)]
    pub shuffle: bool,

    #[serde(rename = "loop", default)]
    pub repeat: LoopMode,
}

/// Repeat mode. The core calls these `disabled`, `loop_one` and `loop`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoopMode {
    #[serde(rename = "loop_one")]
    Track,
    #[serde(rename = "loop")]
    Playlist,
    #[default]
    #[serde(rename = "disabled", other)]
    None,
}

/// An output device grouped into a zone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Output {
    #[serde(rename = "output_id")]
    pub id: String,

    #[serde(default)]
    pub display_name: String,
}

/// Now playing track information.
///
/// Text fields arrive in several shapes depending on the core version and
/// source; see [`LineValue`]. Resolution into display strings happens in
/// `sync::projection`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NowPlaying {
    #[serde(default)]
    pub title: Option<LineValue>,

    #[serde(default)]
    pub artist: Option<LineValue>,

    /// Pre-joined artist line, used when no explicit artist is present
    #[serde(default)]
    pub artist_line: Option<LineValue>,

    #[serde(default)]
    pub album: Option<LineValue>,

    #[serde(default)]
    pub one_line: Option<LineBlock>,

    #[serde(default)]
    pub two_line: Option<LineBlock>,

    #[serde(default)]
    pub three_line: Option<LineBlock>,

    /// Track length in seconds
    #[serde(rename = "length", default)]
    pub length_seconds: Option<f64>,

    /// Current seek position in seconds
    #[serde(rename = "seek_position", default)]
    pub seek_position_seconds: Option<f64>,

    /// Opaque key for the image service
    #[serde(default)]
    pub image_key: Option<String>,
}

/// A structured block of display lines (`one_line`, `two_line`, `three_line`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LineBlock {
    #[serde(default)]
    pub line1: Option<LineValue>,
    #[serde(default)]
    pub line2: Option<LineValue>,
    #[serde(default)]
    pub line3: Option<LineValue>,
}

impl LineBlock {
    /// Line by 1-based index.
    pub fn line(&self, n: usize) -> Option<&LineValue> {
        match n {
            1 => self.line1.as_ref(),
            2 => self.line2.as_ref(),
            3 => self.line3.as_ref(),
            _ => None,
        }
    }
}

/// One text field as sent by the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LineValue {
    Text(String),
    Number(serde_json::Number),
    Record(BTreeMap<String, serde_json::Value>),
    /// Any other shape (bool, array, null); never yields text
    Other(serde_json::Value),
}

impl From<&str> for LineValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl LineValue {
    /// Resolve to non-blank text. Records try `canonical` first, then the
    /// first string-valued field in key order.
    pub fn text(&self, canonical: &str) -> Option<String> {
        match self {
            Self::Text(s) => non_blank(s),
            Self::Number(n) => Some(n.to_string()),
            Self::Record(fields) => {
                let preferred = fields.get(canonical).and_then(|v| match v {
                    serde_json::Value::String(s) => non_blank(s),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });
                preferred.or_else(|| {
                    fields.values().find_map(|v| v.as_str().and_then(non_blank))
                })
            }
            Self::Other(_) => None,
        }
    }
}

fn non_blank(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Seek-only update for one zone (`zones_seek_changed`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeekDelta {
    pub zone_id: String,

    #[serde(rename = "seek_position", default)]
    pub seek_position_seconds: Option<f64>,

    #[serde(default)]
    pub queue_time_remaining: Option<f64>,
}

/// One change-set from the zone subscription.
///
/// Sub-events are applied removed → added → changed → seek_changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ZoneChanges {
    #[serde(default)]
    pub zones_removed: Vec<String>,

    #[serde(default)]
    pub zones_added: Vec<Zone>,

    #[serde(default)]
    pub zones_changed: Vec<Zone>,

    #[serde(default)]
    pub zones_seek_changed: Vec<SeekDelta>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zone_decodes_core_json() {
        let zone: Zone = serde_json::from_value(json!({
            "zone_id": "1601bb42",
            "display_name": "Living Room",
            "state": "playing",
            "is_play_allowed": false,
            "is_pause_allowed": true,
            "is_seek_allowed": true,
            "is_next_allowed": true,
            "is_previous_allowed": false,
            "settings": { "loop": "loop_one", "shuffle": true, "auto_radio": false },
            "outputs": [{ "output_id": "o1", "display_name": "DAC", "volume": { "value": -20 } }],
            "now_playing": {
                "seek_position": 12,
                "length": 245,
                "image_key": "abc",
                "three_line": { "line1": "Song", "line2": "Artist", "line3": "Album" }
            }
        }))
        .unwrap();

        assert_eq!(zone.id, "1601bb42");
        assert_eq!(zone.state, ZoneState::Playing);
        assert!(zone.capabilities.can_pause);
        assert!(!zone.capabilities.can_go_previous);
        assert_eq!(zone.settings.unwrap().repeat, LoopMode::Track);
        assert_eq!(zone.outputs[0].display_name, "DAC");
        assert_eq!(zone.seek_position(), Some(12.0));
        assert_eq!(zone.length(), Some(245.0));
        assert_eq!(zone.image_key(), Some("abc"));
    }

    #[test]
    fn test_unknown_state_and_loop_fall_back() {
        let zone: Zone = serde_json::from_value(json!({
            "zone_id": "z",
            "state": "buffering",
            "settings": { "loop": "next" }
        }))
        .unwrap();
        assert_eq!(zone.state, ZoneState::Stopped);
        assert_eq!(zone.settings.unwrap().repeat, LoopMode::None);
        assert!(zone.now_playing.is_none());
    }

    #[test]
    fn test_loop_modes() {
        for (raw, mode) in [
            ("disabled", LoopMode::None),
            ("loop_one", LoopMode::Track),
            ("loop", LoopMode::Playlist),
        ] {
            let parsed: LoopMode = serde_json::from_value(json!(raw)).unwrap();
            assert_eq!(parsed, mode);
            assert_eq!(serde_json::to_value(mode).unwrap(), json!(raw));
        }
        assert_eq!(LoopMode::default(), LoopMode::None);
    }

    #[test]
    fn test_line_value_shapes() {
        let record: LineValue =
            serde_json::from_value(json!({ "line1": "Canonical", "other": "x" })).unwrap();
        assert_eq!(record.text("line1").as_deref(), Some("Canonical"));

        let loose: LineValue = serde_json::from_value(json!({ "a": 3, "b": "Fallback" })).unwrap();
        assert_eq!(loose.text("line1").as_deref(), Some("Fallback"));

        let number: LineValue = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(number.text("line1").as_deref(), Some("7"));

        let blank = LineValue::from("   ");
        assert_eq!(blank.text("line1"), None);

        let odd: LineValue = serde_json::from_value(json!([1, 2])).unwrap();
        assert_eq!(odd.text("line1"), None);
    }

    #[test]
    fn test_zone_state_display() {
        assert_eq!(ZoneState::Playing.to_string(), "playing");
        assert_eq!(ZoneState::Loading.to_string(), "loading");
    }
}
