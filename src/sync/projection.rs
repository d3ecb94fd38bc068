//! Maps a zone snapshot onto the control surface's property model.

use crate::sync::position::seconds_to_micros;
use crate::zone::{LineBlock, LineValue, LoopMode, Zone, ZoneState};

/// Literal used when no title or artist can be resolved, and as the idle title.
pub const FALLBACK_TEXT: &str = "Roon";

/// Album shown when the track has none, and while idle.
pub const ALBUM_PLACEHOLDER: &str = "Unknown album";

/// Artist shown while idle.
pub const IDLE_ARTIST: &str = "Not playing";

/// Track id of the idle projection (the MPRIS "no track" path).
pub const IDLE_TRACK_ID: &str = "/org/mpris/MediaPlayer2/TrackList/NoTrack";

const ZONE_TRACK_PREFIX: &str = "/com/roon/mpris/zone_";

/// Separator the core uses when joining several artists into one line.
const ARTIST_SEPARATOR: &str = " / ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
        }
    }
}

impl From<ZoneState> for PlaybackStatus {
    /// There is no loading status on the surface, so loading reads as playing.
    fn from(state: ZoneState) -> Self {
        match state {
            ZoneState::Playing | ZoneState::Loading => Self::Playing,
            ZoneState::Paused => Self::Paused,
            ZoneState::Stopped => Self::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    None,
    Track,
    Playlist,
}

impl LoopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Track => "Track",
            Self::Playlist => "Playlist",
        }
    }
}

impl From<LoopMode> for LoopStatus {
    fn from(mode: LoopMode) -> Self {
        match mode {
            LoopMode::None => Self::None,
            LoopMode::Track => Self::Track,
            LoopMode::Playlist => Self::Playlist,
        }
    }
}

/// The control-surface property set derived from one zone.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProjection {
    pub track_id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    pub length_micros: Option<i64>,
    pub art_uri: Option<String>,
    pub playback_status: PlaybackStatus,
    pub loop_status: LoopStatus,
    pub shuffle: bool,
    pub rate: f64,
    pub minimum_rate: f64,
    pub maximum_rate: f64,
    pub can_control: bool,
    pub can_play: bool,
    pub can_pause: bool,
    pub can_seek: bool,
    pub can_go_next: bool,
    pub can_go_previous: bool,
}

impl PlayerProjection {
    /// Nothing selected. `can_play` stays on because desktop shells hide
    /// players that cannot play.
    pub fn idle(session_present: bool) -> Self {
        Self {
            track_id: IDLE_TRACK_ID.to_string(),
            title: FALLBACK_TEXT.to_string(),
            artists: vec![IDLE_ARTIST.to_string()],
            album: ALBUM_PLACEHOLDER.to_string(),
            length_micros: None,
            art_uri: None,
            playback_status: PlaybackStatus::Stopped,
            loop_status: LoopStatus::None,
            shuffle: false,
            rate: 1.0,
            minimum_rate: 1.0,
            maximum_rate: 1.0,
            can_control: session_present,
            can_play: true,
            can_pause: false,
            can_seek: false,
            can_go_next: false,
            can_go_previous: false,
        }
    }

    /// Metadata-level equality (the fields that make up `Metadata` on MPRIS).
    pub fn same_metadata(&self, other: &Self) -> bool {
        self.track_id == other.track_id
            && self.title == other.title
            && self.artists == other.artists
            && self.album == other.album
            && self.length_micros == other.length_micros
            && self.art_uri == other.art_uri
    }
}

/// Stable per-zone track id. Hex keeps arbitrary zone ids inside the
/// object-path alphabet without collisions.
pub fn track_id_for(zone_id: &str) -> String {
    format!("{}{}", ZONE_TRACK_PREFIX, hex::encode(zone_id.as_bytes()))
}

/// Project a zone. Artwork is never resolved here; the caller patches
/// `art_uri` in afterwards.
pub fn project(zone: &Zone, session_present: bool) -> PlayerProjection {
    let caps = zone.capabilities;
    let settings = zone.settings.unwrap_or_default();

    let can_play = caps.can_play
        || matches!(
            zone.state,
            ZoneState::Playing | ZoneState::Paused | ZoneState::Loading
        );

    PlayerProjection {
        track_id: track_id_for(&zone.id),
        title: resolve_title(zone),
        artists: split_artists(&resolve_artist(zone)),
        album: resolve_album(zone),
        length_micros: zone.length().map(seconds_to_micros),
        art_uri: None,
        playback_status: zone.state.into(),
        loop_status: settings.repeat.into(),
        shuffle: settings.shuffle,
        rate: 1.0,
        minimum_rate: 1.0,
        maximum_rate: 1.0,
        can_control: session_present,
        can_play,
        can_pause: caps.can_pause,
        can_seek: caps.can_seek && zone.seek_position().is_some(),
        can_go_next: caps.can_go_next,
        can_go_previous: caps.can_go_previous,
    }
}

/// Candidate sources, tried in order until one yields non-blank text.
enum Source<'a> {
    Field(Option<&'a LineValue>, &'static str),
    Line(Option<&'a LineBlock>, usize),
}

impl Source<'_> {
    fn text(&self) -> Option<String> {
        match self {
            Source::Field(value, canonical) => value.and_then(|v| v.text(canonical)),
            Source::Line(block, n) => {
                let canonical = match n {
                    1 => "line1",
                    2 => "line2",
                    _ => "line3",
                };
                block.and_then(|b| b.line(*n)).and_then(|v| v.text(canonical))
            }
        }
    }
}

fn first_text<'a>(sources: impl IntoIterator<Item = Source<'a>>) -> Option<String> {
    sources.into_iter().find_map(|s| s.text())
}

pub fn resolve_title(zone: &Zone) -> String {
    let np = zone.now_playing.as_ref();
    first_text([
        Source::Field(np.and_then(|n| n.title.as_ref()), "title"),
        Source::Line(np.and_then(|n| n.three_line.as_ref()), 1),
        Source::Line(np.and_then(|n| n.two_line.as_ref()), 2),
        Source::Line(np.and_then(|n| n.one_line.as_ref()), 1),
    ])
    .or_else(|| {
        let name = zone.display_name.trim();
        (!name.is_empty()).then(|| zone.display_name.clone())
    })
    .unwrap_or_else(|| FALLBACK_TEXT.to_string())
}

pub fn resolve_artist(zone: &Zone) -> String {
    let np = zone.now_playing.as_ref();
    first_text([
        Source::Field(np.and_then(|n| n.artist.as_ref()), "artist"),
        Source::Field(np.and_then(|n| n.artist_line.as_ref()), "artist"),
        Source::Line(np.and_then(|n| n.three_line.as_ref()), 2),
        Source::Line(np.and_then(|n| n.two_line.as_ref()), 1),
    ])
    .unwrap_or_else(|| FALLBACK_TEXT.to_string())
}

pub fn resolve_album(zone: &Zone) -> String {
    let np = zone.now_playing.as_ref();
    first_text([
        Source::Field(np.and_then(|n| n.album.as_ref()), "album"),
        Source::Line(np.and_then(|n| n.three_line.as_ref()), 3),
    ])
    .unwrap_or_else(|| ALBUM_PLACEHOLDER.to_string())
}

fn split_artists(line: &str) -> Vec<String> {
    let artists: Vec<String> = line
        .split(ARTIST_SEPARATOR)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    if artists.is_empty() {
        vec![line.to_string()]
    } else {
        artists
    }
}

/// Status line shown in the core's extension list.
pub fn status_line(zone: &Zone, projection: &PlayerProjection) -> String {
    format!("{} • {}", zone.display_name, projection.title)
}
