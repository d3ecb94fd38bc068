//! MPRIS control surface on the session bus
//!
//! Serves `org.mpris.MediaPlayer2` and `org.mpris.MediaPlayer2.Player` at
//! `/org/mpris/MediaPlayer2`. Method calls become [`ControlAction`]s on the
//! synchronizer's event channel; `publish` swaps in a new projection and
//! emits `PropertiesChanged` for the properties that differ.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info};
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{ObjectPath, OwnedValue, Value};
use zbus::{connection, fdo, interface, Connection};

use crate::adapters::traits::ControlSurface;
use crate::sync::projection::IDLE_TRACK_ID;
use crate::sync::{ControlAction, EventSender, PlayerProjection, PositionHandle, SyncEvent};

pub const BUS_NAME: &str = "org.mpris.MediaPlayer2.roon";
pub const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";

const IDENTITY: &str = "Roon";
const DESKTOP_ENTRY: &str = "roon";

fn forward(actions: &EventSender, action: ControlAction) {
    debug!("MPRIS action: {:?}", action);
    if actions.send(SyncEvent::Action(action)).is_err() {
        debug!("Synchronizer gone, dropping MPRIS action");
    }
}

struct RootIface {
    actions: EventSender,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        forward(&self.actions, ControlAction::Raise);
    }

    fn quit(&self) {
        forward(&self.actions, ControlAction::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> String {
        IDENTITY.to_string()
    }

    #[zbus(property)]
    fn desktop_entry(&self) -> String {
        DESKTOP_ENTRY.to_string()
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        Vec::new()
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        Vec::new()
    }
}

struct PlayerIface {
    state: PlayerProjection,
    position: PositionHandle,
    actions: EventSender,
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn play(&self) {
        forward(&self.actions, ControlAction::Play);
    }

    fn pause(&self) {
        forward(&self.actions, ControlAction::Pause);
    }

    fn play_pause(&self) {
        forward(&self.actions, ControlAction::PlayPause);
    }

    fn stop(&self) {
        forward(&self.actions, ControlAction::Stop);
    }

    fn next(&self) {
        forward(&self.actions, ControlAction::Next);
    }

    fn previous(&self) {
        forward(&self.actions, ControlAction::Previous);
    }

    fn seek(&self, offset: i64) {
        forward(
            &self.actions,
            ControlAction::Seek {
                offset_micros: offset,
            },
        );
    }

    fn set_position(&self, track_id: ObjectPath<'_>, position: i64) {
        forward(
            &self.actions,
            ControlAction::SetPosition {
                track_id: track_id.to_string(),
                position_micros: position,
            },
        );
    }

    fn open_uri(&self, _uri: String) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("OpenUri is not supported".into()))
    }

    #[zbus(signal)]
    async fn seeked(emitter: &SignalEmitter<'_>, position: i64) -> zbus::Result<()>;

    #[zbus(property)]
    fn playback_status(&self) -> String {
        self.state.playback_status.as_str().to_string()
    }

    #[zbus(property)]
    fn loop_status(&self) -> String {
        self.state.loop_status.as_str().to_string()
    }

    #[zbus(property)]
    fn shuffle(&self) -> bool {
        self.state.shuffle
    }

    #[zbus(property)]
    fn rate(&self) -> f64 {
        self.state.rate
    }

    #[zbus(property)]
    fn minimum_rate(&self) -> f64 {
        self.state.minimum_rate
    }

    #[zbus(property)]
    fn maximum_rate(&self) -> f64 {
        self.state.maximum_rate
    }

    #[zbus(property)]
    fn volume(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn metadata(&self) -> fdo::Result<HashMap<String, OwnedValue>> {
        metadata(&self.state).map_err(|e| fdo::Error::Failed(e.to_string()))
    }

    #[zbus(property(emits_changed_signal = "false"))]
    fn position(&self) -> i64 {
        self.position.current_micros()
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        self.state.can_go_next
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        self.state.can_go_previous
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        self.state.can_play
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        self.state.can_pause
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        self.state.can_seek
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        self.state.can_control
    }
}

/// `xesam`/`mpris` metadata map for one projection.
fn metadata(state: &PlayerProjection) -> Result<HashMap<String, OwnedValue>> {
    let track_id = ObjectPath::try_from(state.track_id.as_str())
        .or_else(|_| ObjectPath::try_from(IDLE_TRACK_ID))?;

    let mut map = HashMap::new();
    map.insert("mpris:trackid".to_string(), owned(Value::from(track_id))?);
    map.insert("xesam:title".to_string(), owned(Value::from(state.title.as_str()))?);
    map.insert("xesam:artist".to_string(), owned(Value::from(state.artists.clone()))?);
    map.insert("xesam:album".to_string(), owned(Value::from(state.album.as_str()))?);
    if let Some(length) = state.length_micros {
        map.insert("mpris:length".to_string(), owned(Value::from(length))?);
    }
    if let Some(art) = &state.art_uri {
        map.insert("mpris:artUrl".to_string(), owned(Value::from(art.as_str()))?);
    }
    Ok(map)
}

fn owned(value: Value<'_>) -> Result<OwnedValue> {
    Ok(OwnedValue::try_from(value)?)
}

/// Player properties that can change between publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Property {
    PlaybackStatus,
    LoopStatus,
    Shuffle,
    Rate,
    MinimumRate,
    MaximumRate,
    Metadata,
    CanGoNext,
    CanGoPrevious,
    CanPlay,
    CanPause,
    CanSeek,
    CanControl,
}

fn changed_properties(old: &PlayerProjection, new: &PlayerProjection) -> Vec<Property> {
    let checks = [
        (old.playback_status != new.playback_status, Property::PlaybackStatus),
        (old.loop_status != new.loop_status, Property::LoopStatus),
        (old.shuffle != new.shuffle, Property::Shuffle),
        (old.rate != new.rate, Property::Rate),
        (old.minimum_rate != new.minimum_rate, Property::MinimumRate),
        (old.maximum_rate != new.maximum_rate, Property::MaximumRate),
        (!old.same_metadata(new), Property::Metadata),
        (old.can_go_next != new.can_go_next, Property::CanGoNext),
        (old.can_go_previous != new.can_go_previous, Property::CanGoPrevious),
        (old.can_play != new.can_play, Property::CanPlay),
        (old.can_pause != new.can_pause, Property::CanPause),
        (old.can_seek != new.can_seek, Property::CanSeek),
        (old.can_control != new.can_control, Property::CanControl),
    ];
    checks
        .into_iter()
        .filter_map(|(changed, property)| changed.then_some(property))
        .collect()
}

/// The MPRIS player exported on the session bus.
pub struct MprisSurface {
    connection: Connection,
}

impl MprisSurface {
    /// Claim the bus name and export both interfaces. Actions are sent to
    /// `actions`; `Position` reads come from `position`.
    pub async fn connect(actions: EventSender, position: PositionHandle) -> Result<Self> {
        let root = RootIface {
            actions: actions.clone(),
        };
        let player = PlayerIface {
            state: PlayerProjection::idle(false),
            position,
            actions,
        };

        let connection = connection::Builder::session()?
            .name(BUS_NAME)?
            .serve_at(OBJECT_PATH, root)?
            .serve_at(OBJECT_PATH, player)?
            .build()
            .await
            .context("Failed to register MPRIS player on the session bus")?;

        info!("MPRIS player registered as {}", BUS_NAME);
        Ok(Self { connection })
    }
}

#[async_trait]
impl ControlSurface for MprisSurface {
    async fn publish(&self, projection: &PlayerProjection) -> Result<()> {
        let iface_ref = self
            .connection
            .object_server()
            .interface::<_, PlayerIface>(OBJECT_PATH)
            .await?;
        let mut iface = iface_ref.get_mut().await;
        let old = std::mem::replace(&mut iface.state, projection.clone());
        let changed = changed_properties(&old, projection);
        if changed.is_empty() {
            return Ok(());
        }
        debug!("MPRIS properties changed: {:?}", changed);

        let emitter = iface_ref.signal_emitter();
        for property in changed {
            match property {
                Property::PlaybackStatus => iface.playback_status_changed(emitter).await?,
                Property::LoopStatus => iface.loop_status_changed(emitter).await?,
                Property::Shuffle => iface.shuffle_changed(emitter).await?,
                Property::Rate => iface.rate_changed(emitter).await?,
                Property::MinimumRate => iface.minimum_rate_changed(emitter).await?,
                Property::MaximumRate => iface.maximum_rate_changed(emitter).await?,
                Property::Metadata => iface.metadata_changed(emitter).await?,
                Property::CanGoNext => iface.can_go_next_changed(emitter).await?,
                Property::CanGoPrevious => iface.can_go_previous_changed(emitter).await?,
                Property::CanPlay => iface.can_play_changed(emitter).await?,
                Property::CanPause => iface.can_pause_changed(emitter).await?,
                Property::CanSeek => iface.can_seek_changed(emitter).await?,
                Property::CanControl => iface.can_control_changed(emitter).await?,
            }
        }
        Ok(())
    }

    async fn seeked(&self, position_micros: i64) -> Result<()> {
        let iface_ref = self
            .connection
            .object_server()
            .interface::<_, PlayerIface>(OBJECT_PATH)
            .await?;
        PlayerIface::seeked(iface_ref.signal_emitter(), position_micros).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::projection::{project, track_id_for};
    use crate::sync::testing::playing_zone;

    #[test]
    fn test_metadata_keys() {
        let mut p = project(&playing_zone("z1", "Song", 10.0, 200.0), true);
        p.artists = vec!["A".into(), "B".into()];
        let meta = metadata(&p).unwrap();

        assert_eq!(
            meta["xesam:title"],
            OwnedValue::try_from(Value::from("Song")).unwrap()
        );
        assert_eq!(
            meta["mpris:length"],
            OwnedValue::try_from(Value::from(200_000_000i64)).unwrap()
        );
        assert_eq!(
            meta["mpris:trackid"],
            OwnedValue::try_from(Value::from(
                ObjectPath::try_from(track_id_for("z1").as_str()).unwrap()
            ))
            .unwrap()
        );
        assert_eq!(
            meta["xesam:artist"],
            OwnedValue::try_from(Value::from(vec!["A".to_string(), "B".to_string()])).unwrap()
        );
        assert!(!meta.contains_key("mpris:artUrl"));

        p.art_uri = Some("file:///tmp/k.jpg".into());
        assert!(metadata(&p).unwrap().contains_key("mpris:artUrl"));
    }

    #[test]
    fn test_idle_metadata_has_no_length() {
        let meta = metadata(&PlayerProjection::idle(false)).unwrap();
        assert!(!meta.contains_key("mpris:length"));
        assert_eq!(
            meta["mpris:trackid"],
            OwnedValue::try_from(Value::from(ObjectPath::try_from(IDLE_TRACK_ID).unwrap()))
                .unwrap()
        );
    }

    #[test]
    fn test_only_changed_properties_are_reported() {
        let playing = project(&playing_zone("z1", "Song", 10.0, 200.0), true);
        assert!(changed_properties(&playing, &playing).is_empty());

        let mut art = playing.clone();
        art.art_uri = Some("file:///tmp/k.jpg".into());
        assert_eq!(changed_properties(&playing, &art), vec![Property::Metadata]);

        let idle = PlayerProjection::idle(true);
        let changed = changed_properties(&playing, &idle);
        assert!(changed.contains(&Property::PlaybackStatus));
        assert!(changed.contains(&Property::Metadata));
        assert!(changed.contains(&Property::CanSeek));
        assert!(!changed.contains(&Property::CanControl));
        assert!(!changed.contains(&Property::Rate));
    }
}
