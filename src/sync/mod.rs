//! Zone State Synchronizer
//!
//! A single actor owns the zone registry, the active selection, the seek
//! anchor, and the artwork cache. Every input (remote feed, control-surface
//! action, artwork completion) arrives as a [`SyncEvent`] on one channel and
//! is handled to completion before the next one, so none of that state needs
//! a lock. Remote I/O runs in spawned tasks; only artwork completions come
//! back as events.

pub mod artwork;
pub mod commands;
pub mod position;
pub mod projection;
pub mod registry;
pub mod selector;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::traits::{
    ControlSurface, ImageRequest, ImageSource, RemoteTransport, StatusSink,
};
use crate::error::{SyncError, SyncResult};
use crate::zone::{Zone, ZoneChanges};

pub use artwork::{ArtworkCache, Lookup};
pub use commands::{ControlAction, RemoteCommand};
pub use position::{anchor_channel, AnchorSender, PositionHandle, SeekAnchor};
pub use projection::{LoopStatus, PlaybackStatus, PlayerProjection};
pub use registry::ZoneRegistry;

pub type EventSender = mpsc::UnboundedSender<SyncEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SyncEvent>;

const IDLE_STATUS: &str = "No zone selected";
const DISCONNECTED_STATUS: &str = "Disconnected - searching...";

/// Collaborators of one paired core.
#[derive(Clone)]
pub struct RemoteSession {
    pub core_name: String,
    pub transport: Arc<dyn RemoteTransport>,
    pub images: Option<Arc<dyn ImageSource>>,
    pub status: Option<Arc<dyn StatusSink>>,
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("core_name", &self.core_name)
            .field("images", &self.images.is_some())
            .field("status", &self.status.is_some())
            .finish()
    }
}

/// Everything the synchronizer reacts to.
#[derive(Debug)]
pub enum SyncEvent {
    /// A core was paired
    SessionOpened(RemoteSession),
    /// The core went away; treated as an empty snapshot
    SessionClosed,
    /// Initial zone snapshot
    Subscribed { zones: Vec<Zone> },
    /// Incremental change-set
    Changed(ZoneChanges),
    /// Subscription ended; treated as an empty snapshot
    Unsubscribed,
    /// Inbound control-surface action
    Action(ControlAction),
    /// Completion of a spawned artwork fetch
    ArtworkFetched {
        key: String,
        result: SyncResult<PathBuf>,
    },
}

pub struct Synchronizer {
    preference: Option<String>,
    registry: ZoneRegistry,
    active_zone_id: Option<String>,
    session: Option<RemoteSession>,
    /// Outlives the session so the disconnect can still be reported
    status: Option<Arc<dyn StatusSink>>,
    last_status: Option<(String, bool)>,
    surface: Arc<dyn ControlSurface>,
    artwork: ArtworkCache,
    image_request: ImageRequest,
    anchor: AnchorSender,
    projection: PlayerProjection,
    events: EventSender,
    shutdown: CancellationToken,
}

impl Synchronizer {
    /// Build the synchronizer. `events` must feed the receiver later passed
    /// to [`run`](Self::run); artwork completions are sent back through it.
    pub fn new(
        surface: Arc<dyn ControlSurface>,
        anchor: AnchorSender,
        artwork: ArtworkCache,
        preference: Option<String>,
        events: EventSender,
        shutdown: CancellationToken,
    ) -> Self {
        anchor.send_replace(SeekAnchor::idle(Instant::now()));
        let preference = preference
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        Self {
            preference,
            registry: ZoneRegistry::new(),
            active_zone_id: None,
            session: None,
            status: None,
            last_status: None,
            surface,
            artwork,
            image_request: ImageRequest::default(),
            anchor,
            projection: PlayerProjection::idle(false),
            events,
            shutdown,
        }
    }

    pub fn active_zone_id(&self) -> Option<&str> {
        self.active_zone_id.as_deref()
    }

    /// Last projection handed to the surface
    pub fn projection(&self) -> &PlayerProjection {
        &self.projection
    }

    pub fn registry(&self) -> &ZoneRegistry {
        &self.registry
    }

    /// Process events until shutdown is requested or every sender is gone.
    pub async fn run(mut self, mut rx: EventReceiver) {
        info!("Synchronizer started");
        let idle = self.projection.clone();
        self.publish(idle).await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
            }
        }

        info!("Synchronizer stopped");
    }

    pub async fn handle(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::SessionOpened(session) => {
                info!("Paired with core {}", session.core_name);
                if let Some(status) = &session.status {
                    self.status = Some(status.clone());
                    self.last_status = None;
                }
                self.session = Some(session);
                self.refresh().await;
            }
            SyncEvent::SessionClosed => {
                // The adapter loop reports every exit, paired or not
                let Some(session) = self.session.take() else {
                    return;
                };
                info!("Lost core {}", session.core_name);
                self.registry.replace_all(Vec::new());
                self.active_zone_id = None;
                self.reconcile(false).await;
                self.report_status(DISCONNECTED_STATUS.to_string(), true);
            }
            SyncEvent::Subscribed { zones } => {
                debug!("Zone snapshot with {} zones", zones.len());
                self.registry.replace_all(zones);
                self.forget_missing_active();
                self.reconcile(true).await;
            }
            SyncEvent::Unsubscribed => {
                debug!("Zone subscription ended");
                self.registry.replace_all(Vec::new());
                self.forget_missing_active();
                self.reconcile(true).await;
            }
            SyncEvent::Changed(changes) => self.apply_changes(changes).await,
            SyncEvent::Action(action) => self.route(action).await,
            SyncEvent::ArtworkFetched { key, result } => self.apply_artwork(key, result).await,
        }
    }

    async fn apply_changes(&mut self, changes: ZoneChanges) {
        let ZoneChanges {
            zones_removed,
            zones_added,
            zones_changed,
            zones_seek_changed,
        } = changes;

        let mut active_touched = false;

        for id in &zones_removed {
            if self.registry.remove(id).is_some() && self.is_active(id) {
                debug!(zone_id = %id, "Active zone removed");
                self.active_zone_id = None;
            }
        }

        for zone in zones_added.into_iter().chain(zones_changed) {
            active_touched |= self.is_active(&zone.id);
            self.registry.upsert(zone);
        }

        self.reconcile(active_touched).await;

        for delta in zones_seek_changed {
            let applied = self.registry.apply_seek_delta(
                &delta.zone_id,
                delta.seek_position_seconds,
                delta.queue_time_remaining,
            );
            if applied && self.is_active(&delta.zone_id) {
                self.reseek().await;
            }
        }
    }

    fn is_active(&self, zone_id: &str) -> bool {
        self.active_zone_id.as_deref() == Some(zone_id)
    }

    fn active_zone(&self) -> Option<&Zone> {
        self.active_zone_id
            .as_deref()
            .and_then(|id| self.registry.get(id))
    }

    fn forget_missing_active(&mut self) {
        if let Some(id) = &self.active_zone_id {
            if !self.registry.contains(id) {
                debug!(zone_id = %id, "Active zone gone");
                self.active_zone_id = None;
            }
        }
    }

    /// Select only when nothing is active; otherwise re-project if the
    /// active zone's snapshot changed.
    async fn reconcile(&mut self, active_touched: bool) {
        if self.active_zone_id.is_none() {
            self.active_zone_id = selector::select(&self.registry, self.preference.as_deref(), None);
            match &self.active_zone_id {
                Some(id) => info!(zone_id = %id, "Active zone selected"),
                None => debug!("No zone to select"),
            }
            self.refresh().await;
        } else if active_touched {
            self.refresh().await;
        }
    }

    /// Re-project the active zone (or idle), replace the seek anchor, and
    /// publish.
    async fn refresh(&mut self) {
        let now = Instant::now();
        let session_present = self.session.is_some();

        let active = self.active_zone();
        let image_key = active.and_then(Zone::image_key).map(str::to_string);
        let (mut next, anchor, status) = match active {
            Some(zone) => {
                let next = projection::project(zone, session_present);
                let status = projection::status_line(zone, &next);
                (next, SeekAnchor::from_zone(zone, now), status)
            }
            None => (
                PlayerProjection::idle(session_present),
                SeekAnchor::idle(now),
                IDLE_STATUS.to_string(),
            ),
        };

        if let Some(key) = image_key {
            next.art_uri = self.resolve_artwork(&key);
        }

        self.anchor.send_replace(anchor);
        self.publish(next).await;
        if session_present {
            self.report_status(status, false);
        }
    }

    /// Seek delta on the active zone: new anchor plus a Seeked notification.
    /// Whether a position is known feeds `can_seek`, so re-publish when that flips.
    async fn reseek(&mut self) {
        let Some(zone) = self.active_zone() else {
            return;
        };
        let anchor = SeekAnchor::from_zone(zone, Instant::now());
        let position = anchor.position_micros(anchor.anchored_at);
        let mut next = projection::project(zone, self.session.is_some());
        self.anchor.send_replace(anchor);

        if next.can_seek != self.projection.can_seek {
            next.art_uri = self.projection.art_uri.clone();
            self.publish(next).await;
        }

        if let Err(e) = self.surface.seeked(position).await {
            warn!("Failed to signal seek: {}", e);
        }
    }

    async fn publish(&mut self, next: PlayerProjection) {
        if let Err(e) = self.surface.publish(&next).await {
            warn!("Failed to publish player state: {}", e);
        }
        self.projection = next;
    }

    /// Cache hit returns the URI now; a miss starts a fetch whose result
    /// arrives later as [`SyncEvent::ArtworkFetched`].
    fn resolve_artwork(&mut self, key: &str) -> Option<String> {
        let images = self.session.as_ref().and_then(|s| s.images.clone())?;
        let dir = self.artwork.dir()?.to_path_buf();

        match self.artwork.lookup(key) {
            Lookup::Hit(uri) => Some(uri),
            Lookup::Fetch => {
                debug!(image_key = key, "Fetching artwork");
                let events = self.events.clone();
                let request = self.image_request;
                let key = key.to_string();
                tokio::spawn(async move {
                    let result = artwork::fetch_to_disk(images.as_ref(), &dir, &key, request).await;
                    // Receiver gone means the synchronizer already stopped
                    let _ = events.send(SyncEvent::ArtworkFetched { key, result });
                });
                None
            }
            Lookup::InFlight | Lookup::Disabled => None,
        }
    }

    async fn apply_artwork(&mut self, key: String, result: SyncResult<PathBuf>) {
        let Some(uri) = self.artwork.complete(&key, result) else {
            return;
        };

        // Only patch art onto the track it was fetched for
        let current_key = self.active_zone().and_then(Zone::image_key);
        if current_key != Some(key.as_str()) {
            debug!(image_key = %key, "Artwork no longer current, not applied");
            return;
        }
        if self.projection.art_uri.as_deref() == Some(uri.as_str()) {
            return;
        }

        let mut next = self.projection.clone();
        next.art_uri = Some(uri);
        self.publish(next).await;
    }

    async fn route(&mut self, action: ControlAction) {
        match action {
            ControlAction::Quit => {
                info!("Quit requested");
                self.shutdown.cancel();
            }
            ControlAction::Raise => debug!("Raise requested, nothing to raise"),
            action => {
                if let Err(e) = self.send_command(&action).await {
                    if e.is_silent() {
                        debug!("Dropped {:?}: {}", action, e);
                    } else {
                        warn!("Dropped {:?}: {}", action, e);
                    }
                }
            }
        }
    }

    async fn send_command(&mut self, action: &ControlAction) -> SyncResult<()> {
        let transport = self
            .session
            .as_ref()
            .map(|s| s.transport.clone())
            .ok_or(SyncError::TransportUnavailable)?;

        if self.active_zone_id.is_none() {
            self.reconcile(false).await;
        }
        let zone_id = self
            .active_zone_id
            .clone()
            .ok_or(SyncError::ZoneUnresolved)?;

        if let Some(command) = commands::plan(action, &self.projection.track_id)? {
            debug!(zone_id = %zone_id, "Routing {}", command.name());
            commands::dispatch(transport, zone_id, command);
        }
        Ok(())
    }

    /// Fire-and-forget status line update, skipped when unchanged.
    fn report_status(&mut self, message: String, is_error: bool) {
        let Some(status) = self.status.clone() else {
            return;
        };
        let next = (message, is_error);
        if self.last_status.as_ref() == Some(&next) {
            return;
        }
        self.last_status = Some(next.clone());

        tokio::spawn(async move {
            let (message, is_error) = next;
            if let Err(e) = status.set_status(&message, is_error).await {
                warn!("Failed to update status: {}", e);
            }
        });
    }
}
