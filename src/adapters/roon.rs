//! Roon adapter using rust-roon-api
//!
//! Connects to a Roon Core via SOOD discovery, subscribes to zones, and feeds
//! the synchronizer. Outbound commands go through the collaborator types
//! handed over in `SessionOpened`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use roon_api::{
    image::{Args as ImageArgs, Format as RoonImageFormat, Image, Scale, Scaling},
    status::{self, Status},
    transport::{Control, Seek, Transport},
    CoreEvent, Parsed, RoonApi, Services, Svc,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::adapters::traits::{
    AdapterContext, AdapterLogic, ControlVerb, FetchedImage, ImageFormat, ImageRequest,
    ImageScale, ImageSource, RemoteTransport, SeekMode, StatusSink,
};
use crate::sync::{EventSender, RemoteSession, SyncEvent};
use crate::zone::{SeekDelta, Zone, ZoneChanges};

const IMAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Image requests waiting for their `Jpeg`/`Png` reply, keyed by request id
type PendingImages = Arc<Mutex<HashMap<usize, (String, oneshot::Sender<FetchedImage>)>>>;

pub struct RoonAdapter {
    state_path: PathBuf,
}

impl RoonAdapter {
    pub fn new(state_path: PathBuf) -> Self {
        Self { state_path }
    }
}

#[async_trait]
impl AdapterLogic for RoonAdapter {
    fn prefix(&self) -> &'static str {
        "roon"
    }

    async fn init(&self) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
                info!("Created config directory: {:?}", parent);
            }
        }
        info!("Roon state file: {}", self.state_path.display());
        Ok(())
    }

    async fn run(&self, ctx: AdapterContext) -> Result<()> {
        info!("Starting Roon discovery...");

        let info = roon_api::info!("com.github", "Roon MPRIS");
        let mut roon = RoonApi::new(info);

        // Status service makes the extension visible in Roon Settings
        let (svc, status) = Status::new(&roon);
        let services = vec![
            Services::Transport(Transport::new()),
            Services::Image(Image::new()),
            Services::Status(status),
        ];
        let mut provided: HashMap<String, Svc> = HashMap::new();
        provided.insert(status::SVCNAME.to_owned(), svc);

        let state_path = self.state_path.to_string_lossy().to_string();
        let load_path = state_path.clone();
        let get_roon_state = move || RoonApi::load_roon_state(&load_path);

        let (mut handles, mut core_rx) = roon
            .start_discovery(Box::new(get_roon_state), provided, Some(services))
            .await
            .ok_or_else(|| anyhow!("Failed to start Roon discovery"))?;

        info!("Roon discovery started, authorize in Roon → Settings → Extensions");

        let pending: PendingImages = Arc::default();

        let result = loop {
            let received = tokio::select! {
                _ = ctx.shutdown.cancelled() => {
                    info!("Roon event handler shutdown requested");
                    break Ok(());
                }
                received = core_rx.recv() => received,
            };

            let Some((event, msg)) = received else {
                break Err(anyhow!("Roon event channel closed"));
            };

            match event {
                CoreEvent::Found(mut core) => {
                    info!(
                        "Roon Core found: {} (version {})",
                        core.display_name, core.display_version
                    );

                    let Some(transport) = core.get_transport().cloned() else {
                        warn!("Core {} offers no transport service", core.display_name);
                        continue;
                    };
                    transport.subscribe_zones().await;

                    let images = core.get_image().cloned().map(|image| {
                        Arc::new(RoonImages {
                            image,
                            pending: pending.clone(),
                        }) as Arc<dyn ImageSource>
                    });
                    let status = core
                        .get_status()
                        .cloned()
                        .map(|status| Arc::new(RoonStatus { status }) as Arc<dyn StatusSink>);

                    emit(
                        &ctx.events,
                        SyncEvent::SessionOpened(RemoteSession {
                            core_name: core.display_name.clone(),
                            transport: Arc::new(RoonTransport { transport }),
                            images,
                            status,
                        }),
                    );
                }
                CoreEvent::Lost(core) => {
                    warn!(
                        "Roon Core lost: {} (version {})",
                        core.display_name, core.display_version
                    );
                    emit(&ctx.events, SyncEvent::SessionClosed);
                }
                _ => {}
            }

            let Some((body, parsed)) = msg else {
                continue;
            };

            match parsed {
                Parsed::RoonState(roon_state) => {
                    if let Err(e) = RoonApi::save_roon_state(&state_path, roon_state) {
                        warn!("Failed to save Roon state: {}", e);
                    } else {
                        debug!("Roon state saved to {}", state_path);
                    }
                }
                Parsed::Zones(_) => match zones_event(&body) {
                    Ok(event) => emit(&ctx.events, event),
                    Err(e) => warn!("Undecodable zone message: {}", e),
                },
                Parsed::ZonesRemoved(zone_ids) => {
                    debug!("Zones removed: {:?}", zone_ids);
                    emit(
                        &ctx.events,
                        SyncEvent::Changed(ZoneChanges {
                            zones_removed: zone_ids,
                            ..Default::default()
                        }),
                    );
                }
                Parsed::ZonesSeek(_) => match seek_event(&body) {
                    Ok(event) => emit(&ctx.events, event),
                    Err(e) => warn!("Undecodable seek message: {}", e),
                },
                Parsed::Jpeg((image_key, data)) => {
                    complete_image(&pending, image_key, "image/jpeg", data).await;
                }
                Parsed::Png((image_key, data)) => {
                    complete_image(&pending, image_key, "image/png", data).await;
                }
                _ => {}
            }
        };

        handles.abort_all();
        result
    }
}

fn emit(events: &EventSender, event: SyncEvent) {
    if events.send(event).is_err() {
        debug!("Synchronizer gone, dropping Roon event");
    }
}

/// Body of a zone subscription message. The first reply carries a full
/// `zones` snapshot; later ones carry diffs.
#[derive(Debug, Default, Deserialize)]
struct ZonesBody {
    #[serde(default)]
    zones: Option<Vec<Zone>>,
    #[serde(default)]
    zones_added: Vec<Zone>,
    #[serde(default)]
    zones_changed: Vec<Zone>,
    #[serde(default)]
    zones_seek_changed: Vec<SeekDelta>,
}

/// Decode the raw body straight into the local zone model.
fn zones_event(body: &serde_json::Value) -> Result<SyncEvent> {
    let body = ZonesBody::deserialize(body)?;
    Ok(match body.zones {
        Some(zones) => SyncEvent::Subscribed { zones },
        None => SyncEvent::Changed(ZoneChanges {
            zones_added: body.zones_added,
            zones_changed: body.zones_changed,
            ..Default::default()
        }),
    })
}

fn seek_event(body: &serde_json::Value) -> Result<SyncEvent> {
    let body = ZonesBody::deserialize(body)?;
    Ok(SyncEvent::Changed(ZoneChanges {
        zones_seek_changed: body.zones_seek_changed,
        ..Default::default()
    }))
}

async fn complete_image(
    pending: &PendingImages,
    image_key: String,
    content_type: &str,
    data: Vec<u8>,
) {
    debug!("Received {} image: {} ({} bytes)", content_type, image_key, data.len());
    let mut pending = pending.lock().await;
    let Some(req_id) = pending
        .iter()
        .find(|(_, (key, _))| key == &image_key)
        .map(|(id, _)| *id)
    else {
        return;
    };
    if let Some((_, sender)) = pending.remove(&req_id) {
        let _ = sender.send(FetchedImage {
            content_type: content_type.to_string(),
            data,
        });
    }
}

pub struct RoonTransport {
    transport: Transport,
}

#[async_trait]
impl RemoteTransport for RoonTransport {
    async fn control(&self, zone_id: &str, verb: ControlVerb) -> Result<()> {
        let control = match verb {
            ControlVerb::Play => Control::Play,
            ControlVerb::Pause => Control::Pause,
            ControlVerb::PlayPause => Control::PlayPause,
            ControlVerb::Stop => Control::Stop,
            ControlVerb::Next => Control::Next,
            ControlVerb::Previous => Control::Previous,
        };
        self.transport.control(zone_id, &control).await;
        Ok(())
    }

    async fn seek(&self, zone_id: &str, mode: SeekMode, seconds: f64) -> Result<()> {
        let how = match mode {
            SeekMode::Relative => Seek::Relative,
            SeekMode::Absolute => Seek::Absolute,
        };
        self.transport
            .seek(zone_id, &how, whole_seconds(seconds)?)
            .await;
        Ok(())
    }
}

/// The core seeks in whole seconds.
fn whole_seconds(seconds: f64) -> Result<i32> {
    let rounded = seconds.round();
    if !rounded.is_finite() || rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
        return Err(anyhow!("seek offset out of range: {}", seconds));
    }
    Ok(rounded as i32)
}

pub struct RoonImages {
    image: Image,
    pending: PendingImages,
}

#[async_trait]
impl ImageSource for RoonImages {
    async fn fetch(&self, image_key: &str, request: ImageRequest) -> Result<FetchedImage> {
        let scale = match request.scale {
            ImageScale::Fit => Scale::Fit,
            ImageScale::Fill => Scale::Fill,
            ImageScale::Stretch => Scale::Stretch,
        };
        let format = request.format.map(|f| match f {
            ImageFormat::Jpeg => RoonImageFormat::Jpeg,
            ImageFormat::Png => RoonImageFormat::Png,
        });
        let args = ImageArgs::new(
            Some(Scaling::new(scale, request.width, request.height)),
            format,
        );

        let (tx, rx) = oneshot::channel();
        let req_id = {
            // Held across the request so the reply cannot beat the registration
            let mut pending = self.pending.lock().await;
            let req_id = self
                .image
                .get_image(image_key, args)
                .await
                .ok_or_else(|| anyhow!("Failed to request image"))?;
            pending.insert(req_id, (image_key.to_string(), tx));
            req_id
        };
        debug!("Requested image {} with req_id {}", image_key, req_id);

        let result = tokio::time::timeout(IMAGE_TIMEOUT, rx).await;
        if !matches!(result, Ok(Ok(_))) {
            self.pending.lock().await.remove(&req_id);
        }

        match result {
            Ok(Ok(image)) => Ok(image),
            Ok(Err(_)) => Err(anyhow!("Image request cancelled")),
            Err(_) => Err(anyhow!("Image request timed out")),
        }
    }
}

pub struct RoonStatus {
    status: Status,
}

#[async_trait]
impl StatusSink for RoonStatus {
    async fn set_status(&self, message: &str, is_error: bool) -> Result<()> {
        self.status.set_status(message.to_string(), is_error).await;
        Ok(())
    }
}
