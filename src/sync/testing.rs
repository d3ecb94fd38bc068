//! Zone builders and recording fakes for the collaborator traits.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Notify;

use crate::adapters::traits::{
    ControlSurface, ControlVerb, FetchedImage, ImageRequest, ImageSource, RemoteTransport,
    SeekMode, StatusSink,
};
use crate::sync::PlayerProjection;
use crate::zone::{Capabilities, LineValue, NowPlaying, Output, Zone, ZoneState};

/// A stopped zone with nothing loaded.
pub fn zone(id: &str) -> Zone {
    Zone {
        id: id.to_string(),
        display_name: format!("Zone {}", id),
        state: ZoneState::Stopped,
        now_playing: None,
        capabilities: Capabilities::default(),
        settings: None,
        outputs: Vec::new(),
        queue_time_remaining: None,
    }
}

/// A playing zone with a titled track and all transport controls allowed.
pub fn playing_zone(id: &str, title: &str, seek: f64, length: f64) -> Zone {
    Zone {
        state: ZoneState::Playing,
        now_playing: Some(NowPlaying {
            title: Some(LineValue::from(title)),
            seek_position_seconds: Some(seek),
            length_seconds: Some(length),
            ..Default::default()
        }),
        capabilities: Capabilities {
            can_play: true,
            can_pause: true,
            can_seek: true,
            can_go_next: true,
            can_go_previous: true,
        },
        ..zone(id)
    }
}

pub fn zone_with_output(id: &str, output_id: &str, output_name: &str) -> Zone {
    Zone {
        outputs: vec![Output {
            id: output_id.to_string(),
            display_name: output_name.to_string(),
        }],
        ..zone(id)
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    published: Mutex<Vec<PlayerProjection>>,
    seeked: Mutex<Vec<i64>>,
}

impl RecordingSurface {
    pub fn published(&self) -> Vec<PlayerProjection> {
        self.published.lock().unwrap().clone()
    }

    pub fn last(&self) -> PlayerProjection {
        self.published
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("nothing published")
    }

    pub fn seeked(&self) -> Vec<i64> {
        self.seeked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControlSurface for RecordingSurface {
    async fn publish(&self, projection: &PlayerProjection) -> Result<()> {
        self.published.lock().unwrap().push(projection.clone());
        Ok(())
    }

    async fn seeked(&self, position_micros: i64) -> Result<()> {
        self.seeked.lock().unwrap().push(position_micros);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SentCommand {
    Control(String, ControlVerb),
    Seek(String, SeekMode, f64),
}

/// Records every command; optionally rejects the next one.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentCommand>>,
    fail_next: AtomicBool,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn record(&self, command: SentCommand) -> Result<()> {
        self.sent.lock().unwrap().push(command);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("rejected by core");
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteTransport for RecordingTransport {
    async fn control(&self, zone_id: &str, verb: ControlVerb) -> Result<()> {
        self.record(SentCommand::Control(zone_id.to_string(), verb))
    }

    async fn seek(&self, zone_id: &str, mode: SeekMode, seconds: f64) -> Result<()> {
        self.record(SentCommand::Seek(zone_id.to_string(), mode, seconds))
    }
}

/// Serves `image:<key>` bytes. A gated source holds every fetch until the
/// gate is notified.
pub struct FakeImages {
    content_type: String,
    fail: bool,
    gate: Option<Arc<Notify>>,
    fetches: AtomicUsize,
}

impl FakeImages {
    pub fn new(content_type: &str) -> Self {
        Self {
            content_type: content_type.to_string(),
            fail: false,
            gate: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("image/jpeg")
        }
    }

    pub fn gated(content_type: &str, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(content_type)
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSource for FakeImages {
    async fn fetch(&self, image_key: &str, _request: ImageRequest) -> Result<FetchedImage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            anyhow::bail!("image service timed out");
        }
        Ok(FetchedImage {
            content_type: self.content_type.clone(),
            data: format!("image:{}", image_key).into_bytes(),
        })
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    messages: Mutex<Vec<(String, bool)>>,
}

impl RecordingStatus {
    pub fn messages(&self) -> Vec<(String, bool)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<(String, bool)> {
        self.messages.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl StatusSink for RecordingStatus {
    async fn set_status(&self, message: &str, is_error: bool) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), is_error));
        Ok(())
    }
}

/// Let spawned tasks run to completion on the current-thread test runtime.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
