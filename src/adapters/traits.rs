//! Collaborator traits at the seams of the synchronizer.
//!
//! The synchronizer only talks to the outside world through these. The Roon
//! and MPRIS adapters implement them for real; tests implement them with
//! recording fakes.

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::sync::{EventSender, PlayerProjection};

/// Transport verbs understood by the remote core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlVerb {
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Previous,
}

impl ControlVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::PlayPause => "playpause",
            Self::Stop => "stop",
            Self::Next => "next",
            Self::Previous => "previous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    Relative,
    Absolute,
}

/// Outbound commands against a paired core.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn control(&self, zone_id: &str, verb: ControlVerb) -> Result<()>;

    async fn seek(&self, zone_id: &str, mode: SeekMode, seconds: f64) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageScale {
    Fit,
    Fill,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

/// Scaling and format hints passed to the image service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRequest {
    pub scale: ImageScale,
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
}

impl Default for ImageRequest {
    fn default() -> Self {
        Self {
            scale: ImageScale::Fit,
            width: 512,
            height: 512,
            format: Some(ImageFormat::Jpeg),
        }
    }
}

/// Image data returned from the core
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub content_type: String,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, image_key: &str, request: ImageRequest) -> Result<FetchedImage>;
}

/// Status line shown by the core for this extension.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn set_status(&self, message: &str, is_error: bool) -> Result<()>;
}

/// The desktop-facing property sink.
///
/// `publish` always receives the full projection; implementations notify
/// their clients only about fields that changed.
#[async_trait]
pub trait ControlSurface: Send + Sync {
    async fn publish(&self, projection: &PlayerProjection) -> Result<()>;

    /// Announce a discontinuous position change, in microseconds.
    async fn seeked(&self, position_micros: i64) -> Result<()>;
}

/// Context handed to a running adapter.
#[derive(Clone)]
pub struct AdapterContext {
    pub events: EventSender,
    pub shutdown: CancellationToken,
}

/// A long-running adapter loop managed by [`AdapterHandle`](super::AdapterHandle).
#[async_trait]
pub trait AdapterLogic: Send + Sync + 'static {
    /// Short name used in logs
    fn prefix(&self) -> &'static str;

    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Run until the remote side goes away or shutdown is requested.
    async fn run(&self, ctx: AdapterContext) -> Result<()>;
}
