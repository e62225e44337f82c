use crate::config::{CameraConfig, Facing};
use crate::error::CameraError;
use crate::frame::FrameData;
use async_trait::async_trait;
use std::sync::Arc;

/// What the caller asks of the camera when opening a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub resolution: (u32, u32),
    pub fps: u32,
    pub facing: Facing,
}

impl StreamConstraints {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            resolution: config.resolution,
            fps: config.fps,
            facing: config.facing,
        }
    }
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            resolution: (1280, 720),
            fps: 30,
            facing: Facing::User,
        }
    }
}

/// Camera hardware able to open live streams
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Open a live stream; refusal by the user or OS is `CameraError::PermissionDenied`
    async fn open(&self, constraints: &StreamConstraints)
        -> Result<Arc<dyn VideoStream>, CameraError>;

    fn name(&self) -> String;
}

/// A live hardware stream
#[async_trait]
pub trait VideoStream: Send + Sync {
    /// Read the current frame at the stream's native resolution
    async fn grab_frame(&self) -> Result<FrameData, CameraError>;

    /// Stop the hardware; must be idempotent and must not block
    fn stop(&self);

    fn is_live(&self) -> bool;
}
