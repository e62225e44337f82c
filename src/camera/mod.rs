mod controller;
mod device;
#[cfg(all(target_os = "linux", feature = "camera"))]
mod gst;
mod mock;

pub use controller::{MediaStreamController, MediaStreamHandle};
pub use device::{CameraDevice, StreamConstraints, VideoStream};
#[cfg(all(target_os = "linux", feature = "camera"))]
pub use gst::GstCamera;
pub use mock::MockCamera;

use crate::config::CameraConfig;
use crate::error::{IntakeError, Result};
use std::sync::Arc;

/// Build the camera device named by `camera.backend`
pub fn device_from_config(config: &CameraConfig) -> Result<Arc<dyn CameraDevice>> {
    match config.backend.as_str() {
        "mock" => Ok(Arc::new(MockCamera::new())),
        #[cfg(all(target_os = "linux", feature = "camera"))]
        "gstreamer" => Ok(Arc::new(GstCamera::new(config.index)?)),
        #[cfg(not(all(target_os = "linux", feature = "camera")))]
        "gstreamer" => {
            tracing::warn!("GStreamer camera backend requires Linux and the camera feature");
            Err(IntakeError::system(
                "gstreamer camera backend is not available in this build",
            ))
        }
        other => Err(IntakeError::system(format!(
            "Unknown camera backend '{}'",
            other
        ))),
    }
}
