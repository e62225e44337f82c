use crate::camera::{MediaStreamController, MediaStreamHandle, StreamConstraints};
use crate::error::{CameraError, IntakeError, Result};
use crate::frame::FrameData;
use crate::photo::{AcquiredImage, JPEG};
use std::sync::Arc;
use tracing::{debug, info};

/// A camera dialog: preview while open, one still on capture, then closed.
///
/// Every way out of the session (capture, close, drop) releases the stream.
pub struct CaptureSession {
    controller: Arc<MediaStreamController>,
    handle: Option<MediaStreamHandle>,
    jpeg_quality: u8,
}

impl CaptureSession {
    pub fn new(controller: Arc<MediaStreamController>, jpeg_quality: u8) -> Self {
        Self {
            controller,
            handle: None,
            jpeg_quality,
        }
    }

    /// Acquire the camera and begin previewing.
    ///
    /// A refused camera surfaces as `IntakeError::PermissionDenied` and leaves no stream live.
    pub async fn open(&mut self, constraints: &StreamConstraints) -> Result<()> {
        self.close();

        match self.controller.acquire(constraints).await {
            Ok(handle) => {
                self.handle = Some(handle);
                info!("Capture session opened on stream {}", handle.id());
                Ok(())
            }
            Err(CameraError::PermissionDenied { device }) => Err(IntakeError::PermissionDenied {
                details: format!("access to {} was refused", device),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle
            .map(|handle| self.controller.is_live(handle))
            .unwrap_or(false)
    }

    /// Current preview frame; the session stays open
    pub async fn preview(&self) -> Result<FrameData> {
        let handle = self.live_handle()?;
        Ok(self.controller.grab_frame(handle).await?)
    }

    /// Take the still and end the session, whatever happens to the upload afterwards
    pub async fn capture_frame(&mut self) -> Result<AcquiredImage> {
        let handle = self.live_handle()?;

        let grabbed = self.controller.grab_frame(handle).await;
        self.close();
        let frame = grabbed?;

        let quality = self.jpeg_quality;
        let (frame_id, width, height) = (frame.id, frame.width, frame.height);
        let jpeg = tokio::task::spawn_blocking(move || frame.encode_jpeg(quality))
            .await
            .map_err(|e| CameraError::Encode {
                details: format!("encoder task failed: {}", e),
            })??;

        debug!(
            "Captured frame {} as {}x{} JPEG ({} bytes, q{})",
            frame_id,
            width,
            height,
            jpeg.len(),
            quality
        );
        Ok(AcquiredImage::new(jpeg, JPEG))
    }

    /// Release the stream; safe to call any number of times
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.controller.release(handle);
            debug!("Capture session on stream {} closed", handle.id());
        }
    }

    fn live_handle(&self) -> Result<MediaStreamHandle> {
        match self.handle {
            Some(handle) if self.controller.is_live(handle) => Ok(handle),
            _ => Err(CameraError::StreamClosed.into()),
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}
