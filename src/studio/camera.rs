use super::{AcquisitionPath, TryOnStudio};
use crate::capture::CaptureSession;
use crate::error::{CameraError, FailureKind, IntakeError, Result};
use crate::frame::FrameData;
use crate::notify::Severity;
use crate::pipeline::Submission;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl TryOnStudio {
    /// Open the camera dialog and start previewing
    pub async fn open_camera(&mut self) -> Result<()> {
        self.select_path(AcquisitionPath::Camera);

        let controller = Arc::clone(&self.controller);
        let jpeg_quality = self.jpeg_quality;
        let session = self
            .capture
            .get_or_insert_with(|| CaptureSession::new(controller, jpeg_quality));

        if let Err(e) = session.open(&self.constraints).await {
            self.capture = None;
            self.active_path = None;
            self.report_camera_failure(&e);
            return Err(e);
        }

        info!("Camera dialog open");
        Ok(())
    }

    pub async fn preview(&self) -> Result<FrameData> {
        match &self.capture {
            Some(session) => session.preview().await,
            None => Err(CameraError::StreamClosed.into()),
        }
    }

    pub fn camera_open(&self) -> bool {
        self.capture
            .as_ref()
            .map(|session| session.is_open())
            .unwrap_or(false)
    }

    /// Take the still, close the dialog, then upload.
    ///
    /// The camera is released before the upload starts, so its outcome has no
    /// bearing on the stream.
    pub async fn capture_photo(&mut self) -> Result<Submission> {
        let mut session = match self.capture.take() {
            Some(session) => session,
            None => {
                let err: IntakeError = CameraError::StreamClosed.into();
                self.report_camera_failure(&err);
                return Err(err);
            }
        };

        let captured = session.capture_frame().await;
        drop(session);
        self.active_path = None;

        let image = match captured {
            Ok(image) => image,
            Err(e) => {
                self.report_camera_failure(&e);
                return Err(e);
            }
        };
        debug!("Captured {} byte still", image.byte_len());

        Ok(self.pipeline.submit_in(&self.context, image).await)
    }

    /// Close the camera dialog without capturing
    pub fn close_camera(&mut self) {
        if let Some(mut session) = self.capture.take() {
            session.close();
            info!("Camera dialog closed");
        }
        if self.active_path == Some(AcquisitionPath::Camera) {
            self.active_path = None;
        }
    }

    fn report_camera_failure(&self, err: &IntakeError) {
        warn!("Camera failure: {}", err);
        let severity = match err.kind() {
            FailureKind::PermissionDenied => Severity::Warning,
            _ => Severity::Error,
        };
        self.collaborators
            .notifier
            .notify(err.kind().title(), &err.to_string(), severity);
    }
}
