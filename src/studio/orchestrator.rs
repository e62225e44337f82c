use super::AcquisitionPath;
use crate::camera::{CameraDevice, MediaStreamController, StreamConstraints};
use crate::capture::CaptureSession;
use crate::config::FitcamConfig;
use crate::error::{IntakeError, Result};
use crate::events::EventBus;
use crate::identity::SessionContext;
use crate::measurements::{MeasurementField, MeasurementForm, MeasurementInput};
use crate::notify::Severity;
use crate::photo::AcquiredImage;
use crate::pipeline::{Collaborators, StatusSnapshot, Submission, UploadPipeline};
use crate::presenter::{Banner, PresenterHandle, StatusPresenter};
use crate::profile::{Measurements, UserProfile};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Wires the acquisition components together for one session
pub struct TryOnStudio {
    pub(super) context: SessionContext,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) collaborators: Collaborators,
    pub(super) profiles_collection: String,
    pub(super) pipeline: Arc<UploadPipeline>,
    pub(super) controller: Arc<MediaStreamController>,
    pub(super) constraints: StreamConstraints,
    pub(super) jpeg_quality: u8,
    pub(super) capture: Option<CaptureSession>,
    pub(super) form: MeasurementForm,
    pub(super) active_path: Option<AcquisitionPath>,
    pub(super) presenter: Option<PresenterHandle>,
}

impl TryOnStudio {
    /// Build the studio and start the status presenter; needs a tokio runtime
    pub fn new(
        config: &FitcamConfig,
        context: SessionContext,
        device: Arc<dyn CameraDevice>,
        collaborators: Collaborators,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));

        let pipeline = Arc::new(
            UploadPipeline::from_config(config, collaborators.clone())
                .with_event_bus(Arc::clone(&event_bus)),
        );
        let controller =
            Arc::new(MediaStreamController::new(device).with_event_bus(Arc::clone(&event_bus)));
        let form = MeasurementForm::from_collaborators(
            &collaborators,
            config.storage.profiles_collection.clone(),
        )
        .with_event_bus(Arc::clone(&event_bus));
        let presenter = StatusPresenter::spawn(
            pipeline.subscribe(),
            Duration::from_millis(config.status.clear_delay_ms),
        );

        info!("Try-on studio ready");
        debug!("Studio config: {:?}", config);

        Self {
            context,
            event_bus,
            collaborators,
            profiles_collection: config.storage.profiles_collection.clone(),
            pipeline,
            controller,
            constraints: StreamConstraints::from_config(&config.camera),
            jpeg_quality: config.camera.jpeg_quality,
            capture: None,
            form,
            active_path: None,
            presenter: Some(presenter),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn active_path(&self) -> Option<AcquisitionPath> {
        self.active_path
    }

    /// Switch acquisition path; leaving the camera tears the stream down
    pub fn select_path(&mut self, path: AcquisitionPath) {
        if self.active_path == Some(path) {
            return;
        }
        if self.active_path == Some(AcquisitionPath::Camera) {
            self.close_camera();
        }

        debug!("Acquisition path: {}", path.name());
        self.active_path = Some(path);
    }

    /// Read a picked file and run it through the upload pipeline
    pub async fn upload_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Submission> {
        self.select_path(AcquisitionPath::Upload);

        let path = path.as_ref();
        let image = match AcquiredImage::from_file(path).await {
            Ok(image) => image,
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                self.collaborators.notifier.notify(
                    "Could not read file",
                    &format!("{}: {}", path.display(), e),
                    Severity::Error,
                );
                return Err(e);
            }
        };

        Ok(self.upload_image(image).await)
    }

    pub async fn upload_image(&mut self, image: AcquiredImage) -> Submission {
        self.select_path(AcquisitionPath::Upload);
        self.pipeline.submit_in(&self.context, image).await
    }

    pub fn set_measurement(&mut self, field: MeasurementField, value: impl Into<String>) {
        self.select_path(AcquisitionPath::Manual);
        self.form.set(field, value);
    }

    pub fn measurement_input(&self) -> &MeasurementInput {
        self.form.input()
    }

    pub async fn submit_measurements(&mut self) -> Result<Measurements> {
        self.select_path(AcquisitionPath::Manual);
        self.form.submit_in(&self.context).await
    }

    /// The signed-in user's stored profile, if any
    pub async fn profile(&self) -> Result<Option<UserProfile>> {
        let identity = self.context.require_identity()?;
        let record = self
            .collaborators
            .records
            .fetch(&self.profiles_collection, identity)
            .await?;

        match record {
            Some(record) => Ok(Some(UserProfile::from_record(record)?)),
            None => Ok(None),
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        self.pipeline.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.pipeline.subscribe()
    }

    pub fn banner(&self) -> Option<Banner> {
        self.presenter.as_ref().and_then(|presenter| presenter.banner())
    }

    pub fn subscribe_banner(&self) -> Result<watch::Receiver<Option<Banner>>> {
        self.presenter
            .as_ref()
            .map(|presenter| presenter.subscribe())
            .ok_or_else(|| IntakeError::system("status presenter has been shut down"))
    }

    /// Camera streams currently held open
    pub fn live_streams(&self) -> usize {
        self.controller.live_handles()
    }
}
