pub mod config;
pub mod error;
pub mod events;
pub mod notify;
pub mod identity;
pub mod photo;
pub mod validator;
pub mod profile;
pub mod storage;
pub mod frame;
pub mod camera;
pub mod capture;
pub mod pipeline;
pub mod measurements;
pub mod presenter;
pub mod studio;

pub use config::FitcamConfig;
pub use error::{CameraError, FailureKind, FailureReason, IntakeError, Result, StorageError};
pub use events::{EventBus, EventFilter, EventReceiver, IntakeEvent};
pub use notify::{EventBusNotifier, MemoryNotifier, Notifier, Severity, TracingNotifier};
pub use identity::{Identity, IdentityResolver, SessionContext, StaticIdentity};
pub use photo::{AcquiredImage, StoredPhotoReference};
pub use validator::{Rejection, Validator};
pub use profile::{Measurements, ProfilePatch, UserProfile};
pub use storage::{
    FsObjectStore, FsRecordStore, MemoryObjectStore, MemoryRecordStore, ObjectStore, RecordStore,
};
pub use frame::{FrameData, FrameFormat};
pub use camera::{CameraDevice, MediaStreamController, MediaStreamHandle, MockCamera, StreamConstraints};
pub use capture::CaptureSession;
pub use pipeline::{Collaborators, PipelineStatus, StatusSnapshot, Submission, UploadPipeline};
pub use measurements::{MeasurementField, MeasurementForm, MeasurementInput};
pub use presenter::{render, Banner, PresenterHandle, StatusPresenter, Tone};
pub use studio::{AcquisitionPath, TryOnStudio};
