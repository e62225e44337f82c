use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Validation rejected: {reason}")]
    ValidationRejected { reason: String },

    #[error("Camera permission denied: {details}")]
    PermissionDenied { details: String },

    #[error("Transmit failed: {details}")]
    TransmitFailed { details: String },

    #[error("Persist failed for {reference}: {details}")]
    PersistFailed { reference: String, details: String },

    #[error("Precondition failed: {details}")]
    PreconditionFailed { details: String },

    #[error("Submission {submission} was replaced by a newer one; {reference} not linked")]
    Superseded { submission: u64, reference: String },

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("System error: {message}")]
    System { message: String },
}

impl IntakeError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn rejected<S: Into<String>>(reason: S) -> Self {
        Self::ValidationRejected {
            reason: reason.into(),
        }
    }

    pub fn no_identity() -> Self {
        Self::PreconditionFailed {
            details: "no signed-in user for this session".to_string(),
        }
    }

    /// Classify the error into the user-facing failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            IntakeError::ValidationRejected { .. } => FailureKind::ValidationRejected,
            IntakeError::PermissionDenied { .. } => FailureKind::PermissionDenied,
            IntakeError::Camera(CameraError::PermissionDenied { .. }) => {
                FailureKind::PermissionDenied
            }
            IntakeError::TransmitFailed { .. } => FailureKind::TransmitFailed,
            IntakeError::PersistFailed { .. } => FailureKind::PersistFailed,
            IntakeError::PreconditionFailed { .. } => FailureKind::PreconditionFailed,
            IntakeError::Superseded { .. } => FailureKind::Superseded,
            IntakeError::Storage(_) => FailureKind::TransmitFailed,
            IntakeError::Camera(_)
            | IntakeError::Config(_)
            | IntakeError::Io(_)
            | IntakeError::System { .. } => FailureKind::Internal,
        }
    }

    pub fn to_reason(&self) -> FailureReason {
        FailureReason {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Camera hardware errors
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Permission denied for camera {device}")]
    PermissionDenied { device: String },

    #[error("Failed to open camera {device}: {details}")]
    DeviceOpen { device: String, details: String },

    #[error("Camera stream is closed")]
    StreamClosed,

    #[error("Frame capture failed: {details}")]
    Capture { details: String },

    #[error("Still image encoding failed: {details}")]
    Encode { details: String },
}

/// Object storage and record store errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No object stored under key {key}")]
    NotFound { key: String },

    #[error("Storage unavailable: {details}")]
    Unavailable { details: String },
}

/// Event bus errors
#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

/// User-facing failure classes carried by a failed pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    ValidationRejected,
    PermissionDenied,
    TransmitFailed,
    PersistFailed,
    PreconditionFailed,
    Superseded,
    Internal,
}

impl FailureKind {
    pub fn title(&self) -> &'static str {
        match self {
            FailureKind::ValidationRejected => "Invalid photo",
            FailureKind::PermissionDenied => "Camera unavailable",
            FailureKind::TransmitFailed => "Upload failed",
            FailureKind::PersistFailed => "Profile not updated",
            FailureKind::PreconditionFailed => "Sign in required",
            FailureKind::Superseded => "Upload replaced",
            FailureKind::Internal => "Something went wrong",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

pub type Result<T> = std::result::Result<T, IntakeError>;
