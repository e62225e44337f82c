use crate::error::FailureReason;
use crate::photo::StoredPhotoReference;
use serde::{Deserialize, Serialize};

/// Processing state of the most recent photo submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    Idle,
    Validating,
    Uploading,
    Processing,
    Succeeded(StoredPhotoReference),
    Failed(FailureReason),
}

impl PipelineStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Succeeded(_) | PipelineStatus::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineStatus::Idle => "idle",
            PipelineStatus::Validating => "validating",
            PipelineStatus::Uploading => "uploading",
            PipelineStatus::Processing => "processing",
            PipelineStatus::Succeeded(_) => "succeeded",
            PipelineStatus::Failed(_) => "failed",
        }
    }
}

/// The observable status together with the submission that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// 0 until the first submission
    pub submission: u64,
    pub status: PipelineStatus,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            submission: 0,
            status: PipelineStatus::Idle,
        }
    }
}

/// Outcome of one `submit` call, returned to its own caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: u64,
    /// Terminal status reached by this submission
    pub status: PipelineStatus,
    /// False when a newer submission started before this one finished
    pub current: bool,
}

impl Submission {
    pub fn reference(&self) -> Option<&StoredPhotoReference> {
        match &self.status {
            PipelineStatus::Succeeded(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.status {
            PipelineStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}
