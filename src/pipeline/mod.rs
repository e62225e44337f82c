//! Photo upload pipeline.
//!
//! A submission runs validate → put → public URL → profile upsert, strictly in
//! that order. Every submission takes the next id from a counter; only the
//! latest id may move the observable status or link its photo to the profile,
//! so a slow upload that finishes after a newer one started can never
//! overwrite what the user is looking at. Superseded runs end quietly.

mod status;
#[cfg(test)]
mod tests;

pub use status::{PipelineStatus, StatusSnapshot, Submission};

use crate::config::FitcamConfig;
use crate::error::{FailureKind, FailureReason, IntakeError, StorageError};
use crate::events::{EventBus, IntakeEvent};
use crate::identity::{Identity, SessionContext};
use crate::notify::{Notifier, Severity};
use crate::photo::{AcquiredImage, StoredPhotoReference};
use crate::profile::ProfilePatch;
use crate::storage::{ObjectStore, RecordStore};
use crate::validator::Validator;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

/// Shared collaborators used by the pipeline and the measurement form
#[derive(Clone)]
pub struct Collaborators {
    pub objects: Arc<dyn ObjectStore>,
    pub records: Arc<dyn RecordStore>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct UploadPipeline {
    collaborators: Collaborators,
    validator: Validator,
    profiles_collection: String,
    latest: AtomicU64,
    link_lock: Mutex<()>,
    last_key_millis: AtomicI64,
    status_tx: watch::Sender<StatusSnapshot>,
    event_bus: Option<Arc<EventBus>>,
}

impl UploadPipeline {
    pub fn new(
        collaborators: Collaborators,
        validator: Validator,
        profiles_collection: impl Into<String>,
    ) -> Self {
        let (status_tx, _) = watch::channel(StatusSnapshot::default());
        Self {
            collaborators,
            validator,
            profiles_collection: profiles_collection.into(),
            latest: AtomicU64::new(0),
            link_lock: Mutex::new(()),
            last_key_millis: AtomicI64::new(0),
            status_tx,
            event_bus: None,
        }
    }

    pub fn from_config(config: &FitcamConfig, collaborators: Collaborators) -> Self {
        Self::new(
            collaborators,
            Validator::from_config(&config.upload),
            config.storage.profiles_collection.clone(),
        )
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Current observable status
    pub fn status(&self) -> StatusSnapshot {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    /// Submit on behalf of the session's user; no user means a precondition failure
    pub async fn submit_in(&self, context: &SessionContext, image: AcquiredImage) -> Submission {
        match context.require_identity() {
            Ok(identity) => self.submit(identity, image).await,
            Err(e) => {
                let reason = e.to_reason();
                let id = self.begin(PipelineStatus::Failed(reason.clone()));
                self.report_failure(id, &reason);
                Submission {
                    id,
                    status: PipelineStatus::Failed(reason),
                    current: self.latest.load(Ordering::SeqCst) == id,
                }
            }
        }
    }

    /// Run one submission to its terminal state
    pub async fn submit(&self, identity: &Identity, image: AcquiredImage) -> Submission {
        let id = self.begin(PipelineStatus::Validating);
        info!(
            "Submission {} for {}: {} bytes of {}",
            id,
            identity,
            image.byte_len(),
            image.content_type()
        );

        if let Err(rejection) = self.validator.validate(&image) {
            return self.fail(id, IntakeError::rejected(rejection.to_string()).to_reason());
        }

        self.transition(id, PipelineStatus::Uploading);
        let key = self.storage_key(identity, &image);
        if let Err(e) = self
            .collaborators
            .objects
            .put(&key, Arc::clone(image.data()), image.content_type())
            .await
        {
            let err = IntakeError::TransmitFailed {
                details: e.to_string(),
            };
            return self.fail(id, err.to_reason());
        }
        drop(image);

        let url = match self.collaborators.objects.public_url(&key).await {
            Ok(url) => url,
            Err(e) => {
                error!("Stored object {} has no public URL: {}", key, e);
                let err = IntakeError::TransmitFailed {
                    details: format!("no public URL for uploaded photo: {}", e),
                };
                return self.fail(id, err.to_reason());
            }
        };
        let reference = StoredPhotoReference { key, url };

        self.transition(id, PipelineStatus::Processing);
        let persisted = match self.link_photo(id, identity, &reference.url).await {
            Some(persisted) => persisted,
            None => {
                info!(
                    "Submission {} superseded before linking; {} left unlinked",
                    id, reference.key
                );
                let err = IntakeError::Superseded {
                    submission: id,
                    reference: reference.url,
                };
                return self.fail(id, err.to_reason());
            }
        };
        if let Err(e) = persisted {
            // The blob stays in storage unlinked; no compensating delete
            warn!("Photo {} stored but not linked to profile {}", reference.key, identity);
            let err = IntakeError::PersistFailed {
                reference: reference.url.clone(),
                details: e.to_string(),
            };
            return self.fail(id, err.to_reason());
        }

        self.publish(IntakeEvent::ProfileUpdated {
            user_id: identity.to_string(),
            fields: vec!["photo_url".to_string()],
        });

        let submission = self.finish(id, PipelineStatus::Succeeded(reference));
        if submission.current {
            self.collaborators.notifier.notify(
                "Photo uploaded",
                "Your avatar photo has been saved to your profile",
                Severity::Success,
            );
        }
        submission
    }

    /// Point the profile at `url`; `None` when a newer submission has started.
    ///
    /// Links are serialized, so a newer submission's upsert always lands after
    /// any older one that passed the check.
    async fn link_photo(
        &self,
        id: u64,
        identity: &Identity,
        url: &str,
    ) -> Option<Result<(), StorageError>> {
        let _guard = self.link_lock.lock().await;
        if self.latest.load(Ordering::SeqCst) != id {
            return None;
        }

        let persisted = match ProfilePatch::photo(url).into_record() {
            Ok(partial) => {
                self.collaborators
                    .records
                    .upsert(&self.profiles_collection, identity, partial)
                    .await
            }
            Err(e) => Err(e),
        };
        Some(persisted)
    }

    /// Allocate the next submission id and make it the observable one
    fn begin(&self, status: PipelineStatus) -> u64 {
        let mut id = 0;
        self.status_tx.send_modify(|snapshot| {
            id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
            *snapshot = StatusSnapshot {
                submission: id,
                status: status.clone(),
            };
        });

        if id > 1 {
            debug!("Submission {} supersedes submission {}", id, id - 1);
        }
        self.publish(IntakeEvent::StatusChanged {
            submission: id,
            status,
        });
        id
    }

    /// Apply `status` unless a newer submission has started
    fn transition(&self, id: u64, status: PipelineStatus) -> bool {
        let applied = self.status_tx.send_if_modified(|snapshot| {
            if self.latest.load(Ordering::SeqCst) != id {
                return false;
            }
            *snapshot = StatusSnapshot {
                submission: id,
                status: status.clone(),
            };
            true
        });

        if applied {
            debug!("Submission {} is {}", id, status.label());
            self.publish(IntakeEvent::StatusChanged {
                submission: id,
                status,
            });
        } else {
            debug!(
                "Submission {} reached {} after being superseded",
                id,
                status.label()
            );
        }
        applied
    }

    /// Settle on failure; only the current submission tells the user
    fn fail(&self, id: u64, reason: FailureReason) -> Submission {
        let submission = self.finish(id, PipelineStatus::Failed(reason.clone()));
        if submission.current {
            self.report_failure(id, &reason);
        } else {
            debug!("Submission {} failed after being superseded: {}", id, reason);
        }
        submission
    }

    fn report_failure(&self, id: u64, reason: &FailureReason) {
        warn!("Submission {} failed: {}", id, reason);
        self.collaborators.notifier.notify(
            reason.kind.title(),
            &reason.message,
            failure_severity(reason.kind),
        );
    }

    fn finish(&self, id: u64, status: PipelineStatus) -> Submission {
        let current = self.transition(id, status.clone());
        Submission { id, status, current }
    }

    /// `{identity}/{unix_millis}.{ext}`, with millis strictly increasing per process
    fn storage_key(&self, identity: &Identity, image: &AcquiredImage) -> String {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_key_millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        let millis = now.max(previous + 1);

        format!("{}/{}.{}", identity, millis, image.extension())
    }

    fn publish(&self, event: IntakeEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.publish(event);
        }
    }
}

fn failure_severity(kind: FailureKind) -> Severity {
    match kind {
        FailureKind::ValidationRejected | FailureKind::PermissionDenied => Severity::Warning,
        _ => Severity::Error,
    }
}
