use super::*;
use crate::error::{FailureKind, StorageError};
use crate::events::{EventFilter, EventReceiver};
use crate::notify::MemoryNotifier;
use crate::storage::{MemoryObjectStore, MemoryRecordStore, Record};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::time::timeout;

const MIB: usize = 1024 * 1024;

struct Harness {
    objects: Arc<MemoryObjectStore>,
    records: Arc<MemoryRecordStore>,
    notifier: Arc<MemoryNotifier>,
    pipeline: Arc<UploadPipeline>,
    bus: Arc<EventBus>,
}

fn create_harness() -> Harness {
    let objects = Arc::new(MemoryObjectStore::new("https://cdn.example.com"));
    let records = Arc::new(MemoryRecordStore::new());
    create_harness_with(objects.clone(), objects, records.clone(), records)
}

fn create_harness_with(
    objects: Arc<MemoryObjectStore>,
    object_store: Arc<dyn ObjectStore>,
    records: Arc<MemoryRecordStore>,
    record_store: Arc<dyn RecordStore>,
) -> Harness {
    let notifier = Arc::new(MemoryNotifier::new());
    let bus = Arc::new(EventBus::new(64));
    let collaborators = Collaborators {
        objects: object_store,
        records: record_store,
        notifier: notifier.clone(),
    };
    let pipeline = Arc::new(
        UploadPipeline::new(collaborators, Validator::default(), "profiles")
            .with_event_bus(Arc::clone(&bus)),
    );

    Harness {
        objects,
        records,
        notifier,
        pipeline,
        bus,
    }
}

/// Harness whose first object put parks until the returned sender fires
fn create_gated_upload_harness() -> (Harness, Arc<GatedObjectStore>, oneshot::Sender<()>) {
    let objects = Arc::new(MemoryObjectStore::new("https://cdn.example.com"));
    let records = Arc::new(MemoryRecordStore::new());
    let (gated, release) = GatedObjectStore::new(Arc::clone(&objects));
    let gated = Arc::new(gated);
    let harness = create_harness_with(objects, gated.clone(), records.clone(), records);
    (harness, gated, release)
}

fn user(id: &str) -> Identity {
    Identity::parse(id).unwrap()
}

fn jpeg_of(len: usize) -> AcquiredImage {
    AcquiredImage::new(vec![0xAB; len], "image/jpeg")
}

fn status_receiver(bus: &EventBus) -> EventReceiver {
    EventReceiver::new(
        bus.subscribe(),
        EventFilter::EventTypes(vec!["status_changed"]),
        "pipeline-test".to_string(),
    )
}

fn observed_statuses(receiver: &mut EventReceiver) -> Vec<PipelineStatus> {
    receiver
        .drain()
        .unwrap()
        .into_iter()
        .filter_map(|event| match event {
            IntakeEvent::StatusChanged { status, .. } => Some(status),
            _ => None,
        })
        .collect()
}

/// Parks the first caller until the test lets it through
struct Gate {
    pending: Mutex<Option<oneshot::Receiver<()>>>,
    entered: Notify,
}

impl Gate {
    fn new() -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let gate = Self {
            pending: Mutex::new(Some(rx)),
            entered: Notify::new(),
        };
        (gate, tx)
    }

    async fn pass(&self) {
        let pending = self.pending.lock().take();
        if let Some(pending) = pending {
            self.entered.notify_one();
            let _ = pending.await;
        }
    }
}

struct GatedObjectStore {
    inner: Arc<MemoryObjectStore>,
    gate: Gate,
}

impl GatedObjectStore {
    fn new(inner: Arc<MemoryObjectStore>) -> (Self, oneshot::Sender<()>) {
        let (gate, release) = Gate::new();
        (Self { inner, gate }, release)
    }
}

#[async_trait]
impl ObjectStore for GatedObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Arc<Vec<u8>>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.gate.pass().await;
        self.inner.put(key, data, content_type).await
    }

    async fn public_url(&self, key: &str) -> Result<String, StorageError> {
        self.inner.public_url(key).await
    }
}

struct GatedRecordStore {
    inner: Arc<MemoryRecordStore>,
    gate: Gate,
}

impl GatedRecordStore {
    fn new(inner: Arc<MemoryRecordStore>) -> (Self, oneshot::Sender<()>) {
        let (gate, release) = Gate::new();
        (Self { inner, gate }, release)
    }
}

#[async_trait]
impl RecordStore for GatedRecordStore {
    async fn upsert(
        &self,
        collection: &str,
        key: &Identity,
        partial: Record,
    ) -> Result<(), StorageError> {
        self.gate.pass().await;
        self.inner.upsert(collection, key, partial).await
    }

    async fn fetch(
        &self,
        collection: &str,
        key: &Identity,
    ) -> Result<Option<Record>, StorageError> {
        self.inner.fetch(collection, key).await
    }
}

fn toast_titles(notifier: &MemoryNotifier) -> Vec<String> {
    notifier
        .delivered()
        .into_iter()
        .map(|note| note.title)
        .collect()
}

async fn stored_photo_url(records: &MemoryRecordStore, id: &str) -> Option<String> {
    records
        .fetch("profiles", &user(id))
        .await
        .unwrap()
        .and_then(|record| record.get("photo_url").and_then(|v| v.as_str()).map(String::from))
}

#[tokio::test]
async fn test_successful_upload_sequence() {
    let harness = create_harness();
    let mut statuses = status_receiver(&harness.bus);

    assert_eq!(harness.pipeline.status().status, PipelineStatus::Idle);

    let submission = harness.pipeline.submit(&user("u1"), jpeg_of(2 * MIB)).await;
    let reference = submission.reference().cloned().unwrap();
    assert!(submission.current);

    assert_eq!(
        observed_statuses(&mut statuses),
        vec![
            PipelineStatus::Validating,
            PipelineStatus::Uploading,
            PipelineStatus::Processing,
            PipelineStatus::Succeeded(reference.clone()),
        ]
    );

    // key is u1/<millis>.jpg
    let (prefix, file) = reference.key.split_once('/').unwrap();
    let (millis, ext) = file.split_once('.').unwrap();
    assert_eq!(prefix, "u1");
    assert_eq!(ext, "jpg");
    assert!(millis.parse::<i64>().unwrap() > 0);
    assert_eq!(reference.url, format!("https://cdn.example.com/{}", reference.key));

    let upserts = harness.records.upserts();
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0].collection, "profiles");
    assert_eq!(upserts[0].key, "u1");
    assert_eq!(
        upserts[0].partial.get("photo_url").and_then(|v| v.as_str()),
        Some(reference.url.as_str())
    );
    assert!(!upserts[0].partial.contains_key("height"));

    let puts = harness.objects.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].byte_len, 2 * MIB);
    assert_eq!(puts[0].content_type, "image/jpeg");
}

#[tokio::test]
async fn test_oversized_upload_makes_no_network_calls() {
    let harness = create_harness();

    let submission = harness.pipeline.submit(&user("u1"), jpeg_of(11 * MIB)).await;

    assert_eq!(
        submission.failure().map(|reason| reason.kind),
        Some(FailureKind::ValidationRejected)
    );
    assert!(harness.objects.puts().is_empty());
    assert!(harness.records.upserts().is_empty());
    assert_eq!(harness.pipeline.status().status, submission.status);
}

#[tokio::test]
async fn test_non_image_rejected_before_upload() {
    let harness = create_harness();

    let submission = harness
        .pipeline
        .submit(&user("u1"), AcquiredImage::new(b"hello".to_vec(), "text/plain"))
        .await;

    assert_eq!(
        submission.failure().map(|reason| reason.kind),
        Some(FailureKind::ValidationRejected)
    );
    assert!(harness.objects.puts().is_empty());
}

#[tokio::test]
async fn test_transmit_failure_skips_persistence() {
    let harness = create_harness();
    harness.objects.set_failing(true);
    let mut statuses = status_receiver(&harness.bus);

    let submission = harness.pipeline.submit(&user("u1"), jpeg_of(1024)).await;

    assert_eq!(
        submission.failure().map(|reason| reason.kind),
        Some(FailureKind::TransmitFailed)
    );
    assert!(harness.records.upserts().is_empty());

    let observed = observed_statuses(&mut statuses);
    assert_eq!(observed[..2], [PipelineStatus::Validating, PipelineStatus::Uploading]);
    assert!(matches!(observed.last(), Some(PipelineStatus::Failed(_))));
    assert_eq!(observed.len(), 3);

    let notes = harness.notifier.delivered();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Upload failed");
}

#[tokio::test]
async fn test_persist_failure_leaves_orphaned_blob() {
    let harness = create_harness();
    harness.records.set_failing(true);

    let submission = harness.pipeline.submit(&user("u1"), jpeg_of(1024)).await;

    let reason = submission.failure().cloned().unwrap();
    assert_eq!(reason.kind, FailureKind::PersistFailed);

    let puts = harness.objects.puts();
    assert_eq!(puts.len(), 1);
    assert!(harness.objects.object(&puts[0].key).is_some());
    assert_eq!(harness.records.upserts().len(), 1);
}

#[tokio::test]
async fn test_retry_after_failure_succeeds() {
    let harness = create_harness();
    harness.objects.set_failing(true);
    let first = harness.pipeline.submit(&user("u1"), jpeg_of(1024)).await;
    assert!(first.failure().is_some());

    harness.objects.set_failing(false);
    let second = harness.pipeline.submit(&user("u1"), jpeg_of(1024)).await;
    assert!(second.reference().is_some());
    assert_eq!(second.id, first.id + 1);
    assert_eq!(harness.pipeline.status().status, second.status);
}

#[tokio::test]
async fn test_missing_identity_is_precondition_failure() {
    let harness = create_harness();
    let context = SessionContext::new(None);

    let submission = harness.pipeline.submit_in(&context, jpeg_of(1024)).await;

    assert_eq!(
        submission.failure().map(|reason| reason.kind),
        Some(FailureKind::PreconditionFailed)
    );
    assert!(harness.objects.puts().is_empty());
    assert!(harness.records.upserts().is_empty());
    assert_eq!(harness.notifier.delivered()[0].title, "Sign in required");
}

#[tokio::test]
async fn test_late_completion_does_not_override_newer_submission() {
    let (harness, gated, release) = create_gated_upload_harness();

    let pipeline = Arc::clone(&harness.pipeline);
    let first = tokio::spawn(async move { pipeline.submit(&user("u1"), jpeg_of(1024)).await });

    gated.gate.entered.notified().await;
    assert_eq!(harness.pipeline.status().status, PipelineStatus::Uploading);

    let second = harness.pipeline.submit(&user("u1"), jpeg_of(2048)).await;
    assert!(second.reference().is_some());

    release.send(()).unwrap();
    let first = first.await.unwrap();

    // the older submission settles, but only for its own caller
    assert!(!first.current);
    assert!(first.reference().is_none());
    assert_eq!(
        first.failure().map(|reason| reason.kind),
        Some(FailureKind::Superseded)
    );
    assert!(second.id > first.id);

    let observed = harness.pipeline.status();
    assert_eq!(observed.submission, second.id);
    assert_eq!(observed.status, second.status);
}

#[tokio::test]
async fn test_superseded_upload_does_not_relink_profile() {
    let (harness, gated, release) = create_gated_upload_harness();

    let pipeline = Arc::clone(&harness.pipeline);
    let first = tokio::spawn(async move { pipeline.submit(&user("u1"), jpeg_of(1024)).await });
    gated.gate.entered.notified().await;

    let second = harness.pipeline.submit(&user("u1"), jpeg_of(2048)).await;
    let newest = second.reference().unwrap().url.clone();

    release.send(()).unwrap();
    first.await.unwrap();

    // the older blob is stored but never linked
    assert_eq!(harness.objects.puts().len(), 2);
    assert_eq!(harness.records.upserts().len(), 1);
    assert_eq!(stored_photo_url(&harness.records, "u1").await, Some(newest));
    assert_eq!(toast_titles(&harness.notifier), vec!["Photo uploaded"]);
}

#[tokio::test]
async fn test_late_success_does_not_override_newer_failure() {
    let (harness, gated, release) = create_gated_upload_harness();

    let pipeline = Arc::clone(&harness.pipeline);
    let first = tokio::spawn(async move { pipeline.submit(&user("u1"), jpeg_of(1024)).await });
    gated.gate.entered.notified().await;

    let second = harness.pipeline.submit(&user("u1"), jpeg_of(11 * MIB)).await;
    assert!(second.failure().is_some());

    release.send(()).unwrap();
    let first = first.await.unwrap();
    assert!(!first.current);
    assert_eq!(
        first.failure().map(|reason| reason.kind),
        Some(FailureKind::Superseded)
    );

    let observed = harness.pipeline.status();
    assert_eq!(observed.submission, second.id);
    assert!(matches!(
        observed.status,
        PipelineStatus::Failed(FailureReason {
            kind: FailureKind::ValidationRejected,
            ..
        })
    ));

    assert!(harness.records.upserts().is_empty());
    assert_eq!(stored_photo_url(&harness.records, "u1").await, None);
    assert_eq!(toast_titles(&harness.notifier), vec!["Invalid photo"]);
}

#[tokio::test]
async fn test_newer_link_lands_after_older_link_in_flight() {
    let objects = Arc::new(MemoryObjectStore::new("https://cdn.example.com"));
    let records = Arc::new(MemoryRecordStore::new());
    let (gated, release) = GatedRecordStore::new(Arc::clone(&records));
    let gated = Arc::new(gated);
    let harness = create_harness_with(objects.clone(), objects, records, gated.clone());

    let pipeline = Arc::clone(&harness.pipeline);
    let first = tokio::spawn(async move { pipeline.submit(&user("u1"), jpeg_of(1024)).await });
    gated.gate.entered.notified().await;

    let pipeline = Arc::clone(&harness.pipeline);
    let second = tokio::spawn(async move { pipeline.submit(&user("u1"), jpeg_of(2048)).await });

    // wait until the newer submission is queued behind the older link
    let queued = timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = harness.pipeline.status();
            if snapshot.submission == 2 && snapshot.status == PipelineStatus::Processing {
                return;
            }
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(queued.is_ok());

    release.send(()).unwrap();
    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert!(!first.current);
    assert!(second.current);
    let newest = second.reference().unwrap().url.clone();

    let upserts = harness.records.upserts();
    assert_eq!(upserts.len(), 2);
    assert_eq!(
        upserts[1].partial.get("photo_url").and_then(|v| v.as_str()),
        Some(newest.as_str())
    );
    assert_eq!(stored_photo_url(&harness.records, "u1").await, Some(newest));
    assert_eq!(toast_titles(&harness.notifier), vec!["Photo uploaded"]);
}

#[tokio::test]
async fn test_storage_keys_are_unique_per_user() {
    let harness = create_harness();

    let mut keys = Vec::new();
    for _ in 0..5 {
        let submission = harness.pipeline.submit(&user("u1"), jpeg_of(16)).await;
        keys.push(submission.reference().unwrap().key.clone());
    }

    let mut deduped = keys.clone();
    deduped.dedup();
    assert_eq!(deduped.len(), keys.len());
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_watch_subscribers_see_terminal_state() {
    let harness = create_harness();
    let mut rx = harness.pipeline.subscribe();

    harness.pipeline.submit(&user("u1"), jpeg_of(64)).await;

    assert!(rx.has_changed().unwrap());
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.submission, 1);
    assert!(matches!(snapshot.status, PipelineStatus::Succeeded(_)));
}
