use super::*;
use crate::camera::{MediaStreamController, MockCamera, StreamConstraints};
use crate::error::{CameraError, FailureKind, IntakeError};
use std::sync::Arc;

fn create_test_session(camera: &MockCamera) -> (Arc<MediaStreamController>, CaptureSession) {
    let controller = Arc::new(MediaStreamController::new(Arc::new(camera.clone())));
    let session = CaptureSession::new(Arc::clone(&controller), 92);
    (controller, session)
}

fn constraints() -> StreamConstraints {
    StreamConstraints {
        resolution: (24, 16),
        ..StreamConstraints::default()
    }
}

#[tokio::test]
async fn test_capture_frame_produces_jpeg_and_closes() {
    let camera = MockCamera::new();
    let (controller, mut session) = create_test_session(&camera);

    session.open(&constraints()).await.unwrap();
    assert!(session.is_open());

    let image = session.capture_frame().await.unwrap();
    assert_eq!(image.content_type(), "image/jpeg");
    assert_eq!(&image.data()[..2], &[0xFF, 0xD8]);

    assert!(!session.is_open());
    assert_eq!(controller.live_handles(), 0);
    assert_eq!(camera.live(), 0);
}

#[tokio::test]
async fn test_capture_keeps_native_resolution() {
    let camera = MockCamera::new();
    let (_controller, mut session) = create_test_session(&camera);

    session.open(&constraints()).await.unwrap();
    let image = session.capture_frame().await.unwrap();

    let decoded = image::load_from_memory(image.data()).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (24, 16));
}

#[tokio::test]
async fn test_preview_keeps_session_open() {
    let camera = MockCamera::new();
    let (_controller, mut session) = create_test_session(&camera);

    session.open(&constraints()).await.unwrap();
    session.preview().await.unwrap();
    session.preview().await.unwrap();
    assert!(session.is_open());
    assert_eq!(camera.live(), 1);
}

#[tokio::test]
async fn test_open_denied_is_distinguishable() {
    let camera = MockCamera::denying();
    let (controller, mut session) = create_test_session(&camera);

    let err = session.open(&constraints()).await.unwrap_err();
    assert!(matches!(err, IntakeError::PermissionDenied { .. }));
    assert_eq!(err.kind(), FailureKind::PermissionDenied);
    assert_eq!(controller.live_handles(), 0);
    assert!(!session.is_open());
}

#[tokio::test]
async fn test_capture_without_open_fails() {
    let camera = MockCamera::new();
    let (_controller, mut session) = create_test_session(&camera);

    assert!(matches!(
        session.capture_frame().await,
        Err(IntakeError::Camera(CameraError::StreamClosed))
    ));
}

#[tokio::test]
async fn test_close_and_drop_release_stream() {
    let camera = MockCamera::new();
    let (controller, mut session) = create_test_session(&camera);

    session.open(&constraints()).await.unwrap();
    session.close();
    session.close();
    assert_eq!(camera.stopped(), 1);

    session.open(&constraints()).await.unwrap();
    drop(session);
    assert_eq!(controller.live_handles(), 0);
    assert_eq!(camera.live(), 0);
}

#[tokio::test]
async fn test_reopen_replaces_stream() {
    let camera = MockCamera::new();
    let (controller, mut session) = create_test_session(&camera);

    session.open(&constraints()).await.unwrap();
    session.open(&constraints()).await.unwrap();

    assert_eq!(camera.opened(), 2);
    assert_eq!(camera.live(), 1);
    assert_eq!(controller.live_handles(), 1);
}
