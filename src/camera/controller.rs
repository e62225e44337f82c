use super::device::{CameraDevice, StreamConstraints, VideoStream};
use crate::error::CameraError;
use crate::events::{EventBus, IntakeEvent};
use crate::frame::FrameData;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Token for the single live camera stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaStreamHandle {
    id: u64,
}

impl MediaStreamHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

struct ActiveStream {
    handle: MediaStreamHandle,
    stream: Arc<dyn VideoStream>,
}

/// Owns the camera hardware; at most one stream is live at a time.
///
/// The slot lock is never held across an await so that `release` can run
/// synchronously from `Drop`.
pub struct MediaStreamController {
    device: Arc<dyn CameraDevice>,
    active: Mutex<Option<ActiveStream>>,
    next_handle: AtomicU64,
    event_bus: Option<Arc<EventBus>>,
}

impl MediaStreamController {
    pub fn new(device: Arc<dyn CameraDevice>) -> Self {
        Self {
            device,
            active: Mutex::new(None),
            next_handle: AtomicU64::new(1),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Open a stream, releasing any stream that is still live first
    pub async fn acquire(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<MediaStreamHandle, CameraError> {
        if self.release_active() {
            debug!("Released previous camera stream before acquiring a new one");
        }

        info!(
            "Opening camera {} ({}x{} @ {}fps, {:?})",
            self.device.name(),
            constraints.resolution.0,
            constraints.resolution.1,
            constraints.fps,
            constraints.facing
        );

        let stream = match self.device.open(constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Camera {} could not be opened: {}", self.device.name(), e);
                return Err(e);
            }
        };

        let handle = MediaStreamHandle {
            id: self.next_handle.fetch_add(1, Ordering::Relaxed),
        };

        // Another acquire may have won the race while this one was suspended
        let displaced = self.active.lock().replace(ActiveStream {
            handle,
            stream,
        });
        if let Some(displaced) = displaced {
            self.stop_stream(displaced);
        }

        self.publish(IntakeEvent::StreamAcquired {
            handle_id: handle.id,
            timestamp: SystemTime::now(),
        });

        Ok(handle)
    }

    /// Release the stream behind `handle`.
    ///
    /// Releasing a stale or already released handle does nothing.
    pub fn release(&self, handle: MediaStreamHandle) {
        let released = {
            let mut active = self.active.lock();
            match active.as_ref() {
                Some(current) if current.handle == handle => active.take(),
                _ => None,
            }
        };

        match released {
            Some(stream) => self.stop_stream(stream),
            None => debug!("Camera stream {} already released", handle.id),
        }
    }

    /// Release whatever stream is live; returns whether one was
    pub fn release_active(&self) -> bool {
        let released = self.active.lock().take();
        match released {
            Some(stream) => {
                self.stop_stream(stream);
                true
            }
            None => false,
        }
    }

    /// Read the current frame from the stream behind `handle`
    pub async fn grab_frame(&self, handle: MediaStreamHandle) -> Result<FrameData, CameraError> {
        let stream = {
            let active = self.active.lock();
            match active.as_ref() {
                Some(current) if current.handle == handle => Arc::clone(&current.stream),
                _ => return Err(CameraError::StreamClosed),
            }
        };

        stream.grab_frame().await
    }

    pub fn is_live(&self, handle: MediaStreamHandle) -> bool {
        self.active
            .lock()
            .as_ref()
            .map(|current| current.handle == handle)
            .unwrap_or(false)
    }

    /// Number of live streams, 0 or 1
    pub fn live_handles(&self) -> usize {
        usize::from(self.active.lock().is_some())
    }

    fn stop_stream(&self, active: ActiveStream) {
        active.stream.stop();
        info!("Camera stream {} released", active.handle.id);
        self.publish(IntakeEvent::StreamReleased {
            handle_id: active.handle.id,
            timestamp: SystemTime::now(),
        });
    }

    fn publish(&self, event: IntakeEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.publish(event);
        }
    }
}

impl Drop for MediaStreamController {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.stream.stop();
            debug!("Camera stream {} released on teardown", active.handle.id);
        }
    }
}
