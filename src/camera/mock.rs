use super::device::{CameraDevice, StreamConstraints, VideoStream};
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct MockCounters {
    opened: AtomicUsize,
    stopped: AtomicUsize,
}

/// Synthetic camera producing RGB test patterns, for tests and hardware-less runs
#[derive(Clone)]
pub struct MockCamera {
    deny_permission: Arc<AtomicBool>,
    open_delay: Duration,
    counters: Arc<MockCounters>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self {
            deny_permission: Arc::new(AtomicBool::new(false)),
            open_delay: Duration::ZERO,
            counters: Arc::new(MockCounters::default()),
        }
    }

    /// Simulate the user or OS refusing camera access
    pub fn denying() -> Self {
        let camera = Self::new();
        camera.set_deny_permission(true);
        camera
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn set_deny_permission(&self, deny: bool) {
        self.deny_permission.store(deny, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Streams stopped at least once
    pub fn stopped(&self) -> usize {
        self.counters.stopped.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.opened() - self.stopped()
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraDevice for MockCamera {
    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn VideoStream>, CameraError> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }

        if self.deny_permission.load(Ordering::SeqCst) {
            return Err(CameraError::PermissionDenied {
                device: self.name(),
            });
        }

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Mock camera opened at {}x{}",
            constraints.resolution.0, constraints.resolution.1
        );

        Ok(Arc::new(MockStream {
            resolution: constraints.resolution,
            live: AtomicBool::new(true),
            frame_counter: AtomicU64::new(0),
            counters: Arc::clone(&self.counters),
        }))
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}

struct MockStream {
    resolution: (u32, u32),
    live: AtomicBool,
    frame_counter: AtomicU64,
    counters: Arc<MockCounters>,
}

#[async_trait]
impl VideoStream for MockStream {
    async fn grab_frame(&self) -> Result<FrameData, CameraError> {
        if !self.is_live() {
            return Err(CameraError::StreamClosed);
        }

        let (width, height) = self.resolution;
        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let shift = (frame_id % 256) as u32;

        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                data.push(((x + shift) % 256) as u8);
                data.push(((y + shift) % 256) as u8);
                data.push(128);
            }
        }

        trace!("Generated mock frame {} ({}x{})", frame_id, width, height);
        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            width,
            height,
            FrameFormat::Rgb24,
        ))
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}
