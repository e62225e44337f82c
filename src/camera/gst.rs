use super::device::{CameraDevice, StreamConstraints, VideoStream};
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, trace, warn};

const GRAB_TIMEOUT_SECS: u64 = 2;

/// V4L2 camera opened through a GStreamer MJPEG pipeline
pub struct GstCamera {
    index: u32,
}

impl GstCamera {
    pub fn new(index: u32) -> Result<Self, CameraError> {
        gstreamer::init().map_err(|e| CameraError::DeviceOpen {
            device: format!("/dev/video{}", index),
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        Ok(Self { index })
    }

    fn device_path(&self) -> String {
        format!("/dev/video{}", self.index)
    }

    /// Opening the node up front turns an EACCES into a distinguishable refusal
    fn check_access(&self) -> Result<(), CameraError> {
        let device = self.device_path();
        match std::fs::OpenOptions::new().read(true).write(true).open(&device) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(CameraError::PermissionDenied { device })
            }
            Err(e) => Err(CameraError::DeviceOpen {
                device,
                details: e.to_string(),
            }),
        }
    }

    fn build_pipeline_string(&self, constraints: &StreamConstraints) -> String {
        let (width, height) = constraints.resolution;
        format!(
            "v4l2src device={} io-mode=mmap do-timestamp=true ! \
             image/jpeg,width={},height={},framerate={}/1 ! \
             queue max-size-buffers=2 leaky=downstream ! \
             appsink name=sink sync=false max-buffers=1 drop=true emit-signals=false",
            self.device_path(),
            width,
            height,
            constraints.fps
        )
    }
}

#[async_trait]
impl CameraDevice for GstCamera {
    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn VideoStream>, CameraError> {
        self.check_access()?;

        let device = self.device_path();
        let pipeline_desc = self.build_pipeline_string(constraints);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::DeviceOpen {
                device: device.clone(),
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::DeviceOpen {
                device: device.clone(),
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::DeviceOpen {
                device: device.clone(),
                details: "Pipeline has no appsink".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::DeviceOpen {
                device: device.clone(),
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(CameraError::DeviceOpen {
                device,
                details: format!("Failed to start pipeline: {}", e),
            });
        }

        debug!("GStreamer pipeline for {} is playing", device);
        Ok(Arc::new(GstStream {
            pipeline,
            appsink,
            live: AtomicBool::new(true),
            frame_counter: AtomicU64::new(0),
        }))
    }

    fn name(&self) -> String {
        self.device_path()
    }
}

struct GstStream {
    pipeline: Pipeline,
    appsink: AppSink,
    live: AtomicBool,
    frame_counter: AtomicU64,
}

impl GstStream {
    fn pull_frame(appsink: &AppSink, frame_id: u64) -> Result<FrameData, CameraError> {
        let sample = appsink
            .try_pull_sample(gstreamer::ClockTime::from_seconds(GRAB_TIMEOUT_SECS))
            .ok_or_else(|| CameraError::Capture {
                details: format!("No frame within {}s", GRAB_TIMEOUT_SECS),
            })?;

        let buffer = sample.buffer().ok_or_else(|| CameraError::Capture {
            details: "No buffer in sample".to_string(),
        })?;

        let (width, height) = sample
            .caps()
            .and_then(|caps| caps.structure(0))
            .and_then(|s| Some((s.get::<i32>("width").ok()?, s.get::<i32>("height").ok()?)))
            .ok_or_else(|| CameraError::Capture {
                details: "Sample caps carry no dimensions".to_string(),
            })?;

        let map = buffer.map_readable().map_err(|e| CameraError::Capture {
            details: format!("Failed to map buffer: {}", e),
        })?;

        trace!(
            "Captured MJPEG frame {} ({}x{}, {} bytes)",
            frame_id,
            width,
            height,
            map.len()
        );

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            map.as_slice().to_vec(),
            width as u32,
            height as u32,
            FrameFormat::Mjpeg,
        ))
    }
}

#[async_trait]
impl VideoStream for GstStream {
    async fn grab_frame(&self) -> Result<FrameData, CameraError> {
        if !self.is_live() {
            return Err(CameraError::StreamClosed);
        }

        let appsink = self.appsink.clone();
        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);

        tokio::task::spawn_blocking(move || Self::pull_frame(&appsink, frame_id))
            .await
            .map_err(|e| CameraError::Capture {
                details: format!("Frame grab task failed: {}", e),
            })?
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
                warn!("Failed to stop GStreamer pipeline: {}", e);
            }
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl Drop for GstStream {
    fn drop(&mut self) {
        self.stop();
    }
}
