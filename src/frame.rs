use crate::error::CameraError;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Frame format enumeration for camera output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0,
            FrameFormat::Rgb24 => 3,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// A single video frame read from a live stream
#[derive(Debug, Clone)]
pub struct FrameData {
    pub id: u64,
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl FrameData {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => true,
        }
    }

    /// Encode the frame at its native resolution as a JPEG still
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, CameraError> {
        let quality = quality.clamp(1, 100);

        let (rgb, width, height) = match self.format {
            FrameFormat::Rgb24 => {
                if !self.validate_size() {
                    return Err(CameraError::Encode {
                        details: format!(
                            "frame {} has {} bytes, expected {}x{} RGB",
                            self.id,
                            self.data.len(),
                            self.width,
                            self.height
                        ),
                    });
                }
                (self.data.as_slice().to_vec(), self.width, self.height)
            }
            FrameFormat::Mjpeg => {
                let decoded = image::load_from_memory(&self.data)
                    .map_err(|e| CameraError::Encode {
                        details: format!("JPEG decode failed: {}", e),
                    })?
                    .to_rgb8();
                let (width, height) = decoded.dimensions();
                (decoded.into_raw(), width, height)
            }
        };

        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder
            .encode(&rgb, width, height, ColorType::Rgb8)
            .map_err(|e| CameraError::Encode {
                details: format!("JPEG encode failed: {}", e),
            })?;

        Ok(buf)
    }
}
