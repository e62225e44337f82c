use crate::config::UploadConfig;
use crate::photo::AcquiredImage;
use std::fmt;

pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Why an image was refused before upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotAnImage { content_type: String },
    TooLarge { byte_len: u64, max_bytes: u64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotAnImage { content_type } => {
                write!(f, "'{}' is not an image file", content_type)
            }
            Rejection::TooLarge {
                byte_len,
                max_bytes,
            } => write!(
                f,
                "image is {:.1} MB, the limit is {:.1} MB",
                *byte_len as f64 / (1024.0 * 1024.0),
                *max_bytes as f64 / (1024.0 * 1024.0)
            ),
        }
    }
}

/// Local precondition gate run before any upload
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    max_bytes: u64,
}

impl Validator {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.max_bytes)
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn validate(&self, image: &AcquiredImage) -> Result<(), Rejection> {
        if !image.is_image_type() {
            return Err(Rejection::NotAnImage {
                content_type: image.content_type().to_string(),
            });
        }

        if image.byte_len() > self.max_bytes {
            return Err(Rejection::TooLarge {
                byte_len: image.byte_len(),
                max_bytes: self.max_bytes,
            });
        }

        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}
