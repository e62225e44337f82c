use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

pub const JPEG: &str = "image/jpeg";

/// An image obtained from a file pick or a camera capture, consumed once by upload
#[derive(Debug, Clone)]
pub struct AcquiredImage {
    data: Arc<Vec<u8>>,
    content_type: String,
}

impl AcquiredImage {
    pub fn new<S: Into<String>>(data: Vec<u8>, content_type: S) -> Self {
        Self {
            data: Arc::new(data),
            content_type: content_type.into().trim().to_ascii_lowercase(),
        }
    }

    /// Read a picked file, deriving its declared type from the extension
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content_type = content_type_for_path(path);
        let data = fs::read(path).await?;

        debug!(
            "Read {} ({} bytes, declared {})",
            path.display(),
            data.len(),
            content_type
        );

        Ok(Self::new(data, content_type))
    }

    pub fn data(&self) -> &Arc<Vec<u8>> {
        &self.data
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn byte_len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_image_type(&self) -> bool {
        self.content_type
            .strip_prefix("image/")
            .map(|subtype| !subtype.is_empty())
            .unwrap_or(false)
    }

    /// File extension used for storage keys
    pub fn extension(&self) -> String {
        extension_for_content_type(&self.content_type)
    }
}

/// Public locator returned by object storage for an uploaded photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPhotoReference {
    pub key: String,
    pub url: String,
}

impl fmt::Display for StoredPhotoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

pub fn content_type_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => JPEG,
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}

pub fn extension_for_content_type(content_type: &str) -> String {
    match content_type {
        JPEG | "image/jpg" | "image/pjpeg" => "jpg".to_string(),
        "image/svg+xml" => "svg".to_string(),
        other => {
            let subtype = other.split('/').nth(1).unwrap_or_default();
            let cleaned: String = subtype
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            if cleaned.is_empty() {
                "bin".to_string()
            } else {
                cleaned
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_for_content_type("image/jpeg"), "jpg");
        assert_eq!(extension_for_content_type("image/png"), "png");
        assert_eq!(extension_for_content_type("image/svg+xml"), "svg");
        assert_eq!(extension_for_content_type("image/x-icon"), "x");
        assert_eq!(extension_for_content_type("garbage"), "bin");
    }

    #[test]
    fn test_image_type_detection() {
        assert!(AcquiredImage::new(vec![1], "IMAGE/PNG").is_image_type());
        assert!(!AcquiredImage::new(vec![1], "image/").is_image_type());
        assert!(!AcquiredImage::new(vec![1], "text/plain").is_image_type());
    }

    #[tokio::test]
    async fn test_from_file_declares_type_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("me.JPG");
        std::fs::write(&path, vec![0xFF, 0xD8, 0xFF, 0xD9]).unwrap();

        let image = AcquiredImage::from_file(&path).await.unwrap();
        assert_eq!(image.content_type(), JPEG);
        assert_eq!(image.byte_len(), 4);
        assert_eq!(image.extension(), "jpg");
    }
}
