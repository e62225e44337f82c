use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FitcamConfig {
    pub camera: CameraConfig,
    pub upload: UploadConfig,
    pub storage: StorageConfig,
    pub status: StatusConfig,
    pub system: SystemConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera backend ("mock" or "gstreamer")
    #[serde(default = "default_camera_backend")]
    pub backend: String,

    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Requested preview resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Which camera to prefer on devices with more than one
    #[serde(default)]
    pub facing: Facing,

    /// JPEG quality factor for captured stills (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    /// Largest accepted photo in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Root directory of the object store
    #[serde(default = "default_objects_path")]
    pub objects_path: String,

    /// Base URL under which stored objects are publicly reachable
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Root directory of the record store
    #[serde(default = "default_records_path")]
    pub records_path: String,

    /// Collection holding user profiles
    #[serde(default = "default_profiles_collection")]
    pub profiles_collection: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatusConfig {
    /// Delay before a terminal status banner is cleared
    #[serde(default = "default_clear_delay_ms")]
    pub clear_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SessionConfig {
    /// Signed-in user, when not supplied on the command line
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[default]
    User,
    Environment,
}

impl FitcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("fitcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.backend", default_camera_backend())?
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.facing", "user")?
            .set_default("camera.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("upload.max_bytes", default_max_bytes())?
            .set_default("storage.objects_path", default_objects_path())?
            .set_default("storage.public_base_url", default_public_base_url())?
            .set_default("storage.records_path", default_records_path())?
            .set_default(
                "storage.profiles_collection",
                default_profiles_collection(),
            )?
            .set_default("status.clear_delay_ms", default_clear_delay_ms())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // FITCAM_CAMERA__INDEX=1 style overrides; field names contain underscores
            .add_source(Environment::with_prefix("FITCAM").separator("__"))
            .build()?;

        let config: FitcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.camera.jpeg_quality == 0 || self.camera.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Camera jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if !matches!(self.camera.backend.as_str(), "mock" | "gstreamer") {
            return Err(ConfigError::Message(format!(
                "Unknown camera backend '{}'",
                self.camera.backend
            )));
        }

        if self.upload.max_bytes == 0 {
            return Err(ConfigError::Message(
                "Upload max_bytes must be greater than 0".to_string(),
            ));
        }

        if self.storage.profiles_collection.trim().is_empty() {
            return Err(ConfigError::Message(
                "Storage profiles_collection must not be empty".to_string(),
            ));
        }

        // The collection becomes a directory name under records_path
        let collection = self.storage.profiles_collection.as_str();
        if collection.contains(['/', '\\']) || collection == "." || collection == ".." {
            return Err(ConfigError::Message(format!(
                "Storage profiles_collection must be a plain name, got '{}'",
                collection
            )));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for FitcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                backend: default_camera_backend(),
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                facing: Facing::default(),
                jpeg_quality: default_jpeg_quality(),
            },
            upload: UploadConfig {
                max_bytes: default_max_bytes(),
            },
            storage: StorageConfig {
                objects_path: default_objects_path(),
                public_base_url: default_public_base_url(),
                records_path: default_records_path(),
                profiles_collection: default_profiles_collection(),
            },
            status: StatusConfig {
                clear_delay_ms: default_clear_delay_ms(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
            session: SessionConfig::default(),
        }
    }
}

// Default value functions
fn default_camera_backend() -> String {
    "mock".to_string()
}
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_jpeg_quality() -> u8 {
    92
}

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_objects_path() -> String {
    "./data/avatars".to_string()
}
fn default_public_base_url() -> String {
    "http://localhost:8080/avatars".to_string()
}
fn default_records_path() -> String {
    "./data/records".to_string()
}
fn default_profiles_collection() -> String {
    "profiles".to_string()
}

fn default_clear_delay_ms() -> u64 {
    3000
}

fn default_event_bus_capacity() -> usize {
    100
}
