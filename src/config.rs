use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use crate::frame::FrameFormat;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectConfig {
    pub service: ServiceConfig,
    pub camera: CameraConfig,
    pub upload: UploadConfig,
    pub enrichment: EnrichmentConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Base URL of the detection service; processed image paths are joined onto it
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connection establishment timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Requested capture resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Requested frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Capture format requested from the device ("MJPG" or "RGB24")
    #[serde(default = "default_camera_format")]
    pub format: String,

    /// Preferred facing mode ("environment" or "user")
    #[serde(default = "default_camera_facing")]
    pub facing: String,

    /// JPEG quality for captured stills (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// How long to wait for the device to come up
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,

    /// How long a capture waits for a frame before reporting it not ready
    #[serde(default = "default_frame_wait")]
    pub frame_wait_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    /// Text used when the service omits the short description
    #[serde(default = "default_missing_description")]
    pub missing_description: String,

    /// Text used when the service omits the detailed analysis
    #[serde(default = "default_missing_analysis")]
    pub missing_analysis: String,

    /// File name sent with camera captures
    #[serde(default = "default_capture_file_name")]
    pub capture_file_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EnrichmentConfig {
    /// Notice shown when a use-case lookup fails
    #[serde(default = "default_failure_notice")]
    pub failure_notice: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Log routine events at debug level as they are published
    #[serde(default)]
    pub log_events: bool,
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl CameraConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    /// Parsed capture format; unknown names fall back to MJPEG
    pub fn frame_format(&self) -> FrameFormat {
        FrameFormat::from_name(&self.format).unwrap_or(FrameFormat::Mjpeg)
    }

    pub fn frame_wait(&self) -> Duration {
        Duration::from_millis(self.frame_wait_ms)
    }
}

impl DetectConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("cosmic-detect.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("service.base_url", default_base_url())?
            .set_default(
                "service.request_timeout_seconds",
                default_request_timeout(),
            )?
            .set_default(
                "service.connect_timeout_seconds",
                default_connect_timeout(),
            )?
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.format", default_camera_format())?
            .set_default("camera.facing", default_camera_facing())?
            .set_default("camera.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default(
                "camera.acquire_timeout_seconds",
                default_acquire_timeout(),
            )?
            .set_default("camera.frame_wait_ms", default_frame_wait())?
            .set_default("upload.missing_description", default_missing_description())?
            .set_default("upload.missing_analysis", default_missing_analysis())?
            .set_default("upload.capture_file_name", default_capture_file_name())?
            .set_default("enrichment.failure_notice", default_failure_notice())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.log_events", false)?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // COSMIC_DETECT_SERVICE__BASE_URL and friends
            .add_source(
                Environment::with_prefix("COSMIC_DETECT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: DetectConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.service.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::Message(
                "Service base_url must not be empty".to_string(),
            ));
        }

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Message(format!(
                "Service base_url must be an http(s) URL, got '{}'",
                base_url
            )));
        }

        if self.service.request_timeout_seconds == 0 || self.service.connect_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Service timeouts must be greater than 0".to_string(),
            ));
        }

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

        if FrameFormat::from_name(&self.camera.format).is_none() {
            return Err(ConfigError::Message(format!(
                "Unsupported camera format '{}' (expected MJPG or RGB24)",
                self.camera.format
            )));
        }

        if self.camera.jpeg_quality == 0 || self.camera.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Camera jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.camera.acquire_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Camera acquire_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                base_url: default_base_url(),
                request_timeout_seconds: default_request_timeout(),
                connect_timeout_seconds: default_connect_timeout(),
            },
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                format: default_camera_format(),
                facing: default_camera_facing(),
                jpeg_quality: default_jpeg_quality(),
                acquire_timeout_seconds: default_acquire_timeout(),
                frame_wait_ms: default_frame_wait(),
            },
            upload: UploadConfig {
                missing_description: default_missing_description(),
                missing_analysis: default_missing_analysis(),
                capture_file_name: default_capture_file_name(),
            },
            enrichment: EnrichmentConfig {
                failure_notice: default_failure_notice(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                log_events: false,
            },
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:5001".to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
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
fn default_camera_format() -> String {
    "MJPG".to_string()
}
fn default_camera_facing() -> String {
    "environment".to_string()
}
fn default_jpeg_quality() -> u8 {
    80
}
fn default_acquire_timeout() -> u64 {
    10
}
fn default_frame_wait() -> u64 {
    500
}

fn default_missing_description() -> String {
    "No description available".to_string()
}
fn default_missing_analysis() -> String {
    "No detailed analysis available".to_string()
}
fn default_capture_file_name() -> String {
    "captured-image.jpg".to_string()
}

fn default_failure_notice() -> String {
    "Failed to fetch use cases. Please try again.".to_string()
}

fn default_event_bus_capacity() -> usize {
    100
}
