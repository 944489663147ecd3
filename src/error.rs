use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Enrichment error: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl DetectError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether the interactive session can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            DetectError::Camera(e) => e.is_recoverable(),
            DetectError::Capture(_) => true,
            DetectError::Upload(_) => true,
            DetectError::Enrichment(_) => true,
            DetectError::Http(_) => true,
            _ => false,
        }
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            DetectError::Camera(e) => e.user_message(),
            DetectError::Capture(e) => e.user_message(),
            DetectError::Upload(e) => e.user_message(),
            DetectError::Enrichment(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Camera device failures
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera device unavailable: {details}")]
    DeviceUnavailable { details: String },

    #[error("Camera frame not ready ({width}x{height})")]
    FrameNotReady { width: u32, height: u32 },

    #[error("Still image encoding failed: {details}")]
    Encoding { details: String },

    #[error("Camera pipeline error: {details}")]
    Pipeline { details: String },
}

impl CameraError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CameraError::DeviceUnavailable { .. } | CameraError::FrameNotReady { .. }
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            CameraError::DeviceUnavailable { .. } => {
                "Unable to access camera. Please check permissions.".to_string()
            }
            CameraError::FrameNotReady { .. } => {
                "Camera is still starting up. Please try capturing again.".to_string()
            }
            CameraError::Encoding { details } => format!("Could not encode photo: {}", details),
            CameraError::Pipeline { details } => format!("Camera error: {}", details),
        }
    }
}

/// Capture dialog misuse and staging failures
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Operation '{operation}' is not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("Selected file '{name}' is empty")]
    EmptyFile { name: String },

    #[error("No image is staged for submission")]
    NothingStaged,
}

impl CaptureError {
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::InvalidState { operation, .. } => {
                format!("Cannot {} right now", operation.replace('_', " "))
            }
            CaptureError::EmptyFile { name } => format!("The file '{}' is empty", name),
            CaptureError::NothingStaged => "Choose or capture an image first".to_string(),
        }
    }
}

/// Detection submission failures
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload rejected: {reason}")]
    Rejected { reason: String },

    #[error("A submission is already in progress")]
    Busy,

    #[error("Upload transport failure: {details}")]
    Transport { details: String },

    #[error("Invalid detection response: {details}")]
    InvalidResponse { details: String },
}

impl UploadError {
    pub fn user_message(&self) -> String {
        match self {
            UploadError::Rejected { reason } => format!("Error processing image: {}", reason),
            UploadError::Busy => "Still processing the previous image".to_string(),
            UploadError::Transport { details } => format!("Error processing image: {}", details),
            UploadError::InvalidResponse { details } => {
                format!("Error processing image: {}", details)
            }
        }
    }
}

/// Use-case lookup failures
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Use case lookup for {object} failed: {details}")]
    Failed { object: String, details: String },
}

impl EnrichmentError {
    pub fn user_message(&self) -> String {
        "Failed to fetch use cases. Please try again.".to_string()
    }
}

pub type Result<T> = std::result::Result<T, DetectError>;
