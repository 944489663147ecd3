use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Image bytes as sent in the multipart `image` field
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// `POST /detect` success body. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub detections: Option<Vec<WireDetection>>,
    #[serde(default)]
    pub summary: Option<WireSummary>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub api_status: Option<ApiStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WireSummary {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub detailed_analysis: Option<String>,
    #[serde(default)]
    pub total_objects: Option<u32>,
    #[serde(default)]
    pub unique_classes: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireDetection {
    pub class: String,
    pub confidence: f32,
    #[serde(default)]
    pub class_id: Option<u32>,
    #[serde(default)]
    pub bbox: Option<Vec<f32>>,
    #[serde(default)]
    pub estimated_depth: Option<f64>,
    #[serde(default)]
    pub estimated_width_cm: Option<f64>,
    #[serde(default)]
    pub estimated_height_cm: Option<f64>,
    #[serde(default)]
    pub size_estimation_method: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub gemini_available: bool,
    #[serde(default)]
    pub depth_available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SingleUseCaseRequest {
    pub object: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SingleUseCaseResponse {
    pub use_case: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub object: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchUseCaseRequest {
    pub objects: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchUseCaseResponse {
    #[serde(default)]
    pub use_cases: HashMap<String, String>,
    #[serde(default)]
    pub source: String,
}

/// `GET /health` body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub gemini_available: bool,
    #[serde(default)]
    pub depth_available: bool,
    #[serde(default)]
    pub cached_objects: u32,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}
