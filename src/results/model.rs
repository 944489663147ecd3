use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of a result record for the lifetime of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is plenty for logs and UI keys
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// Who produced a detection's use-case text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsesSource {
    ModelDefault,
    Ai,
}

impl UsesSource {
    /// Map the service's free-form `source` field.
    ///
    /// Only the generative backends count as `Ai`; an empty or unknown
    /// source is treated as the model's built-in text.
    pub fn from_service(source: &str) -> Self {
        match source.trim().to_ascii_lowercase().as_str() {
            "ai" | "gemini" => UsesSource::Ai,
            _ => UsesSource::ModelDefault,
        }
    }
}

/// One detected object. Only `uses`/`uses_source` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionItem {
    pub class: String,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u32>,
    /// `[x1, y1, x2, y2]` in source image pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_depth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_width_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_height_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_estimation_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses_source: Option<UsesSource>,
}

impl DetectionItem {
    pub fn new<S: Into<String>>(class: S, confidence: f32) -> Self {
        Self {
            class: class.into(),
            confidence,
            class_id: None,
            bbox: None,
            estimated_depth: None,
            estimated_width_cm: None,
            estimated_height_cm: None,
            size_estimation_method: None,
            uses: None,
            uses_source: None,
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.uses.is_some()
    }

    /// Store use-case text. Blank text leaves the previous value in place.
    pub(crate) fn apply_use_case(&mut self, uses: String, source: UsesSource) -> bool {
        if uses.trim().is_empty() {
            return false;
        }
        self.uses = Some(uses);
        self.uses_source = Some(source);
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_objects: u32,
    pub unique_classes: u32,
}

/// Normalized outcome of one successful submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: RecordId,
    pub original_handle: String,
    pub processed_handle: String,
    pub description: String,
    pub detailed_analysis: String,
    pub detections: Vec<DetectionItem>,
    pub summary: Summary,
    pub timestamp: String,
}

impl ResultRecord {
    /// Class labels in first-seen order without repeats
    pub fn distinct_classes(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for detection in &self.detections {
            if !seen.contains(&detection.class) {
                seen.push(detection.class.clone());
            }
        }
        seen
    }
}
