use crate::config::UploadConfig;
use crate::results::{DetectionItem, RecordId, ResultRecord, Summary};
use crate::service::{DetectResponse, WireDetection};
use tracing::debug;

/// Turn a detection response into a result record.
///
/// Missing text falls back to the configured placeholders, missing detections
/// to an empty list and a missing summary to zero counts. Counts are taken as
/// sent even when they disagree with the detection list.
pub fn normalize_response(
    response: DetectResponse,
    original_handle: String,
    processed_handle: String,
    timestamp: String,
    config: &UploadConfig,
) -> ResultRecord {
    let summary = response.summary.unwrap_or_default();
    let detections: Vec<DetectionItem> = response
        .detections
        .unwrap_or_default()
        .into_iter()
        .map(detection_item)
        .collect();

    let counts = Summary {
        total_objects: summary.total_objects.unwrap_or(0),
        unique_classes: summary.unique_classes.unwrap_or(0),
    };
    if counts.total_objects as usize != detections.len() {
        debug!(
            "Service reported {} objects but sent {} detections",
            counts.total_objects,
            detections.len()
        );
    }

    ResultRecord {
        id: RecordId::new(),
        original_handle,
        processed_handle,
        description: non_empty(summary.description)
            .unwrap_or_else(|| config.missing_description.clone()),
        detailed_analysis: non_empty(summary.detailed_analysis)
            .unwrap_or_else(|| config.missing_analysis.clone()),
        detections,
        summary: counts,
        timestamp,
    }
}

fn detection_item(wire: WireDetection) -> DetectionItem {
    let bbox = wire.bbox.and_then(|b| match b.as_slice() {
        [x1, y1, x2, y2] => Some([*x1, *y1, *x2, *y2]),
        _ => None,
    });

    DetectionItem {
        class_id: wire.class_id,
        bbox,
        estimated_depth: wire.estimated_depth,
        estimated_width_cm: wire.estimated_width_cm,
        estimated_height_cm: wire.estimated_height_cm,
        size_estimation_method: wire.size_estimation_method,
        ..DetectionItem::new(wire.class, wire.confidence.clamp(0.0, 1.0))
    }
}

/// Only missing or empty text is replaced; whitespace is kept as sent
fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.is_empty())
}
