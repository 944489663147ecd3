use crate::results::RecordId;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Where a staged image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    File,
    Camera,
}

/// Events that can occur during a detection session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DetectEvent {
    /// Camera device acquired and live
    CameraStarted { timestamp: SystemTime },
    /// Camera device released
    CameraStopped { timestamp: SystemTime },
    /// Camera could not be acquired; carries the user-facing warning
    CameraUnavailable { message: String },
    /// An image is staged and ready for submission
    ImageStaged { source: ImageSource, bytes: usize },
    /// The staged image was dropped without submission
    ImageDiscarded,
    /// The capture dialog was dismissed
    DialogClosed,
    /// A detection request left the client
    SubmissionStarted { bytes: usize },
    /// A detection request produced a result record
    SubmissionCompleted {
        record_id: RecordId,
        total_objects: u32,
    },
    /// A detection request failed
    SubmissionFailed { reason: String },
    /// Use-case lookups were issued for some detections
    EnrichmentStarted {
        record_id: RecordId,
        detections: Vec<usize>,
    },
    /// Use-case lookups were merged into a record
    EnrichmentCompleted {
        record_id: RecordId,
        detections: Vec<usize>,
    },
    /// A use-case lookup failed; existing data was kept
    EnrichmentFailed { record_id: RecordId, message: String },
    /// A late response targeted state that no longer exists
    StaleResultDiscarded { context: String },
}

impl DetectEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            DetectEvent::CameraStarted { .. } => "Camera started".to_string(),
            DetectEvent::CameraStopped { .. } => "Camera stopped".to_string(),
            DetectEvent::CameraUnavailable { message } => {
                format!("Camera unavailable: {}", message)
            }
            DetectEvent::ImageStaged { source, bytes } => {
                format!("Image staged from {:?} ({} bytes)", source, bytes)
            }
            DetectEvent::ImageDiscarded => "Staged image discarded".to_string(),
            DetectEvent::DialogClosed => "Capture dialog closed".to_string(),
            DetectEvent::SubmissionStarted { bytes } => {
                format!("Submitting image ({} bytes)", bytes)
            }
            DetectEvent::SubmissionCompleted {
                record_id,
                total_objects,
            } => format!(
                "Detection completed: record {} ({} objects)",
                record_id, total_objects
            ),
            DetectEvent::SubmissionFailed { reason } => {
                format!("Detection failed: {}", reason)
            }
            DetectEvent::EnrichmentStarted {
                record_id,
                detections,
            } => format!(
                "Fetching use cases for {} detection(s) of record {}",
                detections.len(),
                record_id
            ),
            DetectEvent::EnrichmentCompleted {
                record_id,
                detections,
            } => format!(
                "Use cases merged into {} detection(s) of record {}",
                detections.len(),
                record_id
            ),
            DetectEvent::EnrichmentFailed { record_id, message } => {
                format!("Use case lookup for record {} failed: {}", record_id, message)
            }
            DetectEvent::StaleResultDiscarded { context } => {
                format!("Discarded stale result: {}", context)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            DetectEvent::CameraStarted { .. } => "camera_started",
            DetectEvent::CameraStopped { .. } => "camera_stopped",
            DetectEvent::CameraUnavailable { .. } => "camera_unavailable",
            DetectEvent::ImageStaged { .. } => "image_staged",
            DetectEvent::ImageDiscarded => "image_discarded",
            DetectEvent::DialogClosed => "dialog_closed",
            DetectEvent::SubmissionStarted { .. } => "submission_started",
            DetectEvent::SubmissionCompleted { .. } => "submission_completed",
            DetectEvent::SubmissionFailed { .. } => "submission_failed",
            DetectEvent::EnrichmentStarted { .. } => "enrichment_started",
            DetectEvent::EnrichmentCompleted { .. } => "enrichment_completed",
            DetectEvent::EnrichmentFailed { .. } => "enrichment_failed",
            DetectEvent::StaleResultDiscarded { .. } => "stale_result_discarded",
        }
    }

    /// Whether this event carries a notice the user should see
    pub fn is_user_notice(&self) -> bool {
        matches!(
            self,
            DetectEvent::CameraUnavailable { .. }
                | DetectEvent::SubmissionFailed { .. }
                | DetectEvent::EnrichmentFailed { .. }
        )
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<DetectEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        Self {
            debug_logging: true,
            ..Self::new(capacity)
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<DetectEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers reached; zero when nobody listens.
    pub fn publish(&self, event: DetectEvent) -> usize {
        match &event {
            DetectEvent::CameraUnavailable { message } => {
                warn!("Camera unavailable: {}", message);
            }
            DetectEvent::SubmissionFailed { reason } => {
                error!("Submission failed: {}", reason);
            }
            DetectEvent::EnrichmentFailed { message, .. } => {
                warn!("Enrichment failed: {}", message);
            }
            DetectEvent::SubmissionCompleted { .. } => {
                info!("{}", event.description());
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
