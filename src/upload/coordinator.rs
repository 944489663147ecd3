use super::normalize::normalize_response;
use crate::capture::StagedImage;
use crate::config::UploadConfig;
use crate::error::{Result, UploadError};
use crate::events::{DetectEvent, EventBus};
use crate::results::ResultRecord;
use crate::service::DetectionService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Submits staged images and turns responses into result records.
///
/// At most one submission is in flight per coordinator; `is_processing()` is
/// true for the whole network round trip.
#[derive(Clone)]
pub struct UploadCoordinator {
    service: Arc<dyn DetectionService>,
    event_bus: Arc<EventBus>,
    config: UploadConfig,
    processing: Arc<AtomicBool>,
}

/// Clears the processing flag on every exit path
struct ProcessingGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl UploadCoordinator {
    pub fn new(
        service: Arc<dyn DetectionService>,
        event_bus: Arc<EventBus>,
        config: UploadConfig,
    ) -> Self {
        Self {
            service,
            event_bus,
            config,
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn service(&self) -> &Arc<dyn DetectionService> {
        &self.service
    }

    /// Send one image for detection.
    ///
    /// Fails with `UploadError::Busy` if another submission is running. The
    /// processing flag is already cleared when an error reaches the caller.
    pub async fn submit(&self, image: &StagedImage) -> Result<ResultRecord> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Rejecting submission of '{}': busy", image.file_name);
            return Err(UploadError::Busy.into());
        }

        let outcome = {
            let _guard = ProcessingGuard {
                flag: Arc::clone(&self.processing),
            };
            self.run(image).await
        };

        match &outcome {
            Ok(record) => {
                self.event_bus.publish(DetectEvent::SubmissionCompleted {
                    record_id: record.id,
                    total_objects: record.summary.total_objects,
                });
            }
            Err(e) => {
                self.event_bus.publish(DetectEvent::SubmissionFailed {
                    reason: e.user_message(),
                });
            }
        }

        outcome
    }

    async fn run(&self, image: &StagedImage) -> Result<ResultRecord> {
        info!(
            "Submitting '{}' ({} bytes, {}) for detection",
            image.file_name,
            image.len(),
            image.mime_type
        );
        self.event_bus
            .publish(DetectEvent::SubmissionStarted { bytes: image.len() });

        let response = self.service.detect(image.to_payload()).await?;

        let processed_handle = match response.image_url.as_deref() {
            Some(path) if !path.is_empty() => self.service.resolve_url(path),
            _ => {
                warn!("Detection response carried no image_url; showing the original image");
                image.display_handle.clone()
            }
        };
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        let record = normalize_response(
            response,
            image.display_handle.clone(),
            processed_handle,
            timestamp,
            &self.config,
        );
        debug!(
            "Normalized record {}: {} detections, {} unique classes",
            record.id,
            record.detections.len(),
            record.summary.unique_classes
        );

        Ok(record)
    }
}
