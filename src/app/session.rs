use crate::camera::{CameraDevice, CameraDeviceBuilder};
use crate::capture::MediaCaptureController;
use crate::config::DetectConfig;
use crate::enrichment::EnrichmentScheduler;
use crate::error::Result;
use crate::events::EventBus;
use crate::results::{ResultRecord, ResultStore, SharedResultStore};
use crate::service::{DetectionService, HttpDetectionService};
use crate::upload::UploadCoordinator;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Everything one active detection session owns.
///
/// The rendering layer reaches state only through this object: the capture
/// dialog, the result list and the per-detection loading flags.
pub struct DetectionSession {
    config: DetectConfig,
    event_bus: Arc<EventBus>,
    controller: Arc<Mutex<MediaCaptureController>>,
    coordinator: UploadCoordinator,
    store: SharedResultStore,
    scheduler: EnrichmentScheduler,
}

impl DetectionSession {
    pub fn new(
        config: DetectConfig,
        device: Arc<dyn CameraDevice>,
        service: Arc<dyn DetectionService>,
    ) -> Self {
        let event_bus = if config.system.log_events {
            EventBus::with_debug_logging(config.system.event_bus_capacity)
        } else {
            EventBus::new(config.system.event_bus_capacity)
        };
        let event_bus = Arc::new(event_bus);
        let store = ResultStore::shared();

        let controller = MediaCaptureController::new(
            device,
            Arc::clone(&event_bus),
            config.upload.capture_file_name.clone(),
        );
        let coordinator = UploadCoordinator::new(
            Arc::clone(&service),
            Arc::clone(&event_bus),
            config.upload.clone(),
        );
        let scheduler = EnrichmentScheduler::new(
            service,
            Arc::clone(&store),
            Arc::clone(&event_bus),
            config.enrichment.clone(),
        );

        Self {
            config,
            event_bus,
            controller: Arc::new(Mutex::new(controller)),
            coordinator,
            store,
            scheduler,
        }
    }

    /// Validate `config`, then wire up the HTTP service and the configured
    /// camera device
    pub fn from_config(config: DetectConfig, mock_camera: bool) -> Result<Self> {
        config.validate()?;

        let service: Arc<dyn DetectionService> =
            Arc::new(HttpDetectionService::new(&config.service)?);
        let device = CameraDeviceBuilder::new()
            .config(config.camera.clone())
            .mock(mock_camera)
            .build()?;

        info!(
            "Detection session ready (service {}, camera '{}')",
            config.service.base_url,
            device.name()
        );
        Ok(Self::new(config, device, service))
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn controller(&self) -> &Arc<Mutex<MediaCaptureController>> {
        &self.controller
    }

    pub fn coordinator(&self) -> &UploadCoordinator {
        &self.coordinator
    }

    pub fn store(&self) -> &SharedResultStore {
        &self.store
    }

    pub fn scheduler(&self) -> &EnrichmentScheduler {
        &self.scheduler
    }

    pub fn service(&self) -> &Arc<dyn DetectionService> {
        self.coordinator.service()
    }

    /// Submit the staged image and store the resulting record at index 0.
    ///
    /// The controller lock is not held during the request, so the dialog can
    /// be closed meanwhile. A record that arrives after the dialog closed is
    /// still stored; only the dialog update is dropped.
    pub async fn submit(&self) -> Result<ResultRecord> {
        let ticket = self.controller.lock().await.begin_submission()?;

        let outcome = self.coordinator.submit(ticket.image()).await;

        match outcome {
            Ok(record) => {
                let current = self.controller.lock().await.finish_submission(&ticket, Ok(()));
                if !current {
                    debug!("Dialog was reset during submission of record {}", record.id);
                }
                self.store.write().await.prepend(record.clone());
                Ok(record)
            }
            Err(e) => {
                self.controller
                    .lock()
                    .await
                    .finish_submission(&ticket, Err(e.user_message()));
                Err(e)
            }
        }
    }

    /// Remove the record at `index`; out-of-range indices are ignored
    pub async fn remove_result(&self, index: usize) -> Option<ResultRecord> {
        self.store.write().await.remove_at(index)
    }

    /// Snapshot of all records, newest first
    pub async fn results(&self) -> Vec<ResultRecord> {
        self.store.read().await.records()
    }
}
