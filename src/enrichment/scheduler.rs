use super::loading::{EnrichmentKey, LoadingState};
use crate::config::EnrichmentConfig;
use crate::error::Result;
use crate::events::{DetectEvent, EventBus};
use crate::results::{RecordId, SharedResultStore, UsesSource};
use crate::service::DetectionService;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What an enrichment request ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// Nothing to look up (index out of range, or no detections)
    Skipped,
    /// Use cases were merged into these detection indices
    Applied(Vec<usize>),
    /// The target changed while the request was in flight; nothing merged
    Stale,
}

/// Issues use-case lookups for detections and merges the answers back.
///
/// No lock is held across a request, so lookups for different records or
/// different detections never wait on each other.
#[derive(Clone)]
pub struct EnrichmentScheduler {
    service: Arc<dyn DetectionService>,
    store: SharedResultStore,
    loading: Arc<LoadingState>,
    event_bus: Arc<EventBus>,
    config: EnrichmentConfig,
}

impl EnrichmentScheduler {
    pub fn new(
        service: Arc<dyn DetectionService>,
        store: SharedResultStore,
        event_bus: Arc<EventBus>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            service,
            store,
            loading: Arc::new(LoadingState::new()),
            event_bus,
            config,
        }
    }

    pub fn is_loading(&self, key: &EnrichmentKey) -> bool {
        self.loading.is_loading(key)
    }

    pub fn loading_snapshot(&self) -> Vec<EnrichmentKey> {
        self.loading.snapshot()
    }

    pub fn loading_state(&self) -> &Arc<LoadingState> {
        &self.loading
    }

    /// Look up the use case for one detection of the record at `record_index`
    pub async fn enrich_one(
        &self,
        record_index: usize,
        detection_index: usize,
    ) -> Result<EnrichmentOutcome> {
        let record = self.store.read().await.get(record_index).map(|r| r.id);
        match record {
            Some(id) => self.enrich_one_by_id(id, detection_index).await,
            None => {
                debug!("No record at index {}; nothing to enrich", record_index);
                Ok(EnrichmentOutcome::Skipped)
            }
        }
    }

    pub async fn enrich_one_by_id(
        &self,
        record: RecordId,
        detection_index: usize,
    ) -> Result<EnrichmentOutcome> {
        let class = {
            let store = self.store.read().await;
            store
                .get_by_id(record)
                .and_then(|r| r.detections.get(detection_index))
                .map(|d| d.class.clone())
        };
        let Some(class) = class else {
            debug!(
                "Detection {} of record {} does not exist; nothing to enrich",
                detection_index, record
            );
            return Ok(EnrichmentOutcome::Skipped);
        };

        let key = EnrichmentKey::new(record, detection_index);
        let guard = self.loading.begin(vec![key]);
        self.event_bus.publish(DetectEvent::EnrichmentStarted {
            record_id: record,
            detections: vec![detection_index],
        });
        debug!("Fetching use case for '{}' ({})", class, key);

        let outcome = match self.service.single_use_case(&class).await {
            Ok(response) => {
                let source = UsesSource::from_service(&response.source);
                let merged = self
                    .store
                    .write()
                    .await
                    .update_record(record, |r| match r.detections.get_mut(detection_index) {
                        Some(detection) if detection.class == class => {
                            Some(detection.apply_use_case(response.use_case, source))
                        }
                        _ => None,
                    })
                    .flatten();

                match merged {
                    Some(true) => Ok(EnrichmentOutcome::Applied(vec![detection_index])),
                    Some(false) => {
                        debug!("Empty use case for '{}' ({}); keeping previous text", class, key);
                        Ok(EnrichmentOutcome::Applied(Vec::new()))
                    }
                    None => Ok(EnrichmentOutcome::Stale),
                }
            }
            Err(e) => Err(e),
        };

        drop(guard);
        self.report(record, outcome)
    }

    /// Look up use cases for every detection of the record at `record_index`
    /// with one batched request
    pub async fn enrich_all(&self, record_index: usize) -> Result<EnrichmentOutcome> {
        let record = self.store.read().await.get(record_index).map(|r| r.id);
        match record {
            Some(id) => self.enrich_all_by_id(id).await,
            None => {
                debug!("No record at index {}; nothing to enrich", record_index);
                Ok(EnrichmentOutcome::Skipped)
            }
        }
    }

    pub async fn enrich_all_by_id(&self, record: RecordId) -> Result<EnrichmentOutcome> {
        let snapshot = {
            let store = self.store.read().await;
            store.get_by_id(record).map(|r| {
                let labels: Vec<String> = r.detections.iter().map(|d| d.class.clone()).collect();
                (labels, r.distinct_classes())
            })
        };
        let Some((labels, classes)) = snapshot else {
            return Ok(EnrichmentOutcome::Skipped);
        };
        if labels.is_empty() {
            debug!("Record {} has no detections; nothing to enrich", record);
            return Ok(EnrichmentOutcome::Skipped);
        }

        let indices: Vec<usize> = (0..labels.len()).collect();
        let keys = indices
            .iter()
            .map(|&i| EnrichmentKey::new(record, i))
            .collect();
        let guard = self.loading.begin(keys);
        self.event_bus.publish(DetectEvent::EnrichmentStarted {
            record_id: record,
            detections: indices,
        });
        info!(
            "Fetching use cases for {} class(es) of record {}",
            classes.len(),
            record
        );

        let outcome = match self.service.batch_use_cases(&classes).await {
            Ok(response) => {
                let source = UsesSource::from_service(&response.source);
                // One write lock so every matching detection changes together
                let applied = self.store.write().await.update_record(record, |r| {
                    let mut applied = Vec::new();
                    for (index, detection) in r.detections.iter_mut().enumerate() {
                        if labels.get(index) != Some(&detection.class) {
                            continue;
                        }
                        // Blank text counts as absent and keeps the previous value
                        let Some(text) = response.use_cases.get(&detection.class) else {
                            continue;
                        };
                        if detection.apply_use_case(text.clone(), source) {
                            applied.push(index);
                        }
                    }
                    applied
                });

                match applied {
                    Some(applied) => Ok(EnrichmentOutcome::Applied(applied)),
                    None => Ok(EnrichmentOutcome::Stale),
                }
            }
            Err(e) => Err(e),
        };

        drop(guard);
        self.report(record, outcome)
    }

    /// Run `enrich_one` as a detached task
    pub fn spawn_enrich_one(
        &self,
        record_index: usize,
        detection_index: usize,
    ) -> JoinHandle<Result<EnrichmentOutcome>> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.enrich_one(record_index, detection_index).await })
    }

    /// Run `enrich_all` as a detached task
    pub fn spawn_enrich_all(&self, record_index: usize) -> JoinHandle<Result<EnrichmentOutcome>> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.enrich_all(record_index).await })
    }

    fn report(
        &self,
        record: RecordId,
        outcome: Result<EnrichmentOutcome>,
    ) -> Result<EnrichmentOutcome> {
        match &outcome {
            Ok(EnrichmentOutcome::Applied(detections)) => {
                self.event_bus.publish(DetectEvent::EnrichmentCompleted {
                    record_id: record,
                    detections: detections.clone(),
                });
            }
            Ok(EnrichmentOutcome::Stale) => {
                debug!("Record {} changed during enrichment; result dropped", record);
                self.event_bus.publish(DetectEvent::StaleResultDiscarded {
                    context: format!("enrichment for record {}", record),
                });
            }
            Ok(EnrichmentOutcome::Skipped) => {}
            Err(e) => {
                warn!("Use case lookup for record {} failed: {}", record, e);
                self.event_bus.publish(DetectEvent::EnrichmentFailed {
                    record_id: record,
                    message: self.config.failure_notice.clone(),
                });
            }
        }
        outcome
    }
}
