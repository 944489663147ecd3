//! Scripted in-memory service used by unit tests across the crate

use super::client::DetectionService;
use super::types::{
    BatchUseCaseResponse, DetectResponse, ImagePayload, ServiceHealth, SingleUseCaseResponse,
};
use crate::error::{EnrichmentError, Result, UploadError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

type Reply<T> = std::result::Result<T, String>;

#[derive(Default)]
pub(crate) struct ScriptedService {
    detect: Mutex<VecDeque<Reply<DetectResponse>>>,
    single: Mutex<HashMap<String, VecDeque<Reply<SingleUseCaseResponse>>>>,
    batch: Mutex<VecDeque<Reply<BatchUseCaseResponse>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    uploads: Mutex<Vec<ImagePayload>>,
    batch_requests: Mutex<Vec<Vec<String>>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_detect(&self, reply: Reply<DetectResponse>) {
        self.detect.lock().push_back(reply);
    }

    pub fn push_single(&self, object: &str, reply: Reply<SingleUseCaseResponse>) {
        self.single
            .lock()
            .entry(object.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn push_batch(&self, reply: Reply<BatchUseCaseResponse>) {
        self.batch.lock().push_back(reply);
    }

    /// Hold calls for `key` ("detect", "batch" or "single:<object>") until released
    pub fn gate(&self, key: &str) -> Arc<Notify> {
        self.gates
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    pub fn uploads(&self) -> Vec<ImagePayload> {
        self.uploads.lock().clone()
    }

    pub fn batch_requests(&self) -> Vec<Vec<String>> {
        self.batch_requests.lock().clone()
    }

    async fn wait_gate(&self, key: &str) {
        let gate = self.gates.lock().get(key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

pub(crate) fn use_case(text: &str, source: &str) -> SingleUseCaseResponse {
    SingleUseCaseResponse {
        use_case: text.to_string(),
        source: source.to_string(),
        object: None,
    }
}

pub(crate) fn batch(pairs: &[(&str, &str)], source: &str) -> BatchUseCaseResponse {
    BatchUseCaseResponse {
        use_cases: pairs
            .iter()
            .map(|(class, text)| (class.to_string(), text.to_string()))
            .collect(),
        source: source.to_string(),
    }
}

#[async_trait]
impl DetectionService for ScriptedService {
    async fn detect(&self, image: ImagePayload) -> Result<DetectResponse> {
        self.uploads.lock().push(image);
        self.wait_gate("detect").await;

        let reply = self.detect.lock().pop_front();
        match reply {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(reason)) => Err(UploadError::Rejected { reason }.into()),
            None => Err(UploadError::Transport {
                details: "no scripted detect reply".to_string(),
            }
            .into()),
        }
    }

    async fn single_use_case(&self, object: &str) -> Result<SingleUseCaseResponse> {
        self.wait_gate(&format!("single:{}", object)).await;

        let reply = self
            .single
            .lock()
            .get_mut(object)
            .and_then(|queue| queue.pop_front());
        match reply {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(details)) => Err(EnrichmentError::Failed {
                object: object.to_string(),
                details,
            }
            .into()),
            None => Err(EnrichmentError::Failed {
                object: object.to_string(),
                details: "no scripted reply".to_string(),
            }
            .into()),
        }
    }

    async fn batch_use_cases(&self, objects: &[String]) -> Result<BatchUseCaseResponse> {
        self.batch_requests.lock().push(objects.to_vec());
        self.wait_gate("batch").await;

        let reply = self.batch.lock().pop_front();
        match reply {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(details)) => Err(EnrichmentError::Failed {
                object: objects.join(", "),
                details,
            }
            .into()),
            None => Err(EnrichmentError::Failed {
                object: objects.join(", "),
                details: "no scripted reply".to_string(),
            }
            .into()),
        }
    }

    async fn health(&self) -> Result<ServiceHealth> {
        Ok(ServiceHealth {
            status: "healthy".to_string(),
            model: Some("scripted".to_string()),
            gemini_available: false,
            depth_available: false,
            cached_objects: 0,
            timestamp: None,
        })
    }

    async fn fetch_image(&self, _url: &str) -> Result<Bytes> {
        Ok(Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]))
    }

    fn base_url(&self) -> &str {
        "http://localhost:5001"
    }
}
