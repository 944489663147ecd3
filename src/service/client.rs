use super::types::{
    BatchUseCaseRequest, BatchUseCaseResponse, DetectResponse, ErrorBody, ImagePayload,
    ServiceHealth, SingleUseCaseRequest, SingleUseCaseResponse,
};
use crate::config::ServiceConfig;
use crate::error::{DetectError, EnrichmentError, Result, UploadError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::{debug, error};

/// Remote detection and enrichment service
#[async_trait]
pub trait DetectionService: Send + Sync {
    /// `POST /detect` with the image as multipart field `image`
    async fn detect(&self, image: ImagePayload) -> Result<DetectResponse>;

    /// `POST /get-single-use-case`
    async fn single_use_case(&self, object: &str) -> Result<SingleUseCaseResponse>;

    /// `POST /get-use-cases`
    async fn batch_use_cases(&self, objects: &[String]) -> Result<BatchUseCaseResponse>;

    /// `GET /health`
    async fn health(&self) -> Result<ServiceHealth>;

    /// Download an image produced by the service
    async fn fetch_image(&self, url: &str) -> Result<Bytes>;

    /// Base that relative service paths are joined onto
    fn base_url(&self) -> &str;

    /// Absolute URL for a path returned by the service
    fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url(), path)
        } else {
            format!("{}/{}", self.base_url(), path)
        }
    }
}

/// Reason surfaced for a non-success response: the service's `error` field,
/// or the bare status when the body carries none.
pub fn rejection_reason(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .filter(|reason| !reason.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()))
}

/// reqwest-backed service client
#[derive(Clone)]
pub struct HttpDetectionService {
    http: Client,
    base_url: String,
}

impl HttpDetectionService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn lookup_failed(object: &str, details: impl ToString) -> DetectError {
        EnrichmentError::Failed {
            object: object.to_string(),
            details: details.to_string(),
        }
        .into()
    }
}

#[async_trait]
impl DetectionService for HttpDetectionService {
    async fn detect(&self, image: ImagePayload) -> Result<DetectResponse> {
        let url = self.endpoint("/detect");
        let size = image.bytes.len();

        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.file_name)
            .mime_str(&image.mime_type)
            .map_err(|e| UploadError::Transport {
                details: e.to_string(),
            })?;
        let form = Form::new().part("image", part);

        debug!("POST {} ({} bytes)", url, size);
        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport {
                details: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let reason = rejection_reason(status, &body);
            error!("Detection rejected ({}): {}", status, reason);
            return Err(UploadError::Rejected { reason }.into());
        }

        let body = resp.bytes().await.map_err(|e| UploadError::Transport {
            details: e.to_string(),
        })?;
        let parsed = serde_json::from_slice::<DetectResponse>(&body).map_err(|e| {
            UploadError::InvalidResponse {
                details: e.to_string(),
            }
        })?;

        Ok(parsed)
    }

    async fn single_use_case(&self, object: &str) -> Result<SingleUseCaseResponse> {
        let url = self.endpoint("/get-single-use-case");
        debug!("POST {} for {}", url, object);

        let resp = self
            .http
            .post(&url)
            .json(&SingleUseCaseRequest {
                object: object.to_string(),
            })
            .send()
            .await
            .map_err(|e| Self::lookup_failed(object, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::lookup_failed(object, rejection_reason(status, &body)));
        }

        resp.json::<SingleUseCaseResponse>()
            .await
            .map_err(|e| Self::lookup_failed(object, e))
    }

    async fn batch_use_cases(&self, objects: &[String]) -> Result<BatchUseCaseResponse> {
        let url = self.endpoint("/get-use-cases");
        let label = objects.join(", ");
        debug!("POST {} for [{}]", url, label);

        let resp = self
            .http
            .post(&url)
            .json(&BatchUseCaseRequest {
                objects: objects.to_vec(),
            })
            .send()
            .await
            .map_err(|e| Self::lookup_failed(&label, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::lookup_failed(&label, rejection_reason(status, &body)));
        }

        resp.json::<BatchUseCaseResponse>()
            .await
            .map_err(|e| Self::lookup_failed(&label, e))
    }

    async fn health(&self) -> Result<ServiceHealth> {
        let url = self.endpoint("/health");
        let resp = self.http.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(DetectError::component(
                "service".to_string(),
                format!("health check failed: {}", resp.status()),
            ));
        }

        Ok(resp.json::<ServiceHealth>().await?)
    }

    async fn fetch_image(&self, url: &str) -> Result<Bytes> {
        let resp = self.http.get(url).send().await?;

        if !resp.status().is_success() {
            return Err(DetectError::component(
                "service".to_string(),
                format!("image download failed: {}", resp.status()),
            ));
        }

        Ok(resp.bytes().await?)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
