mod client;
#[cfg(test)]
pub(crate) mod fake;
mod types;

pub use client::{rejection_reason, DetectionService, HttpDetectionService};
pub use types::{
    ApiStatus, BatchUseCaseRequest, BatchUseCaseResponse, DetectResponse, ImagePayload,
    ServiceHealth, SingleUseCaseRequest, SingleUseCaseResponse, WireDetection, WireSummary,
};
