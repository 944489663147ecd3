pub mod app;
pub mod camera;
pub mod capture;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod events;
pub mod frame;
pub mod results;
pub mod service;
pub mod upload;

pub use app::DetectionSession;
pub use camera::{CameraDevice, CameraDeviceBuilder, CaptureSession, DeviceHandle, MockCameraDevice};
pub use capture::{CaptureState, MediaCaptureController, StagedImage, SubmissionTicket};
pub use config::DetectConfig;
pub use enrichment::{EnrichmentKey, EnrichmentOutcome, EnrichmentScheduler, LoadingState};
pub use error::{DetectError, Result};
pub use events::{DetectEvent, EventBus, ImageSource};
pub use frame::{FrameData, FrameFormat};
pub use results::{DetectionItem, RecordId, ResultRecord, ResultStore, SharedResultStore, Summary, UsesSource};
pub use service::{DetectionService, HttpDetectionService};
pub use upload::UploadCoordinator;
