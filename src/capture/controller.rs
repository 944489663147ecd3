use super::staged::StagedImage;
use super::state::CaptureState;
use crate::camera::{CameraDevice, CaptureSession};
use crate::error::{CameraError, CaptureError, Result};
use crate::events::{DetectEvent, EventBus};
use bytes::Bytes;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Proof that a submission was started from a particular dialog generation.
///
/// Closing the dialog invalidates every outstanding ticket.
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    generation: u64,
    image: StagedImage,
}

impl SubmissionTicket {
    pub fn image(&self) -> &StagedImage {
        &self.image
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// State machine behind the "pick a file or use the camera" dialog.
///
/// Owns the camera for as long as a live preview exists and holds at most one
/// staged image. The device is held if and only if the state is `CameraActive`.
pub struct MediaCaptureController {
    device: Arc<dyn CameraDevice>,
    event_bus: Arc<EventBus>,
    capture_file_name: String,
    state: CaptureState,
    session: Option<CaptureSession>,
    staged: Option<StagedImage>,
    resume_state: Option<CaptureState>,
    generation: u64,
    notice: Option<String>,
}

impl MediaCaptureController {
    pub fn new(
        device: Arc<dyn CameraDevice>,
        event_bus: Arc<EventBus>,
        capture_file_name: String,
    ) -> Self {
        Self {
            device,
            event_bus,
            capture_file_name,
            state: CaptureState::Closed,
            session: None,
            staged: None,
            resume_state: None,
            generation: 0,
            notice: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn staged_image(&self) -> Option<&StagedImage> {
        self.staged.as_ref()
    }

    pub fn is_camera_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_active())
    }

    pub fn is_submitting(&self) -> bool {
        self.state == CaptureState::Submitting
    }

    /// Latest user-facing warning, cleared by the next successful step
    pub fn last_notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Open the dialog
    pub fn open(&mut self) {
        if !self.state.is_open() {
            debug!("Capture dialog opened (generation {})", self.generation);
            self.state = CaptureState::Idle;
            self.notice = None;
        }
    }

    /// Stage a file chosen from local storage, replacing any prior image
    pub fn pick_file<S: Into<String>>(&mut self, name: S, bytes: Bytes) -> Result<StagedImage> {
        self.require(
            "pick_file",
            &[
                CaptureState::Idle,
                CaptureState::CameraActive,
                CaptureState::Captured,
                CaptureState::FilePicked,
            ],
        )?;

        let name = name.into();
        if bytes.is_empty() {
            let err = CaptureError::EmptyFile { name };
            self.notice = Some(err.user_message());
            return Err(err.into());
        }

        // A picked file replaces the live preview
        self.release_camera();

        let image = StagedImage::from_file(name, bytes);
        info!(
            "Staged file '{}' ({} bytes, {})",
            image.file_name,
            image.len(),
            image.mime_type
        );
        self.stage(image.clone());
        self.state = CaptureState::FilePicked;

        Ok(image)
    }

    /// Acquire the camera and start the live preview.
    ///
    /// On failure the controller returns to `Idle` and keeps a warning in
    /// `last_notice()`; there is no automatic retry.
    pub async fn start_camera(&mut self) -> Result<()> {
        self.require(
            "start_camera",
            &[
                CaptureState::Idle,
                CaptureState::FilePicked,
                CaptureState::Captured,
            ],
        )?;

        self.discard_staged();
        self.state = CaptureState::CameraStarting;
        debug!("Starting camera '{}'", self.device.name());

        match CaptureSession::open(Arc::clone(&self.device)).await {
            Ok(session) => {
                self.session = Some(session);
                self.state = CaptureState::CameraActive;
                self.notice = None;
                self.event_bus.publish(DetectEvent::CameraStarted {
                    timestamp: SystemTime::now(),
                });
                Ok(())
            }
            Err(e) => {
                let message = e.user_message();
                warn!("Camera start failed: {}", e);
                self.state = CaptureState::Idle;
                self.notice = Some(message.clone());
                self.event_bus
                    .publish(DetectEvent::CameraUnavailable { message });
                Err(e.into())
            }
        }
    }

    /// Grab a still from the live preview and stop the camera.
    ///
    /// `FrameNotReady` leaves the preview running so the caller can retry.
    pub async fn capture(&mut self) -> Result<StagedImage> {
        self.require("capture", &[CaptureState::CameraActive])?;

        let session = self.session.as_ref().ok_or_else(|| CameraError::DeviceUnavailable {
            details: "camera session missing while active".to_string(),
        })?;

        match session.capture_still().await {
            Ok(jpeg) => {
                self.release_camera();
                let image = StagedImage::from_camera(self.capture_file_name.clone(), Bytes::from(jpeg));
                info!("Captured still image ({} bytes)", image.len());
                self.stage(image.clone());
                self.state = CaptureState::Captured;
                Ok(image)
            }
            Err(e) => {
                debug!("Capture failed: {}", e);
                self.notice = Some(e.user_message());
                Err(e.into())
            }
        }
    }

    /// "Stop Camera": end the preview without capturing
    pub fn stop_camera(&mut self) {
        if self.state == CaptureState::CameraActive {
            self.release_camera();
            self.state = CaptureState::Idle;
        }
    }

    /// Drop the staged image and any live preview, back to `Idle`
    pub fn cancel(&mut self) -> Result<()> {
        if matches!(self.state, CaptureState::Closed | CaptureState::Submitting) {
            return Err(CaptureError::InvalidState {
                operation: "cancel",
                state: self.state.to_string(),
            }
            .into());
        }

        self.discard_staged();
        self.release_camera();
        self.state = CaptureState::Idle;
        Ok(())
    }

    /// Dismiss the dialog from any state.
    ///
    /// In-flight submissions keep running, but their tickets no longer match
    /// and their completion will not touch this controller.
    pub fn close(&mut self) {
        self.release_camera();
        self.discard_staged();
        self.resume_state = None;
        self.notice = None;
        self.generation += 1;

        if self.state.is_open() {
            info!("Capture dialog closed from state {}", self.state);
            self.state = CaptureState::Closed;
            self.event_bus.publish(DetectEvent::DialogClosed);
        }
    }

    /// Move to `Submitting` and hand out the staged image
    pub fn begin_submission(&mut self) -> Result<SubmissionTicket> {
        if !self.state.has_staged_image() {
            return Err(CaptureError::InvalidState {
                operation: "submit",
                state: self.state.to_string(),
            }
            .into());
        }

        let image = self.staged.clone().ok_or(CaptureError::NothingStaged)?;
        self.resume_state = Some(self.state);
        self.state = CaptureState::Submitting;
        self.notice = None;

        Ok(SubmissionTicket {
            generation: self.generation,
            image,
        })
    }

    /// Apply a submission outcome.
    ///
    /// Returns false when the ticket is stale and nothing was changed.
    pub fn finish_submission(
        &mut self,
        ticket: &SubmissionTicket,
        outcome: std::result::Result<(), String>,
    ) -> bool {
        if ticket.generation != self.generation || self.state != CaptureState::Submitting {
            debug!(
                "Ignoring submission completion for generation {} (current {}, state {})",
                ticket.generation, self.generation, self.state
            );
            self.event_bus.publish(DetectEvent::StaleResultDiscarded {
                context: "capture dialog was reset during submission".to_string(),
            });
            return false;
        }

        let resume = self.resume_state.take();
        match outcome {
            Ok(()) => {
                self.staged = None;
                self.state = CaptureState::Idle;
            }
            Err(message) => {
                // Keep the image so the user may retry or cancel
                self.state = resume.unwrap_or(CaptureState::Idle);
                if self.staged.is_none() {
                    self.state = CaptureState::Idle;
                }
                self.notice = Some(message);
            }
        }
        true
    }

    fn require(&self, operation: &'static str, allowed: &[CaptureState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CaptureError::InvalidState {
                operation,
                state: self.state.to_string(),
            }
            .into())
        }
    }

    fn stage(&mut self, image: StagedImage) {
        self.event_bus.publish(DetectEvent::ImageStaged {
            source: image.source,
            bytes: image.len(),
        });
        self.staged = Some(image);
        self.notice = None;
    }

    fn discard_staged(&mut self) {
        if self.staged.take().is_some() {
            self.event_bus.publish(DetectEvent::ImageDiscarded);
        }
    }

    /// Single exit path for the camera device
    fn release_camera(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
            self.event_bus.publish(DetectEvent::CameraStopped {
                timestamp: SystemTime::now(),
            });
        }
    }
}

impl Drop for MediaCaptureController {
    fn drop(&mut self) {
        self.release_camera();
    }
}
