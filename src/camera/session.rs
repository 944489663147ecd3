use super::interface::{CameraDevice, DeviceHandle};
use crate::error::CameraError;
use std::sync::Arc;
use tracing::{debug, info};

/// Exclusive hold on a camera device.
///
/// The handle is released exactly once, either through `release()` or when
/// the session is dropped. `is_active()` is true only while a handle is held.
pub struct CaptureSession {
    device: Arc<dyn CameraDevice>,
    handle: Option<DeviceHandle>,
}

impl CaptureSession {
    /// Acquire the device and wrap the handle
    pub async fn open(device: Arc<dyn CameraDevice>) -> Result<Self, CameraError> {
        debug!("Acquiring camera device '{}'", device.name());
        let handle = device.acquire().await?;
        info!(
            "Camera device '{}' acquired (handle {})",
            device.name(),
            handle.id()
        );

        Ok(Self {
            device,
            handle: Some(handle),
        })
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<&DeviceHandle> {
        self.handle.as_ref()
    }

    /// Grab a JPEG still from the live device
    pub async fn capture_still(&self) -> Result<Vec<u8>, CameraError> {
        let handle = self.handle.as_ref().ok_or_else(|| CameraError::DeviceUnavailable {
            details: "capture session already released".to_string(),
        })?;

        self.device.capture_frame(handle).await
    }

    /// Release the device; subsequent calls do nothing
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.device.release(&handle);
            info!(
                "Camera device '{}' released (handle {})",
                self.device.name(),
                handle.id()
            );
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("device", &self.device.name())
            .field("handle", &self.handle)
            .finish()
    }
}
