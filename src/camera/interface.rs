use crate::error::CameraError;
use async_trait::async_trait;
use std::time::SystemTime;

/// Opaque reference to an acquired camera device.
///
/// Handles are only meaningful to the device that issued them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    id: u64,
    acquired_at: SystemTime,
}

impl DeviceHandle {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            acquired_at: SystemTime::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn acquired_at(&self) -> SystemTime {
        self.acquired_at
    }
}

/// Live video capture device able to produce a single encoded still
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Acquire exclusive access to the device.
    ///
    /// Fails with `DeviceUnavailable` when hardware is missing or access is denied.
    async fn acquire(&self) -> Result<DeviceHandle, CameraError>;

    /// Stop the underlying device. Releasing an unknown or already released
    /// handle is a no-op.
    fn release(&self, handle: &DeviceHandle);

    /// Grab the current frame and encode it as a JPEG still
    async fn capture_frame(&self, handle: &DeviceHandle) -> Result<Vec<u8>, CameraError>;

    /// Short name for logging
    fn name(&self) -> &str;
}
