use super::interface::CameraDevice;
use super::mock::MockCameraDevice;
use crate::config::CameraConfig;
use crate::error::{DetectError, Result};
use std::sync::Arc;
use tracing::info;
#[cfg(not(all(target_os = "linux", feature = "camera")))]
use tracing::warn;

/// Builder selecting the camera device implementation
pub struct CameraDeviceBuilder {
    config: Option<CameraConfig>,
    mock: bool,
}

impl CameraDeviceBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            mock: false,
        }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use the synthetic device instead of real hardware
    pub fn mock(mut self, mock: bool) -> Self {
        self.mock = mock;
        self
    }

    pub fn build(self) -> Result<Arc<dyn CameraDevice>> {
        let config = self
            .config
            .ok_or_else(|| DetectError::system("Camera configuration must be specified"))?;

        if self.mock {
            info!("Using mock camera device");
            return Ok(Arc::new(
                MockCameraDevice::new(config.resolution, config.jpeg_quality)
                    .with_format(config.frame_format()),
            ));
        }

        #[cfg(all(target_os = "linux", feature = "camera"))]
        {
            let device = super::gst::GstCameraDevice::new(config)?;
            Ok(Arc::new(device))
        }

        #[cfg(not(all(target_os = "linux", feature = "camera")))]
        {
            warn!("GStreamer camera is only available on Linux with the camera feature; using mock device");
            Ok(Arc::new(
                MockCameraDevice::new(config.resolution, config.jpeg_quality)
                    .with_format(config.frame_format()),
            ))
        }
    }
}

impl Default for CameraDeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
