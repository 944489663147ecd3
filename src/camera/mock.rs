use super::interface::{CameraDevice, DeviceHandle};
use crate::error::CameraError;
use crate::frame::{encode_still, FrameData, FrameFormat};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Synthetic camera for testing and for machines without a capture device.
///
/// Produces gradient frames; can be configured to refuse access or to emit a
/// number of empty warm-up frames after each acquisition. In MJPEG mode the
/// frames arrive already compressed, as from a webcam's hardware encoder.
pub struct MockCameraDevice {
    resolution: (u32, u32),
    quality: u8,
    format: FrameFormat,
    available: bool,
    warmup_frames: u32,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    // handle id -> frames served so far
    open: HashMap<u64, u32>,
    acquisitions: u64,
}

impl MockCameraDevice {
    /// Create a new mock camera producing frames of the given size
    pub fn new(resolution: (u32, u32), quality: u8) -> Self {
        Self {
            resolution,
            quality,
            format: FrameFormat::Rgb24,
            available: true,
            warmup_frames: 0,
            state: Mutex::new(MockState::default()),
        }
    }

    /// A device that always fails to acquire, like a denied permission prompt
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new((640, 480), 80)
        }
    }

    /// Emit `frames` zero-sized frames after each acquisition
    pub fn with_warmup_frames(mut self, frames: u32) -> Self {
        self.warmup_frames = frames;
        self
    }

    /// Deliver frames in `format` instead of raw RGB
    pub fn with_format(mut self, format: FrameFormat) -> Self {
        self.format = format;
        self
    }

    /// Number of handles currently held
    pub fn open_handles(&self) -> usize {
        self.state.lock().open.len()
    }

    /// Number of successful acquisitions so far
    pub fn acquisitions(&self) -> u64 {
        self.state.lock().acquisitions
    }

    fn gradient(&self, seed: u64) -> Vec<u8> {
        let (width, height) = self.resolution;
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 255 / width.max(1)) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push((seed % 256) as u8);
            }
        }
        data
    }
}

#[async_trait]
impl CameraDevice for MockCameraDevice {
    async fn acquire(&self) -> Result<DeviceHandle, CameraError> {
        if !self.available {
            warn!("Mock camera configured as unavailable");
            return Err(CameraError::DeviceUnavailable {
                details: "no camera device present".to_string(),
            });
        }

        let mut state = self.state.lock();
        state.next_id += 1;
        state.acquisitions += 1;
        let id = state.next_id;
        state.open.insert(id, 0);
        debug!("Mock camera acquired handle {}", id);

        Ok(DeviceHandle::new(id))
    }

    fn release(&self, handle: &DeviceHandle) {
        if self.state.lock().open.remove(&handle.id()).is_some() {
            debug!("Mock camera released handle {}", handle.id());
        }
    }

    async fn capture_frame(&self, handle: &DeviceHandle) -> Result<Vec<u8>, CameraError> {
        let served = {
            let mut state = self.state.lock();
            let served = state.open.get_mut(&handle.id()).ok_or_else(|| {
                CameraError::DeviceUnavailable {
                    details: format!("handle {} is not open", handle.id()),
                }
            })?;
            *served += 1;
            *served
        };

        let frame = if served <= self.warmup_frames {
            FrameData::new(
                served as u64,
                SystemTime::now(),
                Vec::new(),
                0,
                0,
                self.format,
            )
        } else {
            let (width, height) = self.resolution;
            let raw = FrameData::new(
                served as u64,
                SystemTime::now(),
                self.gradient(served as u64),
                width,
                height,
                FrameFormat::Rgb24,
            );
            match self.format {
                FrameFormat::Rgb24 => raw,
                FrameFormat::Mjpeg => FrameData::new(
                    raw.id,
                    raw.timestamp,
                    encode_still(&raw, self.quality)?,
                    width,
                    height,
                    FrameFormat::Mjpeg,
                ),
            }
        };

        encode_still(&frame, self.quality)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
