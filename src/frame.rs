use crate::error::CameraError;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Frame format enumeration for data coming off a camera device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Parse a configured format name such as "MJPG" or "RGB24"
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "MJPG" | "MJPEG" => Some(FrameFormat::Mjpeg),
            "RGB" | "RGB24" | "RGB3" => Some(FrameFormat::Rgb24),
            _ => None,
        }
    }

    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // Variable size, compressed
            FrameFormat::Rgb24 => 3,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// Frame data structure containing raw frame data and metadata
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Frame sequence number within its capture session
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => true, // Compressed formats have variable size
        }
    }

    /// A frame is usable once the device reports real dimensions and delivers bytes
    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.data.is_empty()
    }
}

/// Encode a live frame into a JPEG still.
///
/// Frames without dimensions are reported as not ready; MJPEG frames are
/// already encoded and pass through untouched.
pub fn encode_still(frame: &FrameData, quality: u8) -> Result<Vec<u8>, CameraError> {
    if !frame.is_ready() {
        return Err(CameraError::FrameNotReady {
            width: frame.width,
            height: frame.height,
        });
    }

    match frame.format {
        FrameFormat::Mjpeg => Ok(frame.data.as_ref().clone()),
        FrameFormat::Rgb24 => {
            if !frame.validate_size() {
                return Err(CameraError::Encoding {
                    details: format!(
                        "frame {} has {} bytes, expected {:?}",
                        frame.id,
                        frame.data.len(),
                        frame.expected_size()
                    ),
                });
            }

            let mut buf = Vec::new();
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            encoder
                .encode(
                    &frame.data,
                    frame.width,
                    frame.height,
                    image::ColorType::Rgb8,
                )
                .map_err(|e| CameraError::Encoding {
                    details: e.to_string(),
                })?;

            tracing::trace!(
                "Encoded frame {} ({}x{}) to {} byte JPEG at quality {}",
                frame.id,
                frame.width,
                frame.height,
                buf.len(),
                quality
            );

            Ok(buf)
        }
    }
}
