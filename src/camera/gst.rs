use super::interface::{CameraDevice, DeviceHandle};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{encode_still, FrameData, FrameFormat};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::{debug, info, trace, warn};

/// GStreamer-backed V4L2 camera. Each acquisition starts its own pipeline,
/// which is torn down again on release.
pub struct GstCameraDevice {
    config: CameraConfig,
    next_id: AtomicU64,
    pipelines: Mutex<HashMap<u64, Pipeline>>,
}

impl GstCameraDevice {
    pub fn new(config: CameraConfig) -> Result<Self, CameraError> {
        gstreamer::init().map_err(|e| CameraError::Pipeline {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        info!(
            "GStreamer camera configured for device {} ({}x{} @ {}fps, {:?})",
            config.index,
            config.resolution.0,
            config.resolution.1,
            config.fps,
            config.frame_format()
        );

        Ok(Self {
            config,
            next_id: AtomicU64::new(1),
            pipelines: Mutex::new(HashMap::new()),
        })
    }

    /// Build GStreamer pipeline string for the configured capture format
    fn build_pipeline_string(&self) -> String {
        let (width, height) = self.config.resolution;

        match self.config.frame_format() {
            FrameFormat::Mjpeg => format!(
                "v4l2src device=/dev/video{} io-mode=mmap ! \
                 image/jpeg,width={},height={},framerate={}/1 ! \
                 appsink name=sink sync=false max-buffers=1 drop=true",
                self.config.index, width, height, self.config.fps
            ),
            FrameFormat::Rgb24 => format!(
                "v4l2src device=/dev/video{} ! videoconvert ! videoscale ! \
                 video/x-raw,format=RGB,width={},height={},framerate={}/1 ! \
                 appsink name=sink sync=false max-buffers=1 drop=true",
                self.config.index, width, height, self.config.fps
            ),
        }
    }

    fn stop_pipeline(pipeline: &Pipeline) {
        if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop camera pipeline: {}", e);
        }
    }

    /// Pull the most recent sample. RGB samples are copied into a tightly
    /// packed frame; JPEG samples are taken as they are.
    fn pull_frame(
        pipeline: &Pipeline,
        wait_ms: u64,
        format: FrameFormat,
    ) -> Result<FrameData, CameraError> {
        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Pipeline {
                details: "appsink missing from pipeline".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::Pipeline {
                details: "sink element is not an AppSink".to_string(),
            })?;

        let Some(sample) = appsink.try_pull_sample(gstreamer::ClockTime::from_mseconds(wait_ms))
        else {
            return Err(CameraError::FrameNotReady {
                width: 0,
                height: 0,
            });
        };

        let caps = sample.caps().ok_or_else(|| CameraError::Pipeline {
            details: "No caps in sample".to_string(),
        })?;

        if format == FrameFormat::Mjpeg {
            return Self::jpeg_frame(&sample, caps);
        }

        let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::Pipeline {
            details: format!("Failed to get video info: {}", e),
        })?;

        let width = video_info.width();
        let height = video_info.height();
        if width == 0 || height == 0 {
            return Err(CameraError::FrameNotReady { width, height });
        }

        let buffer = sample.buffer().ok_or_else(|| CameraError::Pipeline {
            details: "No buffer in sample".to_string(),
        })?;
        let map = buffer.map_readable().map_err(|e| CameraError::Pipeline {
            details: format!("Failed to map buffer: {}", e),
        })?;

        let stride = video_info.stride()[0] as usize;
        let row_bytes = width as usize * 3;
        let src = map.as_slice();
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            let end = start + row_bytes;
            if end > src.len() {
                return Err(CameraError::Pipeline {
                    details: format!("Short buffer: {} bytes for {}x{}", src.len(), width, height),
                });
            }
            data.extend_from_slice(&src[start..end]);
        }

        trace!("Pulled RGB frame {}x{} ({} bytes)", width, height, data.len());

        Ok(FrameData::new(
            0,
            SystemTime::now(),
            data,
            width,
            height,
            FrameFormat::Rgb24,
        ))
    }

    fn jpeg_frame(
        sample: &gstreamer::Sample,
        caps: &gstreamer::CapsRef,
    ) -> Result<FrameData, CameraError> {
        let (width, height) = caps
            .structure(0)
            .and_then(|s| Some((s.get::<i32>("width").ok()?, s.get::<i32>("height").ok()?)))
            .map(|(w, h)| (w.max(0) as u32, h.max(0) as u32))
            .unwrap_or((0, 0));

        let buffer = sample.buffer().ok_or_else(|| CameraError::Pipeline {
            details: "No buffer in sample".to_string(),
        })?;
        let map = buffer.map_readable().map_err(|e| CameraError::Pipeline {
            details: format!("Failed to map buffer: {}", e),
        })?;

        trace!("Pulled MJPEG frame {}x{} ({} bytes)", width, height, map.size());

        Ok(FrameData::new(
            0,
            SystemTime::now(),
            map.as_slice().to_vec(),
            width,
            height,
            FrameFormat::Mjpeg,
        ))
    }
}

#[async_trait]
impl CameraDevice for GstCameraDevice {
    async fn acquire(&self) -> Result<DeviceHandle, CameraError> {
        let pipeline_desc = self.build_pipeline_string();
        let timeout = gstreamer::ClockTime::from_mseconds(
            self.config.acquire_timeout().as_millis() as u64,
        );
        debug!(
            "Creating GStreamer pipeline ({} facing requested): {}",
            self.config.facing, pipeline_desc
        );

        let pipeline = tokio::task::spawn_blocking(move || -> Result<Pipeline, CameraError> {
            let pipeline = gstreamer::parse::launch(&pipeline_desc)
                .map_err(|e| CameraError::DeviceUnavailable {
                    details: format!("Failed to create pipeline: {}", e),
                })?
                .downcast::<Pipeline>()
                .map_err(|_| CameraError::Pipeline {
                    details: "Failed to downcast to Pipeline".to_string(),
                })?;

            if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
                Self::stop_pipeline(&pipeline);
                return Err(CameraError::DeviceUnavailable {
                    details: format!("Failed to start camera: {}", e),
                });
            }

            let (result, _, _) = pipeline.state(timeout);
            if let Err(e) = result {
                Self::stop_pipeline(&pipeline);
                return Err(CameraError::DeviceUnavailable {
                    details: format!("Camera did not start: {}", e),
                });
            }

            Ok(pipeline)
        })
        .await
        .map_err(|e| CameraError::Pipeline {
            details: format!("Camera start task failed: {}", e),
        })??;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pipelines.lock().insert(id, pipeline);

        Ok(DeviceHandle::new(id))
    }

    fn release(&self, handle: &DeviceHandle) {
        if let Some(pipeline) = self.pipelines.lock().remove(&handle.id()) {
            Self::stop_pipeline(&pipeline);
            debug!("GStreamer pipeline for handle {} stopped", handle.id());
        }
    }

    async fn capture_frame(&self, handle: &DeviceHandle) -> Result<Vec<u8>, CameraError> {
        let pipeline = self
            .pipelines
            .lock()
            .get(&handle.id())
            .cloned()
            .ok_or_else(|| CameraError::DeviceUnavailable {
                details: format!("handle {} is not open", handle.id()),
            })?;

        let wait_ms = self.config.frame_wait_ms;
        let quality = self.config.jpeg_quality;
        let format = self.config.frame_format();

        tokio::task::spawn_blocking(move || {
            let frame = Self::pull_frame(&pipeline, wait_ms, format)?;
            encode_still(&frame, quality)
        })
        .await
        .map_err(|e| CameraError::Pipeline {
            details: format!("Capture task failed: {}", e),
        })?
    }

    fn name(&self) -> &str {
        "gstreamer"
    }
}

impl Drop for GstCameraDevice {
    fn drop(&mut self) {
        for (_, pipeline) in self.pipelines.lock().drain() {
            Self::stop_pipeline(&pipeline);
        }
    }
}
