use crate::events::ImageSource;
use crate::service::ImagePayload;
use bytes::Bytes;
use image::ImageFormat;
use uuid::Uuid;

/// An image held in memory, not yet submitted
#[derive(Debug, Clone)]
pub struct StagedImage {
    /// Opaque reference used by the rendering layer to show the preview
    pub display_handle: String,
    pub payload: Bytes,
    pub file_name: String,
    pub mime_type: String,
    pub source: ImageSource,
}

impl StagedImage {
    pub fn from_file<S: Into<String>>(file_name: S, payload: Bytes) -> Self {
        Self::new(file_name.into(), payload, ImageSource::File)
    }

    pub fn from_camera<S: Into<String>>(file_name: S, payload: Bytes) -> Self {
        Self::new(file_name.into(), payload, ImageSource::Camera)
    }

    fn new(file_name: String, payload: Bytes, source: ImageSource) -> Self {
        let mime_type = sniff_mime_type(&payload).to_string();
        Self {
            display_handle: format!("staged://{}/{}", Uuid::new_v4().simple(), file_name),
            payload,
            file_name,
            mime_type,
            source,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Multipart payload for the detection request
    pub fn to_payload(&self) -> ImagePayload {
        ImagePayload {
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            bytes: self.payload.clone(),
        }
    }
}

fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        _ => "application/octet-stream",
    }
}
