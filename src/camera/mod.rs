mod builder;
#[cfg(all(target_os = "linux", feature = "camera"))]
mod gst;
mod interface;
mod mock;
mod session;

pub use builder::CameraDeviceBuilder;
#[cfg(all(target_os = "linux", feature = "camera"))]
pub use gst::GstCameraDevice;
pub use interface::{CameraDevice, DeviceHandle};
pub use mock::MockCameraDevice;
pub use session::CaptureSession;
