mod controller;
mod staged;
mod state;

pub use controller::{MediaCaptureController, SubmissionTicket};
pub use staged::StagedImage;
pub use state::CaptureState;
