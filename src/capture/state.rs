use std::fmt;

/// Capture dialog lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Closed,
    Idle,
    CameraStarting,
    CameraActive,
    Captured,
    FilePicked,
    Submitting,
}

impl CaptureState {
    /// States holding an image that can be submitted
    pub fn has_staged_image(&self) -> bool {
        matches!(self, CaptureState::Captured | CaptureState::FilePicked)
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, CaptureState::Closed)
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Closed => "Closed",
            CaptureState::Idle => "Idle",
            CaptureState::CameraStarting => "CameraStarting",
            CaptureState::CameraActive => "CameraActive",
            CaptureState::Captured => "Captured",
            CaptureState::FilePicked => "FilePicked",
            CaptureState::Submitting => "Submitting",
        };
        f.write_str(name)
    }
}
