mod coordinator;
mod normalize;

pub use coordinator::UploadCoordinator;
pub use normalize::normalize_response;
