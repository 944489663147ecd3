mod model;
mod store;

pub use model::{DetectionItem, RecordId, ResultRecord, Summary, UsesSource};
pub use store::{ResultStore, SharedResultStore};
