mod loading;
mod scheduler;
#[cfg(test)]
mod tests;

pub use loading::{EnrichmentKey, LoadingGuard, LoadingState};
pub use scheduler::{EnrichmentOutcome, EnrichmentScheduler};
