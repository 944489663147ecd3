use super::model::{RecordId, ResultRecord};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Store shared between the session, the scheduler and the rendering layer
pub type SharedResultStore = Arc<RwLock<ResultStore>>;

/// Result records, newest first.
///
/// Indices shift on every prepend and removal; use `RecordId` to refer to a
/// record across awaits.
#[derive(Debug, Default)]
pub struct ResultStore {
    records: VecDeque<ResultRecord>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedResultStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Insert a record at index 0
    pub fn prepend(&mut self, record: ResultRecord) {
        debug!("Storing result record {} at index 0", record.id);
        self.records.push_front(record);
    }

    /// Remove the record at `index`; out-of-range indices are ignored
    pub fn remove_at(&mut self, index: usize) -> Option<ResultRecord> {
        let removed = self.records.remove(index);
        if let Some(record) = &removed {
            debug!("Removed result record {} from index {}", record.id, index);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ResultRecord> {
        self.records.get(index)
    }

    pub fn get_by_id(&self, id: RecordId) -> Option<&ResultRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Current index of a record
    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter()
    }

    /// Owned copy of all records in display order
    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.iter().cloned().collect()
    }

    /// Mutate a record in place. Returns `None` when the record is gone.
    pub fn update_record<F, T>(&mut self, id: RecordId, f: F) -> Option<T>
    where
        F: FnOnce(&mut ResultRecord) -> T,
    {
        self.records.iter_mut().find(|record| record.id == id).map(f)
    }
}
