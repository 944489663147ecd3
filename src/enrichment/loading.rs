use crate::results::RecordId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identity of one detection inside one record.
///
/// The detection part is positional and only valid until the record's
/// detections change; records themselves are addressed by stable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnrichmentKey {
    pub record: RecordId,
    pub detection: usize,
}

impl EnrichmentKey {
    pub fn new(record: RecordId, detection: usize) -> Self {
        Self { record, detection }
    }
}

impl fmt::Display for EnrichmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.record, self.detection)
    }
}

/// Per-detection loading flags.
///
/// Each key counts its in-flight requests; a key is loading while the count
/// is above zero and absent otherwise.
#[derive(Debug, Default)]
pub struct LoadingState {
    in_flight: Mutex<HashMap<EnrichmentKey, u32>>,
}

impl LoadingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `keys` loading until the returned guard is dropped
    pub fn begin(self: &Arc<Self>, keys: Vec<EnrichmentKey>) -> LoadingGuard {
        {
            let mut in_flight = self.in_flight.lock();
            for key in &keys {
                *in_flight.entry(*key).or_insert(0) += 1;
            }
        }
        LoadingGuard {
            state: Arc::clone(self),
            keys,
        }
    }

    pub fn is_loading(&self, key: &EnrichmentKey) -> bool {
        self.in_flight.lock().contains_key(key)
    }

    /// Whether any detection of `record` is loading
    pub fn is_record_loading(&self, record: RecordId) -> bool {
        self.in_flight.lock().keys().any(|key| key.record == record)
    }

    /// Keys currently loading
    pub fn snapshot(&self) -> Vec<EnrichmentKey> {
        self.in_flight.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.lock().is_empty()
    }

    fn finish(&self, keys: &[EnrichmentKey]) {
        let mut in_flight = self.in_flight.lock();
        for key in keys {
            if let Some(count) = in_flight.get_mut(key) {
                *count -= 1;
                if *count == 0 {
                    in_flight.remove(key);
                }
            }
        }
    }
}

/// Clears its keys when dropped, so no exit path leaves a key loading
#[derive(Debug)]
pub struct LoadingGuard {
    state: Arc<LoadingState>,
    keys: Vec<EnrichmentKey>,
}

impl LoadingGuard {
    pub fn keys(&self) -> &[EnrichmentKey] {
        &self.keys
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.state.finish(&self.keys);
    }
}
