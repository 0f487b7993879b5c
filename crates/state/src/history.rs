use std::sync::{PoisonError, RwLock};

/// Append-only record of events seen during this run.
///
/// Entries are never evicted, so memory grows with uptime.
#[derive(Debug)]
pub struct History<T> {
    items: RwLock<Vec<T>>,
}

impl<T: Clone> History<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn add(&self, item: T) {
        self.items.write().unwrap_or_else(PoisonError::into_inner).push(item);
    }

    pub fn add_batch(&self, batch: Vec<T>) {
        self.items.write().unwrap_or_else(PoisonError::into_inner).extend(batch);
    }

    pub fn get_last(&self) -> Option<T> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        items.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for History<T> {
    fn default() -> Self {
        Self::new()
    }
}
