//! Scoped persistence handles

use crate::dataset::{Data, Dataset};
use crate::storage::StorageLevel;
use std::ops::Deref;
use tracing::debug;

/// A persisted dataset that is unpersisted when its last handle is dropped.
///
/// Persisting the same dataset again at the same level returns another
/// handle; the blocks stay stored until every handle is gone.
#[must_use = "dropping the last Persisted handle releases the dataset's blocks immediately"]
pub struct Persisted<T: Data> {
    dataset: Dataset<T>,
    level: StorageLevel,
}

impl<T: Data> Persisted<T> {
    pub(crate) fn new(dataset: Dataset<T>, level: StorageLevel) -> Self {
        Self { dataset, level }
    }

    pub fn dataset(&self) -> &Dataset<T> {
        &self.dataset
    }

    pub fn level(&self) -> StorageLevel {
        self.level
    }

    /// Release now rather than at end of scope
    pub fn release(self) {}
}

impl<T: Data> Deref for Persisted<T> {
    type Target = Dataset<T>;

    fn deref(&self) -> &Dataset<T> {
        &self.dataset
    }
}

impl<T: Data> Drop for Persisted<T> {
    fn drop(&mut self) {
        if self.dataset.context().release_block(self.dataset.id()) {
            debug!("Released dataset {} ({})", self.dataset.id(), self.dataset.name());
        }
    }
}

impl<T: Data> std::fmt::Debug for Persisted<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persisted")
            .field("dataset", &self.dataset)
            .field("level", &self.level)
            .finish()
    }
}
