//! Storage levels
//!
//! A storage level tells the block store where the partitions of a persisted
//! dataset live: deserialized in memory, serialized in memory, on disk, or a
//! combination with disk as the fallback when memory is exhausted.

use crate::error::{DatasetError, DatasetResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where and how the blocks of a persisted dataset are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLevel {
    pub use_disk: bool,
    pub use_memory: bool,
    pub use_off_heap: bool,
    pub deserialized: bool,
    pub replication: u8,
}

impl StorageLevel {
    pub const NONE: Self = Self::new(false, false, false, false, 1);
    pub const DISK_ONLY: Self = Self::new(true, false, false, false, 1);
    pub const DISK_ONLY_2: Self = Self::new(true, false, false, false, 2);
    pub const DISK_ONLY_3: Self = Self::new(true, false, false, false, 3);
    pub const MEMORY_ONLY: Self = Self::new(false, true, false, true, 1);
    pub const MEMORY_ONLY_2: Self = Self::new(false, true, false, true, 2);
    pub const MEMORY_ONLY_SER: Self = Self::new(false, true, false, false, 1);
    pub const MEMORY_ONLY_SER_2: Self = Self::new(false, true, false, false, 2);
    pub const MEMORY_AND_DISK: Self = Self::new(true, true, false, true, 1);
    pub const MEMORY_AND_DISK_2: Self = Self::new(true, true, false, true, 2);
    pub const MEMORY_AND_DISK_SER: Self = Self::new(true, true, false, false, 1);
    pub const MEMORY_AND_DISK_SER_2: Self = Self::new(true, true, false, false, 2);
    pub const MEMORY_AND_DISK_DESER: Self = Self::new(true, true, false, true, 1);
    pub const OFF_HEAP: Self = Self::new(true, true, true, false, 1);

    pub const fn new(
        use_disk: bool,
        use_memory: bool,
        use_off_heap: bool,
        deserialized: bool,
        replication: u8,
    ) -> Self {
        Self {
            use_disk,
            use_memory,
            use_off_heap,
            deserialized,
            replication,
        }
    }

    /// Resolve a level by its name (case-insensitive), e.g. `MEMORY_AND_DISK`
    pub fn from_name(name: &str) -> DatasetResult<Self> {
        let wanted = name.trim().to_ascii_uppercase();
        NAMED_LEVELS
            .iter()
            .find(|(n, _)| *n == wanted)
            .map(|(_, level)| *level)
            .ok_or_else(|| DatasetError::UnknownStorageLevel(name.to_string()))
    }

    /// All recognised level names
    pub fn names() -> impl Iterator<Item = &'static str> {
        NAMED_LEVELS.iter().map(|(n, _)| *n)
    }

    /// Canonical name of this level, if it is one of the named levels.
    ///
    /// `MEMORY_AND_DISK_DESER` shares its flags with `MEMORY_AND_DISK` and
    /// therefore reports the latter.
    pub fn name(&self) -> Option<&'static str> {
        NAMED_LEVELS
            .iter()
            .find(|(_, level)| level == self)
            .map(|(n, _)| *n)
    }

    /// A level is valid when it stores blocks somewhere
    pub fn is_valid(&self) -> bool {
        (self.use_memory || self.use_disk) && self.replication >= 1
    }

    /// Smallest level that keeps everything either level keeps
    pub fn union(self, other: Self) -> Self {
        let use_off_heap = self.use_off_heap || other.use_off_heap;
        let deserialized = !use_off_heap
            && ((self.use_memory && self.deserialized) || (other.use_memory && other.deserialized));
        Self {
            use_disk: self.use_disk || other.use_disk,
            use_memory: self.use_memory || other.use_memory,
            use_off_heap,
            deserialized,
            replication: self.replication.max(other.replication),
        }
    }
}

impl Default for StorageLevel {
    fn default() -> Self {
        StorageLevel::NONE
    }
}

impl fmt::Display for StorageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(
                f,
                "StorageLevel(disk={}, memory={}, offheap={}, deserialized={}, replication={})",
                self.use_disk, self.use_memory, self.use_off_heap, self.deserialized, self.replication
            ),
        }
    }
}

const NAMED_LEVELS: &[(&str, StorageLevel)] = &[
    ("NONE", StorageLevel::NONE),
    ("DISK_ONLY", StorageLevel::DISK_ONLY),
    ("DISK_ONLY_2", StorageLevel::DISK_ONLY_2),
    ("DISK_ONLY_3", StorageLevel::DISK_ONLY_3),
    ("MEMORY_ONLY", StorageLevel::MEMORY_ONLY),
    ("MEMORY_ONLY_2", StorageLevel::MEMORY_ONLY_2),
    ("MEMORY_ONLY_SER", StorageLevel::MEMORY_ONLY_SER),
    ("MEMORY_ONLY_SER_2", StorageLevel::MEMORY_ONLY_SER_2),
    ("MEMORY_AND_DISK", StorageLevel::MEMORY_AND_DISK),
    ("MEMORY_AND_DISK_2", StorageLevel::MEMORY_AND_DISK_2),
    ("MEMORY_AND_DISK_SER", StorageLevel::MEMORY_AND_DISK_SER),
    ("MEMORY_AND_DISK_SER_2", StorageLevel::MEMORY_AND_DISK_SER_2),
    ("MEMORY_AND_DISK_DESER", StorageLevel::MEMORY_AND_DISK_DESER),
    ("OFF_HEAP", StorageLevel::OFF_HEAP),
];
