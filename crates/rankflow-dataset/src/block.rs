//! Block store for persisted datasets
//!
//! Holds the storage level registered for each persisted dataset and the
//! materialized partitions (the block) once the dataset has been computed.
//! Memory tiers are bounded by an optional byte budget; disk blocks are
//! bincode files under the context's spill directory.

use crate::dataset::{Data, DatasetId, Partitions};
use crate::error::{DatasetError, DatasetResult};
use crate::storage::StorageLevel;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Snapshot of what the block store currently holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStatus {
    /// Datasets with a registered storage level
    pub persisted_datasets: usize,
    /// Datasets whose partitions are actually stored
    pub stored_blocks: usize,
    /// Bytes held by the memory tiers
    pub memory_bytes: u64,
    /// Bytes written to the spill directory
    pub disk_bytes: u64,
}

/// Tier a block ended up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tier {
    Memory,
    SerializedMemory,
    Disk,
}

enum Block {
    Memory {
        data: Arc<dyn Any + Send + Sync>,
        size: u64,
    },
    Serialized {
        bytes: Arc<Vec<u8>>,
    },
    Disk {
        path: PathBuf,
        size: u64,
    },
}

/// Owned copy of a block reference, so decoding happens outside the lock
pub(crate) enum BlockRef {
    Memory(Arc<dyn Any + Send + Sync>),
    Serialized(Arc<Vec<u8>>),
    Disk(PathBuf),
}

impl BlockRef {
    pub(crate) fn decode<T: Data>(self) -> DatasetResult<Option<Partitions<T>>> {
        match self {
            BlockRef::Memory(data) => Ok(data.downcast::<Vec<Vec<T>>>().ok()),
            BlockRef::Serialized(bytes) => {
                let parts: Vec<Vec<T>> = bincode::deserialize(&bytes)?;
                Ok(Some(Arc::new(parts)))
            }
            BlockRef::Disk(path) => {
                let file = File::open(&path).map_err(|e| DatasetError::io(&path, e))?;
                let parts: Vec<Vec<T>> = bincode::deserialize_from(BufReader::new(file))?;
                Ok(Some(Arc::new(parts)))
            }
        }
    }
}

/// Level of a persisted dataset and the number of live handles for it
#[derive(Debug, Clone, Copy)]
struct Registration {
    level: StorageLevel,
    handles: usize,
}

pub(crate) struct BlockStore {
    levels: FxHashMap<DatasetId, Registration>,
    blocks: FxHashMap<DatasetId, Block>,
    memory_used: u64,
    memory_limit: Option<u64>,
    disk_used: u64,
    local_dir: PathBuf,
}

impl BlockStore {
    pub(crate) fn new(local_dir: PathBuf, memory_limit: Option<u64>) -> Self {
        Self {
            levels: FxHashMap::default(),
            blocks: FxHashMap::default(),
            memory_used: 0,
            memory_limit,
            disk_used: 0,
            local_dir,
        }
    }

    pub(crate) fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub(crate) fn level(&self, id: DatasetId) -> Option<StorageLevel> {
        self.levels.get(&id).map(|r| r.level)
    }

    /// Register a storage level for a dataset and count one more handle.
    ///
    /// Re-registering the same level adds a handle; a different level is a conflict.
    pub(crate) fn register(&mut self, id: DatasetId, level: StorageLevel) -> DatasetResult<()> {
        match self.levels.get_mut(&id) {
            Some(current) if current.level == level => {
                current.handles += 1;
                Ok(())
            }
            Some(current) => Err(DatasetError::StorageLevelConflict {
                dataset: id,
                current: current.level,
                requested: level,
            }),
            None => {
                self.levels.insert(id, Registration { level, handles: 1 });
                Ok(())
            }
        }
    }

    /// Drop one handle; the dataset is removed once no handles remain.
    /// Returns whether the dataset was removed.
    pub(crate) fn release(&mut self, id: DatasetId) -> bool {
        let remaining = match self.levels.get_mut(&id) {
            Some(current) => {
                current.handles = current.handles.saturating_sub(1);
                current.handles
            }
            None => return false,
        };
        remaining == 0 && self.remove(id)
    }

    /// Forget a dataset's level and drop its block regardless of live handles.
    /// Returns whether anything was registered.
    pub(crate) fn remove(&mut self, id: DatasetId) -> bool {
        let registered = self.levels.remove(&id).is_some();
        self.drop_block(id);
        registered
    }

    pub(crate) fn get(&self, id: DatasetId) -> Option<BlockRef> {
        self.blocks.get(&id).map(|block| match block {
            Block::Memory { data, .. } => BlockRef::Memory(Arc::clone(data)),
            Block::Serialized { bytes } => BlockRef::Serialized(Arc::clone(bytes)),
            Block::Disk { path, .. } => BlockRef::Disk(path.clone()),
        })
    }

    pub(crate) fn contains(&self, id: DatasetId) -> bool {
        self.blocks.contains_key(&id)
    }

    /// Store computed partitions for a registered dataset.
    ///
    /// Returns the tier used, or `None` when the dataset is no longer
    /// registered or the block fits nowhere its level allows.
    pub(crate) fn put<T: Data>(
        &mut self,
        id: DatasetId,
        parts: &Partitions<T>,
    ) -> DatasetResult<Option<Tier>> {
        let level = match self.levels.get(&id) {
            Some(current) if current.level.is_valid() => current.level,
            _ => return Ok(None),
        };
        self.drop_block(id);

        let size = bincode::serialized_size(&**parts)?;

        if level.use_memory {
            if self.fits_in_memory(size) {
                let tier = if level.deserialized && !level.use_off_heap {
                    let data: Arc<dyn Any + Send + Sync> = parts.clone();
                    self.blocks.insert(id, Block::Memory { data, size });
                    Tier::Memory
                } else {
                    let bytes = bincode::serialize(&**parts)?;
                    self.blocks.insert(id, Block::Serialized { bytes: Arc::new(bytes) });
                    Tier::SerializedMemory
                };
                self.memory_used += size;
                debug!("Stored dataset {} in memory ({} bytes, {})", id, size, level);
                return Ok(Some(tier));
            }
            if !level.use_disk {
                warn!(
                    "Not enough storage memory for dataset {} ({} bytes); it will be recomputed",
                    id, size
                );
                return Ok(None);
            }
            warn!("Spilling dataset {} to disk ({} bytes)", id, size);
        }

        self.write_to_disk(id, parts, size)?;
        if level.replication > 1 {
            debug!(
                "Dataset {} requests replication {}; a single local copy is kept",
                id, level.replication
            );
        }
        Ok(Some(Tier::Disk))
    }

    pub(crate) fn status(&self) -> StorageStatus {
        StorageStatus {
            persisted_datasets: self.levels.len(),
            stored_blocks: self.blocks.len(),
            memory_bytes: self.memory_used,
            disk_bytes: self.disk_used,
        }
    }

    pub(crate) fn clear(&mut self) {
        let ids: Vec<DatasetId> = self.blocks.keys().copied().collect();
        for id in ids {
            self.drop_block(id);
        }
        self.levels.clear();
    }

    fn fits_in_memory(&self, size: u64) -> bool {
        match self.memory_limit {
            Some(limit) => self.memory_used.saturating_add(size) <= limit,
            None => true,
        }
    }

    fn write_to_disk<T: Data>(
        &mut self,
        id: DatasetId,
        parts: &Partitions<T>,
        size: u64,
    ) -> DatasetResult<()> {
        fs::create_dir_all(&self.local_dir).map_err(|e| DatasetError::io(&self.local_dir, e))?;
        let path = self.local_dir.join(format!("dataset-{}.bin", id));
        let file = File::create(&path).map_err(|e| DatasetError::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, &**parts)?;
        writer.flush().map_err(|e| DatasetError::io(&path, e))?;

        debug!("Stored dataset {} on disk at {:?} ({} bytes)", id, path, size);
        self.disk_used += size;
        self.blocks.insert(id, Block::Disk { path, size });
        Ok(())
    }

    fn drop_block(&mut self, id: DatasetId) {
        match self.blocks.remove(&id) {
            Some(Block::Memory { size, .. }) => self.memory_used -= size,
            Some(Block::Serialized { bytes }) => self.memory_used -= bytes.len() as u64,
            Some(Block::Disk { path, size }) => {
                self.disk_used -= size;
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Failed to remove spilled block {:?}: {}", path, e);
                }
            }
            None => {}
        }
    }
}
