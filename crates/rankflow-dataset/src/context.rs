//! Execution context
//!
//! Owns the worker pool that partitions are computed on, the block store for
//! persisted datasets, and the configuration every dataset built from it
//! inherits (default parallelism for sources, partition count for shuffles).

use crate::block::{BlockStore, StorageStatus};
use crate::dataset::{Data, Dataset, DatasetId, Partitions};
use crate::error::DatasetResult;
use crate::source;
use crate::storage::StorageLevel;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Lineage evaluation recurses once per transformation, so workers get a deep stack
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Context configuration
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Application name, used for worker thread names and the spill directory
    pub app_name: String,
    /// Worker threads, and the partition count of sources
    pub default_parallelism: usize,
    /// Partition count of every shuffle output
    pub shuffle_partitions: usize,
    /// Byte budget for the memory storage tiers (None = unbounded)
    pub storage_memory_bytes: Option<u64>,
    /// Parent of the spill directory (None = the OS temp dir). The context
    /// creates its own subdirectory here and removes only that.
    pub local_dir: Option<PathBuf>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            app_name: "rankflow".to_string(),
            default_parallelism: rayon::current_num_threads(),
            shuffle_partitions: 8,
            storage_memory_bytes: None,
            local_dir: None,
        }
    }
}

struct Shared {
    pool: rayon::ThreadPool,
    blocks: Mutex<BlockStore>,
    next_id: AtomicU64,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let store = self.blocks.get_mut().unwrap_or_else(|e| e.into_inner());
        store.clear();
        remove_spill_dir(store.local_dir());
    }
}

/// Handle to an execution context; cheap to clone
#[derive(Clone)]
pub struct Context {
    config: Arc<ContextConfig>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("config", &self.config).finish()
    }
}

impl Context {
    /// Create a new context with its own worker pool
    pub fn new(config: ContextConfig) -> DatasetResult<Self> {
        let mut config = config;
        config.default_parallelism = config.default_parallelism.max(1);
        config.shuffle_partitions = config.shuffle_partitions.max(1);

        let app_name = config.app_name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.default_parallelism)
            .stack_size(WORKER_STACK_SIZE)
            .thread_name(move |i| format!("{}-worker-{}", app_name, i))
            .build()?;

        // Always a fresh directory of our own; only it is removed on stop
        let prefix: String = config
            .app_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let spill_dir = config
            .local_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
        let blocks = BlockStore::new(spill_dir, config.storage_memory_bytes);

        info!(
            "Context '{}' started: parallelism={}, shuffle_partitions={}",
            config.app_name, config.default_parallelism, config.shuffle_partitions
        );

        Ok(Self {
            config: Arc::new(config),
            shared: Arc::new(Shared {
                pool,
                blocks: Mutex::new(blocks),
                next_id: AtomicU64::new(0),
            }),
        })
    }

    /// Context with default configuration
    pub fn local() -> DatasetResult<Self> {
        Self::new(ContextConfig::default())
    }

    /// A context sharing this one's workers and block store but with a different
    /// shuffle partition count. Datasets built from it inherit the new count.
    pub fn with_shuffle_partitions(&self, partitions: usize) -> Self {
        let mut config = (*self.config).clone();
        config.shuffle_partitions = partitions.max(1);
        debug!("Derived context with shuffle_partitions={}", config.shuffle_partitions);
        Self {
            config: Arc::new(config),
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn app_name(&self) -> &str {
        &self.config.app_name
    }

    pub fn default_parallelism(&self) -> usize {
        self.config.default_parallelism
    }

    pub fn shuffle_partitions(&self) -> usize {
        self.config.shuffle_partitions
    }

    /// Distribute an in-memory collection over `slices` partitions
    pub fn parallelize<T: Data>(&self, data: Vec<T>, slices: usize) -> Dataset<T> {
        let slices = slices.max(1);
        let data = Arc::new(data);
        Dataset::from_compute(self, "parallelize", slices, move || {
            Ok(source::split_evenly(data.as_slice(), slices))
        })
    }

    /// Lines of a text file, or of every visible file in a directory
    pub fn text_file(&self, path: impl AsRef<Path>) -> Dataset<String> {
        let path = path.as_ref().to_path_buf();
        let slices = self.default_parallelism();
        let name = format!("text_file({})", path.display());
        Dataset::from_compute(self, name, slices, move || {
            let lines = source::read_lines(&path)?;
            Ok(source::split_evenly(&lines, slices))
        })
    }

    /// Directory disk blocks are written to
    pub fn spill_dir(&self) -> PathBuf {
        self.blocks().local_dir().to_path_buf()
    }

    pub fn storage_status(&self) -> StorageStatus {
        self.blocks().status()
    }

    /// Release every stored block and remove the spill directory
    pub fn stop(&self) {
        let mut store = self.blocks();
        let status = store.status();
        store.clear();
        remove_spill_dir(store.local_dir());
        info!(
            "Context '{}' stopped ({} persisted datasets released)",
            self.config.app_name, status.persisted_datasets
        );
    }

    pub(crate) fn run<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.shared.pool.install(f)
    }

    pub(crate) fn next_dataset_id(&self) -> DatasetId {
        self.shared.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn storage_level_of(&self, id: DatasetId) -> Option<StorageLevel> {
        self.blocks().level(id)
    }

    pub(crate) fn register_level(&self, id: DatasetId, level: StorageLevel) -> DatasetResult<()> {
        self.blocks().register(id, level)
    }

    pub(crate) fn get_block<T: Data>(&self, id: DatasetId) -> DatasetResult<Option<Partitions<T>>> {
        let block = self.blocks().get(id);
        match block {
            Some(block) => block.decode::<T>(),
            None => Ok(None),
        }
    }

    pub(crate) fn put_block<T: Data>(&self, id: DatasetId, parts: &Partitions<T>) -> DatasetResult<()> {
        self.blocks().put(id, parts)?;
        Ok(())
    }

    pub(crate) fn release_block(&self, id: DatasetId) -> bool {
        self.blocks().release(id)
    }

    pub(crate) fn remove_block(&self, id: DatasetId) -> bool {
        self.blocks().remove(id)
    }

    pub(crate) fn has_block(&self, id: DatasetId) -> bool {
        self.blocks().contains(id)
    }

    fn blocks(&self) -> MutexGuard<'_, BlockStore> {
        self.shared.blocks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn remove_spill_dir(dir: &Path) {
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(dir) {
            warn!("Failed to remove spill directory {:?}: {}", dir, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_is_clamped() {
        let ctx = Context::new(ContextConfig {
            default_parallelism: 0,
            shuffle_partitions: 0,
            ..ContextConfig::default()
        })
        .unwrap();
        assert_eq!(ctx.default_parallelism(), 1);
        assert_eq!(ctx.shuffle_partitions(), 1);
    }

    #[test]
    fn test_derived_context_shares_blocks() {
        let ctx = Context::local().unwrap();
        let derived = ctx.with_shuffle_partitions(3);
        assert_eq!(derived.shuffle_partitions(), 3);
        assert_eq!(ctx.shuffle_partitions(), 8);

        let ds = derived.parallelize(vec![1u64, 2, 3], 2);
        let _handle = ds.cache().unwrap();
        ds.collect().unwrap();
        assert_eq!(ctx.storage_status().persisted_datasets, 1);
        assert_eq!(ctx.storage_status().stored_blocks, 1);
    }

    #[test]
    fn test_stop_removes_spill_dir() {
        let dir = TempDir::new().unwrap();
        let keep = dir.path().join("keep.txt");
        fs::write(&keep, "not ours").unwrap();
        let ctx = Context::new(ContextConfig {
            local_dir: Some(dir.path().to_path_buf()),
            ..ContextConfig::default()
        })
        .unwrap();
        let spill = ctx.spill_dir();
        assert_eq!(spill.parent(), Some(dir.path()));

        let ds = ctx.parallelize((0u64..50).collect(), 4);
        let handle = ds.persist(StorageLevel::DISK_ONLY).unwrap();
        assert_eq!(ds.count().unwrap(), 50);
        assert!(spill.exists());
        assert!(ctx.storage_status().disk_bytes > 0);

        ctx.stop();
        assert!(!spill.exists());
        assert!(dir.path().exists());
        assert!(keep.exists());
        assert_eq!(ctx.storage_status(), StorageStatus::default());
        drop(handle);
    }

    #[test]
    fn test_drop_leaves_supplied_dir_contents() {
        let dir = TempDir::new().unwrap();
        let keep = dir.path().join("keep.txt");
        fs::write(&keep, "not ours").unwrap();
        {
            let ctx = Context::new(ContextConfig {
                local_dir: Some(dir.path().to_path_buf()),
                ..ContextConfig::default()
            })
            .unwrap();
            let ds = ctx.parallelize(vec![1u64, 2], 1);
            let _handle = ds.persist(StorageLevel::DISK_ONLY).unwrap();
            ds.collect().unwrap();
        }
        assert!(keep.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_dataset_ids_are_unique() {
        let ctx = Context::local().unwrap();
        let a = ctx.parallelize(vec![1u64], 1);
        let b = a.map(|x| x + 1);
        assert_ne!(a.id(), b.id());
    }
}
