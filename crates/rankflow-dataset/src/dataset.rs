//! Lazily evaluated, partitioned datasets
//!
//! Every transformation returns a new [`Dataset`] that only records how to
//! compute its partitions from its parent. Evaluation walks the lineage back
//! to the sources when an action runs, stopping early at any ancestor whose
//! partitions are held by the block store.

use crate::context::Context;
use crate::error::{DatasetError, DatasetResult, TaskError};
use crate::persist::Persisted;
use crate::shuffle::{self, FxIndexMap, FxIndexSet, HashPartitioner};
use crate::storage::StorageLevel;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Element type that can flow through a dataset
pub trait Data: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Data for T where T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// Dataset identifier, unique within a context
pub type DatasetId = u64;

/// Materialized partitions of a dataset
pub type Partitions<T> = Arc<Vec<Vec<T>>>;

type ComputeFn<T> = dyn Fn() -> DatasetResult<Vec<Vec<T>>> + Send + Sync;

enum Lineage<T> {
    Compute(Box<ComputeFn<T>>),
    /// Partitions fixed by `checkpoint`; no parent is evaluated
    Materialized(Partitions<T>),
}

struct DatasetInner<T> {
    id: DatasetId,
    name: String,
    num_partitions: usize,
    lineage: Lineage<T>,
    evaluations: AtomicU64,
}

/// A partitioned collection described by its lineage
pub struct Dataset<T: Data> {
    ctx: Context,
    inner: Arc<DatasetInner<T>>,
}

impl<T: Data> Clone for Dataset<T> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Data> fmt::Debug for Dataset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("num_partitions", &self.inner.num_partitions)
            .finish()
    }
}

impl<T: Data> Dataset<T> {
    pub(crate) fn from_compute<F>(
        ctx: &Context,
        name: impl Into<String>,
        num_partitions: usize,
        compute: F,
    ) -> Self
    where
        F: Fn() -> DatasetResult<Vec<Vec<T>>> + Send + Sync + 'static,
    {
        Self {
            ctx: ctx.clone(),
            inner: Arc::new(DatasetInner {
                id: ctx.next_dataset_id(),
                name: name.into(),
                num_partitions,
                lineage: Lineage::Compute(Box::new(compute)),
                evaluations: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> DatasetId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn num_partitions(&self) -> usize {
        self.inner.num_partitions
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// How many times this dataset's own lineage step has been evaluated
    pub fn compute_count(&self) -> u64 {
        self.inner.evaluations.load(Ordering::Relaxed)
    }

    /// Partitions of this dataset, from the block store when available
    pub(crate) fn partitions(&self) -> DatasetResult<Partitions<T>> {
        let compute = match &self.inner.lineage {
            Lineage::Materialized(parts) => return Ok(Arc::clone(parts)),
            Lineage::Compute(compute) => compute,
        };
        let id = self.id();
        let persisted = self.ctx.storage_level_of(id).is_some();

        if persisted {
            if let Some(stored) = self.ctx.get_block::<T>(id)? {
                debug!("Block hit for dataset {} ({})", id, self.name());
                return Ok(stored);
            }
        }

        let parts = Arc::new(compute()?);
        self.inner.evaluations.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Computed dataset {} ({}) into {} partitions",
            id,
            self.name(),
            parts.len()
        );

        if persisted {
            self.ctx.put_block(id, &parts)?;
        }
        Ok(parts)
    }

    // ---- Narrow transformations ----

    pub fn map<U, F>(&self, f: F) -> Dataset<U>
    where
        U: Data,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let parent = self.clone();
        Dataset::from_compute(&self.ctx, "map", self.num_partitions(), move || {
            let parts = parent.partitions()?;
            Ok(parts
                .par_iter()
                .map(|p| p.iter().cloned().map(&f).collect())
                .collect())
        })
    }

    /// Like [`map`](Self::map) but the closure may fail; the first failure aborts the evaluation
    pub fn try_map<U, E, F>(&self, f: F) -> Dataset<U>
    where
        U: Data,
        E: Into<TaskError>,
        F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    {
        let parent = self.clone();
        Dataset::from_compute(&self.ctx, "try_map", self.num_partitions(), move || {
            let parts = parent.partitions()?;
            parts
                .par_iter()
                .map(|p| {
                    p.iter()
                        .cloned()
                        .map(|item| f(item).map_err(|e| DatasetError::task("try_map", e)))
                        .collect::<DatasetResult<Vec<U>>>()
                })
                .collect()
        })
    }

    pub fn flat_map<U, I, F>(&self, f: F) -> Dataset<U>
    where
        U: Data,
        I: IntoIterator<Item = U>,
        F: Fn(T) -> I + Send + Sync + 'static,
    {
        let parent = self.clone();
        Dataset::from_compute(&self.ctx, "flat_map", self.num_partitions(), move || {
            let parts = parent.partitions()?;
            Ok(parts
                .par_iter()
                .map(|p| p.iter().cloned().flat_map(&f).collect())
                .collect())
        })
    }

    pub fn try_flat_map<U, I, E, F>(&self, f: F) -> Dataset<U>
    where
        U: Data,
        I: IntoIterator<Item = U>,
        E: Into<TaskError>,
        F: Fn(T) -> Result<I, E> + Send + Sync + 'static,
    {
        let parent = self.clone();
        Dataset::from_compute(&self.ctx, "try_flat_map", self.num_partitions(), move || {
            let parts = parent.partitions()?;
            parts
                .par_iter()
                .map(|p| -> DatasetResult<Vec<U>> {
                    let mut out = Vec::new();
                    for item in p.iter().cloned() {
                        let produced = f(item).map_err(|e| DatasetError::task("try_flat_map", e))?;
                        out.extend(produced);
                    }
                    Ok(out)
                })
                .collect()
        })
    }

    pub fn filter<F>(&self, predicate: F) -> Dataset<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let parent = self.clone();
        Dataset::from_compute(&self.ctx, "filter", self.num_partitions(), move || {
            let parts = parent.partitions()?;
            Ok(parts
                .par_iter()
                .map(|p| p.iter().filter(|item| predicate(item)).cloned().collect())
                .collect())
        })
    }

    // ---- Actions ----

    /// Evaluate the lineage and gather every element, in partition order
    pub fn collect(&self) -> DatasetResult<Vec<T>> {
        let parts = self.ctx.run(|| self.partitions())?;
        Ok(parts.iter().flat_map(|p| p.iter().cloned()).collect())
    }

    pub fn count(&self) -> DatasetResult<usize> {
        let parts = self.ctx.run(|| self.partitions())?;
        Ok(parts.iter().map(Vec::len).sum())
    }

    /// Evaluate now and return a dataset holding the computed partitions,
    /// with no lineage behind it.
    ///
    /// Evaluation recurses once per transformation, so iterative jobs call
    /// this periodically to keep the depth bounded. The returned dataset keeps
    /// its partitions in memory for as long as it is alive and is never
    /// recomputed; persisting it stores nothing further.
    pub fn checkpoint(&self) -> DatasetResult<Dataset<T>> {
        let parts = self.ctx.run(|| self.partitions())?;
        let checkpointed = Dataset {
            ctx: self.ctx.clone(),
            inner: Arc::new(DatasetInner {
                id: self.ctx.next_dataset_id(),
                name: "checkpoint".to_string(),
                num_partitions: parts.len(),
                lineage: Lineage::Materialized(parts),
                evaluations: AtomicU64::new(0),
            }),
        };
        debug!(
            "Checkpointed dataset {} ({}) as {}",
            self.id(),
            self.name(),
            checkpointed.id()
        );
        Ok(checkpointed)
    }

    // ---- Persistence ----

    /// Keep this dataset's partitions at `level` once computed.
    ///
    /// The dataset is unpersisted once every returned handle has been dropped.
    /// Persisting again at the same level adds a handle; a different level is an error.
    pub fn persist(&self, level: StorageLevel) -> DatasetResult<Persisted<T>> {
        self.ctx.register_level(self.id(), level)?;
        debug!("Persisting dataset {} ({}) at {}", self.id(), self.name(), level);
        Ok(Persisted::new(self.clone(), level))
    }

    /// Persist at `MEMORY_ONLY`
    pub fn cache(&self) -> DatasetResult<Persisted<T>> {
        self.persist(StorageLevel::MEMORY_ONLY)
    }

    /// Drop any stored blocks and forget the storage level, even while handles are alive
    pub fn unpersist(&self) {
        if self.ctx.remove_block(self.id()) {
            debug!("Unpersisted dataset {} ({})", self.id(), self.name());
        }
    }

    /// Registered storage level, `NONE` if not persisted
    pub fn storage_level(&self) -> StorageLevel {
        self.ctx.storage_level_of(self.id()).unwrap_or(StorageLevel::NONE)
    }

    /// Whether the partitions are currently held by the block store
    pub fn is_stored(&self) -> bool {
        self.ctx.has_block(self.id())
    }
}

impl<T: Data + Eq + Hash> Dataset<T> {
    /// Remove duplicate elements
    pub fn distinct(&self) -> Dataset<T> {
        let parent = self.clone();
        let partitioner = HashPartitioner::new(self.ctx.shuffle_partitions());
        Dataset::from_compute(&self.ctx, "distinct", partitioner.partitions(), move || {
            let parts = parent.partitions()?;
            let local: Vec<Vec<T>> = parts
                .par_iter()
                .map(|p| dedup(p.iter().cloned()))
                .collect();
            let shuffled = shuffle::exchange(local, &partitioner, |item| item);
            Ok(shuffled.into_par_iter().map(|p| dedup(p.into_iter())).collect())
        })
    }
}

fn dedup<T: Eq + Hash>(items: impl Iterator<Item = T>) -> Vec<T> {
    items.collect::<FxIndexSet<T>>().into_iter().collect()
}

impl<K, V> Dataset<(K, V)>
where
    K: Data + Eq + Hash,
    V: Data,
{
    pub fn keys(&self) -> Dataset<K> {
        self.map(|(k, _)| k)
    }

    pub fn values(&self) -> Dataset<V> {
        self.map(|(_, v)| v)
    }

    pub fn map_values<U, F>(&self, f: F) -> Dataset<(K, U)>
    where
        U: Data,
        F: Fn(V) -> U + Send + Sync + 'static,
    {
        let parent = self.clone();
        Dataset::from_compute(&self.ctx, "map_values", self.num_partitions(), move || {
            let parts = parent.partitions()?;
            Ok(parts
                .par_iter()
                .map(|p| p.iter().cloned().map(|(k, v)| (k, f(v))).collect())
                .collect())
        })
    }

    pub fn flat_map_values<U, I, F>(&self, f: F) -> Dataset<(K, U)>
    where
        U: Data,
        I: IntoIterator<Item = U>,
        F: Fn(V) -> I + Send + Sync + 'static,
    {
        let parent = self.clone();
        Dataset::from_compute(&self.ctx, "flat_map_values", self.num_partitions(), move || {
            let parts = parent.partitions()?;
            Ok(parts
                .par_iter()
                .map(|p| {
                    p.iter()
                        .cloned()
                        .flat_map(|(k, v)| f(v).into_iter().map(move |u| (k.clone(), u)))
                        .collect()
                })
                .collect())
        })
    }

    /// Gather all values of each key into one list
    pub fn group_by_key(&self) -> Dataset<(K, Vec<V>)> {
        let parent = self.clone();
        let partitioner = HashPartitioner::new(self.ctx.shuffle_partitions());
        Dataset::from_compute(&self.ctx, "group_by_key", partitioner.partitions(), move || {
            let parts = parent.partitions()?;
            let shuffled = shuffle::exchange_cloned(parts.as_slice(), &partitioner, |(k, _)| k);
            Ok(shuffled
                .into_par_iter()
                .map(|p| {
                    let mut groups: FxIndexMap<K, Vec<V>> = FxIndexMap::default();
                    for (k, v) in p {
                        groups.entry(k).or_default().push(v);
                    }
                    groups.into_iter().collect()
                })
                .collect())
        })
    }

    /// Merge the values of each key with an associative function, combining map-side first
    pub fn reduce_by_key<F>(&self, f: F) -> Dataset<(K, V)>
    where
        F: Fn(V, V) -> V + Send + Sync + 'static,
    {
        let parent = self.clone();
        let partitioner = HashPartitioner::new(self.ctx.shuffle_partitions());
        Dataset::from_compute(&self.ctx, "reduce_by_key", partitioner.partitions(), move || {
            let parts = parent.partitions()?;
            let combined: Vec<Vec<(K, V)>> = parts
                .par_iter()
                .map(|p| combine(p.iter().cloned(), &f))
                .collect();
            let shuffled = shuffle::exchange(combined, &partitioner, |(k, _)| k);
            Ok(shuffled
                .into_par_iter()
                .map(|p| combine(p.into_iter(), &f))
                .collect())
        })
    }

    /// Inner join on key
    pub fn join<W: Data>(&self, other: &Dataset<(K, W)>) -> Dataset<(K, (V, W))> {
        let left = self.clone();
        let right = other.clone();
        let partitioner = HashPartitioner::new(self.ctx.shuffle_partitions());
        Dataset::from_compute(&self.ctx, "join", partitioner.partitions(), move || {
            let left_parts = left.partitions()?;
            let right_parts = right.partitions()?;
            let left_shuffled =
                shuffle::exchange_cloned(left_parts.as_slice(), &partitioner, |(k, _)| k);
            let right_shuffled =
                shuffle::exchange_cloned(right_parts.as_slice(), &partitioner, |(k, _)| k);

            Ok(left_shuffled
                .into_par_iter()
                .zip(right_shuffled.into_par_iter())
                .map(|(lp, rp)| {
                    let mut lookup: FxIndexMap<K, Vec<W>> = FxIndexMap::default();
                    for (k, w) in rp {
                        lookup.entry(k).or_default().push(w);
                    }
                    let mut out = Vec::new();
                    for (k, v) in lp {
                        if let Some(matches) = lookup.get(&k) {
                            for w in matches {
                                out.push((k.clone(), (v.clone(), w.clone())));
                            }
                        }
                    }
                    out
                })
                .collect())
        })
    }
}

fn combine<K, V, F>(pairs: impl Iterator<Item = (K, V)>, f: &F) -> Vec<(K, V)>
where
    K: Eq + Hash,
    V: Clone,
    F: Fn(V, V) -> V,
{
    let mut acc: FxIndexMap<K, V> = FxIndexMap::default();
    for (k, v) in pairs {
        match acc.get_mut(&k) {
            Some(slot) => *slot = f(slot.clone(), v),
            None => {
                acc.insert(k, v);
            }
        }
    }
    acc.into_iter().collect()
}
