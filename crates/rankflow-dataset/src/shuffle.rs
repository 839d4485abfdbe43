//! Hash partitioning and the all-to-all exchange behind wide transformations

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use rustc_hash::FxHasher;
use std::hash::{BuildHasherDefault, Hash, Hasher};

/// Insertion-ordered map with the Fx hasher
pub(crate) type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;
/// Insertion-ordered set with the Fx hasher
pub(crate) type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

/// Assigns keys to one of a fixed number of partitions by hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashPartitioner {
    partitions: usize,
}

impl HashPartitioner {
    /// A partition count of zero is treated as one
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: partitions.max(1),
        }
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub fn partition_for<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() % self.partitions as u64) as usize
    }
}

/// Route every item of every input partition to the output partition its key hashes to.
///
/// Items keep their relative order within an output partition: input
/// partitions are drained in order.
pub(crate) fn exchange<T, H, F>(parts: Vec<Vec<T>>, partitioner: &HashPartitioner, key: F) -> Vec<Vec<T>>
where
    T: Send,
    H: Hash + ?Sized,
    F: Fn(&T) -> &H + Sync,
{
    let scattered: Vec<Vec<Vec<T>>> = parts
        .into_par_iter()
        .map(|part| scatter(part, partitioner, &key))
        .collect();
    gather(scattered, partitioner.partitions())
}

/// Like [`exchange`], but reads borrowed partitions (e.g. a stored block)
/// and clones each item as it is routed.
pub(crate) fn exchange_cloned<T, H, F>(parts: &[Vec<T>], partitioner: &HashPartitioner, key: F) -> Vec<Vec<T>>
where
    T: Clone + Send + Sync,
    H: Hash + ?Sized,
    F: Fn(&T) -> &H + Sync,
{
    let scattered: Vec<Vec<Vec<T>>> = parts
        .par_iter()
        .map(|part| scatter(part.iter().cloned(), partitioner, &key))
        .collect();
    gather(scattered, partitioner.partitions())
}

fn scatter<T, H, F>(items: impl IntoIterator<Item = T>, partitioner: &HashPartitioner, key: &F) -> Vec<Vec<T>>
where
    H: Hash + ?Sized,
    F: Fn(&T) -> &H,
{
    let mut buckets: Vec<Vec<T>> = (0..partitioner.partitions()).map(|_| Vec::new()).collect();
    for item in items {
        let target = partitioner.partition_for(key(&item));
        buckets[target].push(item);
    }
    buckets
}

fn gather<T>(scattered: Vec<Vec<Vec<T>>>, partitions: usize) -> Vec<Vec<T>> {
    let mut out: Vec<Vec<T>> = (0..partitions).map(|_| Vec::new()).collect();
    for buckets in scattered {
        for (target, bucket) in buckets.into_iter().enumerate() {
            out[target].extend(bucket);
        }
    }
    out
}
