//! Partitioned, lazily evaluated datasets
//!
//! A [`Dataset`] is a description of how to compute a set of partitions from
//! its parents (its lineage). Nothing runs until an action such as
//! [`Dataset::collect`] is called on it. Datasets can be persisted at a
//! [`StorageLevel`] so that later reads reuse stored blocks instead of
//! re-evaluating the lineage.

pub mod block;
pub mod context;
pub mod dataset;
pub mod error;
pub mod persist;
pub mod shuffle;
pub mod source;
pub mod storage;

pub use block::StorageStatus;
pub use context::{Context, ContextConfig};
pub use dataset::{Data, Dataset, DatasetId, Partitions};
pub use error::{DatasetError, DatasetResult, TaskError};
pub use persist::Persisted;
pub use shuffle::HashPartitioner;
pub use storage::StorageLevel;
