//! Error types for dataset evaluation

use crate::dataset::DatasetId;
use crate::storage::StorageLevel;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error returned by a user-supplied closure inside a fallible transformation
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while building or evaluating datasets
#[derive(Error, Debug)]
pub enum DatasetError {
    /// A transformation closure failed while computing a partition
    #[error("Task failed in dataset '{dataset}': {source}")]
    Task {
        dataset: String,
        #[source]
        source: TaskError,
    },

    /// Reading a source or a spilled block failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Encoding or decoding a serialized block failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// A persisted dataset was asked to switch to another storage level
    #[error("Cannot change storage level of dataset {dataset} from {current} to {requested}")]
    StorageLevelConflict {
        dataset: DatasetId,
        current: StorageLevel,
        requested: StorageLevel,
    },

    /// Storage level name not recognised
    #[error("Unknown storage level: {0}")]
    UnknownStorageLevel(String),

    /// The context's worker pool could not be created
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl DatasetError {
    pub(crate) fn task(dataset: &str, source: impl Into<TaskError>) -> Self {
        DatasetError::Task {
            dataset: dataset.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DatasetError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type DatasetResult<T> = Result<T, DatasetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_keeps_source() {
        let err = DatasetError::task("parse", io::Error::new(io::ErrorKind::Other, "bad line"));
        assert_eq!(err.to_string(), "Task failed in dataset 'parse': bad line");
        assert!(std::error::Error::source(&err).is_some());
    }
}
