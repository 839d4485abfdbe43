//! Error types for RankFlow jobs

use crate::graph::EdgeParseError;
use rankflow_dataset::DatasetError;
use thiserror::Error;

/// Errors that can occur while configuring or running a PageRank job
#[derive(Error, Debug)]
pub enum PageRankError {
    /// Required input missing or out of range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unrecognised or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed edge line; the whole load fails
    #[error("Parse error: {0}")]
    Parse(#[from] EdgeParseError),

    /// Failure inside the dataset layer
    #[error("Dataset error: {0}")]
    Dataset(DatasetError),

    /// The job already produced its result
    #[error("PageRank job has already finished")]
    AlreadyFinalized,

    /// I/O error reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration file
    #[error("Config file error: {0}")]
    ConfigFile(#[from] serde_yaml::Error),
}

impl From<DatasetError> for PageRankError {
    /// Edge parse failures surface from inside a dataset task; unwrap them so
    /// callers see a parse error rather than a generic task failure.
    fn from(err: DatasetError) -> Self {
        match err {
            DatasetError::Task { dataset, source } => match source.downcast::<EdgeParseError>() {
                Ok(parse) => PageRankError::Parse(*parse),
                Err(source) => PageRankError::Dataset(DatasetError::Task { dataset, source }),
            },
            other => PageRankError::Dataset(other),
        }
    }
}

pub type PageRankResult<T> = Result<T, PageRankError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_parse_error_is_unwrapped() {
        let parse = EdgeParseError::FieldCount {
            line: "5".to_string(),
            found: 1,
        };
        let task = DatasetError::Task {
            dataset: "try_flat_map".to_string(),
            source: Box::new(parse.clone()),
        };
        match PageRankError::from(task) {
            PageRankError::Parse(inner) => assert_eq!(inner, parse),
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[test]
    fn test_other_task_errors_stay_dataset_errors() {
        let task = DatasetError::Task {
            dataset: "map".to_string(),
            source: Box::new(io::Error::new(io::ErrorKind::Other, "worker lost")),
        };
        let err = PageRankError::from(task);
        assert!(matches!(err, PageRankError::Dataset(DatasetError::Task { .. })));
        assert!(err.to_string().contains("worker lost"));
    }
}
