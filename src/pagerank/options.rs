//! PageRank job options

use crate::error::{PageRankError, PageRankResult};
use rankflow_dataset::StorageLevel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// PageRank configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRankOptions {
    /// Edge-list file or directory (required)
    pub edges_path: PathBuf,
    /// Number of iterations; always run in full
    pub iterations: usize,
    /// Damping factor (usually 0.85)
    pub damping: f64,
    /// Number of results returned
    pub top_k: usize,
    /// Storage level name for adjacency and ranks, e.g. `MEMORY_AND_DISK`
    pub persist: Option<String>,
    /// Partition count for every shuffle in the job
    pub shuffle_partitions: Option<usize>,
}

impl Default for PageRankOptions {
    fn default() -> Self {
        Self {
            edges_path: PathBuf::new(),
            iterations: 10,
            damping: 0.85,
            top_k: 10,
            persist: None,
            shuffle_partitions: None,
        }
    }
}

impl PageRankOptions {
    pub fn new(edges_path: impl Into<PathBuf>) -> Self {
        Self {
            edges_path: edges_path.into(),
            ..Self::default()
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_persist(mut self, level: impl Into<String>) -> Self {
        self.persist = Some(level.into());
        self
    }

    pub fn with_shuffle_partitions(mut self, partitions: usize) -> Self {
        self.shuffle_partitions = Some(partitions);
        self
    }

    /// Check required inputs and numeric ranges
    pub fn validate(&self) -> PageRankResult<()> {
        if self.edges_path.as_os_str().is_empty() {
            return Err(PageRankError::InvalidInput("edges_path is required".to_string()));
        }
        if self.iterations == 0 {
            return Err(PageRankError::InvalidInput(
                "iterations must be a positive integer".to_string(),
            ));
        }
        if !self.damping.is_finite() || !(0.0..=1.0).contains(&self.damping) {
            return Err(PageRankError::Config(format!(
                "damping must be within [0, 1], got {}",
                self.damping
            )));
        }
        if self.shuffle_partitions == Some(0) {
            return Err(PageRankError::Config(
                "shuffle_partitions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the configured persistence level. An empty name means no persistence.
    pub fn storage_level(&self) -> PageRankResult<Option<StorageLevel>> {
        match self.persist.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => StorageLevel::from_name(name).map(Some).map_err(|_| {
                PageRankError::Config(format!(
                    "Invalid persistence level: {} (expected one of: {})",
                    name,
                    StorageLevel::names().collect::<Vec<_>>().join(", ")
                ))
            }),
        }
    }
}
