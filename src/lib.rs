//! RankFlow
//!
//! Batch PageRank over large edge lists, expressed as a lazy, partitioned
//! dataflow on top of `rankflow-dataset`.
//!
//! # Architecture
//!
//! - `graph`: edge-list parsing and adjacency construction
//! - `pagerank`: job options, rank propagation and the iterative job
//! - `config`: session settings mapped onto the execution context
//!
//! # Example
//!
//! ```no_run
//! use rankflow::{PageRankJob, PageRankOptions, SessionConfig};
//!
//! let ctx = SessionConfig::default().build_context()?;
//! let opts = PageRankOptions::new("web-Google.txt").with_iterations(10);
//! for entry in PageRankJob::new(&ctx, opts)?.run()? {
//!     println!("Page: {}, Rank: {}", entry.node, entry.rank);
//! }
//! # Ok::<(), rankflow::PageRankError>(())
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod pagerank;

pub use config::SessionConfig;
pub use error::{PageRankError, PageRankResult};
pub use graph::{build_adjacency, parse_edge, Adjacency, Edge, EdgeLoader, EdgeParseError, NodeId};
pub use pagerank::{run_pagerank, JobReport, JobState, PageRankJob, PageRankOptions, RankEntry};

pub use rankflow_dataset::{Context, ContextConfig, StorageLevel};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
