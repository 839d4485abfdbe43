//! Iterative PageRank over the dataset layer

pub mod job;
pub mod options;
pub mod propagation;

pub use job::{run_pagerank, JobReport, JobState, PageRankJob, RankEntry};
pub use options::PageRankOptions;
pub use propagation::{contributions, damp};
