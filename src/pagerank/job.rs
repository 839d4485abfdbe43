//! PageRank job
//!
//! Builds the whole iterative computation as dataset lineage and evaluates it
//! once, at the end:
//!
//! 1. load the adjacency and cache it (every iteration joins against it)
//! 2. start every source node at rank 1.0
//! 3. per iteration, send `rank / out_degree` along each out-edge, sum what
//!    each node receives, and apply `(1 - d) + d * sum`
//! 4. collect, sort by rank descending, keep the first `top_k`
//!
//! Nodes that receive no contributions drop out of the next generation, so
//! rank held by nodes without out-edges is not redistributed.
//!
//! Every [`CHECKPOINT_INTERVAL`] iterations the current rank generation is
//! evaluated and its lineage cut, so long runs do not build an unbounded
//! chain of transformations.

use super::options::PageRankOptions;
use super::propagation::{contributions, damp};
use crate::error::{PageRankError, PageRankResult};
use crate::graph::{EdgeLoader, NodeId};
use rankflow_dataset::{Context, Dataset, Persisted, StorageLevel};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

type Ranks = Dataset<(NodeId, f64)>;

/// Iterations between rank checkpoints; bounds how deep evaluation recurses
pub const CHECKPOINT_INTERVAL: usize = 32;

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Uninitialized,
    AdjacencyReady,
    /// Building iteration `k` (1-based)
    Iterating(usize),
    Finalized,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Uninitialized => write!(f, "uninitialized"),
            JobState::AdjacencyReady => write!(f, "adjacency-ready"),
            JobState::Iterating(k) => write!(f, "iterating({})", k),
            JobState::Finalized => write!(f, "finalized"),
        }
    }
}

/// One ranked node of the result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankEntry {
    pub node: NodeId,
    pub rank: f64,
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub iterations: usize,
    /// Nodes holding a rank after the last iteration
    pub ranked_nodes: usize,
    /// Entries returned (at most `top_k`)
    pub returned: usize,
    /// Times the adjacency lineage was evaluated
    pub adjacency_evaluations: u64,
    /// Rank generations materialized before the final collect
    pub checkpoints: usize,
    pub elapsed: Duration,
}

/// Iterative PageRank over an edge list
#[derive(Debug)]
pub struct PageRankJob {
    ctx: Context,
    opts: PageRankOptions,
    level: Option<StorageLevel>,
    state: JobState,
    report: Option<JobReport>,
}

impl PageRankJob {
    /// Validate options and resolve the persistence level.
    ///
    /// A configured shuffle partition count applies to every shuffle this job builds.
    pub fn new(ctx: &Context, opts: PageRankOptions) -> PageRankResult<Self> {
        opts.validate()?;
        let level = opts.storage_level()?;
        let ctx = match opts.shuffle_partitions {
            Some(partitions) => ctx.with_shuffle_partitions(partitions),
            None => ctx.clone(),
        };

        debug!(
            "PageRank job: edges={:?}, iterations={}, damping={}, top_k={}, persist={:?}, shuffle_partitions={}",
            opts.edges_path,
            opts.iterations,
            opts.damping,
            opts.top_k,
            level.map(|l| l.to_string()),
            ctx.shuffle_partitions()
        );

        Ok(Self {
            ctx,
            opts,
            level,
            state: JobState::Uninitialized,
            report: None,
        })
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn options(&self) -> &PageRankOptions {
        &self.opts
    }

    /// Resolved persistence level, if any
    pub fn storage_level(&self) -> Option<StorageLevel> {
        self.level
    }

    /// Summary of the finished run
    pub fn report(&self) -> Option<&JobReport> {
        self.report.as_ref()
    }

    /// Run every iteration and return the `top_k` highest-ranked nodes.
    ///
    /// Ties are broken by ascending node id. On failure every cached dataset
    /// is released and the job returns to `Uninitialized`.
    pub fn run(&mut self) -> PageRankResult<Vec<RankEntry>> {
        if self.state == JobState::Finalized {
            return Err(PageRankError::AlreadyFinalized);
        }

        match self.execute() {
            Ok(top) => Ok(top),
            Err(e) => {
                debug!("PageRank job failed in state {}: {}", self.state, e);
                self.state = JobState::Uninitialized;
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> PageRankResult<Vec<RankEntry>> {
        let start = Instant::now();
        let damping = self.opts.damping;

        let adjacency = EdgeLoader::new(&self.ctx).load_adjacency(&self.opts.edges_path);
        let adjacency_level = match self.level {
            Some(level) => StorageLevel::MEMORY_ONLY.union(level),
            None => StorageLevel::MEMORY_ONLY,
        };
        let adjacency = adjacency.persist(adjacency_level)?;
        self.transition(JobState::AdjacencyReady);

        let mut ranks: Ranks = adjacency.map_values(|_| 1.0);
        let mut ranks_handle = self.persist_ranks(&ranks)?;
        let mut checkpoints = 0;

        for k in 1..=self.opts.iterations {
            self.transition(JobState::Iterating(k));
            let contribs = adjacency
                .join(&ranks)
                .flat_map(|(_, (neighbors, rank))| contributions(neighbors, rank));
            ranks = contribs
                .reduce_by_key(|a, b| a + b)
                .map_values(move |sum| damp(sum, damping));
            if k % CHECKPOINT_INTERVAL == 0 && k < self.opts.iterations {
                ranks = ranks.checkpoint()?;
                checkpoints += 1;
            }
            // Replacing the handle releases the previous generation
            ranks_handle = self.persist_ranks(&ranks)?;
        }

        let mut results = ranks.collect()?;
        let ranked_nodes = results.len();
        sort_by_rank(&mut results);
        results.truncate(self.opts.top_k);

        let adjacency_evaluations = adjacency.compute_count();
        drop(ranks_handle);
        adjacency.release();

        let elapsed = start.elapsed();
        info!(
            "PageRank finished in {:.2}s with {} iterations ({} ranked nodes)",
            elapsed.as_secs_f64(),
            self.opts.iterations,
            ranked_nodes
        );

        self.report = Some(JobReport {
            iterations: self.opts.iterations,
            ranked_nodes,
            returned: results.len(),
            adjacency_evaluations,
            checkpoints,
            elapsed,
        });
        self.transition(JobState::Finalized);

        Ok(results
            .into_iter()
            .map(|(node, rank)| RankEntry { node, rank })
            .collect())
    }

    fn persist_ranks(&self, ranks: &Ranks) -> PageRankResult<Option<Persisted<(NodeId, f64)>>> {
        match self.level {
            Some(level) => Ok(Some(ranks.persist(level)?)),
            None => Ok(None),
        }
    }

    fn transition(&mut self, next: JobState) {
        debug!("PageRank job: {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Rank descending, then node id ascending
fn sort_by_rank(results: &mut [(NodeId, f64)]) {
    results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

/// Run a PageRank job to completion
pub fn run_pagerank(ctx: &Context, opts: PageRankOptions) -> PageRankResult<Vec<RankEntry>> {
    PageRankJob::new(ctx, opts)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rankflow_dataset::ContextConfig;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn ctx() -> Context {
        Context::new(ContextConfig {
            default_parallelism: 2,
            shuffle_partitions: 4,
            ..ContextConfig::default()
        })
        .unwrap()
    }

    fn edge_file(dir: &TempDir, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join("edges.txt");
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_sort_by_rank_breaks_ties_by_node() {
        let mut rows = vec![(3, 1.0), (1, 2.0), (2, 1.0), (0, 0.5)];
        sort_by_rank(&mut rows);
        assert_eq!(rows, vec![(1, 2.0), (2, 1.0), (3, 1.0), (0, 0.5)]);
    }

    #[test]
    fn test_state_transitions() {
        let dir = TempDir::new().unwrap();
        let path = edge_file(&dir, &["1\t2", "2\t1"]);
        let ctx = ctx();

        let mut job = PageRankJob::new(&ctx, PageRankOptions::new(&path).with_iterations(3)).unwrap();
        assert_eq!(job.state(), JobState::Uninitialized);
        assert!(job.report().is_none());

        job.run().unwrap();
        assert_eq!(job.state(), JobState::Finalized);

        let report = job.report().unwrap();
        assert_eq!(report.iterations, 3);
        assert_eq!(report.ranked_nodes, 2);
        assert_eq!(report.returned, 2);
        assert_eq!(report.checkpoints, 0);

        assert!(matches!(job.run(), Err(PageRankError::AlreadyFinalized)));
    }

    #[test]
    fn test_failed_run_resets_state() {
        let dir = TempDir::new().unwrap();
        let path = edge_file(&dir, &["1\t2", "oops"]);
        let ctx = ctx();

        let mut job = PageRankJob::new(&ctx, PageRankOptions::new(&path)).unwrap();
        assert!(matches!(job.run(), Err(PageRankError::Parse(_))));
        assert_eq!(job.state(), JobState::Uninitialized);
        assert_eq!(ctx.storage_status().persisted_datasets, 0);
    }

    #[test]
    fn test_construction_errors() {
        let ctx = ctx();
        assert!(matches!(
            PageRankJob::new(&ctx, PageRankOptions::default()),
            Err(PageRankError::InvalidInput(_))
        ));
        assert!(matches!(
            PageRankJob::new(&ctx, PageRankOptions::new("e").with_persist("FAST")),
            Err(PageRankError::Config(_))
        ));
    }

    #[test]
    fn test_shuffle_partitions_are_threaded_into_the_job() {
        let ctx = ctx();
        let job = PageRankJob::new(&ctx, PageRankOptions::new("e").with_shuffle_partitions(13)).unwrap();
        assert_eq!(job.ctx.shuffle_partitions(), 13);
        assert_eq!(ctx.shuffle_partitions(), 4);
    }

    #[test]
    fn test_long_runs_are_checkpointed() {
        let dir = TempDir::new().unwrap();
        let path = edge_file(&dir, &["1\t2", "2\t3", "3\t1"]);
        let ctx = ctx();

        let iterations = CHECKPOINT_INTERVAL * 3;
        let mut job = PageRankJob::new(&ctx, PageRankOptions::new(&path).with_iterations(iterations)).unwrap();
        let top = job.run().unwrap();
        // the last interval ends at the final iteration and needs no checkpoint
        assert_eq!(job.report().unwrap().checkpoints, 2);
        assert_eq!(job.report().unwrap().adjacency_evaluations, 1);
        for entry in top {
            assert!((entry.rank - 1.0).abs() < 1e-9);
        }
    }
}
