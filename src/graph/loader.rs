//! Graph loading
//!
//! Turns an edge-list text source into the adjacency dataset the rank
//! propagation iterates over. Loading is lazy: nothing is read until the
//! adjacency (or something derived from it) is materialized.

use super::edge::{parse_edge, Edge, NodeId};
use rankflow_dataset::{Context, Dataset};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Node id → distinct out-neighbours; every source node appears exactly once
pub type Adjacency = Dataset<(NodeId, Vec<NodeId>)>;

/// Loads edge lists from text sources through a context
#[derive(Debug, Clone)]
pub struct EdgeLoader {
    ctx: Context,
}

impl EdgeLoader {
    pub fn new(ctx: &Context) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Parsed edges, in source order. Evaluation fails on the first malformed line.
    pub fn load_edges(&self, path: impl AsRef<Path>) -> Dataset<Edge> {
        let path: PathBuf = path.as_ref().to_path_buf();
        debug!("Edge source: {:?}", path);
        self.ctx
            .text_file(&path)
            .try_flat_map(|line: String| parse_edge(&line))
    }

    /// Adjacency built from the edges at `path`
    pub fn load_adjacency(&self, path: impl AsRef<Path>) -> Adjacency {
        build_adjacency(&self.load_edges(path))
    }
}

/// Deduplicate edges, then group targets by source node
pub fn build_adjacency(edges: &Dataset<Edge>) -> Adjacency {
    edges.distinct().map(Edge::into_pair).group_by_key()
}
