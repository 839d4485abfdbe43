//! Directed edges parsed from edge-list text
//!
//! One edge per line, `source<TAB>target` (any whitespace separates the two
//! node ids). Lines starting with `#` are comments.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Node identifier (non-negative integer)
pub type NodeId = u64;

/// A directed edge between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    /// Source node (edge goes FROM this node)
    pub source: NodeId,

    /// Target node (edge goes TO this node)
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Edge { source, target }
    }

    /// Key the edge by its source node
    pub fn into_pair(self) -> (NodeId, NodeId) {
        (self.source, self.target)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// A malformed edge line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EdgeParseError {
    #[error("expected 2 node ids but found {found} field(s) in line {line:?}")]
    FieldCount { line: String, found: usize },

    #[error("invalid node id {token:?} in line {line:?}")]
    InvalidNodeId { line: String, token: String },
}

/// Parse one edge-list line.
///
/// Returns `Ok(None)` for comment lines. Anything else must be exactly two
/// non-negative integer tokens; blank lines are malformed.
pub fn parse_edge(line: &str) -> Result<Option<Edge>, EdgeParseError> {
    if line.starts_with('#') {
        return Ok(None);
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(EdgeParseError::FieldCount {
            line: line.to_string(),
            found: tokens.len(),
        });
    }

    let parse = |token: &str| {
        token
            .parse::<NodeId>()
            .map_err(|_| EdgeParseError::InvalidNodeId {
                line: line.to_string(),
                token: token.to_string(),
            })
    };

    Ok(Some(Edge::new(parse(tokens[0])?, parse(tokens[1])?)))
}
