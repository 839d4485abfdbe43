//! Graph input
//!
//! Parses edge-list text into [`Edge`]s and groups them into the adjacency
//! dataset consumed by the rank propagation engine.

pub mod edge;
pub mod loader;

// Re-export main types
pub use edge::{parse_edge, Edge, EdgeParseError, NodeId};
pub use loader::{build_adjacency, Adjacency, EdgeLoader};
