//! Per-iteration rank arithmetic

use crate::graph::NodeId;

/// Split `rank` evenly over `neighbors`, one share per out-edge.
///
/// A node without neighbours sends nothing.
pub fn contributions(neighbors: Vec<NodeId>, rank: f64) -> impl Iterator<Item = (NodeId, f64)> {
    let share = if neighbors.is_empty() {
        0.0
    } else {
        rank / neighbors.len() as f64
    };
    neighbors.into_iter().map(move |n| (n, share))
}

/// `(1 - d) + d * sum`
pub fn damp(aggregated: f64, damping: f64) -> f64 {
    (1.0 - damping) + damping * aggregated
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_shares_sum_to_rank() {
        for degree in 1..=12u64 {
            let neighbors: Vec<NodeId> = (100..100 + degree).collect();
            let rank = 0.37 * degree as f64 + 0.11;
            let sent: Vec<(NodeId, f64)> = contributions(neighbors.clone(), rank).collect();

            assert_eq!(sent.len(), degree as usize);
            assert_eq!(sent.iter().map(|(n, _)| *n).collect::<Vec<_>>(), neighbors);
            let total: f64 = sent.iter().map(|(_, c)| c).sum();
            assert!((total - rank).abs() < EPS, "degree {}: {} != {}", degree, total, rank);
        }
    }

    #[test]
    fn test_no_neighbors_sends_nothing() {
        assert_eq!(contributions(Vec::new(), 1.0).count(), 0);
    }

    #[test]
    fn test_damp() {
        assert!((damp(1.0, 0.85) - 1.0).abs() < EPS);
        assert!((damp(0.5, 0.85) - 0.575).abs() < EPS);
        assert!((damp(0.0, 0.85) - 0.15).abs() < EPS);
        assert_eq!(damp(3.0, 0.0), 1.0);
    }
}
