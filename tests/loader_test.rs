use rankflow::{Adjacency, Context, ContextConfig, EdgeLoader, EdgeParseError, NodeId, PageRankError};
use std::fs;
use tempfile::TempDir;

fn context() -> Context {
    Context::new(ContextConfig {
        default_parallelism: 4,
        shuffle_partitions: 3,
        ..ContextConfig::default()
    })
    .unwrap()
}

fn normalized(adjacency: &Adjacency) -> Vec<(NodeId, Vec<NodeId>)> {
    let mut rows = adjacency.collect().unwrap();
    for (_, targets) in rows.iter_mut() {
        targets.sort_unstable();
    }
    rows.sort();
    rows
}

#[test]
fn test_adjacency_ignores_line_order_and_duplicates() {
    let dir = TempDir::new().unwrap();
    let forward = dir.path().join("forward.txt");
    let shuffled = dir.path().join("shuffled.txt");
    fs::write(&forward, "# graph\n1\t2\n1\t3\n2\t3\n3\t1\n4\t1\n").unwrap();
    fs::write(&shuffled, "4\t1\n3\t1\n# graph\n1\t3\n2\t3\n1\t2\n1\t3\n").unwrap();

    let ctx = context();
    let loader = EdgeLoader::new(&ctx);
    let expected = vec![(1, vec![2, 3]), (2, vec![3]), (3, vec![1]), (4, vec![1])];
    assert_eq!(normalized(&loader.load_adjacency(&forward)), expected);
    assert_eq!(normalized(&loader.load_adjacency(&shuffled)), expected);
}

#[test]
fn test_directory_of_part_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("part-00000"), "1\t2\n2\t1\n").unwrap();
    fs::write(dir.path().join("part-00001"), "2\t3\n").unwrap();
    fs::write(dir.path().join("_SUCCESS"), "").unwrap();
    fs::write(dir.path().join(".part-00000.crc"), "not an edge").unwrap();

    let ctx = context();
    let adjacency = EdgeLoader::new(&ctx).load_adjacency(dir.path());
    assert_eq!(normalized(&adjacency), vec![(1, vec![2]), (2, vec![1, 3])]);
}

#[test]
fn test_space_separated_edges() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("spaces.txt");
    fs::write(&path, "10 20\n20   10\n").unwrap();

    let ctx = context();
    let edges = EdgeLoader::new(&ctx).load_edges(&path).collect().unwrap();
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].into_pair(), (10, 20));
    assert_eq!(edges[1].into_pair(), (20, 10));
}

#[test]
fn test_malformed_line_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.txt");
    fs::write(&path, "# header\n5\n").unwrap();

    let ctx = context();
    let err = EdgeLoader::new(&ctx).load_adjacency(&path).collect().unwrap_err();
    match PageRankError::from(err) {
        PageRankError::Parse(EdgeParseError::FieldCount { found, .. }) => assert_eq!(found, 1),
        other => panic!("expected parse error, got {}", other),
    }
}

#[test]
fn test_non_numeric_node_id() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.txt");
    fs::write(&path, "1\t2\nabc\t3\n").unwrap();

    let ctx = context();
    let err = EdgeLoader::new(&ctx).load_edges(&path).count().unwrap_err();
    assert!(matches!(
        PageRankError::from(err),
        PageRankError::Parse(EdgeParseError::InvalidNodeId { .. })
    ));
}
