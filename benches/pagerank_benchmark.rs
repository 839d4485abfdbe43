use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rankflow::{Context, ContextConfig, PageRankJob, PageRankOptions};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Random edge list with `nodes * 8` edges
fn write_graph(dir: &Path, nodes: u64) -> PathBuf {
    let path = dir.join(format!("graph-{}.txt", nodes));
    let mut out = BufWriter::new(File::create(&path).unwrap());
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..nodes * 8 {
        writeln!(out, "{}\t{}", rng.gen_range(0..nodes), rng.gen_range(0..nodes)).unwrap();
    }
    out.flush().unwrap();
    path
}

/// Full job (load, 10 iterations, top 10) at increasing graph sizes
fn bench_pagerank(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let ctx = Context::new(ContextConfig::default()).unwrap();
    let mut group = c.benchmark_group("pagerank");
    group.sample_size(10);

    for nodes in [1_000u64, 10_000, 50_000].iter() {
        let path = write_graph(dir.path(), *nodes);
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &path, |b, path| {
            b.iter(|| {
                PageRankJob::new(&ctx, PageRankOptions::new(path))
                    .unwrap()
                    .run()
                    .unwrap()
            });
        });
    }
    group.finish();
}

/// Same graph under different storage levels for the rank generations
fn bench_storage_levels(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let ctx = Context::new(ContextConfig::default()).unwrap();
    let path = write_graph(dir.path(), 10_000);
    let mut group = c.benchmark_group("pagerank_storage_level");
    group.sample_size(10);

    for level in ["MEMORY_ONLY", "MEMORY_ONLY_SER", "DISK_ONLY"].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(level), level, |b, level| {
            b.iter(|| {
                PageRankJob::new(&ctx, PageRankOptions::new(&path).with_persist(*level))
                    .unwrap()
                    .run()
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pagerank, bench_storage_levels);
criterion_main!(benches);
