use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use playtree_core::{build, rebalance, MemoryPathStore, NewItem, PlaylistService};

const SIZES: &[u64] = &[100, 1_000, 10_000];

/// Rows of one playlist with sparse positions, so a rebalance moves every entry.
fn sparse_rows(count: u64) -> Vec<String> {
    (0..count)
        .map(|i| format!("bench.track.t{i}.{}", i * 3 + 7))
        .collect()
}

fn fill_and_rebalance(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_rebalance");
    for &count in SIZES {
        let rows = sparse_rows(count);
        group.bench_with_input(BenchmarkId::new("fill", count), &rows, |b, rows| {
            b.iter(|| build(black_box(rows)).map(|tree| tree.size()))
        });
        group.bench_with_input(BenchmarkId::new("rebalance", count), &rows, |b, rows| {
            b.iter_batched(
                || build(rows).ok().unwrap_or_default(),
                |mut tree| rebalance(&mut tree).len(),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn service_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("service_add");
    for &count in SIZES {
        let items: Vec<NewItem> = (0..count).map(|i| NewItem::track(format!("t{i}"))).collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &items, |b, items| {
            b.iter_batched(
                || PlaylistService::new(MemoryPathStore::new()),
                |mut service| service.add_items("bench", items, None, true).map(|p| p.len()),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, fill_and_rebalance, service_add);
criterion_main!(benches);
