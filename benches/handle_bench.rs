use cog_core::HandleTable;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

fn bench_allocate_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle_table");
    for count in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::new("allocate", count), &count, |b, &count| {
            b.iter(|| {
                let mut table = HandleTable::with_capacity(count);
                for i in 0..count {
                    black_box(table.allocate(i));
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("churn", count), &count, |b, &count| {
            b.iter(|| {
                let mut table = HandleTable::with_capacity(count);
                let mut live = Vec::with_capacity(count);
                for i in 0..count {
                    live.push(table.allocate(i));
                    if i % 2 == 0 {
                        let victim = live.swap_remove(0);
                        black_box(table.release(victim));
                    }
                }
            })
        });
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut table = HandleTable::new();
    let handles: Vec<_> = (0..10_000).map(|i| table.allocate(i)).collect();
    for handle in handles.iter().step_by(3) {
        table.release(*handle);
    }

    c.bench_function("resolve_10000_mixed", |b| {
        b.iter(|| {
            let mut hits = 0;
            for handle in &handles {
                if table.resolve(*handle).is_some() {
                    hits += 1;
                }
            }
            black_box(hits)
        })
    });
}

criterion_group!(benches, bench_allocate_release, bench_resolve);
criterion_main!(benches);
