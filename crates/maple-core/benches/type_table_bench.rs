use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use maple_core::mir::{PrimType, TyIdx, TypeAttrs, TypeTable};
use rayon::prelude::*;

fn intern_batch(table: &TypeTable, n: u32) -> TyIdx {
    let arr = table
        .get_or_create_array_type(TyIdx::from(PrimType::F64), &[n % 64 + 1], TypeAttrs::default())
        .unwrap_or(TyIdx::from(PrimType::Void));
    table.pointer_to(arr).unwrap_or(arr)
}

fn bench_sequential_interning(c: &mut Criterion) {
    c.bench_function("type_table_sequential", |b| {
        b.iter(|| {
            let table = TypeTable::new();
            for n in 0..1024u32 {
                black_box(intern_batch(&table, n));
            }
        })
    });
}

fn bench_parallel_interning(c: &mut Criterion) {
    let mut group = c.benchmark_group("type_table_parallel");
    for threads in [1usize, 2, 4, 8] {
        let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool,
            Err(_) => continue,
        };
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, _| {
            b.iter(|| {
                let table = TypeTable::new();
                pool.install(|| {
                    (0..1024u32)
                        .into_par_iter()
                        .for_each(|n| {
                            black_box(intern_batch(&table, n));
                        })
                });
            })
        });
    }
    group.finish();
}

fn bench_hot_lookups(c: &mut Criterion) {
    let table = TypeTable::new();
    for n in 0..64 {
        intern_batch(&table, n);
    }
    c.bench_function("type_table_hot_lookup", |b| {
        b.iter(|| {
            (0..1024u32)
                .into_par_iter()
                .map(|n| intern_batch(&table, black_box(n)).0)
                .sum::<u32>()
        })
    });
}

criterion_group!(
    benches,
    bench_sequential_interning,
    bench_parallel_interning,
    bench_hot_lookups
);
criterion_main!(benches);
