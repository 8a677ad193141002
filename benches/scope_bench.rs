use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memscope::{MemoryScope, NativeSocketAddress};

fn benchmark_scope_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("MemoryScope");

    for size in [16usize, 256, 4096].iter() {
        group.bench_with_input(BenchmarkId::new("confined_allocate_close", size), size, |b, &size| {
            b.iter(|| {
                let scope = MemoryScope::confined();
                let region = scope.allocate(size).unwrap();
                black_box(region.len());
                scope.close().unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("shared_allocate_close", size), size, |b, &size| {
            b.iter(|| {
                let scope = MemoryScope::shared();
                let region = scope.allocate(size).unwrap();
                black_box(region.len());
                scope.close().unwrap();
            });
        });
    }

    let shared = MemoryScope::shared();
    group.bench_function("fork_unfork", |b| {
        b.iter(|| {
            shared.fork().unwrap();
            shared.unfork().unwrap();
        });
    });

    group.finish();
}

fn benchmark_bulk_addresses(c: &mut Criterion) {
    let mut group = c.benchmark_group("NativeSocketAddress");

    for count in [1usize, 16, 128].iter() {
        group.bench_with_input(BenchmarkId::new("allocate_free_all", count), count, |b, &count| {
            b.iter(|| {
                let addresses = NativeSocketAddress::allocate(count).unwrap();
                NativeSocketAddress::free_all(addresses);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_scope_lifecycle, benchmark_bulk_addresses);
criterion_main!(benches);
