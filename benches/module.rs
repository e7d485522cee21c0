extern crate pescope;

#[path = "../tests/common/mod.rs"]
mod common;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use pescope::{image::ImageHeaders, LoadConfig, Module, Parser};
use std::hint::black_box;

/// Benchmark header decoding alone against a full staged load of a managed image
fn bench_module_load(c: &mut Criterion) {
    let data = common::managed_dll();

    let mut group = c.benchmark_group("module");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("image_headers", |b| {
        b.iter(|| {
            let mut parser = Parser::new(black_box(&data));
            black_box(ImageHeaders::read(&mut parser).unwrap())
        });
    });
    group.bench_function("from_mem_minimal", |b| {
        b.iter(|| {
            let module =
                Module::from_mem_with_config(black_box(data.clone()), LoadConfig::minimal())
                    .unwrap();
            black_box(module)
        });
    });
    group.bench_function("from_mem_all_stages", |b| {
        b.iter(|| black_box(Module::from_mem(black_box(data.clone())).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_module_load);
criterion_main!(benches);
