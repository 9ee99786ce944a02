//! Benchmarks for tile generation, stitching and vectorization

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geochange_algorithms::stitch::{stitch, TilePrediction};
use geochange_algorithms::vectorize::{mask_to_polygons, VectorizeParams};
use geochange_parallel::generate_tiles;
use ndarray::Array2;

fn predictions(size: usize, tile: usize) -> Vec<TilePrediction> {
    generate_tiles(size, size, tile, tile)
        .unwrap()
        .into_iter()
        .map(|spec| {
            let values = Array2::from_shape_fn((spec.height, spec.width), |(r, c)| {
                (((spec.start_row + r) / 37 + (spec.start_col + c) / 53) % 2) as f32
            });
            TilePrediction::new(spec, values)
        })
        .collect()
}

fn bench_stitch(c: &mut Criterion) {
    let mut group = c.benchmark_group("stitch");
    for size in [1000, 2500, 5000] {
        let preds = predictions(size, 1024);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| stitch(black_box(&preds), size, size).unwrap())
        });
    }
    group.finish();
}

fn bench_tiles(c: &mut Criterion) {
    c.bench_function("generate_tiles/20000", |b| {
        b.iter(|| generate_tiles(black_box(20_000), black_box(20_000), 512, 512).unwrap())
    });
}

fn bench_vectorize(c: &mut Criterion) {
    let mut group = c.benchmark_group("vectorize");
    for size in [512, 1024, 2048] {
        let mask = stitch(&predictions(size, 512), size, size).unwrap();
        let params = VectorizeParams::default();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| mask_to_polygons(black_box(&mask), &params).unwrap())
        });
    }
    group.finish();
}


criterion_group!(benches, bench_stitch, bench_tiles, bench_vectorize);
criterion_main!(benches);
