//! Benchmarks for graph-cut segmentation across max-flow backends.
//!
//! Run with: cargo bench -p seg-graphcut
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p seg-graphcut -- --save-baseline main
//! 2. After changes: cargo bench -p seg-graphcut -- --baseline main

#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use seg_graphcut::{
    DirectionPolicy, GraphCutParams, MultiLabelParams, NoiseConvention, SegmentationRequest,
    Sigma, segment, segment_multilabel,
};
use seg_maxflow::SolverKind;
use seg_types::{GridCoord, GridDims, SeedSet, Volume};

// =============================================================================
// Test Volume Generation
// =============================================================================

/// A bright sphere with deterministic texture in a dark volume.
fn sphere_volume(n: usize) -> Volume<i16> {
    let center = n as f64 / 2.0;
    let radius = n as f64 / 4.0;
    Volume::from_fn(GridDims::new(n, n, n), |c| {
        let d = ((c.x as f64 - center).powi(2)
            + (c.y as f64 - center).powi(2)
            + (c.z as f64 - center).powi(2))
        .sqrt();
        let texture = ((c.x * 31 + c.y * 17 + c.z * 7) % 41) as i16;
        if d < radius { 800 + texture } else { 100 + texture }
    })
    .unwrap()
}

fn seed_masks(n: usize) -> (Volume<u8>, Volume<u8>) {
    let dims = GridDims::new(n, n, n);
    let mid = n / 2;
    let fg = Volume::from_fn(dims, |c| {
        u8::from(c.x.abs_diff(mid) <= 1 && c.y.abs_diff(mid) <= 1 && c.z.abs_diff(mid) <= 1)
    })
    .unwrap();
    let bg = Volume::from_fn(dims, |c| u8::from(c.z == 0 || c.z == n - 1)).unwrap();
    (fg, bg)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_backends(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");

    for n in [16usize, 32, 48] {
        let volume = sphere_volume(n);
        let (fg, bg) = seed_masks(n);
        group.throughput(Throughput::Elements(volume.len() as u64));

        for solver in SolverKind::ALL {
            let params = GraphCutParams::default()
                .with_sigma(Sigma::Fixed(50.0))
                .with_direction(DirectionPolicy::BrightToDark)
                .with_solver(solver);
            group.bench_with_input(
                BenchmarkId::new(solver.name(), format!("{n}^3")),
                &(&volume, &fg, &bg),
                |b, (volume, fg, bg)| {
                    b.iter(|| {
                        let request = SegmentationRequest::new("bench", *volume, *fg, *bg);
                        segment(black_box(&request), black_box(&params))
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_auto_sigma(c: &mut Criterion) {
    let n = 32;
    let volume = sphere_volume(n);
    let (fg, bg) = seed_masks(n);
    let params = GraphCutParams::default()
        .with_sigma(Sigma::Auto)
        .with_noise(NoiseConvention::AbsoluteMean);

    c.bench_function("segment_auto_sigma_32^3", |b| {
        b.iter(|| {
            let request = SegmentationRequest::new("bench", &volume, &fg, &bg);
            segment(black_box(&request), black_box(&params))
        });
    });
}

fn bench_multilabel(c: &mut Criterion) {
    let n = 24;
    let volume = sphere_volume(n);
    let indexer = volume.indexer();
    let mid = n / 2;
    let classes = [
        SeedSet::from_coords(indexer, [GridCoord::new(0, 0, 0)]).unwrap(),
        SeedSet::from_coords(indexer, [GridCoord::new(mid, mid, mid)]).unwrap(),
        SeedSet::from_coords(indexer, [GridCoord::new(n - 1, n - 1, n - 1)]).unwrap(),
    ];
    let params = MultiLabelParams::default().with_sigma(Sigma::Fixed(50.0));

    c.bench_function("multilabel_3_classes_24^3", |b| {
        b.iter(|| segment_multilabel(black_box(&volume), black_box(&classes), &params));
    });
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_backends, bench_auto_sigma, bench_multilabel);
criterion_main!(benches);
