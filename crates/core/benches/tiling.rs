// Benchmark suite for tile grid generation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use park_tiles_core::{AreaOfInterest, BBox, TileGrid};

/// A spread of synthetic areas: small parks scattered over a state-sized
/// extent in Web Mercator meters.
fn synthetic_areas(count: usize) -> Vec<AreaOfInterest> {
    (0..count)
        .map(|i| {
            let x = -13_600_000.0 + (i as f64 % 50.0) * 20_000.0;
            let y = 3_800_000.0 + (i as f64 / 50.0).floor() * 15_000.0;
            AreaOfInterest {
                fid: i as u64,
                name: format!("park-{}", i),
                bbox: BBox::new(x, y, x + 8_000.0, y + 6_000.0),
            }
        })
        .collect()
}

fn bench_generate_tiles(c: &mut Criterion) {
    let grid = TileGrid::new(1.0, 2500, 2500);
    let areas = synthetic_areas(500);

    c.bench_function("generate_tiles_500_areas", |b| {
        b.iter(|| black_box(grid.generate(black_box(&areas))))
    });
}

fn bench_single_large_area(c: &mut Criterion) {
    let grid = TileGrid::new(1.0, 2500, 2500);
    let areas = vec![AreaOfInterest {
        fid: 1,
        name: "statewide".to_string(),
        bbox: BBox::new(-13_850_000.0, 3_830_000.0, -12_700_000.0, 5_160_000.0),
    }];

    c.bench_function("generate_tiles_statewide_area", |b| {
        b.iter(|| black_box(grid.generate(black_box(&areas))))
    });
}

criterion_group!(benches, bench_generate_tiles, bench_single_large_area);
criterion_main!(benches);
