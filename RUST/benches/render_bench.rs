use amrtui::*;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tempfile::tempdir;

/// Wide, shallow forest of small grids.
fn build_forest_dataset(roots: usize, fanout: usize, depth: u32) -> Dataset {
    let mut b = DatasetBuilder::new("bench-forest");
    let leaf = |level: u32| {
        let meta = GridMeta::new(vec![0.0; 3], vec![1.0; 3], level, vec![2, 2, 2]);
        let field = Field::new(&[2, 2, 2], vec![level as f64; 8]).unwrap();
        (meta, field)
    };
    for _ in 0..roots {
        let (m, f) = leaf(0);
        let mut frontier = vec![b.add_grid(None, m, f).unwrap()];
        for level in 1..=depth {
            let mut next = Vec::with_capacity(frontier.len() * fanout);
            for &p in &frontier {
                for _ in 0..fanout {
                    let (m, f) = leaf(level);
                    next.push(b.add_grid(Some(p), m, f).unwrap());
                }
            }
            frontier = next;
        }
    }
    b.build().unwrap()
}

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchy/project");
    for &(roots, fanout, depth) in &[(1, 4, 5), (64, 2, 6)] {
        let ds = build_forest_dataset(roots, fanout, depth);
        group.throughput(Throughput::Elements(ds.grid_count() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{roots}x{fanout}^{depth}")),
            &ds,
            |b, ds| b.iter(|| project(ds).unwrap()),
        );
    }
    group.finish();
}

fn bench_raster(c: &mut Criterion) {
    let galaxy = load_sample("IsolatedGalaxy").unwrap();
    let field = galaxy.field(GridId(0)).unwrap();

    let mut group = c.benchmark_group("image/raster");
    group.sample_size(30);
    for axis in Axis::ALL {
        let slice = Arc::new(extract(&field, axis, 16).unwrap());
        group.throughput(Throughput::Elements(slice.data().len() as u64));
        group.bench_with_input(BenchmarkId::new("recompute", axis), &slice, |b, slice| {
            b.iter_batched(
                || {
                    let mut panel = ImagePanel::new(PaletteId::Viridis, axis, 16);
                    panel.set_data(Some(Arc::clone(slice)));
                    panel
                },
                |panel| panel.raster(),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_field_read(c: &mut Criterion) {
    let galaxy = load_sample("IsolatedGalaxy").unwrap();

    for &(compression, label) in &[(true, "zlib"), (false, "raw")] {
        let dir = tempdir().unwrap();
        let file = dir.path().join(format!("bench_{label}.amrt"));
        let wopts = WriteOptions {
            compression,
            compression_mode: CompressionMode::Always,
            ..WriteOptions::default()
        };
        write_dataset(&file, &galaxy, galaxy.name(), wopts).unwrap();
        let ds = open_dataset(&file, ReadOptions { validate: true }).unwrap();

        let mut group = c.benchmark_group(format!("container/{label}"));
        group.sample_size(20);
        group.warm_up_time(std::time::Duration::from_millis(500));
        group.throughput(Throughput::Bytes((32 * 32 * 32 * 8) as u64));
        group.bench_function("root_field", |b| b.iter(|| ds.field(GridId(0)).unwrap()));
        group.finish();
    }
}

criterion_group!(benches, bench_projection, bench_raster, bench_field_read);
criterion_main!(benches);
