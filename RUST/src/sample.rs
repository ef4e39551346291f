//! Built-in procedural datasets, loadable by name.

use crate::dataset::{Dataset, DatasetBuilder, GridId, GridMeta};
use crate::error::{BrowseError, Result};
use crate::slice::Field;

pub const DEFAULT_SAMPLE: &str = "IsolatedGalaxy";

pub const SAMPLE_NAMES: [&str; 2] = ["IsolatedGalaxy", "Slab2D"];

/// Load a built-in sample by (case-insensitive) name.
pub fn load_sample(name: &str) -> Result<Dataset> {
    match name.trim().to_ascii_lowercase().as_str() {
        "isolatedgalaxy" => isolated_galaxy(),
        "slab2d" => slab_2d(),
        _ => Err(BrowseError::UnknownSample(name.to_string())),
    }
}

/// Spiral disk centred in the unit cube.
fn galaxy_density(x: f64, y: f64, z: f64) -> f64 {
    let (dx, dy, dz) = (x - 0.5, y - 0.5, z - 0.5);
    let r = (dx * dx + dy * dy).sqrt();
    let theta = dy.atan2(dx);
    let disk = (-(r / 0.12).powi(2)).exp() * (-(dz / 0.06).powi(2)).exp();
    let arms = 1.0 + 0.35 * (2.0 * theta - 18.0 * r).cos();
    1e-3 + disk * arms
}

fn cell_centre(left: f64, right: f64, n: usize, i: usize) -> f64 {
    left + (right - left) * (i as f64 + 0.5) / n as f64
}

fn grid_field(meta: &GridMeta, f: impl Fn(&[f64]) -> f64) -> Result<Field> {
    let rank = meta.dims.len();
    Field::from_fn(&meta.dims, |i, j, k| {
        let idx = [i, j, k];
        let mut pos = [0.5f64; 3];
        for a in 0..rank {
            pos[a] = cell_centre(meta.left_edge[a], meta.right_edge[a], meta.dims[a], idx[a]);
        }
        f(&pos)
    })
}

/// Half-size sub-box of `[left, right]` pushed toward the domain centre.
fn inner_box(left: &[f64], right: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut l = Vec::with_capacity(left.len());
    let mut r = Vec::with_capacity(left.len());
    for a in 0..left.len() {
        let width = (right[a] - left[a]) / 2.0;
        let mid = (left[a] + right[a]) / 2.0;
        if mid < 0.5 {
            l.push(right[a] - width);
            r.push(right[a]);
        } else if mid > 0.5 {
            l.push(left[a]);
            r.push(left[a] + width);
        } else {
            l.push(mid - width / 2.0);
            r.push(mid + width / 2.0);
        }
    }
    (l, r)
}

fn isolated_galaxy() -> Result<Dataset> {
    const ROOT_N: usize = 32;
    const CHILD_N: usize = 16;
    const EXTRA_LEVELS: u32 = 2;

    let mut b = DatasetBuilder::new(DEFAULT_SAMPLE).field_name("density");
    let density = |p: &[f64]| galaxy_density(p[0], p[1], p[2]);

    let root_meta = GridMeta::new(vec![0.0; 3], vec![1.0; 3], 0, vec![ROOT_N; 3]);
    let root_field = grid_field(&root_meta, density)?;
    let root = b.add_grid(None, root_meta, root_field)?;

    // Four level-1 quadrants over the disk, each refined toward the centre.
    for (qx, qy) in [(0.25, 0.25), (0.5, 0.25), (0.25, 0.5), (0.5, 0.5)] {
        let left = vec![qx, qy, 0.375];
        let right = vec![qx + 0.25, qy + 0.25, 0.625];
        let meta = GridMeta::new(left.clone(), right.clone(), 1, vec![CHILD_N; 3]);
        let field = grid_field(&meta, density)?;
        let mut parent: GridId = b.add_grid(Some(root), meta, field)?;

        let (mut l, mut r) = (left, right);
        for level in 2..2 + EXTRA_LEVELS {
            let (nl, nr) = inner_box(&l, &r);
            let meta = GridMeta::new(nl.clone(), nr.clone(), level, vec![CHILD_N; 3]);
            let field = grid_field(&meta, density)?;
            parent = b.add_grid(Some(parent), meta, field)?;
            l = nl;
            r = nr;
        }
    }

    b.build()
}

fn slab_2d() -> Result<Dataset> {
    let mut b = DatasetBuilder::new("Slab2D").field_name("temperature");
    let temperature = |p: &[f64]| {
        let (x, y) = (p[0], p[1]);
        300.0 + 50.0 * (6.0 * x).sin() * (4.0 * y).cos() + 20.0 * x
    };

    let a_meta = GridMeta::new(vec![0.0, 0.0], vec![1.0, 1.0], 0, vec![20, 20]);
    let a_field = grid_field(&a_meta, temperature)?;
    let a = b.add_grid(None, a_meta, a_field)?;

    for (x0, y0) in [(0.0, 0.0), (0.5, 0.5)] {
        let meta = GridMeta::new(vec![x0, y0], vec![x0 + 0.5, y0 + 0.5], 1, vec![20, 20]);
        let field = grid_field(&meta, temperature)?;
        b.add_grid(Some(a), meta, field)?;
    }

    let b_meta = GridMeta::new(vec![1.0, 0.0], vec![2.0, 1.0], 0, vec![8, 8]);
    let b_field = grid_field(&b_meta, temperature)?;
    b.add_grid(None, b_meta, b_field)?;

    b.build()
}
