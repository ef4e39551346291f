use amrtui::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;

/// Adjacency-list index with made-up geometry. Lets tests build shapes
/// (cycles, very deep chains) a real dataset can't hold.
#[derive(Default)]
struct Adjacency {
    roots: Vec<usize>,
    children: HashMap<usize, Vec<usize>>,
    metas: HashMap<usize, GridMeta>,
    count: usize,
}

impl Adjacency {
    fn link(&mut self, parent: usize, child: usize) {
        self.children.entry(parent).or_default().push(child);
        self.count = self.count.max(parent + 1).max(child + 1);
    }
}

fn unit_meta(level: u32) -> GridMeta {
    GridMeta::new(vec![0.0; 3], vec![1.0; 3], level, vec![2, 2, 2])
}

impl SpatialIndex for Adjacency {
    fn roots(&self) -> Vec<GridId> {
        self.roots.iter().copied().map(GridId).collect()
    }

    fn children(&self, id: GridId) -> Result<Vec<GridId>> {
        Ok(self
            .children
            .get(&id.0)
            .map(|c| c.iter().copied().map(GridId).collect())
            .unwrap_or_default())
    }

    fn meta(&self, id: GridId) -> Result<GridMeta> {
        Ok(self.metas.get(&id.0).cloned().unwrap_or_else(|| unit_meta(0)))
    }

    fn field(&self, _id: GridId) -> Result<Arc<Field>> {
        Ok(Arc::new(Field::from_fn(&[2, 2, 2], |i, j, k| (i + j + k) as f64).unwrap()))
    }

    fn grid_count(&self) -> usize {
        self.count.max(self.roots.len())
    }
}

fn cube(dims: Vec<usize>, left: f64, right: f64, level: u32) -> (GridMeta, Field) {
    let meta = GridMeta::new(vec![left; 3], vec![right; 3], level, dims.clone());
    let field = Field::from_fn(&dims, |i, j, k| (i * 100 + j * 10 + k) as f64).unwrap();
    (meta, field)
}

/// Root A with children A1, A2; root B alone.
fn two_root_dataset() -> Dataset {
    let mut b = DatasetBuilder::new("two-roots");
    let (m, f) = cube(vec![4, 4, 4], 0.0, 1.0, 0);
    let a = b.add_grid(None, m, f).unwrap();
    let (m, f) = cube(vec![2, 2, 2], 0.0, 0.5, 1);
    b.add_grid(Some(a), m, f).unwrap();
    let (m, f) = cube(vec![3, 3, 3], 0.5, 1.0, 1);
    b.add_grid(Some(a), m, f).unwrap();
    let (m, f) = cube(vec![4, 4, 4], 1.0, 2.0, 0);
    b.add_grid(None, m, f).unwrap();
    b.build().unwrap()
}

fn random_dataset(rng: &mut StdRng, n: usize) -> Dataset {
    let mut b = DatasetBuilder::new("random");
    let mut ids: Vec<(GridId, u32)> = Vec::new();
    for _ in 0..n {
        let parent = if ids.is_empty() || rng.gen_bool(0.2) {
            None
        } else {
            Some(ids[rng.gen_range(0..ids.len())])
        };
        let level = parent.map(|(_, l)| l + 1).unwrap_or(0);
        let (m, f) = cube(vec![2, 2, 2], 0.0, 1.0, level);
        let id = b.add_grid(parent.map(|(p, _)| p), m, f).unwrap();
        ids.push((id, level));
    }
    b.build().unwrap()
}

#[test]
fn projects_two_roots_in_source_order() {
    let ds = two_root_dataset();
    let forest = project(&ds).unwrap();

    assert_eq!(forest.len(), 2);
    let a = &forest[0];
    assert_eq!(a.kind(), NodeKind::Expandable);
    assert_eq!(a.children.len(), 2);
    assert_eq!(a.children[0].backref, GridId(1));
    assert_eq!(a.children[1].backref, GridId(2));
    assert!(a.children.iter().all(|c| c.is_leaf()));
    assert_eq!(a.children[1].dims, vec![3, 3, 3]);

    let b = &forest[1];
    assert!(b.is_leaf());
    assert_eq!(b.label, "Grid_0004");
    assert_eq!(b.bounds.left, vec![1.0; 3]);
}

#[test]
fn random_forests_project_every_grid_once() {
    let mut rng = StdRng::seed_from_u64(0xA3C5);
    for _ in 0..25 {
        let n = rng.gen_range(1..60);
        let ds = random_dataset(&mut rng, n);
        let forest = project(&ds).unwrap();

        assert_eq!(forest.len(), ds.roots().len());
        let total: usize = forest.iter().map(|r| r.node_count()).sum();
        assert_eq!(total, ds.grid_count());

        for root in &forest {
            root.walk(&mut |node: &HierarchyNode| {
                let kids = ds.children(node.backref).unwrap();
                assert_eq!(node.is_leaf(), kids.is_empty());
                let projected: Vec<GridId> = node.children.iter().map(|c| c.backref).collect();
                assert_eq!(projected, kids);
                let meta = ds.meta(node.backref).unwrap();
                assert_eq!(node.level, meta.level);
                assert_eq!(node.dims, meta.dims);
            });
        }
    }
}

#[test]
fn projection_is_deterministic() {
    let ds = two_root_dataset();
    assert_eq!(project(&ds).unwrap(), project(&ds).unwrap());
}

#[test]
fn empty_index_projects_to_empty_forest() {
    let ds = DatasetBuilder::new("empty").build().unwrap();
    assert!(project(&ds).unwrap().is_empty());
}

#[test]
fn cycle_is_reported() {
    let mut idx = Adjacency::default();
    idx.roots = vec![0];
    idx.link(0, 1);
    idx.link(1, 2);
    idx.link(2, 1);

    let err = project(&idx).unwrap_err();
    match err {
        BrowseError::CyclicHierarchy { grid } => assert_eq!(grid, GridId(1)),
        other => panic!("expected CyclicHierarchy, got {other:?}"),
    }
}

#[test]
fn shared_child_under_two_parents_is_not_a_cycle() {
    let mut idx = Adjacency::default();
    idx.roots = vec![0];
    idx.link(0, 1);
    idx.link(0, 2);
    idx.link(1, 3);
    idx.link(2, 3);

    let forest = project(&idx).unwrap();
    assert_eq!(forest[0].node_count(), 5);
}

#[test]
fn deep_chain_respects_depth_limit() {
    let mut idx = Adjacency::default();
    idx.roots = vec![0];
    for i in 0..4 {
        idx.link(i, i + 1);
    }

    // Four levels below the root.
    let err = project_with(&idx, ProjectOptions { max_depth: 3 }).unwrap_err();
    assert!(matches!(err, BrowseError::HierarchyTooDeep { limit: 3 }));

    let forest = project_with(&idx, ProjectOptions { max_depth: 4 }).unwrap();
    assert_eq!(forest[0].node_count(), 5);
}

#[test]
fn very_deep_chain_does_not_overflow_the_stack() {
    let mut idx = Adjacency::default();
    idx.roots = vec![0];
    let depth = 2_000;
    for i in 0..depth {
        idx.link(i, i + 1);
    }

    let forest = project(&idx).unwrap();
    let mut deepest = 0usize;
    let mut node = &forest[0];
    while let Some(child) = node.children.first() {
        deepest += 1;
        node = child;
    }
    assert_eq!(deepest, depth);
}

#[test]
fn levels_are_copied_not_derived() {
    let mut idx = Adjacency::default();
    idx.roots = vec![0];
    idx.link(0, 1);
    idx.metas.insert(0, unit_meta(0));
    idx.metas.insert(1, unit_meta(3));

    let forest = project(&idx).unwrap();
    assert_eq!(forest[0].children[0].level, 3);
}

#[test]
fn child_outside_parent_bounds_still_projects() {
    let mut idx = Adjacency::default();
    idx.roots = vec![0];
    idx.link(0, 1);
    idx.metas.insert(0, unit_meta(0));
    idx.metas.insert(1, GridMeta::new(vec![0.5; 3], vec![1.5; 3], 1, vec![2, 2, 2]));

    let forest = project(&idx).unwrap();
    let child = &forest[0].children[0];
    assert!(!forest[0].bounds.contains(&child.bounds));
    assert_eq!(child.bounds.right, vec![1.5; 3]);
}

#[test]
fn builtin_samples_project() {
    let galaxy = load_sample("IsolatedGalaxy").unwrap();
    let forest = project(&galaxy).unwrap();
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].node_count(), 13);
    assert_eq!(forest[0].children.len(), 4);

    let slab = load_sample("slab2d").unwrap();
    let forest = project(&slab).unwrap();
    assert_eq!(forest.len(), 2);
    assert_eq!(forest[0].children.len(), 2);
    assert!(forest[1].is_leaf());
    assert_eq!(forest[1].dims, vec![8, 8]);
}

#[test]
fn unknown_sample_is_a_load_error() {
    let err = load_sample("NoSuchThing").unwrap_err();
    assert!(matches!(err, BrowseError::UnknownSample(_)));
    assert!(err.is_load_error());
}
