use amrtui::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn grid(b: &mut DatasetBuilder, parent: Option<GridId>, dims: &[usize], level: u32) -> GridId {
    let rank = dims.len();
    let meta = GridMeta::new(vec![0.0; rank], vec![1.0; rank], level, dims.to_vec());
    let field = Field::from_fn(dims, |i, j, k| (i + 2 * j + 3 * k) as f64).unwrap();
    b.add_grid(parent, meta, field).unwrap()
}

/// Root 20^3 with a single 5^3 child.
fn coarse_and_fine() -> Dataset {
    let mut b = DatasetBuilder::new("coarse-fine");
    let root = grid(&mut b, None, &[20, 20, 20], 0);
    grid(&mut b, Some(root), &[5, 5, 5], 1);
    b.build().unwrap()
}

/// Delegates to a dataset, counting field reads and failing for one grid.
struct Flaky {
    inner: Dataset,
    broken: Option<GridId>,
    reads: AtomicUsize,
}

impl Flaky {
    fn new(inner: Dataset, broken: Option<GridId>) -> Self {
        Self {
            inner,
            broken,
            reads: AtomicUsize::new(0),
        }
    }
}

impl SpatialIndex for Flaky {
    fn roots(&self) -> Vec<GridId> {
        self.inner.roots()
    }

    fn children(&self, id: GridId) -> Result<Vec<GridId>> {
        self.inner.children(id)
    }

    fn meta(&self, id: GridId) -> Result<GridMeta> {
        self.inner.meta(id)
    }

    fn field(&self, id: GridId) -> Result<Arc<Field>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.broken == Some(id) {
            return Err(BrowseError::ChunkCrcMismatch {
                grid: id,
                expected: 1,
                got: 2,
            });
        }
        self.inner.field(id)
    }

    fn grid_count(&self) -> usize {
        self.inner.grid_count()
    }
}

fn ready_shell(ds: Dataset, settings: ShellSettings) -> BrowserShell {
    let forest = project(&ds).unwrap();
    let mut shell = BrowserShell::with_forest(Arc::new(ds), "test", forest, settings);
    shell.refresh();
    shell
}

#[test]
fn first_grid_is_selected_and_sliced() {
    let shell = ready_shell(load_sample("Slab2D").unwrap(), ShellSettings::default());

    assert_eq!(*shell.phase(), LoadPhase::Ready);
    assert_eq!(shell.field_name(), "temperature");
    let current = shell.selection().current().unwrap();
    assert_eq!(current.backref, GridId(0));

    // 2-D grid: the z extent is 1, so the default coordinate clamps to 0.
    assert_eq!(shell.image().coord(), 0);
    assert_eq!(shell.image().data().unwrap().shape(), [20, 20]);
    assert!(shell.status().is_none());

    let details = shell.details_lines();
    assert!(details.contains(&"Left Edge = [0.000000, 0.000000]".to_string()));
    assert!(details.contains(&"Active Dimensions = [20 x 20]".to_string()));
    assert!(details.contains(&"Cells = 400".to_string()));
    assert!(details.contains(&"Children = 2".to_string()));
}

#[test]
fn coord_follows_the_selected_grid() {
    let settings = ShellSettings {
        coord: 15,
        ..ShellSettings::default()
    };
    let mut shell = ready_shell(coarse_and_fine(), settings);
    assert_eq!(shell.image().coord(), 15);
    assert_eq!(shell.image().data().unwrap().shape(), [20, 20]);

    shell.handle(Action::Down);
    shell.refresh();
    assert_eq!(shell.selection().current().unwrap().backref, GridId(1));
    assert_eq!(shell.image().coord(), 4);
    assert_eq!(shell.image().data().unwrap().shape(), [5, 5]);
}

#[test]
fn axis_and_coord_actions_reslice() {
    let mut shell = ready_shell(coarse_and_fine(), ShellSettings::default());
    let before = shell.image().data().cloned().unwrap();

    shell.handle(Action::SetAxis(Axis::X));
    shell.handle(Action::CoordStep(-1));
    shell.refresh();
    assert_eq!(shell.image().axis(), Axis::X);
    assert_eq!(shell.image().coord(), 15);
    let after = shell.image().data().cloned().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));

    shell.handle(Action::CoordPage(10));
    shell.refresh();
    assert_eq!(shell.image().coord(), 19);
}

#[test]
fn details_recompute_once_per_selection_change() {
    let mut shell = ready_shell(coarse_and_fine(), ShellSettings::default());
    shell.details_lines();
    shell.details_lines();
    let n = shell.details().computations();

    shell.handle(Action::Down);
    shell.details_lines();
    shell.details_lines();
    assert_eq!(shell.details().computations(), n + 1);
    assert!(shell.details_lines().contains(&"Level = 1".to_string()));
}

#[test]
fn failing_field_leaves_an_empty_image_and_a_status() {
    let index = Flaky::new(coarse_and_fine(), Some(GridId(1)));
    let forest = project(&index).unwrap();
    let mut shell = BrowserShell::with_forest(Arc::new(index), "flaky", forest, ShellSettings::default());
    shell.refresh();
    assert!(shell.image().data().is_some());

    shell.handle(Action::Down);
    shell.refresh();
    assert!(shell.image().data().is_none());
    assert!(shell.image().render_line(0).is_empty());
    let status = shell.status().unwrap();
    assert!(status.contains("grid 1"), "{status}");

    // The browser keeps working once a healthy grid is selected again.
    shell.handle(Action::Up);
    shell.refresh();
    assert!(shell.image().data().is_some());
    assert!(shell.status().is_none());
}

#[test]
fn fields_are_cached_between_selections() {
    let index = Arc::new(Flaky::new(coarse_and_fine(), None));
    let forest = project(index.as_ref()).unwrap();
    let mut shell = BrowserShell::with_forest(index.clone(), "cached", forest, ShellSettings::default());

    for _ in 0..3 {
        shell.refresh();
        shell.handle(Action::Down);
        shell.refresh();
        shell.handle(Action::Up);
    }
    assert_eq!(index.reads.load(Ordering::SeqCst), 2);
}

#[test]
fn zero_field_cache_reads_every_time() {
    let index = Arc::new(Flaky::new(coarse_and_fine(), None));
    let forest = project(index.as_ref()).unwrap();
    let settings = ShellSettings {
        field_cache: 0,
        ..ShellSettings::default()
    };
    let mut shell = BrowserShell::with_forest(index.clone(), "uncached", forest, settings);

    for _ in 0..3 {
        shell.refresh();
        shell.handle(Action::Down);
        shell.refresh();
        shell.handle(Action::Up);
    }
    assert_eq!(index.reads.load(Ordering::SeqCst), 6);
}

#[test]
fn refresh_without_changes_does_not_reslice() {
    let index = Arc::new(Flaky::new(coarse_and_fine(), None));
    let forest = project(index.as_ref()).unwrap();
    let settings = ShellSettings {
        field_cache: 0,
        ..ShellSettings::default()
    };
    let mut shell = BrowserShell::with_forest(index.clone(), "idle", forest, settings);
    for _ in 0..5 {
        shell.refresh();
    }
    assert_eq!(index.reads.load(Ordering::SeqCst), 1);
}

#[test]
fn background_projection_delivers_the_tree() {
    let ds = load_sample("IsolatedGalaxy").unwrap();
    let mut shell = BrowserShell::spawn(Arc::new(ds), "galaxy", ShellSettings::default()).unwrap();

    assert!(shell.wait_for_tree(Duration::from_secs(10)));
    assert_eq!(*shell.phase(), LoadPhase::Ready);
    shell.refresh();

    // Root expanded, its four children collapsed.
    assert_eq!(shell.tree().rows().len(), 5);
    assert_eq!(shell.image().coord(), 16);
    assert_eq!(shell.image().data().unwrap().shape(), [32, 32]);
}

struct Cyclic;

impl SpatialIndex for Cyclic {
    fn roots(&self) -> Vec<GridId> {
        vec![GridId(0)]
    }

    fn children(&self, id: GridId) -> Result<Vec<GridId>> {
        Ok(vec![GridId(1 - id.0)])
    }

    fn meta(&self, _id: GridId) -> Result<GridMeta> {
        Ok(GridMeta::new(vec![0.0; 3], vec![1.0; 3], 0, vec![1, 1, 1]))
    }

    fn field(&self, _id: GridId) -> Result<Arc<Field>> {
        Ok(Arc::new(Field::new(&[1, 1, 1], vec![0.0]).unwrap()))
    }

    fn grid_count(&self) -> usize {
        2
    }
}

#[test]
fn failed_projection_is_reported() {
    let mut shell = BrowserShell::spawn(Arc::new(Cyclic), "cyclic", ShellSettings::default()).unwrap();
    assert!(shell.wait_for_tree(Duration::from_secs(10)));
    match shell.phase() {
        LoadPhase::Failed(msg) => assert!(msg.contains("cyclic"), "{msg}"),
        other => panic!("expected Failed, got {other:?}"),
    }
    shell.refresh();
    assert!(shell.tree().rows().is_empty());
    assert!(shell.selection().current().is_none());
    assert_eq!(shell.details_lines()[0], "No grid selected.");
}

#[test]
fn navigation_actions() {
    let mut shell = ready_shell(load_sample("IsolatedGalaxy").unwrap(), ShellSettings::default());
    assert_eq!(shell.tree().rows().len(), 5);

    shell.handle(Action::Down);
    shell.handle(Action::Expand);
    assert_eq!(shell.tree().rows().len(), 6);
    shell.handle(Action::Collapse);
    assert_eq!(shell.tree().rows().len(), 5);

    shell.handle(Action::End);
    assert_eq!(shell.tree().selected(), 4);
    assert_eq!(shell.selection().current().unwrap().backref, GridId(10));

    shell.handle(Action::PageDown);
    assert_eq!(shell.tree().selected(), 4);
    shell.handle(Action::Home);
    assert_eq!(shell.selection().current().unwrap().backref, GridId(0));

    // Collapsing the root hides everything below it.
    shell.handle(Action::Collapse);
    assert_eq!(shell.tree().rows().len(), 1);
    shell.handle(Action::Down);
    assert_eq!(shell.tree().selected(), 0);
}

#[test]
fn palette_and_range_actions() {
    let mut shell = ready_shell(coarse_and_fine(), ShellSettings::default());
    assert_eq!(shell.image().palette(), PaletteId::Arbre);
    shell.handle(Action::NextPalette);
    assert_eq!(shell.image().palette(), PaletteId::Viridis);

    let range = shell.image().range();
    shell.handle(Action::LockRange);
    assert_eq!(shell.image().range_override(), Some(range));

    shell.handle(Action::Down);
    shell.refresh();
    assert_eq!(shell.image().range(), range);

    shell.handle(Action::UnlockRange);
    assert!(shell.image().range_override().is_none());
    assert_ne!(shell.image().range(), range);

    assert!(!shell.should_quit());
    shell.handle(Action::Quit);
    assert!(shell.should_quit());
}

#[test]
fn draws_into_a_test_backend() {
    use ratatui::{backend::TestBackend, Terminal};

    let shell = ready_shell(load_sample("Slab2D").unwrap(), ShellSettings::default());
    let mut term = Terminal::new(TestBackend::new(100, 30)).unwrap();
    term.draw(|f| ui::draw(f, &shell)).unwrap();

    let text: String = term
        .backend()
        .buffer()
        .content
        .iter()
        .map(|c| c.symbol())
        .collect();
    assert!(text.contains("Grid_0001"));
    assert!(text.contains("Grid_0004"));
    assert!(text.contains("Level = 0"));
    assert!(text.contains("temperature"));
    assert!(text.contains(BLOCK_GLYPH));
}
