//! Top-level composition: owns the dataset, the navigation tree, the
//! selection and both panels, and keeps them consistent between draws.

use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::dataset::{GridId, SpatialIndex};
use crate::details::GridDetailsPanel;
use crate::error::Result;
use crate::hierarchy::{project_with, HierarchyNode, ProjectOptions, MAX_DEPTH};
use crate::image_panel::{ImagePanel, DEFAULT_COORD};
use crate::palette::PaletteId;
use crate::selection::SelectionModel;
use crate::slice::{self, Axis, Field, Slice};
use crate::tree_view::TreeView;

pub type Forest = Vec<Arc<HierarchyNode>>;

const PAGE_ROWS: i32 = 10;
const COORD_PAGE: i64 = 10;

/// Startup configuration for the browser.
#[derive(Debug, Clone)]
pub struct ShellSettings {
    pub palette: PaletteId,
    pub axis: Axis,
    pub coord: usize,
    pub max_depth: usize,
    /// Number of decoded grid fields kept around; 0 disables caching.
    pub field_cache: usize,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            palette: PaletteId::default(),
            axis: Axis::Z,
            coord: DEFAULT_COORD,
            max_depth: MAX_DEPTH,
            field_cache: 16,
        }
    }
}

/// User intents, independent of the terminal backend's key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Expand,
    Collapse,
    SetAxis(Axis),
    CoordStep(i64),
    CoordPage(i64),
    NextPalette,
    LockRange,
    UnlockRange,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPhase {
    Projecting,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SliceKey {
    grid: GridId,
    axis: Axis,
    coord: usize,
}

/// Most-recently-used decoded fields.
#[derive(Debug)]
struct FieldCache {
    capacity: usize,
    entries: VecDeque<(GridId, Arc<Field>)>,
}

impl FieldCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    fn get_or_load(&mut self, index: &dyn SpatialIndex, id: GridId) -> Result<Arc<Field>> {
        if let Some(pos) = self.entries.iter().position(|(g, _)| *g == id) {
            if let Some(entry) = self.entries.remove(pos) {
                let field = Arc::clone(&entry.1);
                self.entries.push_front(entry);
                return Ok(field);
            }
        }
        let field = index.field(id)?;
        if self.capacity > 0 {
            self.entries.push_front((id, Arc::clone(&field)));
            self.entries.truncate(self.capacity);
        }
        Ok(field)
    }
}

pub struct BrowserShell {
    index: Arc<dyn SpatialIndex + Send + Sync>,
    title: String,
    phase: LoadPhase,
    pending: Option<Receiver<Result<Forest>>>,
    tree: TreeView,
    selection: SelectionModel,
    details: GridDetailsPanel,
    image: ImagePanel,
    fields: FieldCache,
    seen_selection: Option<u64>,
    slice_key: Option<SliceKey>,
    status: Option<String>,
    quit: bool,
}

impl BrowserShell {
    fn empty(index: Arc<dyn SpatialIndex + Send + Sync>, title: String, settings: &ShellSettings) -> Self {
        Self {
            index,
            title,
            phase: LoadPhase::Projecting,
            pending: None,
            tree: TreeView::default(),
            selection: SelectionModel::new(),
            details: GridDetailsPanel::new(),
            image: ImagePanel::new(settings.palette, settings.axis, settings.coord),
            fields: FieldCache::new(settings.field_cache),
            seen_selection: None,
            slice_key: None,
            status: None,
            quit: false,
        }
    }

    /// Start projecting `index` on a worker thread. The tree appears on the
    /// first [`refresh`](Self::refresh) after the worker finishes.
    pub fn spawn(
        index: Arc<dyn SpatialIndex + Send + Sync>,
        title: impl Into<String>,
        settings: ShellSettings,
    ) -> Result<Self> {
        let mut shell = Self::empty(Arc::clone(&index), title.into(), &settings);
        let (tx, rx) = mpsc::channel();
        let opts = ProjectOptions {
            max_depth: settings.max_depth,
        };
        thread::Builder::new()
            .name("amrtui-project".to_string())
            .spawn(move || {
                // The receiver may be gone if the shell was dropped first.
                let _ = tx.send(project_with(index.as_ref(), opts));
            })?;
        shell.pending = Some(rx);
        Ok(shell)
    }

    /// Build a shell around an already projected forest.
    pub fn with_forest(
        index: Arc<dyn SpatialIndex + Send + Sync>,
        title: impl Into<String>,
        forest: Forest,
        settings: ShellSettings,
    ) -> Self {
        let mut shell = Self::empty(index, title.into(), &settings);
        shell.install_forest(forest);
        shell
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn phase(&self) -> &LoadPhase {
        &self.phase
    }

    pub fn tree(&self) -> &TreeView {
        &self.tree
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    pub fn image(&self) -> &ImagePanel {
        &self.image
    }

    pub fn details_lines(&self) -> Rc<Vec<String>> {
        self.details.lines(&self.selection)
    }

    pub fn details(&self) -> &GridDetailsPanel {
        &self.details
    }

    pub fn field_name(&self) -> &str {
        self.index.field_name()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Block until the projection worker reports back or `timeout` passes.
    pub fn wait_for_tree(&mut self, timeout: Duration) -> bool {
        if let Some(rx) = self.pending.take() {
            match rx.recv_timeout(timeout) {
                Ok(result) => self.finish_projection(result),
                Err(RecvTimeoutError::Timeout) => self.pending = Some(rx),
                Err(RecvTimeoutError::Disconnected) => {
                    self.phase = LoadPhase::Failed("projection worker exited".to_string());
                }
            }
        }
        self.phase != LoadPhase::Projecting
    }

    fn poll_loader(&mut self) {
        let Some(rx) = self.pending.take() else { return };
        match rx.try_recv() {
            Ok(result) => self.finish_projection(result),
            Err(TryRecvError::Empty) => self.pending = Some(rx),
            Err(TryRecvError::Disconnected) => {
                error!("projection worker exited without a result");
                self.phase = LoadPhase::Failed("projection worker exited".to_string());
            }
        }
    }

    fn finish_projection(&mut self, result: Result<Forest>) {
        match result {
            Ok(forest) => self.install_forest(forest),
            Err(e) => {
                error!(error = %e, "hierarchy projection failed");
                self.phase = LoadPhase::Failed(e.to_string());
            }
        }
    }

    fn install_forest(&mut self, forest: Forest) {
        info!(roots = forest.len(), "hierarchy ready");
        self.tree = TreeView::new(forest);
        self.phase = LoadPhase::Ready;
        if let Some(node) = self.tree.highlighted() {
            self.selection.highlight(node);
        }
    }

    /// Bring derived state up to date; call before every draw.
    pub fn refresh(&mut self) {
        self.poll_loader();
        self.sync_selection();
    }

    fn sync_selection(&mut self) {
        let version = self.selection.version();
        if self.seen_selection != Some(version) {
            self.seen_selection = Some(version);
            let dims = self.selection.current().map(|n| n.dims.clone());
            self.image.set_extent(dims.as_deref());
        }

        let Some(node) = self.selection.current().cloned() else {
            if self.slice_key.take().is_some() {
                self.image.set_data(None);
            }
            return;
        };

        let key = SliceKey {
            grid: node.backref,
            axis: self.image.axis(),
            coord: self.image.coord(),
        };
        if self.slice_key == Some(key) {
            return;
        }
        self.slice_key = Some(key);

        match self.extract(key) {
            Ok(slice) => {
                self.image.set_data(Some(Arc::new(slice)));
                self.status = None;
            }
            Err(e) => {
                error!(grid = %key.grid, axis = %key.axis, coord = key.coord, error = %e, "slice extraction failed");
                self.image.set_data(None);
                self.status = Some(format!("slice of grid {} failed: {}", key.grid, e));
            }
        }
    }

    fn extract(&mut self, key: SliceKey) -> Result<Slice> {
        let field = self.fields.get_or_load(self.index.as_ref(), key.grid)?;
        debug!(grid = %key.grid, axis = %key.axis, coord = key.coord, "extracting slice");
        slice::extract(&field, key.axis, key.coord)
    }

    fn highlight(&mut self, node: Option<Arc<HierarchyNode>>) {
        if let Some(node) = node {
            self.selection.highlight(node);
        }
    }

    pub fn handle(&mut self, action: Action) {
        match action {
            Action::Up => {
                let n = self.tree.move_sel(-1);
                self.highlight(n);
            }
            Action::Down => {
                let n = self.tree.move_sel(1);
                self.highlight(n);
            }
            Action::PageUp => {
                let n = self.tree.move_sel(-PAGE_ROWS);
                self.highlight(n);
            }
            Action::PageDown => {
                let n = self.tree.move_sel(PAGE_ROWS);
                self.highlight(n);
            }
            Action::Home => {
                let n = self.tree.select_first();
                self.highlight(n);
            }
            Action::End => {
                let n = self.tree.select_last();
                self.highlight(n);
            }
            Action::Expand => self.tree.toggle_expand_selected(true),
            Action::Collapse => self.tree.toggle_expand_selected(false),
            Action::SetAxis(axis) => self.image.set_axis(axis),
            Action::CoordStep(delta) => self.image.shift_coord(delta),
            Action::CoordPage(pages) => self.image.shift_coord(pages.saturating_mul(COORD_PAGE)),
            Action::NextPalette => {
                let next = self.image.palette().next();
                self.image.set_palette(next);
            }
            Action::LockRange => {
                let range = self.image.range();
                self.image.set_range_override(Some(range));
            }
            Action::UnlockRange => self.image.set_range_override(None),
            Action::Quit => self.quit = true,
        }
    }

    /// Highlight `node` directly, as a tree widget's highlight event would.
    pub fn on_highlight(&mut self, node: Arc<HierarchyNode>) {
        self.selection.highlight(node);
    }
}
