//! Data access: the spatial index the browser walks, and the concrete
//! grid-arena dataset behind it.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::codec::{self, ReadOptions};
use crate::error::{BrowseError, Result};
use crate::header::GridEntry;
use crate::sample;
use crate::slice::{self, Axis, Field, Slice};

/// Non-owning handle to a grid inside a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridId(pub usize);

impl fmt::Display for GridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Geometry and resolution of one grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridMeta {
    pub left_edge: Vec<f64>,
    pub right_edge: Vec<f64>,
    pub level: u32,
    pub dims: Vec<usize>,
}

impl GridMeta {
    pub fn new(left_edge: Vec<f64>, right_edge: Vec<f64>, level: u32, dims: Vec<usize>) -> Self {
        Self {
            left_edge,
            right_edge,
            level,
            dims,
        }
    }

    /// Physical width of one cell along each axis.
    pub fn cell_width(&self) -> Vec<f64> {
        self.left_edge
            .iter()
            .zip(&self.right_edge)
            .zip(&self.dims)
            .map(|((l, r), &n)| if n == 0 { 0.0 } else { (r - l) / n as f64 })
            .collect()
    }
}

/// Read-only view of a multi-resolution grid hierarchy.
pub trait SpatialIndex {
    /// Grids without a parent, coarsest first by convention.
    fn roots(&self) -> Vec<GridId>;

    fn children(&self, id: GridId) -> Result<Vec<GridId>>;

    fn meta(&self, id: GridId) -> Result<GridMeta>;

    fn label(&self, id: GridId) -> Result<String> {
        Ok(format!("Grid_{:04}", id.0 + 1))
    }

    /// Full scalar field of a grid.
    fn field(&self, id: GridId) -> Result<Arc<Field>>;

    fn sample(&self, id: GridId, axis: Axis, coord: usize) -> Result<Slice> {
        let field = self.field(id)?;
        slice::extract(&field, axis, coord)
    }

    fn grid_count(&self) -> usize;

    fn field_name(&self) -> &str {
        "field"
    }
}

#[derive(Debug, Clone)]
pub(crate) enum FieldStore {
    Memory(Arc<Field>),
    Chunk(GridEntry),
}

#[derive(Debug, Clone)]
pub(crate) struct GridRecord {
    pub(crate) meta: GridMeta,
    pub(crate) parent: Option<GridId>,
    pub(crate) children: Vec<GridId>,
    pub(crate) store: FieldStore,
}

/// Container file the chunked fields are decoded from.
#[derive(Debug, Clone)]
pub(crate) struct Backing {
    pub(crate) path: PathBuf,
    pub(crate) payload_start: u64,
    pub(crate) opts: ReadOptions,
}

/// Arena of grids addressed by [`GridId`].
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    field_name: String,
    grids: Vec<GridRecord>,
    roots: Vec<GridId>,
    backing: Option<Backing>,
}

impl Dataset {
    /// Assemble a dataset from records whose `children` are still empty.
    pub(crate) fn from_records(
        name: String,
        field_name: String,
        mut grids: Vec<GridRecord>,
        backing: Option<Backing>,
    ) -> Result<Self> {
        let n = grids.len();
        let mut roots = Vec::new();
        for i in 0..n {
            let parent = grids[i].parent;
            match parent {
                None => roots.push(GridId(i)),
                Some(p) if p.0 >= n => {
                    return Err(BrowseError::Format(format!(
                        "grid {} has unknown parent {}",
                        i, p
                    )))
                }
                Some(p) if p.0 == i => {
                    return Err(BrowseError::Format(format!("grid {} is its own parent", i)))
                }
                Some(p) => grids[p.0].children.push(GridId(i)),
            }
        }
        // Parent links that loop back on themselves leave grids unreachable.
        let mut reached = vec![false; n];
        let mut stack = roots.clone();
        while let Some(id) = stack.pop() {
            reached[id.0] = true;
            stack.extend(grids[id.0].children.iter().copied());
        }
        if let Some(i) = reached.iter().position(|r| !r) {
            return Err(BrowseError::CyclicHierarchy { grid: GridId(i) });
        }
        Ok(Self {
            name,
            field_name,
            grids,
            roots,
            backing,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self, id: GridId) -> Result<Option<GridId>> {
        Ok(self.record(id)?.parent)
    }

    pub fn is_file_backed(&self) -> bool {
        self.backing.is_some()
    }

    pub fn grid_ids(&self) -> impl Iterator<Item = GridId> + '_ {
        (0..self.grids.len()).map(GridId)
    }

    pub(crate) fn record(&self, id: GridId) -> Result<&GridRecord> {
        self.grids.get(id.0).ok_or(BrowseError::GridNotFound(id))
    }
}

impl SpatialIndex for Dataset {
    fn roots(&self) -> Vec<GridId> {
        self.roots.clone()
    }

    fn children(&self, id: GridId) -> Result<Vec<GridId>> {
        Ok(self.record(id)?.children.clone())
    }

    fn meta(&self, id: GridId) -> Result<GridMeta> {
        Ok(self.record(id)?.meta.clone())
    }

    fn field(&self, id: GridId) -> Result<Arc<Field>> {
        let rec = self.record(id)?;
        match &rec.store {
            FieldStore::Memory(f) => Ok(Arc::clone(f)),
            FieldStore::Chunk(entry) => {
                let backing = self.backing.as_ref().ok_or_else(|| {
                    BrowseError::Format(format!("grid {} is chunked but dataset has no file", id))
                })?;
                let field = codec::read_grid_field(backing, entry, &rec.meta)?;
                Ok(Arc::new(field))
            }
        }
    }

    fn grid_count(&self) -> usize {
        self.grids.len()
    }

    fn field_name(&self) -> &str {
        &self.field_name
    }
}

/// Incremental in-memory dataset construction. Parents must be added before
/// their children, so the result is always a forest.
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    name: String,
    field_name: String,
    grids: Vec<GridRecord>,
}

impl DatasetBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_name: "density".to_string(),
            grids: Vec::new(),
        }
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    pub fn add_grid(&mut self, parent: Option<GridId>, meta: GridMeta, field: Field) -> Result<GridId> {
        if let Some(p) = parent {
            if p.0 >= self.grids.len() {
                return Err(BrowseError::GridNotFound(p));
            }
        }
        if slice::padded_dims(&meta.dims)? != field.dims() {
            return Err(BrowseError::Format(format!(
                "grid dims {:?} do not match field dims {:?}",
                meta.dims,
                field.dims()
            )));
        }
        let id = GridId(self.grids.len());
        self.grids.push(GridRecord {
            meta,
            parent,
            children: Vec::new(),
            store: FieldStore::Memory(Arc::new(field)),
        });
        Ok(id)
    }

    pub fn build(self) -> Result<Dataset> {
        Dataset::from_records(self.name, self.field_name, self.grids, None)
    }
}

/// Where a dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    Sample(String),
    Path(PathBuf),
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::Sample(name) => write!(f, "sample:{}", name),
            DatasetSource::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Load a dataset by sample name or container path.
pub fn load(source: &DatasetSource, opts: ReadOptions) -> Result<Dataset> {
    let ds = match source {
        DatasetSource::Sample(name) => sample::load_sample(name)?,
        DatasetSource::Path(path) => codec::open_dataset(path, opts)?,
    };
    info!(
        source = %source,
        grids = ds.grid_count(),
        roots = ds.roots.len(),
        "dataset loaded"
    );
    Ok(ds)
}
