mod codec;
mod dataset;
mod details;
mod error;
mod header;
mod hierarchy;
mod image_panel;
mod palette;
mod reactive;
mod sample;
mod selection;
mod shell;
mod slice;
mod tree_view;
pub mod ui;

pub use crate::codec::{open_dataset, read_header_only, write_dataset, CompressionMode, ReadOptions, WriteOptions};
pub use crate::dataset::{load, Dataset, DatasetBuilder, DatasetSource, GridId, GridMeta, SpatialIndex};
pub use crate::details::GridDetailsPanel;
pub use crate::error::{BrowseError, Result};
pub use crate::header::{GridEntry, Header, MAGIC_BYTES, VERSION};
pub use crate::hierarchy::{project, project_with, Bounds, HierarchyNode, NodeKind, ProjectOptions, MAX_DEPTH};
pub use crate::image_panel::{ImageCell, ImagePanel, BLOCK_GLYPH, DEFAULT_COORD};
pub use crate::palette::{map, DisplayRange, PaletteId, Rgb};
pub use crate::reactive::{Memo, Signal};
pub use crate::sample::{load_sample, DEFAULT_SAMPLE, SAMPLE_NAMES};
pub use crate::selection::SelectionModel;
pub use crate::shell::{Action, BrowserShell, Forest, LoadPhase, ShellSettings};
pub use crate::slice::{extract, padded_dims, Axis, Field, Slice};
pub use crate::tree_view::{FlatRow, TreeView};
