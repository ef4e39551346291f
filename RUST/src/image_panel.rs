//! False-color raster of the current slice.
//!
//! Inputs are [`Signal`]s; the display range and the rendered cell grid are
//! [`Memo`]s keyed by input versions. Writes only invalidate. The raster is
//! rebuilt in full on the first read after a write.

use std::rc::Rc;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::palette::{self, DisplayRange, PaletteId, Rgb};
use crate::reactive::{Memo, Signal};
use crate::slice::{padded_dims, Axis, Slice};

/// Full block, painted in the sample's color.
pub const BLOCK_GLYPH: char = '\u{2588}';

/// Initial slice coordinate; clamped once a grid is selected.
pub const DEFAULT_COORD: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCell {
    pub glyph: char,
    pub fg: Rgb,
}

type RangeKey = (u64, u64);
type RasterKey = (u64, u64, u64, u64, u64);

#[derive(Debug)]
pub struct ImagePanel {
    data: Signal<Option<Arc<Slice>>>,
    range_override: Signal<Option<DisplayRange>>,
    palette: Signal<PaletteId>,
    axis: Signal<Axis>,
    coord: Signal<usize>,
    extent: Signal<Option<[usize; 3]>>,

    range: Memo<RangeKey, DisplayRange>,
    raster: Memo<RasterKey, Vec<Vec<ImageCell>>>,
}

impl Default for ImagePanel {
    fn default() -> Self {
        Self::new(PaletteId::default(), Axis::Z, DEFAULT_COORD)
    }
}

impl ImagePanel {
    pub fn new(palette: PaletteId, axis: Axis, coord: usize) -> Self {
        Self {
            data: Signal::new(None),
            range_override: Signal::new(None),
            palette: Signal::new(palette),
            axis: Signal::new(axis),
            coord: Signal::new(coord),
            extent: Signal::new(None),
            range: Memo::new(),
            raster: Memo::new(),
        }
    }

    pub fn data(&self) -> Option<&Arc<Slice>> {
        self.data.get().as_ref()
    }

    pub fn set_data(&mut self, data: Option<Arc<Slice>>) {
        self.data.set(data);
    }

    pub fn palette(&self) -> PaletteId {
        *self.palette.get()
    }

    pub fn set_palette(&mut self, palette: PaletteId) {
        self.palette.set_if_changed(palette);
    }

    pub fn set_palette_by_name(&mut self, name: &str) -> Result<()> {
        let palette = name.parse::<PaletteId>()?;
        self.set_palette(palette);
        Ok(())
    }

    pub fn axis(&self) -> Axis {
        *self.axis.get()
    }

    /// Change the cut axis; `coord` is re-clamped against the new axis length.
    pub fn set_axis(&mut self, axis: Axis) {
        if self.axis.set_if_changed(axis) {
            self.reclamp();
        }
    }

    pub fn coord(&self) -> usize {
        *self.coord.get()
    }

    /// Set the slice coordinate, clamped into the current axis extent.
    pub fn set_coord(&mut self, coord: usize) {
        let clamped = self.clamp_coord(coord);
        self.coord.set_if_changed(clamped);
    }

    pub fn shift_coord(&mut self, delta: i64) {
        let cur = self.coord() as i64;
        let next = cur.saturating_add(delta).max(0);
        self.set_coord(usize::try_from(next).unwrap_or(usize::MAX));
    }

    /// Dims of the grid slices are cut from; `None` leaves `coord` unclamped.
    pub fn extent(&self) -> Option<[usize; 3]> {
        *self.extent.get()
    }

    pub fn set_extent(&mut self, dims: Option<&[usize]>) {
        let padded = dims.and_then(|d| padded_dims(d).ok());
        if self.extent.set_if_changed(padded) {
            self.reclamp();
        }
    }

    /// Length of the current axis, when the extent is known.
    pub fn axis_len(&self) -> Option<usize> {
        self.extent().map(|d| d[self.axis().index()])
    }

    fn clamp_coord(&self, coord: usize) -> usize {
        match self.axis_len() {
            Some(len) => coord.min(len.saturating_sub(1)),
            None => coord,
        }
    }

    fn reclamp(&mut self) {
        let clamped = self.clamp_coord(self.coord());
        self.coord.set_if_changed(clamped);
    }

    pub fn range_override(&self) -> Option<DisplayRange> {
        *self.range_override.get()
    }

    /// Pin the display range; `None` goes back to the slice's own min/max.
    pub fn set_range_override(&mut self, range: Option<DisplayRange>) {
        self.range_override.set(range);
    }

    /// Effective display range: the override, else min/max of the slice.
    pub fn range(&self) -> DisplayRange {
        let key = (self.data.version(), self.range_override.version());
        *self.range.get_or_compute(key, || {
            if let Some(r) = self.range_override() {
                return r;
            }
            match self.data() {
                Some(slice) => slice.range(),
                None => DisplayRange::new(0.0, 0.0),
            }
        })
    }

    /// Number of scanlines the current data renders to.
    pub fn rows(&self) -> usize {
        self.data().map(|s| s.rows()).unwrap_or(0)
    }

    fn raster_key(&self) -> RasterKey {
        (
            self.data.version(),
            self.range_override.version(),
            self.palette.version(),
            self.axis.version(),
            self.coord.version(),
        )
    }

    /// Full cell grid for the current state, rebuilt if any input moved.
    pub fn raster(&self) -> Rc<Vec<Vec<ImageCell>>> {
        self.raster.get_or_compute(self.raster_key(), || {
            let Some(slice) = self.data() else {
                return Vec::new();
            };
            let range = self.range();
            let palette = self.palette();
            debug!(
                rows = slice.rows(),
                cols = slice.cols(),
                palette = %palette,
                "recomputing raster"
            );
            (0..slice.rows())
                .map(|y| render_row(slice, y, range, palette))
                .collect()
        })
    }

    /// Cells of scanline `y`; empty when there is no data or `y` is past the last row.
    pub fn render_line(&self, y: usize) -> Vec<ImageCell> {
        if y >= self.rows() {
            return Vec::new();
        }
        self.raster().get(y).cloned().unwrap_or_default()
    }

    pub fn raster_computations(&self) -> u64 {
        self.raster.computations()
    }
}

fn render_row(slice: &Slice, y: usize, range: DisplayRange, palette: PaletteId) -> Vec<ImageCell> {
    let Some(row) = slice.row(y) else {
        return Vec::new();
    };
    row.iter()
        .map(|&v| ImageCell {
            glyph: BLOCK_GLYPH,
            fg: palette::map(v, range, palette),
        })
        .collect()
}
