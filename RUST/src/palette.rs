//! Palette lookup: scalar value + display range -> color.
//!
//! Ramps are fixed tables of sRGB stops, sampled with linear interpolation
//! between neighbouring stops. Every ramp is monotonic in luminance.

use std::fmt;
use std::str::FromStr;

use crate::error::{BrowseError, Result};

/// sRGB 8-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Rec. 709 relative luminance of the encoded values, in `0..=255`.
    pub fn luminance(self) -> f64 {
        0.2126 * self.r as f64 + 0.7152 * self.g as f64 + 0.0722 * self.b as f64
    }
}

/// Value window mapped onto the palette.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRange {
    pub min: f64,
    pub max: f64,
}

impl DisplayRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }

    /// Position of `value` in the range, clamped to `[0, 1]`.
    ///
    /// A degenerate range or a NaN sample gives 0.
    pub fn normalize(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        let t = (value - self.min) / (self.max - self.min);
        if t.is_nan() {
            return 0.0;
        }
        t.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaletteId {
    #[default]
    Arbre,
    Viridis,
    Magma,
    Gray,
}

type Stop = (f64, Rgb);

const ARBRE: &[Stop] = &[
    (0.0, Rgb::new(0, 0, 0)),
    (0.2, Rgb::new(28, 43, 104)),
    (0.4, Rgb::new(0, 118, 120)),
    (0.6, Rgb::new(92, 170, 60)),
    (0.8, Rgb::new(230, 220, 130)),
    (1.0, Rgb::new(255, 255, 255)),
];

const VIRIDIS: &[Stop] = &[
    (0.0, Rgb::new(68, 1, 84)),
    (1.0 / 9.0, Rgb::new(72, 40, 120)),
    (2.0 / 9.0, Rgb::new(62, 74, 137)),
    (3.0 / 9.0, Rgb::new(49, 104, 142)),
    (4.0 / 9.0, Rgb::new(38, 130, 142)),
    (5.0 / 9.0, Rgb::new(31, 158, 137)),
    (6.0 / 9.0, Rgb::new(53, 183, 121)),
    (7.0 / 9.0, Rgb::new(109, 205, 89)),
    (8.0 / 9.0, Rgb::new(180, 222, 44)),
    (1.0, Rgb::new(253, 231, 37)),
];

const MAGMA: &[Stop] = &[
    (0.0, Rgb::new(0, 0, 4)),
    (0.125, Rgb::new(28, 16, 68)),
    (0.25, Rgb::new(79, 18, 123)),
    (0.375, Rgb::new(129, 37, 129)),
    (0.5, Rgb::new(181, 54, 122)),
    (0.625, Rgb::new(229, 80, 100)),
    (0.75, Rgb::new(251, 135, 97)),
    (0.875, Rgb::new(254, 194, 135)),
    (1.0, Rgb::new(252, 253, 191)),
];

const GRAY: &[Stop] = &[(0.0, Rgb::new(0, 0, 0)), (1.0, Rgb::new(255, 255, 255))];

impl PaletteId {
    pub const ALL: [PaletteId; 4] = [
        PaletteId::Arbre,
        PaletteId::Viridis,
        PaletteId::Magma,
        PaletteId::Gray,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PaletteId::Arbre => "arbre",
            PaletteId::Viridis => "viridis",
            PaletteId::Magma => "magma",
            PaletteId::Gray => "gray",
        }
    }

    fn stops(self) -> &'static [Stop] {
        match self {
            PaletteId::Arbre => ARBRE,
            PaletteId::Viridis => VIRIDIS,
            PaletteId::Magma => MAGMA,
            PaletteId::Gray => GRAY,
        }
    }

    /// The palette after this one, wrapping around.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|&p| p == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    /// Color at normalized position `t` (clamped to `[0, 1]`, NaN -> 0).
    pub fn sample(self, t: f64) -> Rgb {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let stops = self.stops();
        let first = stops[0];
        if t <= first.0 {
            return first.1;
        }
        for pair in stops.windows(2) {
            let (t0, c0) = pair[0];
            let (t1, c1) = pair[1];
            if t <= t1 {
                let f = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
                return Rgb::new(lerp_u8(c0.r, c1.r, f), lerp_u8(c0.g, c1.g, f), lerp_u8(c0.b, c1.b, f));
            }
        }
        stops[stops.len() - 1].1
    }
}

fn lerp_u8(a: u8, b: u8, f: f64) -> u8 {
    let v = a as f64 + (b as f64 - a as f64) * f;
    v.round().clamp(0.0, 255.0) as u8
}

impl fmt::Display for PaletteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaletteId {
    type Err = BrowseError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == key || (key == "grey" && *p == PaletteId::Gray))
            .ok_or_else(|| BrowseError::UnknownPalette(s.to_string()))
    }
}

/// Map `value` through `palette` after normalizing it against `range`.
pub fn map(value: f64, range: DisplayRange, palette: PaletteId) -> Rgb {
    palette.sample(range.normalize(value))
}
