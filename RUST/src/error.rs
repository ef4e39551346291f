use thiserror::Error;

use crate::dataset::GridId;

#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("format error: {0}")]
    Format(String),

    #[error("unsupported value: {0}")]
    Unsupported(String),

    #[error("unknown sample dataset `{0}`")]
    UnknownSample(String),

    #[error("header CRC mismatch: expected {expected}, got {got}")]
    HeaderCrcMismatch { expected: String, got: String },

    #[error("file size mismatch: expected {expected} bytes, got {got} bytes")]
    FileSizeMismatch { expected: u64, got: u64 },

    #[error("grid {0} not found")]
    GridNotFound(GridId),

    #[error("grid {grid} chunk out of bounds (offset {offset}, csize {csize}, payload_len {payload_len})")]
    ChunkOutOfBounds {
        grid: GridId,
        offset: u64,
        csize: u64,
        payload_len: u64,
    },

    #[error("failed to decompress grid {grid}: {message}")]
    DecompressionFailed { grid: GridId, message: String },

    #[error("grid {grid} decoded size mismatch: expected {expected} bytes, got {got} bytes")]
    ChunkSizeMismatch { grid: GridId, expected: u64, got: u64 },

    #[error("grid {grid} CRC mismatch: expected {expected:08X}, got {got:08X}")]
    ChunkCrcMismatch { grid: GridId, expected: u32, got: u32 },

    #[error("cyclic hierarchy: grid {grid} is its own ancestor")]
    CyclicHierarchy { grid: GridId },

    #[error("hierarchy deeper than {limit} levels below a root")]
    HierarchyTooDeep { limit: usize },

    #[error("axis {0} is not one of 0, 1, 2")]
    InvalidAxis(usize),

    #[error("coordinate {coord} out of range for axis {axis} (length {len})")]
    AxisOutOfRange { axis: usize, coord: usize, len: usize },

    #[error("unknown palette `{0}`")]
    UnknownPalette(String),
}

impl BrowseError {
    /// True for the failures that make a dataset unusable at load time.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Utf8(_)
                | Self::Json(_)
                | Self::Format(_)
                | Self::Unsupported(_)
                | Self::UnknownSample(_)
                | Self::HeaderCrcMismatch { .. }
                | Self::FileSizeMismatch { .. }
                | Self::ChunkOutOfBounds { .. }
                | Self::DecompressionFailed { .. }
                | Self::ChunkSizeMismatch { .. }
                | Self::ChunkCrcMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BrowseError>;
