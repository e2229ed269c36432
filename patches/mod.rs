//! Image ⇄ patch-matrix conversion for patch-based denoising.
//!
//! An image is cut into overlapping rectangular patches, each flattened into one
//! row of an observation matrix. After the rows have been denoised they are
//! merged back: every pixel becomes the mean or median of all patch values that
//! cover it.

pub mod extract;
pub mod merge;
pub mod quality;

pub use extract::OverlappingPatches;
pub use quality::psnr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Patch geometry as read from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatchConfig {
    pub height: usize,
    pub width: usize,
    /// Three interleaved channels when set, a single channel otherwise.
    pub color: bool,
    /// Step between neighbouring patch origins, in pixels.
    pub shift: usize,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            height: 12,
            width: 12,
            color: false,
            shift: 1,
        }
    }
}

impl PatchConfig {
    pub fn channels(&self) -> usize {
        if self.color { 3 } else { 1 }
    }

    /// Length of one flattened patch.
    pub fn patch_dim(&self) -> usize {
        self.height * self.width * self.channels()
    }
}

/// How overlapping patch values are combined into one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    Mean,
    #[default]
    Median,
}

#[derive(Error, Debug, PartialEq)]
pub enum PatchError {
    #[error("Patch shape must be non-empty, got {rows}x{cols}.")]
    EmptyPatch { rows: usize, cols: usize },
    #[error("Patch shift must be at least 1.")]
    ZeroShift,
    #[error("Image of {image_rows}x{image_cols} pixels is smaller than the {patch_rows}x{patch_cols} patch.")]
    ImageTooSmall {
        image_rows: usize,
        image_cols: usize,
        patch_rows: usize,
        patch_cols: usize,
    },
    #[error("Image has {found} channels, but the patch layout expects {expected}.")]
    ChannelMismatch { found: usize, expected: usize },
    #[error("Image has shape {found:?}, but the patch layout was built for {expected:?}.")]
    ImageShapeMismatch {
        found: (usize, usize, usize),
        expected: (usize, usize, usize),
    },
    #[error("Patch matrix has shape {found:?}, but the layout produces {expected:?}.")]
    PatchMatrixMismatch {
        found: (usize, usize),
        expected: (usize, usize),
    },
    #[error("Cannot compare images of different shapes: {left:?} vs {right:?}.")]
    ShapeMismatch {
        left: Vec<usize>,
        right: Vec<usize>,
    },
    #[error("Cannot compute a quality metric over an empty image.")]
    EmptyImage,
}
