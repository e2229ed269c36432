use super::{PatchConfig, PatchError};
use ndarray::{Array2, ArrayView3, Axis, s};
use rayon::prelude::*;

/// The layout of all overlapping patches over an image of a fixed shape.
///
/// Patch origins advance by `shift` pixels along both axes, and the last origin
/// on each axis is always flush with the image border so every pixel is
/// covered. Patches are numbered row-major by origin; within a patch, values
/// are laid out row-major with channels innermost, which is also the order of
/// the columns of the patch matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlappingPatches {
    image_shape: (usize, usize, usize),
    patch_shape: (usize, usize),
    row_origins: Vec<usize>,
    col_origins: Vec<usize>,
}

impl OverlappingPatches {
    pub fn new(
        image_shape: (usize, usize, usize),
        patch_shape: (usize, usize),
        shift: usize,
    ) -> Result<Self, PatchError> {
        let (image_rows, image_cols, channels) = image_shape;
        let (patch_rows, patch_cols) = patch_shape;
        if patch_rows == 0 || patch_cols == 0 {
            return Err(PatchError::EmptyPatch {
                rows: patch_rows,
                cols: patch_cols,
            });
        }
        if shift == 0 {
            return Err(PatchError::ZeroShift);
        }
        if patch_rows > image_rows || patch_cols > image_cols {
            return Err(PatchError::ImageTooSmall {
                image_rows,
                image_cols,
                patch_rows,
                patch_cols,
            });
        }
        if channels == 0 {
            return Err(PatchError::ChannelMismatch {
                found: 0,
                expected: 1,
            });
        }
        Ok(Self {
            image_shape,
            patch_shape,
            row_origins: origins(image_rows, patch_rows, shift),
            col_origins: origins(image_cols, patch_cols, shift),
        })
    }

    /// Builds the layout from configuration, checking the image's channel count
    /// against the configured colour mode.
    pub fn from_config(
        image_shape: (usize, usize, usize),
        config: &PatchConfig,
    ) -> Result<Self, PatchError> {
        if image_shape.2 != config.channels() {
            return Err(PatchError::ChannelMismatch {
                found: image_shape.2,
                expected: config.channels(),
            });
        }
        Self::new(image_shape, (config.height, config.width), config.shift)
    }

    pub fn image_shape(&self) -> (usize, usize, usize) {
        self.image_shape
    }

    pub fn patch_shape(&self) -> (usize, usize) {
        self.patch_shape
    }

    pub fn n_patches(&self) -> usize {
        self.row_origins.len() * self.col_origins.len()
    }

    /// Length of one flattened patch (D of the patch matrix).
    pub fn patch_dim(&self) -> usize {
        self.patch_shape.0 * self.patch_shape.1 * self.image_shape.2
    }

    /// Top-left pixel of patch `index`.
    pub fn origin(&self, index: usize) -> (usize, usize) {
        let per_row = self.col_origins.len();
        (
            self.row_origins[index / per_row],
            self.col_origins[index % per_row],
        )
    }

    pub(super) fn row_origins(&self) -> &[usize] {
        &self.row_origins
    }

    pub(super) fn col_origins(&self) -> &[usize] {
        &self.col_origins
    }

    pub(super) fn check_image(&self, found: (usize, usize, usize)) -> Result<(), PatchError> {
        if found != self.image_shape {
            return Err(PatchError::ImageShapeMismatch {
                found,
                expected: self.image_shape,
            });
        }
        Ok(())
    }

    /// Copies every patch of `image` into one row of a patches × D matrix.
    pub fn extract(&self, image: ArrayView3<'_, f64>) -> Result<Array2<f64>, PatchError> {
        self.check_image(image.dim())?;
        let (patch_rows, patch_cols) = self.patch_shape;
        let mut patches = Array2::zeros((self.n_patches(), self.patch_dim()));

        patches
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(index, mut row)| {
                let (r0, c0) = self.origin(index);
                let window = image.slice(s![r0..r0 + patch_rows, c0..c0 + patch_cols, ..]);
                for (dst, &src) in row.iter_mut().zip(window.iter()) {
                    *dst = src;
                }
            });

        Ok(patches)
    }
}

fn origins(extent: usize, patch: usize, shift: usize) -> Vec<usize> {
    let last = extent - patch;
    let mut origins: Vec<usize> = (0..=last).step_by(shift).collect();
    if origins.last() != Some(&last) {
        origins.push(last);
    }
    origins
}
