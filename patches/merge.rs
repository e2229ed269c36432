use super::extract::OverlappingPatches;
use super::{MergeMethod, PatchError};
use ndarray::{Array3, ArrayView2, Axis};
use rayon::prelude::*;

impl OverlappingPatches {
    /// Reassembles an image from a patches × D matrix laid out like
    /// [`OverlappingPatches::extract`] produces it.
    ///
    /// Image rows are merged in parallel; each worker keeps one value buffer
    /// that it refills for every pixel.
    pub fn merge(
        &self,
        patches: ArrayView2<'_, f64>,
        method: MergeMethod,
    ) -> Result<Array3<f64>, PatchError> {
        let expected = (self.n_patches(), self.patch_dim());
        if patches.dim() != expected {
            return Err(PatchError::PatchMatrixMismatch {
                found: patches.dim(),
                expected,
            });
        }

        let (patch_rows, patch_cols) = self.patch_shape();
        let (image_rows, image_cols, channels) = self.image_shape();
        let row_origins = self.row_origins();
        let col_origins = self.col_origins();
        let per_row = col_origins.len();
        let mut image = Array3::zeros((image_rows, image_cols, channels));

        image
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each_init(
                || Vec::with_capacity(patch_rows * patch_cols),
                |values, (r, mut plane)| {
                    for c in 0..image_cols {
                        for k in 0..channels {
                            values.clear();
                            for (pi, &r0) in row_origins.iter().enumerate() {
                                if r < r0 || r >= r0 + patch_rows {
                                    continue;
                                }
                                for (pj, &c0) in col_origins.iter().enumerate() {
                                    if c < c0 || c >= c0 + patch_cols {
                                        continue;
                                    }
                                    let offset = ((r - r0) * patch_cols + (c - c0)) * channels + k;
                                    values.push(patches[[pi * per_row + pj, offset]]);
                                }
                            }
                            plane[[c, k]] = combine(values, method);
                        }
                    }
                },
            );

        Ok(image)
    }
}

fn combine(values: &mut [f64], method: MergeMethod) -> f64 {
    match method {
        MergeMethod::Mean => values.iter().sum::<f64>() / values.len() as f64,
        MergeMethod::Median => median(values),
    }
}

/// Median with the two middle values averaged for even counts.
fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        upper
    } else {
        let below = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        0.5 * (below + upper)
    }
}
