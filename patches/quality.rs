use super::PatchError;
use ndarray::{ArrayBase, Data, Dimension, Zip};

/// Peak signal-to-noise ratio of `estimate` against `reference`, in decibels.
///
/// `data_range` is the distance between the smallest and largest admissible
/// pixel value (255 for 8-bit images). Identical images give `f64::INFINITY`.
pub fn psnr<S1, S2, D>(
    reference: &ArrayBase<S1, D>,
    estimate: &ArrayBase<S2, D>,
    data_range: f64,
) -> Result<f64, PatchError>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    if reference.shape() != estimate.shape() {
        return Err(PatchError::ShapeMismatch {
            left: reference.shape().to_vec(),
            right: estimate.shape().to_vec(),
        });
    }
    if reference.is_empty() {
        return Err(PatchError::EmptyImage);
    }

    let squared_error = Zip::from(reference)
        .and(estimate)
        .fold(0.0, |acc, &r, &e| acc + (r - e) * (r - e));
    let mse = squared_error / reference.len() as f64;
    if mse == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * (data_range * data_range / mse).log10())
}
