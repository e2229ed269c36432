//! Mixture parameters as handed over by the trainer.
//!
//! The public fields are the trainer-facing parameters. The trainer may write
//! them freely between passes; a reconstructor re-checks their shapes when it
//! binds to a model, and `auxiliary()` re-derives anything the hot loop reads
//! at the start of every pass.

use crate::error::DenoiseError;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, s};

/// Read access shared by every covariance family.
pub trait MixtureModel: Sync {
    fn n_components(&self) -> usize;
    fn dim(&self) -> usize;
    fn means(&self) -> ArrayView2<'_, f64>;

    /// Checks that every parameter block agrees with the declared C and D.
    fn validate(&self) -> Result<(), DenoiseError>;

    /// Batch-level precomputation run once before the workers of a pass start.
    fn auxiliary(&mut self) {}
}

/// Diagonal (or isotropic) covariance mixture.
///
/// `variances` is C×D for the diagonal family and C×1 for the isotropic one.
#[derive(Debug, Clone)]
pub struct DiagonalModel {
    pub means: Array2<f64>,
    pub variances: Array2<f64>,
}

impl DiagonalModel {
    pub fn new(means: Array2<f64>, variances: Array2<f64>) -> Result<Self, DenoiseError> {
        let model = Self { means, variances };
        model.validate()?;
        Ok(model)
    }

    /// A model whose components all share unit isotropic variance.
    pub fn from_means(means: Array2<f64>) -> Self {
        let variances = Array2::ones((means.nrows(), 1));
        Self { means, variances }
    }

    pub fn is_isotropic(&self) -> bool {
        self.variances.ncols() == 1 && self.dim() != 1
    }
}

impl MixtureModel for DiagonalModel {
    fn n_components(&self) -> usize {
        self.means.nrows()
    }

    fn dim(&self) -> usize {
        self.means.ncols()
    }

    fn means(&self) -> ArrayView2<'_, f64> {
        self.means.view()
    }

    fn validate(&self) -> Result<(), DenoiseError> {
        let (c, d) = self.means.dim();
        let (vc, vd) = self.variances.dim();
        if vc != c || (vd != d && vd != 1) {
            return Err(DenoiseError::InvalidModel(format!(
                "variances have shape ({vc}, {vd}); expected ({c}, {d}) or ({c}, 1)"
            )));
        }
        Ok(())
    }
}

/// Full covariance mixture. Covariances are stored as a C×D×D stack.
#[derive(Debug, Clone)]
pub struct FullModel {
    pub means: Array2<f64>,
    pub covariances: Array3<f64>,
}

impl FullModel {
    pub fn new(means: Array2<f64>, covariances: Array3<f64>) -> Result<Self, DenoiseError> {
        let model = Self { means, covariances };
        model.validate()?;
        Ok(model)
    }

    /// A model whose components all carry identity covariance.
    pub fn from_means(means: Array2<f64>) -> Self {
        let (c, d) = means.dim();
        let mut covariances = Array3::zeros((c, d, d));
        for mut block in covariances.outer_iter_mut() {
            block.diag_mut().fill(1.0);
        }
        Self { means, covariances }
    }
}

impl MixtureModel for FullModel {
    fn n_components(&self) -> usize {
        self.means.nrows()
    }

    fn dim(&self) -> usize {
        self.means.ncols()
    }

    fn means(&self) -> ArrayView2<'_, f64> {
        self.means.view()
    }

    fn validate(&self) -> Result<(), DenoiseError> {
        let (c, d) = self.means.dim();
        if self.covariances.dim() != (c, d, d) {
            return Err(DenoiseError::InvalidModel(format!(
                "covariances have shape {:?}; expected ({c}, {d}, {d})",
                self.covariances.dim()
            )));
        }
        Ok(())
    }
}

/// Mixture of factor analyzers with `h` latent factors per component.
///
/// * `means`: C×D.
/// * `uv`: C blocks of D×(D+H); the rightmost H columns of block `c` project a
///   data-space residual into the latent space of component `c`.
/// * `a`: C×(D·H); row `c` read row-major as a D×H matrix maps latent
///   coordinates back into data space.
#[derive(Debug, Clone)]
pub struct MfaModel {
    pub means: Array2<f64>,
    pub uv: Array3<f64>,
    pub a: Array2<f64>,
    h: usize,
    projection: Array3<f64>,
    lift: Array3<f64>,
}

impl MfaModel {
    pub fn new(
        means: Array2<f64>,
        uv: Array3<f64>,
        a: Array2<f64>,
        h: usize,
    ) -> Result<Self, DenoiseError> {
        let mut model = Self {
            means,
            uv,
            a,
            h,
            projection: Array3::zeros((0, h, 0)),
            lift: Array3::zeros((0, 0, h)),
        };
        model.validate()?;
        model.auxiliary();
        Ok(model)
    }

    /// Latent dimensionality H.
    pub fn latent_dim(&self) -> usize {
        self.h
    }

    /// H×D projection into the latent space of `component` (the transposed
    /// right-hand slice of its `uv` block).
    pub fn projection(&self, component: usize) -> ArrayView2<'_, f64> {
        self.projection.slice(s![component, .., ..])
    }

    /// D×H map from the latent space of `component` back to data space.
    pub fn lift(&self, component: usize) -> ArrayView2<'_, f64> {
        self.lift.slice(s![component, .., ..])
    }

    pub(crate) fn derived(&self) -> (ArrayView3<'_, f64>, ArrayView3<'_, f64>) {
        (self.projection.view(), self.lift.view())
    }
}

impl MixtureModel for MfaModel {
    fn n_components(&self) -> usize {
        self.means.nrows()
    }

    fn dim(&self) -> usize {
        self.means.ncols()
    }

    fn means(&self) -> ArrayView2<'_, f64> {
        self.means.view()
    }

    fn validate(&self) -> Result<(), DenoiseError> {
        let (c, d) = self.means.dim();
        let h = self.h;
        if self.uv.dim() != (c, d, d + h) {
            return Err(DenoiseError::InvalidModel(format!(
                "uv has shape {:?}; expected ({c}, {d}, {}) for D = {d}, H = {h}",
                self.uv.dim(),
                d + h
            )));
        }
        if self.a.dim() != (c, d * h) {
            return Err(DenoiseError::InvalidModel(format!(
                "a has shape {:?}; expected ({c}, {}) for D = {d}, H = {h}",
                self.a.dim(),
                d * h
            )));
        }
        Ok(())
    }

    /// Re-derives the contiguous per-component operators read by the hot loop.
    ///
    /// Requires a model that passed `validate`.
    fn auxiliary(&mut self) {
        let (c, d) = self.means.dim();
        let h = self.h;
        let uv = &self.uv;
        let a = &self.a;
        self.projection = Array3::from_shape_fn((c, h, d), |(k, j, i)| uv[[k, i, d + j]]);
        self.lift = Array3::from_shape_fn((c, d, h), |(k, i, j)| a[[k, i * h + j]]);
    }
}
