//! Reconstruction under a mixture of factor analyzers.
//!
//! For a sample `x` and component `c` the estimate is
//!
//! ```text
//! r     = x - m[c]            (D)
//! z     = W[c]ᵀ r             (H)   latent coordinates
//! delta = A[c] z              (D)   back in data space
//! x̂     = delta + m[c]
//! ```
//!
//! This runs once per (sample, component) pair with non-zero responsibility, so
//! it must not allocate. Both working vectors live in [`MfaScratch`]; the
//! length-D one holds the residual and is then overwritten with `delta`.

use crate::error::DenoiseError;
use crate::model::{MfaModel, MixtureModel};
use crate::reconstruct::Reconstructor;
use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array1, ArrayView1, ArrayViewMut1, Axis, Zip};

/// Per-worker working vectors for [`MfaReconstructor`].
#[derive(Debug, Clone)]
pub struct MfaScratch {
    data: Array1<f64>,
    latent: Array1<f64>,
}

impl MfaScratch {
    pub fn new(dim: usize, latent_dim: usize) -> Self {
        Self {
            data: Array1::zeros(dim),
            latent: Array1::zeros(latent_dim),
        }
    }
}

pub struct MfaReconstructor<'m> {
    model: &'m mut MfaModel,
}

impl<'m> MfaReconstructor<'m> {
    /// Binds to `model` after checking its shapes.
    ///
    /// The derived operators are left as they are; the driver rebuilds them at
    /// the start of every pass through [`Reconstructor::refresh`].
    pub fn new(model: &'m mut MfaModel) -> Result<Self, DenoiseError> {
        model.validate()?;
        Ok(Self { model })
    }

    pub fn model(&self) -> &MfaModel {
        &*self.model
    }

    pub fn latent_dim(&self) -> usize {
        self.model.latent_dim()
    }
}

impl Reconstructor for MfaReconstructor<'_> {
    type Scratch = MfaScratch;

    fn n_components(&self) -> usize {
        self.model.n_components()
    }

    fn dim(&self) -> usize {
        self.model.dim()
    }

    fn refresh(&mut self) {
        self.model.auxiliary();
    }

    fn allocate_scratch(&self) -> MfaScratch {
        MfaScratch::new(self.model.dim(), self.model.latent_dim())
    }

    fn accumulate(
        &self,
        sample: ArrayView1<'_, f64>,
        component: usize,
        weight: f64,
        mut out: ArrayViewMut1<'_, f64>,
        scratch: &mut MfaScratch,
    ) {
        let MfaScratch { data, latent } = scratch;
        let mean = self.model.means.row(component);
        let (projection, lift) = self.model.derived();

        Zip::from(&mut *data)
            .and(&sample)
            .and(&mean)
            .for_each(|r, &x, &m| *r = x - m);

        general_mat_vec_mul(
            1.0,
            &projection.index_axis(Axis(0), component),
            &*data,
            0.0,
            latent,
        );
        general_mat_vec_mul(
            1.0,
            &lift.index_axis(Axis(0), component),
            &*latent,
            0.0,
            data,
        );

        Zip::from(&mut out)
            .and(&*data)
            .and(&mean)
            .for_each(|o, &delta, &m| *o += weight * (delta + m));
    }
}
