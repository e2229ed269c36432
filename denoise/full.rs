use crate::error::DenoiseError;
use crate::model::{FullModel, MixtureModel};
use crate::reconstruct::Reconstructor;
use ndarray::{ArrayView1, ArrayViewMut1};

/// Reconstruction for full-covariance mixtures.
///
/// The point estimate is the component mean, exactly as for the diagonal
/// family; the covariances only matter to the trainer's posteriors. The type is
/// kept separate so the rule can move to a covariance-aware estimate without
/// touching callers.
pub struct FullReconstructor<'m> {
    model: &'m mut FullModel,
}

impl<'m> FullReconstructor<'m> {
    pub fn new(model: &'m mut FullModel) -> Result<Self, DenoiseError> {
        model.validate()?;
        Ok(Self { model })
    }

    pub fn model(&self) -> &FullModel {
        &*self.model
    }
}

impl Reconstructor for FullReconstructor<'_> {
    type Scratch = ();

    fn n_components(&self) -> usize {
        self.model.n_components()
    }

    fn dim(&self) -> usize {
        self.model.dim()
    }

    fn refresh(&mut self) {
        self.model.auxiliary();
    }

    fn allocate_scratch(&self) {}

    #[inline]
    fn accumulate(
        &self,
        _: ArrayView1<'_, f64>,
        component: usize,
        weight: f64,
        mut out: ArrayViewMut1<'_, f64>,
        _: &mut (),
    ) {
        out.scaled_add(weight, &self.model.means.row(component));
    }
}
