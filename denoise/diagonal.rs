use crate::error::DenoiseError;
use crate::model::{DiagonalModel, MixtureModel};
use crate::reconstruct::Reconstructor;
use ndarray::{ArrayView1, ArrayViewMut1};

/// Mean-only reconstruction for diagonal and isotropic mixtures.
pub struct DiagonalReconstructor<'m> {
    model: &'m mut DiagonalModel,
}

impl<'m> DiagonalReconstructor<'m> {
    pub fn new(model: &'m mut DiagonalModel) -> Result<Self, DenoiseError> {
        model.validate()?;
        Ok(Self { model })
    }

    pub fn model(&self) -> &DiagonalModel {
        &*self.model
    }
}

impl Reconstructor for DiagonalReconstructor<'_> {
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
