use ndarray::{Array1, ArrayView1, ArrayViewMut1};

/// One covariance family's point-reconstruction rule, bound to one model.
///
/// The driver shares a reconstructor by reference across all workers of a pass.
/// Everything a worker mutates lives in its `Scratch`, which it allocates once
/// with [`Reconstructor::allocate_scratch`] and then reuses for every
/// (sample, component) pair it processes.
pub trait Reconstructor: Sync {
    /// Per-worker working storage.
    type Scratch;

    /// Number of mixture components C.
    fn n_components(&self) -> usize;

    /// Data dimensionality D.
    fn dim(&self) -> usize;

    /// Runs the bound model's once-per-pass auxiliary refresh.
    fn refresh(&mut self);

    fn allocate_scratch(&self) -> Self::Scratch;

    /// Adds `weight × reconstruction(sample, component)` into `out`.
    ///
    /// `component < n_components()` and `sample.len() == out.len() == dim()`
    /// are guaranteed by the caller and not re-checked here.
    fn accumulate(
        &self,
        sample: ArrayView1<'_, f64>,
        component: usize,
        weight: f64,
        out: ArrayViewMut1<'_, f64>,
        scratch: &mut Self::Scratch,
    );

    /// The unweighted reconstruction of `sample` under a single component.
    fn reconstruct_component(
        &self,
        sample: ArrayView1<'_, f64>,
        component: usize,
        scratch: &mut Self::Scratch,
    ) -> Array1<f64> {
        let mut out = Array1::zeros(self.dim());
        self.accumulate(sample, component, 1.0, out.view_mut(), scratch);
        out
    }
}
