//! Sparse posterior storage.
//!
//! A posterior lists only the components that carry non-negligible responsibility
//! for a sample. The enumeration order of the entries is the order in which the
//! driver sums component contributions, so every store here preserves the order
//! it was given.

use crate::error::DenoiseError;
use ahash::AHashSet;
use itertools::Itertools;
use ndarray::ArrayView2;
use rayon::prelude::*;
use std::cmp::Ordering;

/// The posterior of one sample: `(component, probability)` pairs in caller order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Posterior {
    entries: Vec<(usize, f64)>,
}

impl Posterior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a posterior, rejecting any component index listed twice.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, DenoiseError>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let entries: Vec<(usize, f64)> = pairs.into_iter().collect();
        let mut seen = AHashSet::with_capacity(entries.len());
        if let Some(component) = first_repeat(entries.iter().copied(), &mut seen) {
            return Err(DenoiseError::DuplicateComponent { component });
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn view(&self) -> PosteriorView<'_> {
        PosteriorView {
            entries: &self.entries,
        }
    }
}

/// A borrowed posterior, as handed to the driver.
#[derive(Debug, Clone, Copy)]
pub struct PosteriorView<'a> {
    entries: &'a [(usize, f64)],
}

impl<'a> PosteriorView<'a> {
    /// Wraps raw `(component, probability)` entries for a custom store.
    ///
    /// Nothing is checked here; the driver validates every entry before a pass.
    pub fn new(entries: &'a [(usize, f64)]) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + 'a {
        self.entries.iter().copied()
    }

    /// Sum of the listed probabilities. Pruned posteriors need not reach 1.
    pub fn mass(&self) -> f64 {
        self.entries.iter().map(|&(_, p)| p).sum()
    }
}

/// Read access to one posterior per sample, indexed `0..n_samples()`.
///
/// Stores are shared by every worker of a pass, so they must be `Sync` and
/// hand out borrowed views only.
pub trait PosteriorStore: Sync {
    fn n_samples(&self) -> usize;
    fn posterior(&self, sample: usize) -> PosteriorView<'_>;
}

impl PosteriorStore for [Posterior] {
    fn n_samples(&self) -> usize {
        self.len()
    }

    fn posterior(&self, sample: usize) -> PosteriorView<'_> {
        self[sample].view()
    }
}

impl PosteriorStore for Vec<Posterior> {
    fn n_samples(&self) -> usize {
        self.len()
    }

    fn posterior(&self, sample: usize) -> PosteriorView<'_> {
        self[sample].view()
    }
}

/// Compressed sparse row posteriors: all entries in one buffer, delimited by
/// per-sample offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrPosteriors {
    offsets: Vec<usize>,
    entries: Vec<(usize, f64)>,
}

impl Default for CsrPosteriors {
    fn default() -> Self {
        Self {
            offsets: vec![0],
            entries: Vec::new(),
        }
    }
}

impl CsrPosteriors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the posterior of the next sample.
    pub fn push_sample<I>(&mut self, pairs: I) -> Result<(), DenoiseError>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let start = self.entries.len();
        self.entries.extend(pairs);
        let mut seen = AHashSet::with_capacity(self.entries.len() - start);
        if let Some(component) = first_repeat(self.entries[start..].iter().copied(), &mut seen) {
            self.entries.truncate(start);
            return Err(DenoiseError::RepeatedComponent {
                sample: self.n_samples(),
                component,
            });
        }
        self.offsets.push(self.entries.len());
        Ok(())
    }

    pub fn from_posteriors(posteriors: &[Posterior]) -> Self {
        let total = posteriors.iter().map(Posterior::len).sum();
        let mut offsets = Vec::with_capacity(posteriors.len() + 1);
        let mut entries = Vec::with_capacity(total);
        offsets.push(0);
        for posterior in posteriors {
            entries.extend_from_slice(&posterior.entries);
            offsets.push(entries.len());
        }
        Self { offsets, entries }
    }

    /// Keeps every positive responsibility of at least `threshold`, in component order.
    ///
    /// `responsibilities` is a dense samples × components matrix, as an EM
    /// E-step would produce before truncation.
    pub fn from_dense_threshold(
        responsibilities: ArrayView2<'_, f64>,
        threshold: f64,
    ) -> Result<Self, DenoiseError> {
        let rows: Vec<Vec<(usize, f64)>> = responsibilities
            .outer_iter()
            .into_par_iter()
            .enumerate()
            .map(|(sample, row)| -> Result<Vec<(usize, f64)>, DenoiseError> {
                let mut kept = Vec::new();
                for (component, &probability) in row.iter().enumerate() {
                    check_probability(sample, component, probability)?;
                    if probability > 0.0 && probability >= threshold {
                        kept.push((component, probability));
                    }
                }
                Ok(kept)
            })
            .collect::<Result<_, _>>()?;
        Ok(Self::from_rows(rows))
    }

    /// Keeps the `k` largest positive responsibilities of each sample.
    ///
    /// Entries are ordered by descending probability; ties go to the lower
    /// component index, which keeps the summation order reproducible.
    pub fn from_dense_top_k(
        responsibilities: ArrayView2<'_, f64>,
        k: usize,
    ) -> Result<Self, DenoiseError> {
        let rows: Vec<Vec<(usize, f64)>> = responsibilities
            .outer_iter()
            .into_par_iter()
            .enumerate()
            .map(|(sample, row)| -> Result<Vec<(usize, f64)>, DenoiseError> {
                for (component, &probability) in row.iter().enumerate() {
                    check_probability(sample, component, probability)?;
                }
                let kept = row
                    .iter()
                    .copied()
                    .enumerate()
                    .filter(|&(_, p)| p > 0.0)
                    .sorted_unstable_by(|a, b| match b.1.partial_cmp(&a.1) {
                        Some(Ordering::Equal) | None => a.0.cmp(&b.0),
                        Some(order) => order,
                    })
                    .take(k)
                    .collect();
                Ok(kept)
            })
            .collect::<Result<_, _>>()?;
        Ok(Self::from_rows(rows))
    }

    fn from_rows(rows: Vec<Vec<(usize, f64)>>) -> Self {
        let total = rows.iter().map(Vec::len).sum();
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        let mut entries = Vec::with_capacity(total);
        offsets.push(0);
        for row in rows {
            entries.extend(row);
            offsets.push(entries.len());
        }
        Self { offsets, entries }
    }

    /// Total number of stored entries across all samples.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }
}

impl PosteriorStore for CsrPosteriors {
    fn n_samples(&self) -> usize {
        self.offsets.len() - 1
    }

    fn posterior(&self, sample: usize) -> PosteriorView<'_> {
        let start = self.offsets[sample];
        let end = self.offsets[sample + 1];
        PosteriorView {
            entries: &self.entries[start..end],
        }
    }
}

/// First component listed twice in `entries`. `seen` is cleared before use so
/// callers can reuse one set across samples.
pub(crate) fn first_repeat(
    entries: impl IntoIterator<Item = (usize, f64)>,
    seen: &mut AHashSet<usize>,
) -> Option<usize> {
    seen.clear();
    entries
        .into_iter()
        .map(|(component, _)| component)
        .find(|&component| !seen.insert(component))
}

pub(crate) fn check_probability(
    sample: usize,
    component: usize,
    probability: f64,
) -> Result<(), DenoiseError> {
    if probability.is_finite() && probability >= 0.0 {
        Ok(())
    } else {
        Err(DenoiseError::InvalidProbability {
            sample,
            component,
            probability,
        })
    }
}
