// ========================================================================================
//
//                        THE DENOISING PASS: VALIDATE, REFRESH, FAN OUT
//
// ========================================================================================
//
// A pass runs in three strictly ordered phases:
//
//   1. Validation. Every shape and every posterior entry is checked before the
//      output buffer is touched, so a failed pass never exposes partial rows.
//   2. Refresh. The bound model's auxiliary precomputation runs once, on the
//      calling thread, while the reconstructor is still exclusively borrowed.
//   3. Fan-out. The sample range is cut into one contiguous block of rows per
//      worker. Each block allocates its reconstructor scratch once and reuses it
//      for every sample and component it visits. Output rows are disjoint
//      between blocks, so no synchronization is needed for writes.
//
// Row n of the output depends only on row n of the input and posterior n, and
// the contributions of a posterior are summed in its enumeration order, so the
// result is bit-identical for any worker count.

use crate::config::DenoiseConfig;
use crate::error::DenoiseError;
use crate::posterior::{PosteriorStore, check_probability, first_repeat};
use crate::reconstruct::Reconstructor;
use ahash::AHashSet;
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Runs denoising passes on a fixed number of workers.
///
/// With an explicit worker count the driver owns a dedicated rayon pool. It is
/// built on the first pass and reused by every later pass, including passes
/// run through clones of the driver.
#[derive(Debug, Clone, Default)]
pub struct DenoisingDriver {
    threads: Option<usize>,
    pool: OnceLock<Arc<ThreadPool>>,
}

impl DenoisingDriver {
    /// A driver that uses rayon's global pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver that runs every pass on a dedicated pool of `threads` workers.
    /// A count of zero falls back to the global pool.
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads: (threads > 0).then_some(threads),
            pool: OnceLock::new(),
        }
    }

    pub fn from_config(config: &DenoiseConfig) -> Self {
        Self::with_threads(config.threads.unwrap_or(0))
    }

    pub fn threads(&self) -> Option<usize> {
        self.threads
    }

    /// The dedicated pool, built on first use. `None` means the global pool.
    fn pool(&self) -> Result<Option<&ThreadPool>, DenoiseError> {
        let Some(threads) = self.threads else {
            return Ok(None);
        };
        if let Some(pool) = self.pool.get() {
            return Ok(Some(pool.as_ref()));
        }
        if threads > num_cpus::get() {
            log::warn!(
                "Denoising with {threads} workers on {} logical CPUs; the pool is oversubscribed",
                num_cpus::get()
            );
        }
        let built = ThreadPoolBuilder::new().num_threads(threads).build()?;
        log::debug!("Built a dedicated denoising pool of {threads} workers");
        Ok(Some(self.pool.get_or_init(|| Arc::new(built)).as_ref()))
    }

    /// Denoises `x` into a freshly allocated matrix of the same shape.
    pub fn denoise<R, P>(
        &self,
        x: ArrayView2<'_, f64>,
        reconstructor: &mut R,
        posteriors: &P,
    ) -> Result<Array2<f64>, DenoiseError>
    where
        R: Reconstructor,
        P: PosteriorStore + ?Sized,
    {
        let mut x_reco = Array2::zeros(x.raw_dim());
        self.denoise_into(x, x_reco.view_mut(), reconstructor, posteriors)?;
        Ok(x_reco)
    }

    /// Overwrites every row of `x_reco` with the posterior-weighted
    /// reconstruction of the matching row of `x`.
    ///
    /// On error `x_reco` is left exactly as it was passed in.
    pub fn denoise_into<R, P>(
        &self,
        x: ArrayView2<'_, f64>,
        x_reco: ArrayViewMut2<'_, f64>,
        reconstructor: &mut R,
        posteriors: &P,
    ) -> Result<(), DenoiseError>
    where
        R: Reconstructor,
        P: PosteriorStore + ?Sized,
    {
        let pool = self.pool()?;
        let workers = pool.map_or_else(rayon::current_num_threads, ThreadPool::current_num_threads);

        {
            let shared: &R = reconstructor;
            on_pool(pool, || validate_pass(x, &x_reco, shared, posteriors))?;
        }

        reconstructor.refresh();
        let reconstructor: &R = reconstructor;

        if x.nrows() == 0 {
            return Ok(());
        }
        on_pool(pool, || run_blocks(x, x_reco, reconstructor, posteriors, workers));
        Ok(())
    }
}

/// Denoises `x` on rayon's global pool.
pub fn denoise<R, P>(
    x: ArrayView2<'_, f64>,
    reconstructor: &mut R,
    posteriors: &P,
) -> Result<Array2<f64>, DenoiseError>
where
    R: Reconstructor,
    P: PosteriorStore + ?Sized,
{
    DenoisingDriver::new().denoise(x, reconstructor, posteriors)
}

fn on_pool<T, F>(pool: Option<&ThreadPool>, op: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    match pool {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

fn validate_pass<R, P>(
    x: ArrayView2<'_, f64>,
    x_reco: &ArrayViewMut2<'_, f64>,
    reconstructor: &R,
    posteriors: &P,
) -> Result<(), DenoiseError>
where
    R: Reconstructor,
    P: PosteriorStore + ?Sized,
{
    if x.nrows() != posteriors.n_samples() {
        return Err(DenoiseError::SampleCountMismatch {
            found: x.nrows(),
            expected: posteriors.n_samples(),
        });
    }
    if x.ncols() != reconstructor.dim() {
        return Err(DenoiseError::DimensionMismatch {
            found: x.ncols(),
            expected: reconstructor.dim(),
        });
    }
    if x_reco.dim() != x.dim() {
        return Err(DenoiseError::OutputShapeMismatch {
            found: x_reco.dim(),
            expected: x.dim(),
        });
    }

    // Report the lowest offending sample so the error does not depend on scheduling.
    let n_components = reconstructor.n_components();
    let first_error = (0..posteriors.n_samples())
        .into_par_iter()
        .map_init(AHashSet::new, |seen, sample| {
            check_sample(sample, posteriors, n_components, seen)
        })
        .find_first(Option::is_some)
        .flatten();
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn check_sample<P>(
    sample: usize,
    posteriors: &P,
    n_components: usize,
    seen: &mut AHashSet<usize>,
) -> Option<DenoiseError>
where
    P: PosteriorStore + ?Sized,
{
    let posterior = posteriors.posterior(sample);
    let entry_error = posterior.iter().find_map(|(component, probability)| {
        if component >= n_components {
            return Some(DenoiseError::InvalidComponent {
                sample,
                component,
                n_components,
            });
        }
        check_probability(sample, component, probability).err()
    });
    if entry_error.is_some() {
        return entry_error;
    }
    first_repeat(posterior.iter(), seen)
        .map(|component| DenoiseError::RepeatedComponent { sample, component })
}

fn run_blocks<R, P>(
    x: ArrayView2<'_, f64>,
    mut x_reco: ArrayViewMut2<'_, f64>,
    reconstructor: &R,
    posteriors: &P,
    workers: usize,
) where
    R: Reconstructor,
    P: PosteriorStore + ?Sized,
{
    let n_samples = x.nrows();
    let workers = workers.clamp(1, n_samples);
    let block_rows = n_samples.div_ceil(workers);
    let start = Instant::now();

    log::info!(
        "Denoising {n_samples} samples of dimension {} over {} components with {workers} workers",
        x.ncols(),
        reconstructor.n_components()
    );
    log::debug!("Static partition: {block_rows} rows per block");

    x_reco
        .axis_chunks_iter_mut(Axis(0), block_rows)
        .into_par_iter()
        .zip(x.axis_chunks_iter(Axis(0), block_rows).into_par_iter())
        .enumerate()
        .for_each(|(block, (mut out_block, x_block))| {
            let mut scratch = reconstructor.allocate_scratch();
            let first_sample = block * block_rows;
            for (offset, (mut out_row, x_row)) in out_block
                .outer_iter_mut()
                .zip(x_block.outer_iter())
                .enumerate()
            {
                out_row.fill(0.0);
                for (component, probability) in posteriors.posterior(first_sample + offset).iter() {
                    reconstructor.accumulate(
                        x_row,
                        component,
                        probability,
                        out_row.view_mut(),
                        &mut scratch,
                    );
                }
            }
        });

    log::debug!("Denoising pass finished in {:.2?}", start.elapsed());
}
