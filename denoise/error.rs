use thiserror::Error;

/// Errors raised by a denoising pass.
///
/// Every variant is a precondition violation. They are reported before the
/// first write into the output buffer, so a failed pass never leaves partially
/// reconstructed rows behind.
#[derive(Error, Debug)]
pub enum DenoiseError {
    #[error("Observation matrix has {found} rows, but the posterior store holds {expected} samples.")]
    SampleCountMismatch { found: usize, expected: usize },
    #[error("Observation matrix has {found} columns, but the model dimensionality is {expected}.")]
    DimensionMismatch { found: usize, expected: usize },
    #[error(
        "Output buffer has shape {found:?}, but it must match the observation matrix shape {expected:?}."
    )]
    OutputShapeMismatch {
        found: (usize, usize),
        expected: (usize, usize),
    },
    #[error(
        "Posterior of sample {sample} references component {component}, but the model only has {n_components} components."
    )]
    InvalidComponent {
        sample: usize,
        component: usize,
        n_components: usize,
    },
    #[error(
        "Posterior of sample {sample} assigns probability {probability} to component {component}; probabilities must be finite and non-negative."
    )]
    InvalidProbability {
        sample: usize,
        component: usize,
        probability: f64,
    },
    #[error("Posterior lists component {component} more than once.")]
    DuplicateComponent { component: usize },
    #[error("Posterior of sample {sample} lists component {component} more than once.")]
    RepeatedComponent { sample: usize, component: usize },
    #[error("Model parameters are inconsistent: {0}")]
    InvalidModel(String),
    #[error("Failed to build the denoising thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
