#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
//! Posterior-weighted denoising for fitted mixture models.
//!
//! Given observations `X` (N×D), a fitted mixture, and one sparse posterior per
//! sample, every row of the output is
//!
//! ```text
//! x̂[n] = Σ_c q[n][c] · reconstruct(c, X[n])
//! ```
//!
//! where the per-component rule depends on the covariance family: the component
//! mean for diagonal, isotropic and full covariances, and a low-rank projection
//! through the component's latent factors for a mixture of factor analyzers.
pub mod config;
pub mod diagonal;
pub mod driver;
pub mod error;
pub mod full;
pub mod kind;
pub mod mfa;
pub mod model;
pub mod posterior;
pub mod reconstruct;

#[path = "../patches/mod.rs"]
pub mod patches;

pub use config::{ConfigError, DenoiseConfig};
pub use diagonal::DiagonalReconstructor;
pub use driver::{DenoisingDriver, denoise};
pub use error::DenoiseError;
pub use full::FullReconstructor;
pub use kind::{AnyModel, AnyReconstructor, AnyScratch, CovarianceType, UnknownCovarianceType};
pub use mfa::{MfaReconstructor, MfaScratch};
pub use model::{DiagonalModel, FullModel, MfaModel, MixtureModel};
pub use posterior::{CsrPosteriors, Posterior, PosteriorStore, PosteriorView};
pub use reconstruct::Reconstructor;
