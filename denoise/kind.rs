//! Runtime selection of the covariance family.
//!
//! The trainer labels its models with a covariance type string; `AnyModel` and
//! `AnyReconstructor` let such a model run through the same driver as the
//! statically typed reconstructors.

use crate::diagonal::DiagonalReconstructor;
use crate::error::DenoiseError;
use crate::full::FullReconstructor;
use crate::mfa::{MfaReconstructor, MfaScratch};
use crate::model::{DiagonalModel, FullModel, MfaModel, MixtureModel};
use crate::reconstruct::Reconstructor;
use ndarray::{ArrayView1, ArrayViewMut1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovarianceType {
    Isotropic,
    Diagonal,
    Full,
    Mfa,
}

impl CovarianceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Isotropic => "isotropic",
            Self::Diagonal => "diagonal",
            Self::Full => "full",
            Self::Mfa => "mfa",
        }
    }
}

impl fmt::Display for CovarianceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown covariance type '{0}'; expected one of isotropic, diagonal, full, mfa.")]
pub struct UnknownCovarianceType(pub String);

impl FromStr for CovarianceType {
    type Err = UnknownCovarianceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isotropic" => Ok(Self::Isotropic),
            "diagonal" => Ok(Self::Diagonal),
            "full" => Ok(Self::Full),
            "mfa" => Ok(Self::Mfa),
            _ => Err(UnknownCovarianceType(s.to_string())),
        }
    }
}

/// A fitted model of any supported covariance family.
#[derive(Debug, Clone)]
pub enum AnyModel {
    Diagonal(DiagonalModel),
    Full(FullModel),
    Mfa(MfaModel),
}

impl AnyModel {
    pub fn covariance_type(&self) -> CovarianceType {
        match self {
            Self::Diagonal(model) if model.is_isotropic() => CovarianceType::Isotropic,
            Self::Diagonal(_) => CovarianceType::Diagonal,
            Self::Full(_) => CovarianceType::Full,
            Self::Mfa(_) => CovarianceType::Mfa,
        }
    }

    pub fn n_components(&self) -> usize {
        match self {
            Self::Diagonal(model) => model.n_components(),
            Self::Full(model) => model.n_components(),
            Self::Mfa(model) => model.n_components(),
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            Self::Diagonal(model) => model.dim(),
            Self::Full(model) => model.dim(),
            Self::Mfa(model) => model.dim(),
        }
    }

    /// Binds the matching reconstructor to this model.
    pub fn reconstructor(&mut self) -> Result<AnyReconstructor<'_>, DenoiseError> {
        Ok(match self {
            Self::Diagonal(model) => AnyReconstructor::Diagonal(DiagonalReconstructor::new(model)?),
            Self::Full(model) => AnyReconstructor::Full(FullReconstructor::new(model)?),
            Self::Mfa(model) => AnyReconstructor::Mfa(MfaReconstructor::new(model)?),
        })
    }
}

pub enum AnyReconstructor<'m> {
    Diagonal(DiagonalReconstructor<'m>),
    Full(FullReconstructor<'m>),
    Mfa(MfaReconstructor<'m>),
}

/// Scratch for [`AnyReconstructor`]; only the MFA family needs storage.
#[derive(Debug, Clone, Default)]
pub struct AnyScratch {
    mfa: Option<MfaScratch>,
}

impl Reconstructor for AnyReconstructor<'_> {
    type Scratch = AnyScratch;

    fn n_components(&self) -> usize {
        match self {
            Self::Diagonal(reco) => reco.n_components(),
            Self::Full(reco) => reco.n_components(),
            Self::Mfa(reco) => reco.n_components(),
        }
    }

    fn dim(&self) -> usize {
        match self {
            Self::Diagonal(reco) => reco.dim(),
            Self::Full(reco) => reco.dim(),
            Self::Mfa(reco) => reco.dim(),
        }
    }

    fn refresh(&mut self) {
        match self {
            Self::Diagonal(reco) => reco.refresh(),
            Self::Full(reco) => reco.refresh(),
            Self::Mfa(reco) => reco.refresh(),
        }
    }

    fn allocate_scratch(&self) -> AnyScratch {
        match self {
            Self::Mfa(reco) => AnyScratch {
                mfa: Some(reco.allocate_scratch()),
            },
            Self::Diagonal(_) | Self::Full(_) => AnyScratch::default(),
        }
    }

    #[inline]
    fn accumulate(
        &self,
        sample: ArrayView1<'_, f64>,
        component: usize,
        weight: f64,
        out: ArrayViewMut1<'_, f64>,
        scratch: &mut AnyScratch,
    ) {
        match self {
            Self::Diagonal(reco) => reco.accumulate(sample, component, weight, out, &mut ()),
            Self::Full(reco) => reco.accumulate(sample, component, weight, out, &mut ()),
            Self::Mfa(reco) => {
                let mfa = scratch.mfa.get_or_insert_with(|| reco.allocate_scratch());
                reco.accumulate(sample, component, weight, out, mfa);
            }
        }
    }
}
