//! Constrained matrix factorization by proximal alternating optimization.
//!
//! Solves Y ≈ A·S under convex constraints on either factor: each outer
//! iteration takes one projected gradient step per factor, with step
//! sizes derived from cached spectral-norm Lipschitz bounds. The generic
//! block solver, the projection operators, and the spectral-norm utility
//! live in `proxmf-core` and are re-exported here as [`core`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod driver;
pub mod factor;
pub mod likelihood;
pub mod steps;

pub use driver::{nmf, nmf_constrained, FactorConstraints, NmfOptions, NmfSolution};
pub use factor::{Factor, Weight};
pub use likelihood::{grad_amplitude, grad_source, residual, LikelihoodProx};
pub use steps::{LipschitzSteps, DEFAULT_MAX_STRIDE};

pub use proxmf_core as core;

/// Common imports for factorization runs.
pub mod prelude {
    pub use crate::driver::{nmf, nmf_constrained, FactorConstraints, NmfOptions, NmfSolution};
    pub use crate::factor::{Factor, Weight};
    pub use crate::steps::LipschitzSteps;
    pub use proxmf_core::operators::{Identity, NonNegative, ProxOp};
    pub use proxmf_core::solver::{Constraint, LinearOperator};
}
