//! Generic proximal-optimization primitives.
//!
//! This crate provides the building blocks for constrained first-order
//! optimization: projection operators, spectral-norm estimation, and a
//! block proximal-gradient solver with optional Nesterov acceleration and
//! ADMM-style constraint handling.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod operators;
pub mod solver;
pub mod spectral;
pub mod trace;

pub use error::{ProxError, Result};
pub use operators::{
    HardThreshold, Identity, LowerBound, NonNegative, ProxOp, SoftThreshold, UpperBound,
};
pub use solver::{
    solve, BlockUpdate, Constraint, LinearOperator, Solution, SolveOptions, StepRule,
};
pub use spectral::spectral_norm;
pub use trace::{Trace, TraceRecord};

/// Common imports for solver components.
pub mod prelude {
    pub use crate::{
        solve, spectral_norm, BlockUpdate, Constraint, HardThreshold, Identity, LinearOperator,
        LowerBound, NonNegative, ProxError, ProxOp, Result, SoftThreshold, Solution, SolveOptions,
        StepRule, Trace, TraceRecord, UpperBound,
    };
}
