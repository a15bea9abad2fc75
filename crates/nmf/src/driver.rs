//! Run configuration and the factorization entry points.

use ndarray::Array2;
use proxmf_core::error::{ProxError, Result};
use proxmf_core::operators::{NonNegative, ProxOp};
use proxmf_core::solver::{solve, Constraint, SolveOptions};
use proxmf_core::trace::Trace;

use crate::factor::{Factor, Weight};
use crate::likelihood::LikelihoodProx;
use crate::steps::{LipschitzSteps, DEFAULT_MAX_STRIDE};

/// Options for a factorization run.
#[derive(Clone, Debug)]
pub struct NmfOptions {
    /// Residual weights; scalar 1 when unweighted.
    pub weight: Weight,
    /// Convergence margin on the Lipschitz step, in (0, 1].
    pub slack: f64,
    /// Cap on the step controller's recompute interval.
    pub max_stride: usize,
    /// Factor update order within one iteration; A then S when `None`.
    pub update_order: Option<Vec<Factor>>,
    /// Nesterov acceleration of the factor updates.
    pub accelerated: bool,
    /// Maximum outer iterations.
    pub max_iter: usize,
    /// Relative residual threshold.
    pub e_rel: f64,
    /// Absolute residual threshold.
    pub e_abs: f64,
    /// Keep a record of all optimization variables.
    pub traceback: bool,
}

impl Default for NmfOptions {
    fn default() -> Self {
        Self {
            weight: Weight::Scalar(1.0),
            slack: 0.9,
            max_stride: DEFAULT_MAX_STRIDE,
            update_order: None,
            accelerated: false,
            max_iter: 1000,
            e_rel: 1e-3,
            e_abs: 0.0,
            traceback: false,
        }
    }
}

/// ADMM-handled constraint lists, per factor.
#[derive(Default)]
pub struct FactorConstraints {
    /// Constraints on the amplitude factor A.
    pub amplitude: Vec<Constraint>,
    /// Constraints on the source factor S.
    pub source: Vec<Constraint>,
}

/// Result of a factorization run.
#[derive(Debug)]
pub struct NmfSolution {
    /// Final amplitude factor A (M×K).
    pub amplitude: Array2<f64>,
    /// Final source factor S (K×N).
    pub source: Array2<f64>,
    /// Outer iterations performed.
    pub iterations: usize,
    /// Whether the residual thresholds were met before `max_iter`.
    pub converged: bool,
    /// Iteration history, when requested.
    pub trace: Option<Trace>,
}

/// Non-negative matrix factorization of `target` ≈ A·S.
///
/// Minimizes ½‖W½(Y − A·S)‖² by alternating proximal gradient steps,
/// projecting both factors onto the non-negative orthant after each step.
/// Shapes: Y is M×N, `amplitude0` M×K, `source0` K×N; mismatches panic
/// from the underlying matrix products. Non-convergence within
/// `max_iter` is reported through [`NmfSolution::converged`], not as an
/// error.
pub fn nmf(
    target: &Array2<f64>,
    amplitude0: Array2<f64>,
    source0: Array2<f64>,
    options: &NmfOptions,
) -> Result<NmfSolution> {
    nmf_constrained(
        target,
        amplitude0,
        source0,
        NonNegative,
        NonNegative,
        FactorConstraints::default(),
        options,
    )
}

/// Matrix factorization with custom projections and ADMM constraints.
///
/// Like [`nmf`], but with `prox_amplitude` and `prox_source` applied
/// directly after each gradient step, and `constraints` handled through
/// dual updates by the block solver.
pub fn nmf_constrained<PA, PS>(
    target: &Array2<f64>,
    amplitude0: Array2<f64>,
    source0: Array2<f64>,
    prox_amplitude: PA,
    prox_source: PS,
    constraints: FactorConstraints,
    options: &NmfOptions,
) -> Result<NmfSolution>
where
    PA: ProxOp,
    PS: ProxOp,
{
    let w_max = options.weight.max();
    log::debug!("weight bound for the Lipschitz estimates: {w_max}");

    let mut steps = LipschitzSteps::new(
        options.slack,
        w_max,
        options.max_stride,
        options.update_order.as_deref(),
    )?;
    let update = LikelihoodProx::new(
        target.clone(),
        options.weight.clone(),
        prox_amplitude,
        prox_source,
    );

    let solve_options = SolveOptions {
        update_order: options
            .update_order
            .as_ref()
            .map(|order| order.iter().map(|factor| factor.index()).collect()),
        accelerated: options.accelerated,
        max_iter: options.max_iter,
        e_rel: options.e_rel,
        e_abs: options.e_abs,
        traceback: options.traceback,
    };
    let block_constraints = [constraints.amplitude, constraints.source];

    let solution = solve(
        vec![amplitude0, source0],
        &update,
        &mut steps,
        &block_constraints,
        &solve_options,
    )?;

    let mut blocks = solution.blocks.into_iter();
    let (Some(amplitude), Some(source)) = (blocks.next(), blocks.next()) else {
        return Err(ProxError::numerical("solver returned a wrong block count"));
    };
    Ok(NmfSolution {
        amplitude,
        source,
        iterations: solution.iterations,
        converged: solution.converged,
        trace: solution.trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn invalid_slack_is_rejected_before_iterating() {
        let y = array![[1.0]];
        let options = NmfOptions {
            slack: 2.0,
            ..NmfOptions::default()
        };
        let result = nmf(&y, array![[1.0]], array![[1.0]], &options);
        assert!(matches!(result, Err(ProxError::InvalidParameters { .. })));
    }

    #[test]
    fn defaults_match_the_documented_contract() {
        let options = NmfOptions::default();
        assert_eq!(options.slack, 0.9);
        assert_eq!(options.max_iter, 1000);
        assert_eq!(options.e_rel, 1e-3);
        assert_eq!(options.e_abs, 0.0);
        assert!(!options.accelerated);
        assert!(!options.traceback);
        assert_eq!(options.weight.max(), 1.0);
    }
}
