//! Block proximal-gradient solver.
//!
//! Minimizes a smooth objective coupling several coordinate blocks by
//! cycling through them: each block takes one gradient-plus-projection
//! step supplied by a [`BlockUpdate`], with step sizes from a [`StepRule`].
//! Additional convex constraints on a block are handled through linearized
//! ADMM dual updates, and Nesterov extrapolation can be layered on the
//! gradient steps.

use ndarray::Array2;

use crate::error::{ProxError, Result};
use crate::operators::ProxOp;
use crate::spectral::spectral_norm;
use crate::trace::{Trace, TraceRecord};

/// Computes the proximal update for one coordinate block.
pub trait BlockUpdate {
    /// Next iterate for block `index`, evaluated at `x`.
    ///
    /// `x` is the evaluation point chosen by the solver (the current
    /// block, possibly extrapolated or shifted by constraint terms);
    /// the remaining, fixed blocks are read from `blocks`.
    fn update(
        &self,
        x: &Array2<f64>,
        step: f64,
        blocks: &[Array2<f64>],
        index: usize,
    ) -> Array2<f64>;
}

/// Supplies the gradient step size for each block.
pub trait StepRule {
    /// Step size for updating block `index` given the current blocks.
    fn step(&mut self, index: usize, blocks: &[Array2<f64>]) -> f64;
}

/// Linear operator attached to an ADMM constraint.
#[derive(Clone, Debug, Default)]
pub enum LinearOperator {
    /// The identity map.
    #[default]
    Identity,
    /// A dense matrix applied from the left.
    Matrix(Array2<f64>),
}

impl LinearOperator {
    /// Apply the operator to a block.
    pub fn apply(&self, x: &Array2<f64>) -> Array2<f64> {
        match self {
            Self::Identity => x.clone(),
            Self::Matrix(l) => l.dot(x),
        }
    }

    /// Apply the transposed operator.
    pub fn apply_transpose(&self, x: &Array2<f64>) -> Array2<f64> {
        match self {
            Self::Identity => x.clone(),
            Self::Matrix(l) => l.t().dot(x),
        }
    }

    /// Squared spectral norm ‖L‖².
    pub fn norm_sq(&self) -> f64 {
        match self {
            Self::Identity => 1.0,
            Self::Matrix(l) => {
                let s = spectral_norm(&l.view());
                s * s
            }
        }
    }
}

/// An ADMM-handled constraint on one block: the prox of a convex penalty
/// composed with a linear operator.
pub struct Constraint {
    /// Proximal operator of the penalty.
    pub prox: Box<dyn ProxOp>,
    /// Linear operator inside the penalty; identity for a direct constraint.
    pub linear: LinearOperator,
    /// Fixed constraint step size; derived from the gradient step and
    /// ‖L‖² when `None`.
    pub step: Option<f64>,
}

impl Constraint {
    /// Constraint with an identity operator and derived step size.
    pub fn new(prox: Box<dyn ProxOp>) -> Self {
        Self {
            prox,
            linear: LinearOperator::Identity,
            step: None,
        }
    }

    /// Constraint with an explicit linear operator.
    pub fn with_operator(prox: Box<dyn ProxOp>, linear: LinearOperator) -> Self {
        Self {
            prox,
            linear,
            step: None,
        }
    }
}

/// Options controlling a [`solve`] run.
#[derive(Clone, Debug)]
pub struct SolveOptions {
    /// Block visit order within one outer iteration; index order by default.
    pub update_order: Option<Vec<usize>>,
    /// Apply Nesterov extrapolation to the gradient steps.
    pub accelerated: bool,
    /// Maximum number of outer iterations.
    pub max_iter: usize,
    /// Relative primal/dual residual threshold.
    pub e_rel: f64,
    /// Absolute primal/dual residual threshold.
    pub e_abs: f64,
    /// Record per-iteration history.
    pub traceback: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            update_order: None,
            accelerated: false,
            max_iter: 1000,
            e_rel: 1e-3,
            e_abs: 0.0,
            traceback: false,
        }
    }
}

/// Result of a [`solve`] run.
#[derive(Debug)]
pub struct Solution {
    /// Final block values, in input order.
    pub blocks: Vec<Array2<f64>>,
    /// Outer iterations performed.
    pub iterations: usize,
    /// Whether the residual thresholds were met before `max_iter`.
    pub converged: bool,
    /// Iteration history, when requested.
    pub trace: Option<Trace>,
}

/// Dual variables for one constraint, owned by a single solve call.
struct DualState {
    z: Array2<f64>,
    u: Array2<f64>,
    op_norm_sq: f64,
    z_residual_sq: f64,
    z_norm_sq: f64,
}

/// Nesterov bookkeeping for one block.
struct Momentum {
    y: Array2<f64>,
    t: f64,
}

/// Minimize over all blocks by alternating proximal gradient steps.
///
/// Visits blocks in `update_order` each outer iteration, obtaining the
/// step size from `steps` and the proximal update from `update`.
/// `constraints` lists ADMM-handled constraints per block (an empty slice
/// means none). Terminates when every block's primal residual and every
/// constraint's dual residual satisfy
/// `‖Δ‖² ≤ e_rel²·‖·‖² + e_abs²`, or after `max_iter` iterations;
/// non-convergence is reported through [`Solution::converged`], not as an
/// error.
pub fn solve<U, R>(
    mut blocks: Vec<Array2<f64>>,
    update: &U,
    steps: &mut R,
    constraints: &[Vec<Constraint>],
    options: &SolveOptions,
) -> Result<Solution>
where
    U: BlockUpdate + ?Sized,
    R: StepRule + ?Sized,
{
    let n = blocks.len();
    if n == 0 {
        return Err(ProxError::invalid("no blocks to optimize"));
    }
    if !constraints.is_empty() && constraints.len() != n {
        return Err(ProxError::invalid(format!(
            "got constraint lists for {} blocks, expected {n}",
            constraints.len()
        )));
    }

    let order = match &options.update_order {
        Some(order) => {
            if order.is_empty() {
                return Err(ProxError::invalid("update order is empty"));
            }
            if let Some(&j) = order.iter().find(|&&j| j >= n) {
                return Err(ProxError::invalid(format!(
                    "update order references block {j}, but there are only {n} blocks"
                )));
            }
            order.clone()
        }
        None => (0..n).collect(),
    };

    let mut duals: Vec<Vec<DualState>> = Vec::with_capacity(n);
    for j in 0..n {
        let list = constraint_list(constraints, j);
        let mut states = Vec::with_capacity(list.len());
        for constraint in list {
            let op_norm_sq = constraint.linear.norm_sq();
            if op_norm_sq == 0.0 {
                return Err(ProxError::invalid(
                    "constraint linear operator has zero spectral norm",
                ));
            }
            let z = constraint.linear.apply(&blocks[j]);
            let u = Array2::zeros(z.dim());
            states.push(DualState {
                z,
                u,
                op_norm_sq,
                z_residual_sq: 0.0,
                z_norm_sq: 0.0,
            });
        }
        duals.push(states);
    }

    let mut momentum: Vec<Momentum> = if options.accelerated {
        blocks
            .iter()
            .map(|x| Momentum {
                y: x.clone(),
                t: 1.0,
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut trace = options.traceback.then(Trace::default);

    for it in 0..options.max_iter {
        let mut residual_sq = vec![0.0; n];
        let mut step_used = vec![0.0; n];

        for &j in &order {
            let step = steps.step(j, &blocks);
            step_used[j] = step;

            let mut x_arg = if options.accelerated {
                momentum[j].y.clone()
            } else {
                blocks[j].clone()
            };
            if !duals[j].is_empty() {
                let base = x_arg.clone();
                for (constraint, dual) in constraint_list(constraints, j).iter().zip(&duals[j]) {
                    let step_g = constraint.step.unwrap_or(step * dual.op_norm_sq);
                    let coupling = constraint
                        .linear
                        .apply_transpose(&(&constraint.linear.apply(&base) - &dual.z + &dual.u));
                    x_arg = x_arg - coupling * (step / step_g);
                }
            }

            let x_new = update.update(&x_arg, step, &blocks, j);
            residual_sq[j] = norm_sq_diff(&x_new, &blocks[j]);

            if options.accelerated {
                let mom = &mut momentum[j];
                let t_next = 0.5 * (1.0 + (1.0 + 4.0 * mom.t * mom.t).sqrt());
                let beta = (mom.t - 1.0) / t_next;
                mom.y = &x_new + &((&x_new - &blocks[j]) * beta);
                mom.t = t_next;
            }
            blocks[j] = x_new;

            for (constraint, dual) in constraint_list(constraints, j).iter().zip(&mut duals[j]) {
                let step_g = constraint.step.unwrap_or(step * dual.op_norm_sq);
                let lx = constraint.linear.apply(&blocks[j]);
                let mut z_new = &lx + &dual.u;
                constraint.prox.apply(&mut z_new, step_g);
                dual.z_residual_sq = norm_sq_diff(&z_new, &dual.z);
                dual.z_norm_sq = norm_sq(&z_new);
                dual.u = &dual.u + &(&lx - &z_new);
                dual.z = z_new;
            }
        }

        let mut converged = true;
        for j in 0..n {
            let tol = options.e_rel * options.e_rel * norm_sq(&blocks[j])
                + options.e_abs * options.e_abs;
            if residual_sq[j] > tol {
                converged = false;
            }
            for dual in &duals[j] {
                let tol = options.e_rel * options.e_rel * dual.z_norm_sq
                    + options.e_abs * options.e_abs;
                if dual.z_residual_sq > tol {
                    converged = false;
                }
            }
        }

        if let Some(trace) = trace.as_mut() {
            trace.records.push(TraceRecord {
                iteration: it,
                steps: step_used.clone(),
                residuals: residual_sq.clone(),
                blocks: blocks.clone(),
            });
        }
        log::trace!(
            "iteration {it}: primal residual {:.3e}",
            residual_sq.iter().sum::<f64>().sqrt()
        );

        if converged {
            log::debug!("converged after {} iterations", it + 1);
            return Ok(Solution {
                blocks,
                iterations: it + 1,
                converged: true,
                trace,
            });
        }
    }

    log::debug!(
        "stopped at the iteration limit ({}) without meeting the residual thresholds",
        options.max_iter
    );
    Ok(Solution {
        blocks,
        iterations: options.max_iter,
        converged: false,
        trace,
    })
}

fn constraint_list(constraints: &[Vec<Constraint>], j: usize) -> &[Constraint] {
    constraints.get(j).map(Vec::as_slice).unwrap_or(&[])
}

fn norm_sq(x: &Array2<f64>) -> f64 {
    x.iter().map(|v| v * v).sum()
}

fn norm_sq_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{Identity, NonNegative};
    use ndarray::array;

    /// Proximal update for the separable objective ½‖X − target‖² per block.
    struct ProxQuadratic<P: ProxOp> {
        targets: Vec<Array2<f64>>,
        prox: P,
    }

    impl<P: ProxOp> BlockUpdate for ProxQuadratic<P> {
        fn update(
            &self,
            x: &Array2<f64>,
            step: f64,
            _blocks: &[Array2<f64>],
            index: usize,
        ) -> Array2<f64> {
            let mut next = x - &((x - &self.targets[index]) * step);
            self.prox.apply(&mut next, step);
            next
        }
    }

    struct FixedStep(f64);

    impl StepRule for FixedStep {
        fn step(&mut self, _index: usize, _blocks: &[Array2<f64>]) -> f64 {
            self.0
        }
    }

    #[test]
    fn quadratic_blocks_reach_their_targets() {
        let targets = vec![array![[1.0, -2.0]], array![[3.0]]];
        let update = ProxQuadratic {
            targets: targets.clone(),
            prox: Identity,
        };
        let blocks = vec![array![[0.0, 0.0]], array![[0.0]]];
        let options = SolveOptions {
            e_rel: 1e-8,
            ..SolveOptions::default()
        };
        let solution = solve(blocks, &update, &mut FixedStep(0.5), &[], &options).unwrap();
        assert!(solution.converged);
        for (block, target) in solution.blocks.iter().zip(&targets) {
            assert!(norm_sq_diff(block, target).sqrt() < 1e-6);
        }
    }

    #[test]
    fn non_negative_prox_clamps_the_solution() {
        let update = ProxQuadratic {
            targets: vec![array![[-1.0, 2.0]]],
            prox: NonNegative,
        };
        let blocks = vec![array![[1.0, 1.0]]];
        let options = SolveOptions {
            e_rel: 1e-8,
            ..SolveOptions::default()
        };
        let solution = solve(blocks, &update, &mut FixedStep(0.5), &[], &options).unwrap();
        assert!(solution.converged);
        assert!(norm_sq_diff(&solution.blocks[0], &array![[0.0, 2.0]]).sqrt() < 1e-6);
    }

    #[test]
    fn acceleration_reaches_the_same_fixed_point() {
        let update = ProxQuadratic {
            targets: vec![array![[2.0, -1.0], [0.5, 4.0]]],
            prox: Identity,
        };
        let blocks = vec![array![[0.0, 0.0], [0.0, 0.0]]];
        let options = SolveOptions {
            accelerated: true,
            e_rel: 1e-8,
            ..SolveOptions::default()
        };
        let solution = solve(blocks, &update, &mut FixedStep(0.4), &[], &options).unwrap();
        assert!(solution.converged);
        assert!(norm_sq_diff(&solution.blocks[0], &update.targets[0]).sqrt() < 1e-6);
    }

    #[test]
    fn admm_constraint_enforces_non_negativity() {
        // Identity direct prox; non-negativity only through the dual updates.
        let update = ProxQuadratic {
            targets: vec![array![[-1.0, 2.0]]],
            prox: Identity,
        };
        let blocks = vec![array![[0.0, 0.0]]];
        let constraints = vec![vec![Constraint::new(Box::new(NonNegative))]];
        let options = SolveOptions {
            max_iter: 500,
            e_rel: 1e-8,
            ..SolveOptions::default()
        };
        let solution = solve(
            blocks,
            &update,
            &mut FixedStep(0.5),
            &constraints,
            &options,
        )
        .unwrap();
        assert!(solution.converged);
        assert!(norm_sq_diff(&solution.blocks[0], &array![[0.0, 2.0]]).sqrt() < 1e-3);
    }

    #[test]
    fn iteration_limit_is_reported_without_error() {
        let update = ProxQuadratic {
            targets: vec![array![[100.0]]],
            prox: Identity,
        };
        let blocks = vec![array![[0.0]]];
        let options = SolveOptions {
            max_iter: 1,
            e_rel: 1e-12,
            ..SolveOptions::default()
        };
        let solution = solve(blocks, &update, &mut FixedStep(0.01), &[], &options).unwrap();
        assert!(!solution.converged);
        assert_eq!(solution.iterations, 1);
    }

    #[test]
    fn traceback_records_every_iteration() {
        let update = ProxQuadratic {
            targets: vec![array![[1.0]]],
            prox: Identity,
        };
        let blocks = vec![array![[0.0]]];
        let options = SolveOptions {
            traceback: true,
            e_rel: 1e-8,
            ..SolveOptions::default()
        };
        let solution = solve(blocks, &update, &mut FixedStep(0.5), &[], &options).unwrap();
        let trace = solution.trace.unwrap();
        assert_eq!(trace.len(), solution.iterations);
        assert!(!trace.is_empty());
        let record = &trace.records[0];
        assert_eq!(record.steps, vec![0.5]);
        assert_eq!(record.blocks.len(), 1);
    }

    #[test]
    fn invalid_update_order_is_rejected() {
        let update = ProxQuadratic {
            targets: vec![array![[1.0]]],
            prox: Identity,
        };
        let options = SolveOptions {
            update_order: Some(vec![0, 3]),
            ..SolveOptions::default()
        };
        let result = solve(
            vec![array![[0.0]]],
            &update,
            &mut FixedStep(0.5),
            &[],
            &options,
        );
        assert!(matches!(
            result,
            Err(ProxError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn linear_operator_matrix_applies_and_scales() {
        let l = LinearOperator::Matrix(array![[2.0, 0.0], [0.0, 2.0]]);
        let x = array![[1.0], [3.0]];
        assert_eq!(l.apply(&x), array![[2.0], [6.0]]);
        assert_eq!(l.apply_transpose(&x), array![[2.0], [6.0]]);
        assert!((l.norm_sq() - 4.0).abs() < 1e-8);
        assert_eq!(LinearOperator::Identity.norm_sq(), 1.0);
    }
}
