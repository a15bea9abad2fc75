//! Adaptive Lipschitz step sizes for the alternating factor updates.
//!
//! The safe gradient step for one factor is bounded by the inverse
//! Lipschitz constant of the data-fidelity gradient, which requires a
//! spectral norm of the opposite factor. That norm is the dominant cost
//! per iteration, so the controller caches each factor's bound and only
//! recomputes it on a stride that widens as the bound stabilizes.

use ndarray::Array2;
use proxmf_core::error::{ProxError, Result};
use proxmf_core::solver::StepRule;
use proxmf_core::spectral::spectral_norm;

use crate::factor::Factor;

/// Default cap on the recompute interval.
pub const DEFAULT_MAX_STRIDE: usize = 100;

/// Stateful per-factor estimator of the Lipschitz step size.
///
/// For each factor it keeps the last computed bound, the iteration it was
/// computed at, and the current recompute stride. A call either serves
/// `slack / bound` from the cache or recomputes the bound; after a
/// recompute, if the relative change stayed under half the slack budget
/// `(1 − slack) / 2`, the stride grows by `budget / rel_change` times its
/// current value (never shrinking, clamped at `max_stride`), so stable
/// problems settle into long cache runs.
///
/// One instance serves exactly one optimization run; the iteration
/// bookkeeping assumes calls arrive in the solver's alternating order.
pub struct LipschitzSteps {
    slack: f64,
    wa_max: f64,
    ws_max: f64,
    max_stride: usize,
    advance_index: usize,
    it: usize,
    stride: [usize; 2],
    last: [i64; 2],
    stored: [f64; 2],
}

impl LipschitzSteps {
    /// Create a controller for one optimization run.
    ///
    /// `slack` is the convergence margin on the inverse-Lipschitz step and
    /// must lie in (0, 1]; `w_max` bounds the residual weights (1 when
    /// unweighted). The factor whose update ends one outer iteration is
    /// the last entry of `update_order` (Source when `None`); its calls
    /// advance the iteration counter.
    pub fn new(
        slack: f64,
        w_max: f64,
        max_stride: usize,
        update_order: Option<&[Factor]>,
    ) -> Result<Self> {
        Self::with_factor_bounds(slack, w_max, w_max, max_stride, update_order)
    }

    /// Like [`LipschitzSteps::new`], with separate weight bounds per factor.
    pub fn with_factor_bounds(
        slack: f64,
        wa_max: f64,
        ws_max: f64,
        max_stride: usize,
        update_order: Option<&[Factor]>,
    ) -> Result<Self> {
        if !(slack > 0.0 && slack <= 1.0) {
            return Err(ProxError::invalid(format!(
                "slack must lie in (0, 1], got {slack}"
            )));
        }
        if max_stride == 0 {
            return Err(ProxError::invalid("max_stride must be at least 1"));
        }
        let advance_index = update_order
            .and_then(|order| order.last().copied())
            .unwrap_or(Factor::Source)
            .index();
        Ok(Self {
            slack,
            wa_max,
            ws_max,
            max_stride,
            advance_index,
            it: 0,
            stride: [1, 1],
            // Below any reachable iteration, so the first call per factor
            // always recomputes and `stored` is written before it is read.
            last: [-1, -1],
            stored: [0.0, 0.0],
        })
    }

    /// Step size for updating `which`, given the current factors.
    pub fn step_for(&mut self, which: Factor, factors: &[Array2<f64>]) -> f64 {
        let j = which.index();
        if self.it as i64 >= self.last[j] + self.stride[j] as i64 {
            self.last[j] = self.it as i64;
            let bound = self.lipschitz_bound(which, factors);
            if j == self.advance_index {
                self.it += 1;
            }
            if self.it > 1 && self.slack < 1.0 {
                let budget = (1.0 - self.slack) / 2.0;
                let rel_error = (self.stored[j] - bound).abs() / self.stored[j];
                if rel_error > 0.0 && rel_error < budget {
                    let growth = (budget / rel_error * self.stride[j] as f64) as usize;
                    self.stride[j] = self.stride[j]
                        .saturating_add(growth.max(1))
                        .min(self.max_stride);
                }
            }
            self.stored[j] = bound;
        } else if j == self.advance_index {
            self.it += 1;
        }
        self.slack / self.stored[j]
    }

    /// Current recompute interval for `which`.
    pub fn stride(&self, which: Factor) -> usize {
        self.stride[which.index()]
    }

    /// Outer iterations counted so far.
    pub fn iteration(&self) -> usize {
        self.it
    }

    fn lipschitz_bound(&self, which: Factor, factors: &[Array2<f64>]) -> f64 {
        // ‖∇²f‖ of the quadratic data term: ‖S·Sᵗ‖ = σ_max(S)² when
        // updating A, ‖Aᵗ·A‖ = σ_max(A)² when updating S, scaled by the
        // weight bound.
        let bound = match which {
            Factor::Amplitude => {
                let sn = spectral_norm(&factors[Factor::Source.index()].view());
                sn * sn * self.wa_max
            }
            Factor::Source => {
                let sn = spectral_norm(&factors[Factor::Amplitude.index()].view());
                sn * sn * self.ws_max
            }
        };
        // A zero bound (zero opposite factor) would poison the relative
        // change and the returned step; the floor keeps both finite.
        bound.max(f64::MIN_POSITIVE)
    }
}

impl StepRule for LipschitzSteps {
    fn step(&mut self, index: usize, blocks: &[Array2<f64>]) -> f64 {
        self.step_for(Factor::from_index(index), blocks)
    }
}
