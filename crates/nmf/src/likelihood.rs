//! Weighted quadratic data-fidelity model and its proximal update.

use ndarray::Array2;
use proxmf_core::operators::ProxOp;
use proxmf_core::solver::BlockUpdate;

use crate::factor::{Factor, Weight};

/// Weighted model residual W ⊙ (A·S − Y).
pub fn residual(
    amplitude: &Array2<f64>,
    source: &Array2<f64>,
    target: &Array2<f64>,
    weight: &Weight,
) -> Array2<f64> {
    let mut r = amplitude.dot(source) - target;
    weight.apply(&mut r);
    r
}

/// Gradient of ½‖W½(A·S − Y)‖² with respect to A.
pub fn grad_amplitude(
    amplitude: &Array2<f64>,
    source: &Array2<f64>,
    target: &Array2<f64>,
    weight: &Weight,
) -> Array2<f64> {
    residual(amplitude, source, target, weight).dot(&source.t())
}

/// Gradient of ½‖W½(A·S − Y)‖² with respect to S.
pub fn grad_source(
    source: &Array2<f64>,
    amplitude: &Array2<f64>,
    target: &Array2<f64>,
    weight: &Weight,
) -> Array2<f64> {
    amplitude.t().dot(&residual(amplitude, source, target, weight))
}

/// Configured update strategy for one factorization run.
///
/// Owns the target, the weights, and the two direct projections, bound
/// once at configuration time; the solver then invokes it repeatedly with
/// varying evaluation points, step sizes, and factor indices. The update
/// is one gradient step on the data fidelity followed by the projection
/// of the factor being updated.
pub struct LikelihoodProx<PA, PS> {
    target: Array2<f64>,
    weight: Weight,
    prox_amplitude: PA,
    prox_source: PS,
}

impl<PA: ProxOp, PS: ProxOp> LikelihoodProx<PA, PS> {
    /// Bind the fixed run data and the two factor projections.
    pub fn new(
        target: Array2<f64>,
        weight: Weight,
        prox_amplitude: PA,
        prox_source: PS,
    ) -> Self {
        Self {
            target,
            weight,
            prox_amplitude,
            prox_source,
        }
    }

    /// Proximal gradient update of `which`, evaluated at `x`.
    ///
    /// The opposite, fixed factor is read from `factors`.
    pub fn update_factor(
        &self,
        x: &Array2<f64>,
        step: f64,
        factors: &[Array2<f64>],
        which: Factor,
    ) -> Array2<f64> {
        match which {
            Factor::Amplitude => {
                let grad = grad_amplitude(
                    x,
                    &factors[Factor::Source.index()],
                    &self.target,
                    &self.weight,
                );
                let mut next = x - &(grad * step);
                self.prox_amplitude.apply(&mut next, step);
                next
            }
            Factor::Source => {
                let grad = grad_source(
                    x,
                    &factors[Factor::Amplitude.index()],
                    &self.target,
                    &self.weight,
                );
                let mut next = x - &(grad * step);
                self.prox_source.apply(&mut next, step);
                next
            }
        }
    }
}

impl<PA: ProxOp, PS: ProxOp> BlockUpdate for LikelihoodProx<PA, PS> {
    fn update(
        &self,
        x: &Array2<f64>,
        step: f64,
        blocks: &[Array2<f64>],
        index: usize,
    ) -> Array2<f64> {
        self.update_factor(x, step, blocks, Factor::from_index(index))
    }
}
