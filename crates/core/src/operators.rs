//! Projection and proximal operators applied between gradient steps.

use ndarray::Array2;

/// A proximal operator.
///
/// `apply` projects `x` onto the operator's constraint set in place.
/// `step` is the gradient step size that produced `x`; scaled operators
/// (thresholding) fold it into their threshold, projections ignore it.
pub trait ProxOp {
    /// Project `x` in place.
    fn apply(&self, x: &mut Array2<f64>, step: f64);
}

impl<F> ProxOp for F
where
    F: Fn(&mut Array2<f64>, f64),
{
    fn apply(&self, x: &mut Array2<f64>, step: f64) {
        self(x, step)
    }
}

/// The identity operator (no constraint).
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl ProxOp for Identity {
    fn apply(&self, _x: &mut Array2<f64>, _step: f64) {}
}

/// Projection onto the non-negative orthant.
#[derive(Clone, Copy, Debug, Default)]
pub struct NonNegative;

impl ProxOp for NonNegative {
    fn apply(&self, x: &mut Array2<f64>, _step: f64) {
        x.mapv_inplace(|v| v.max(0.0));
    }
}

/// Clamp entries from below.
#[derive(Clone, Copy, Debug)]
pub struct LowerBound(pub f64);

impl ProxOp for LowerBound {
    fn apply(&self, x: &mut Array2<f64>, _step: f64) {
        let lo = self.0;
        x.mapv_inplace(|v| v.max(lo));
    }
}

/// Clamp entries from above.
#[derive(Clone, Copy, Debug)]
pub struct UpperBound(pub f64);

impl ProxOp for UpperBound {
    fn apply(&self, x: &mut Array2<f64>, _step: f64) {
        let hi = self.0;
        x.mapv_inplace(|v| v.min(hi));
    }
}

/// Soft thresholding, the prox of the L1 penalty with the given weight.
///
/// Shrinks every entry toward zero by `weight * step`.
#[derive(Clone, Copy, Debug)]
pub struct SoftThreshold(pub f64);

impl ProxOp for SoftThreshold {
    fn apply(&self, x: &mut Array2<f64>, step: f64) {
        let thresh = self.0 * step;
        x.mapv_inplace(|v| v.signum() * (v.abs() - thresh).max(0.0));
    }
}

/// Hard thresholding: zero every entry smaller in magnitude than
/// `weight * step`.
#[derive(Clone, Copy, Debug)]
pub struct HardThreshold(pub f64);

impl ProxOp for HardThreshold {
    fn apply(&self, x: &mut Array2<f64>, step: f64) {
        let thresh = self.0 * step;
        x.mapv_inplace(|v| if v.abs() < thresh { 0.0 } else { v });
    }
}
