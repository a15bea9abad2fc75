//! Iteration history recording.

use ndarray::Array2;

/// Snapshot of one solver iteration.
#[derive(Clone, Debug)]
pub struct TraceRecord {
    /// Zero-based outer iteration.
    pub iteration: usize,
    /// Step size used for each block this iteration.
    pub steps: Vec<f64>,
    /// Squared primal residual ‖X − X_prev‖² per block.
    pub residuals: Vec<f64>,
    /// Block values at the end of the iteration.
    pub blocks: Vec<Array2<f64>>,
}

/// Record of all optimization variables across a solve.
///
/// Holds one full snapshot per iteration, so memory grows linearly with
/// the iteration count. Only populated when tracing is requested.
#[derive(Clone, Debug, Default)]
pub struct Trace {
    /// Per-iteration records, in order.
    pub records: Vec<TraceRecord>,
}

impl Trace {
    /// Number of recorded iterations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
