//! Spectral-norm estimation.

use ndarray::{Array1, ArrayView2};

const MAX_ITER: usize = 200;
const TOL: f64 = 1e-10;

/// Largest singular value of `m`.
///
/// Computed by power iteration on the smaller Gram matrix of `m`. The
/// start vector is deterministic (uniform, with basis-vector restarts if
/// it lies in the null space), so repeated calls on the same matrix agree
/// exactly. Returns 0 for an empty or all-zero matrix.
pub fn spectral_norm(m: &ArrayView2<f64>) -> f64 {
    let (rows, cols) = m.dim();
    if rows == 0 || cols == 0 {
        return 0.0;
    }

    let side = rows.min(cols);
    let mut v = Array1::from_elem(side, 1.0 / (side as f64).sqrt());
    let mut estimate = 0.0;
    let mut restarts = 0;
    let mut iter = 0;
    while iter < MAX_ITER {
        let w = gram_apply(m, &v);
        let norm = w.dot(&w).sqrt();
        if norm == 0.0 {
            // The current vector is in the null space; restart from the
            // next basis vector until one escapes or the matrix is zero.
            if restarts < side {
                v.fill(0.0);
                v[restarts] = 1.0;
                restarts += 1;
                iter += 1;
                continue;
            }
            return 0.0;
        }
        let converged = (norm - estimate).abs() <= TOL * norm;
        estimate = norm;
        v = w / norm;
        if converged {
            break;
        }
        iter += 1;
    }
    estimate.sqrt()
}

/// Apply the smaller of MᵀM and MMᵀ to `v`.
fn gram_apply(m: &ArrayView2<f64>, v: &Array1<f64>) -> Array1<f64> {
    let (rows, cols) = m.dim();
    if cols <= rows {
        m.t().dot(&m.dot(v))
    } else {
        m.dot(&m.t().dot(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    #[test]
    fn diagonal_matrix_returns_largest_entry() {
        let m = array![[3.0, 0.0], [0.0, 1.0]];
        assert!((spectral_norm(&m.view()) - 3.0).abs() < 1e-8);
    }

    #[test]
    fn identity_has_unit_norm() {
        let m = Array2::<f64>::eye(4);
        assert!((spectral_norm(&m.view()) - 1.0).abs() < 1e-8);
    }

    #[test]
    fn rectangular_matrix_matches_known_singular_value() {
        let m = array![[3.0, 0.0], [0.0, 4.0], [0.0, 0.0]];
        assert!((spectral_norm(&m.view()) - 4.0).abs() < 1e-8);
    }

    #[test]
    fn null_space_start_is_restarted() {
        // The uniform start vector is annihilated by this Gram matrix.
        let m = array![[1.0, -1.0], [0.0, 0.0]];
        assert!((spectral_norm(&m.view()) - 2.0_f64.sqrt()).abs() < 1e-8);
    }

    #[test]
    fn zero_and_empty_matrices_return_zero() {
        let zero = Array2::<f64>::zeros((3, 2));
        assert_eq!(spectral_norm(&zero.view()), 0.0);
        let empty = Array2::<f64>::zeros((0, 2));
        assert_eq!(spectral_norm(&empty.view()), 0.0);
    }

    #[test]
    fn transpose_has_the_same_norm() {
        let m = array![[1.0, 2.0, 0.5], [0.0, 1.0, -1.0]];
        let a = spectral_norm(&m.view());
        let b = spectral_norm(&m.t());
        assert!((a - b).abs() < 1e-8);
    }
}
