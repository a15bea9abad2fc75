//! Factor indexing and the residual weight model.

use ndarray::Array2;

/// The two factors of the bilinear model Y ≈ A·S.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Factor {
    /// The left factor A (M×K), mixing amplitudes.
    Amplitude,
    /// The right factor S (K×N), sources.
    Source,
}

impl Factor {
    /// Block index used by the generic solver.
    pub fn index(self) -> usize {
        match self {
            Self::Amplitude => 0,
            Self::Source => 1,
        }
    }

    /// Factor for a solver block index.
    ///
    /// Panics if `index` is not 0 or 1; the solver is configured with
    /// exactly two blocks.
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Amplitude,
            1 => Self::Source,
            _ => panic!("factor index out of range: {index}"),
        }
    }
}

/// Weights applied elementwise to the model residual.
#[derive(Clone, Debug)]
pub enum Weight {
    /// A single weight for every entry.
    Scalar(f64),
    /// Per-entry non-negative weights, shaped like Y.
    Matrix(Array2<f64>),
}

impl Default for Weight {
    fn default() -> Self {
        Self::Scalar(1.0)
    }
}

impl Weight {
    /// Scale `residual` in place.
    ///
    /// A matrix weight must match the residual's shape; a mismatch panics
    /// from the elementwise product.
    pub fn apply(&self, residual: &mut Array2<f64>) {
        match self {
            Self::Scalar(w) => {
                let w = *w;
                if w != 1.0 {
                    residual.mapv_inplace(|v| v * w);
                }
            }
            Self::Matrix(w) => {
                *residual *= w;
            }
        }
    }

    /// Largest weight, used to bound the gradient's Lipschitz constant.
    pub fn max(&self) -> f64 {
        match self {
            Self::Scalar(w) => *w,
            Self::Matrix(w) => w.iter().fold(0.0_f64, |acc, &v| acc.max(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn factor_indices_round_trip() {
        assert_eq!(Factor::from_index(Factor::Amplitude.index()), Factor::Amplitude);
        assert_eq!(Factor::from_index(Factor::Source.index()), Factor::Source);
    }

    #[test]
    fn scalar_weight_scales_residual() {
        let mut r = array![[1.0, -2.0]];
        Weight::Scalar(0.5).apply(&mut r);
        assert_eq!(r, array![[0.5, -1.0]]);
    }

    #[test]
    fn matrix_weight_is_elementwise() {
        let mut r = array![[1.0, -2.0], [3.0, 4.0]];
        let w = array![[1.0, 0.0], [0.5, 2.0]];
        Weight::Matrix(w).apply(&mut r);
        assert_eq!(r, array![[1.0, 0.0], [1.5, 8.0]]);
    }

    #[test]
    fn weight_max_covers_both_forms() {
        assert_eq!(Weight::Scalar(3.0).max(), 3.0);
        assert_eq!(Weight::Matrix(array![[0.1, 2.0], [0.5, 1.0]]).max(), 2.0);
        assert_eq!(Weight::default().max(), 1.0);
    }
}
