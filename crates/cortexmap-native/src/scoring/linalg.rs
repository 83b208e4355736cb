//! Linear algebra helpers: Cholesky factor/solve and correlation statistics.

/// Lower-triangular Cholesky factor of a symmetric positive definite matrix
#[derive(Clone, Debug)]
pub struct Cholesky {
    l: Vec<f64>,
    k: usize,
}

impl Cholesky {
    /// Factor a `k × k` row-major Gram matrix: G = L · Lᵀ.
    /// Near-zero pivots are clamped so the solve stays finite.
    #[must_use]
    pub fn factor(gram: &[f64], k: usize) -> Self {
        let mut l = vec![0.0f64; k * k];
        for i in 0..k {
            for j in 0..=i {
                let mut sum = gram[i * k + j];
                for p in 0..j {
                    sum -= l[i * k + p] * l[j * k + p];
                }
                if i == j {
                    l[i * k + j] = if sum > 1e-12 { sum.sqrt() } else { 1e-6 };
                } else {
                    l[i * k + j] = sum / l[j * k + j];
                }
            }
        }
        Self { l, k }
    }

    /// Solve G · x = rhs
    #[must_use]
    pub fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        let (l, k) = (&self.l, self.k);

        // Forward: L · y = rhs
        let mut y = vec![0.0f64; k];
        for i in 0..k {
            let mut sum = rhs[i];
            for j in 0..i {
                sum -= l[i * k + j] * y[j];
            }
            y[i] = sum / l[i * k + i];
        }

        // Backward: Lᵀ · x = y
        let mut x = vec![0.0f64; k];
        for i in (0..k).rev() {
            let mut sum = y[i];
            for j in (i + 1)..k {
                sum -= l[j * k + i] * x[j];
            }
            x[i] = sum / l[i * k + i];
        }

        x
    }
}

/// Pearson correlation; 0 for mismatched, empty or constant inputs
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.is_empty() {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let n = x.len() as f64;
    let mean_x: f64 = x.iter().sum::<f64>() / n;
    let mean_y: f64 = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x < 1e-10 || var_y < 1e-10 {
        return 0.0;
    }

    cov / (var_x.sqrt() * var_y.sqrt())
}

/// Median of a slice, ignoring NaN; 0 when nothing is left
pub fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cholesky_solve() {
        // [[4, 2], [2, 3]] · [1, 2] = [8, 8]
        let gram = [4.0, 2.0, 2.0, 3.0];
        let x = Cholesky::factor(&gram, 2).solve(&[8.0, 8.0]);
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_pearson_correlation() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        assert!((pearson_correlation(&x, &y) - 1.0).abs() < 1e-10);

        let flipped: Vec<f64> = y.iter().map(|v| -v).collect();
        assert!((pearson_correlation(&x, &flipped) + 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_pearson_degenerate() {
        assert_eq!(pearson_correlation(&[1.0, 1.0], &[2.0, 3.0]), 0.0);
        assert_eq!(pearson_correlation(&[], &[]), 0.0);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[f64::NAN, 5.0]), 5.0);
        assert_eq!(median(&[]), 0.0);
    }
}
