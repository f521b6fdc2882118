// src/utils.rs

use ndarray::{Array1, Array2, ArrayView1};

pub fn calculate_portfolio_return(x: &[f64], mean_returns: &[f64]) -> f64 {
    x.iter()
        .zip(mean_returns.iter())
        .map(|(xi, mu)| xi * mu)
        .sum()
}

// Σ·x, shared by the variance and the objective gradient
pub fn calculate_covariance_product(x: &[f64], cov: &Array2<f64>) -> Array1<f64> {
    cov.dot(&ArrayView1::from(x))
}

pub fn calculate_portfolio_variance(x: &[f64], cov: &Array2<f64>) -> f64 {
    ArrayView1::from(x).dot(&calculate_covariance_product(x, cov))
}

pub fn calculate_portfolio_volatility(x: &[f64], cov: &Array2<f64>) -> f64 {
    // Rounding can push the quadratic form a hair below zero
    calculate_portfolio_variance(x, cov).max(0.0).sqrt()
}

pub fn is_symmetric(matrix: &Array2<f64>, tolerance: f64) -> bool {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return false;
    }

    for i in 0..rows {
        for j in (i + 1)..cols {
            let a = matrix[[i, j]];
            let b = matrix[[j, i]];
            let scale = a.abs().max(b.abs()).max(1.0);
            if (a - b).abs() > tolerance * scale {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_calculate_portfolio_return() {
        let x = vec![0.3, 0.5, 0.2];
        let mean_returns = vec![0.04, 0.05, 0.06];

        let result = calculate_portfolio_return(&x, &mean_returns);
        let expected = 0.3 * 0.04 + 0.5 * 0.05 + 0.2 * 0.06;
        assert!((result - expected).abs() < 1e-12);
    }

    #[test]
    fn test_calculate_portfolio_variance() {
        let x = vec![0.25, 0.75];
        let cov = array![[0.04, 0.006], [0.006, 0.09]];

        let result = calculate_portfolio_variance(&x, &cov);
        let expected = 0.25 * 0.25 * 0.04 + 2.0 * 0.25 * 0.75 * 0.006 + 0.75 * 0.75 * 0.09;
        assert!((result - expected).abs() < 1e-12);

        let vol = calculate_portfolio_volatility(&x, &cov);
        assert!((vol - expected.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_volatility_of_perfect_hedge_is_zero() {
        let x = vec![0.5, 0.5];
        let cov = array![[0.04, -0.04], [-0.04, 0.04]];
        assert_eq!(calculate_portfolio_volatility(&x, &cov), 0.0);
    }

    #[test]
    fn test_is_symmetric() {
        let symmetric = array![[0.04, 0.01], [0.01, 0.09]];
        assert!(is_symmetric(&symmetric, 1e-10));

        let skewed = array![[0.04, 0.01], [0.02, 0.09]];
        assert!(!is_symmetric(&skewed, 1e-10));

        let non_square = Array2::<f64>::zeros((2, 3));
        assert!(!is_symmetric(&non_square, 1e-10));
    }
}
