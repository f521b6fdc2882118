// src/portfolio.rs

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{AllocationError, AllocationResult};
use crate::utils::{calculate_portfolio_volatility, is_symmetric};

/// Below this the Sharpe ratio is treated as undefined.
pub const MIN_VOLATILITY: f64 = 1e-12;

/// Relative tolerance for the covariance symmetry check.
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

fn check_tickers(tickers: &[String]) -> AllocationResult<()> {
    if tickers.is_empty() {
        return Err(AllocationError::InvalidInput("at least one asset is required".to_string()));
    }
    let mut seen = HashSet::new();
    for ticker in tickers {
        if !seen.insert(ticker.as_str()) {
            return Err(AllocationError::InvalidInput(format!("duplicate ticker {}", ticker)));
        }
    }
    Ok(())
}

/// Date-aligned closing prices, one row per trading day and one column per
/// ticker. NaN marks a missing observation.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSeries {
    tickers: Vec<String>,
    prices: Array2<f64>,
}

impl AssetSeries {
    pub fn new(tickers: Vec<String>, rows: Vec<Vec<f64>>) -> AllocationResult<Self> {
        check_tickers(&tickers)?;
        let width = tickers.len();

        let mut flat = Vec::with_capacity(rows.len() * width);
        for (t, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(AllocationError::InvalidInput(format!(
                    "price row {} has {} values, expected {}",
                    t,
                    row.len(),
                    width
                )));
            }
            flat.extend_from_slice(row);
        }

        let prices = Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|e| AllocationError::InvalidInput(e.to_string()))?;
        Ok(AssetSeries { tickers, prices })
    }

    pub fn from_array(tickers: Vec<String>, prices: Array2<f64>) -> AllocationResult<Self> {
        check_tickers(&tickers)?;
        if prices.ncols() != tickers.len() {
            return Err(AllocationError::InvalidInput(format!(
                "price matrix has {} columns for {} tickers",
                prices.ncols(),
                tickers.len()
            )));
        }
        Ok(AssetSeries { tickers, prices })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn prices(&self) -> &Array2<f64> {
        &self.prices
    }

    pub fn num_assets(&self) -> usize {
        self.tickers.len()
    }

    pub fn num_observations(&self) -> usize {
        self.prices.nrows()
    }
}

/// Annualized expected return per asset.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanReturnVector {
    tickers: Vec<String>,
    values: Array1<f64>,
}

impl MeanReturnVector {
    pub fn new(tickers: Vec<String>, values: Vec<f64>) -> AllocationResult<Self> {
        Self::from_array(tickers, Array1::from(values))
    }

    pub fn from_array(tickers: Vec<String>, values: Array1<f64>) -> AllocationResult<Self> {
        check_tickers(&tickers)?;
        if values.len() != tickers.len() {
            return Err(AllocationError::InvalidInput(format!(
                "{} mean returns for {} tickers",
                values.len(),
                tickers.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AllocationError::InvalidInput("mean returns must be finite".to_string()));
        }
        Ok(MeanReturnVector { tickers, values })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.tickers
            .iter()
            .position(|t| t == ticker)
            .map(|i| self.values[i])
    }
}

/// Annualized covariance of daily returns. Always square, symmetric and
/// with a non-negative diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    tickers: Vec<String>,
    values: Array2<f64>,
}

impl CovarianceMatrix {
    pub fn new(tickers: Vec<String>, rows: Vec<Vec<f64>>) -> AllocationResult<Self> {
        let n = rows.len();
        let mut flat = Vec::with_capacity(n * n);
        for row in &rows {
            if row.len() != n {
                return Err(AllocationError::InvalidInput(format!(
                    "covariance matrix is not square: row of {} in a {}-row matrix",
                    row.len(),
                    n
                )));
            }
            flat.extend_from_slice(row);
        }
        let values = Array2::from_shape_vec((n, n), flat)
            .map_err(|e| AllocationError::InvalidInput(e.to_string()))?;
        Self::from_array(tickers, values)
    }

    pub fn from_array(tickers: Vec<String>, values: Array2<f64>) -> AllocationResult<Self> {
        check_tickers(&tickers)?;
        let (rows, cols) = values.dim();
        if rows != cols {
            return Err(AllocationError::InvalidInput(format!(
                "covariance matrix is {}x{}, expected square",
                rows, cols
            )));
        }
        if rows != tickers.len() {
            return Err(AllocationError::InvalidInput(format!(
                "covariance matrix is {}x{} for {} tickers",
                rows,
                cols,
                tickers.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AllocationError::InvalidInput(
                "covariance entries must be finite".to_string(),
            ));
        }
        if values.diag().iter().any(|v| *v < 0.0) {
            return Err(AllocationError::InvalidInput(
                "covariance diagonal must be non-negative".to_string(),
            ));
        }
        if !is_symmetric(&values, SYMMETRY_TOLERANCE) {
            return Err(AllocationError::InvalidInput(
                "covariance matrix is not symmetric".to_string(),
            ));
        }
        Ok(CovarianceMatrix { tickers, values })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn dim(&self) -> usize {
        self.values.nrows()
    }

    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.tickers.iter().position(|t| t == row)?;
        let j = self.tickers.iter().position(|t| t == col)?;
        Some(self.values[[i, j]])
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.values.outer_iter().map(|row| row.to_vec()).collect()
    }
}

/// Allocation fractions in the same asset order as the statistics they were
/// optimized against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    pub tickers: Vec<String>,
    pub weights: Vec<f64>,
}

impl WeightVector {
    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.tickers
            .iter()
            .position(|t| t == ticker)
            .map(|i| self.weights[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.tickers.iter().map(String::as_str).zip(self.weights.iter().copied())
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub expected_return: f64,
    pub expected_volatility: f64,
    pub sharpe_ratio: f64,
}

impl PortfolioStats {
    /// Evaluates the portfolio at `weights`. Returns `None` when the
    /// volatility is too small for the Sharpe ratio to be defined.
    pub fn compute(
        weights: &[f64],
        mean_returns: &MeanReturnVector,
        cov_matrix: &CovarianceMatrix,
        risk_free_rate: f64,
    ) -> Option<Self> {
        let expected_return = ArrayView1::from(weights).dot(mean_returns.values());
        let expected_volatility = calculate_portfolio_volatility(weights, cov_matrix.values());

        // written negated so a NaN volatility also lands here
        if !(expected_volatility > MIN_VOLATILITY) {
            return None;
        }

        Some(PortfolioStats {
            expected_return,
            expected_volatility,
            sharpe_ratio: (expected_return - risk_free_rate) / expected_volatility,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_asset_series_rejects_ragged_rows() {
        let result = AssetSeries::new(tickers(&["A", "B"]), vec![vec![1.0, 2.0], vec![1.0]]);
        assert!(matches!(result, Err(AllocationError::InvalidInput(_))));
    }

    #[test]
    fn test_asset_series_rejects_duplicate_tickers() {
        let result = AssetSeries::new(tickers(&["A", "A"]), vec![vec![1.0, 2.0]]);
        assert!(matches!(result, Err(AllocationError::InvalidInput(_))));
    }

    #[test]
    fn test_covariance_validation() {
        let ok = CovarianceMatrix::new(
            tickers(&["A", "B"]),
            vec![vec![0.04, 0.01], vec![0.01, 0.09]],
        );
        assert!(ok.is_ok());
        assert_eq!(ok.unwrap().get("B", "A"), Some(0.01));

        let asymmetric = CovarianceMatrix::new(
            tickers(&["A", "B"]),
            vec![vec![0.04, 0.01], vec![0.03, 0.09]],
        );
        assert!(matches!(asymmetric, Err(AllocationError::InvalidInput(_))));

        let negative_variance = CovarianceMatrix::new(tickers(&["A"]), vec![vec![-0.01]]);
        assert!(matches!(negative_variance, Err(AllocationError::InvalidInput(_))));

        let non_square = CovarianceMatrix::new(
            tickers(&["A", "B"]),
            vec![vec![0.04, 0.0, 0.0], vec![0.0, 0.09, 0.0]],
        );
        assert!(matches!(non_square, Err(AllocationError::InvalidInput(_))));

        let wrong_size = CovarianceMatrix::new(
            tickers(&["A", "B", "C"]),
            vec![vec![0.04, 0.0], vec![0.0, 0.09]],
        );
        assert!(matches!(wrong_size, Err(AllocationError::InvalidInput(_))));
    }

    #[test]
    fn test_mean_returns_lookup() {
        let mean = MeanReturnVector::new(tickers(&["A", "B"]), vec![0.1, 0.2]).unwrap();
        assert_eq!(mean.get("B"), Some(0.2));
        assert_eq!(mean.get("C"), None);

        let short = MeanReturnVector::new(tickers(&["A", "B"]), vec![0.1]);
        assert!(matches!(short, Err(AllocationError::InvalidInput(_))));
    }

    #[test]
    fn test_portfolio_stats_compute() {
        let mean = MeanReturnVector::new(tickers(&["A", "B"]), vec![0.10, 0.20]).unwrap();
        let cov = CovarianceMatrix::new(
            tickers(&["A", "B"]),
            vec![vec![0.04, 0.0], vec![0.0, 0.09]],
        )
        .unwrap();

        let stats = PortfolioStats::compute(&[0.0, 1.0], &mean, &cov, 0.02).unwrap();
        assert!((stats.expected_return - 0.20).abs() < 1e-12);
        assert!((stats.expected_volatility - 0.30).abs() < 1e-12);
        assert!((stats.sharpe_ratio - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_portfolio_stats_undefined_at_zero_volatility() {
        let mean = MeanReturnVector::new(tickers(&["A"]), vec![0.05]).unwrap();
        let cov = CovarianceMatrix::new(tickers(&["A"]), vec![vec![0.0]]).unwrap();
        assert!(PortfolioStats::compute(&[1.0], &mean, &cov, 0.02).is_none());
    }
}
