// src/models.rs

use serde::{Deserialize, Serialize};

use crate::portfolio::PortfolioStats;
use crate::report::AllocationReport;

/// JSON has no NaN, so a missing close is sent as `null`.
pub type PriceRows = Vec<Vec<Option<f64>>>;

pub fn rows_with_gaps(rows: &PriceRows) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|row| row.iter().map(|p| p.unwrap_or(f64::NAN)).collect())
        .collect()
}

#[derive(Deserialize, Serialize)]
pub struct EstimateRequest {
    pub tickers: Vec<String>,
    pub prices: PriceRows,
}

#[derive(Deserialize, Serialize)]
pub struct EstimateResponse {
    pub success: bool,
    pub tickers: Vec<String>,
    pub mean_returns: Option<Vec<f64>>,
    pub covariance: Option<Vec<Vec<f64>>>,
    /// Usable daily return rows behind the estimate.
    pub observations: Option<usize>,
    pub message: String,
}

#[derive(Deserialize, Serialize)]
pub struct OptimizationRequest {
    pub tickers: Vec<String>,
    pub mean_returns: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
    // Falls back to the configured rate
    pub risk_free_rate: Option<f64>,
}

#[derive(Serialize, Deserialize)]
pub struct OptimizationResult {
    pub success: bool,
    pub tickers: Vec<String>,
    pub weights: Option<Vec<f64>>,
    pub stats: Option<PortfolioStats>,
    /// Where the solver stopped when it did not converge.
    pub last_iterate: Option<Vec<f64>>,
    pub status: Option<String>,
    pub message: String,
}

impl OptimizationResult {
    pub fn failure(tickers: Vec<String>, message: String) -> Self {
        OptimizationResult {
            success: false,
            tickers,
            weights: None,
            stats: None,
            last_iterate: None,
            status: None,
            message,
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct AllocationRequest {
    pub tickers: Vec<String>,
    pub prices: PriceRows,
    pub risk_free_rate: Option<f64>,
}

#[derive(Deserialize, Serialize)]
pub struct TickerAllocationRequest {
    pub tickers: Vec<String>,
    pub lookback_days: Option<i64>,
    pub risk_free_rate: Option<f64>,
}

#[derive(Serialize, Deserialize)]
pub struct AllocationResponse {
    #[serde(flatten)]
    pub result: OptimizationResult,
    pub report: Option<AllocationReport>,
    pub summary: Option<String>,
}
