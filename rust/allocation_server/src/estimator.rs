// src/estimator.rs

use ndarray::{Array2, Axis};
use tracing::{debug, info};

use crate::error::{AllocationError, AllocationResult};
use crate::portfolio::{AssetSeries, CovarianceMatrix, MeanReturnVector};

/// Day-over-day percentage changes with every row holding an undefined
/// return already removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnMatrix {
    pub tickers: Vec<String>,
    pub returns: Array2<f64>,
    pub dropped_rows: usize,
}

impl ReturnMatrix {
    pub fn num_rows(&self) -> usize {
        self.returns.nrows()
    }
}

pub fn daily_returns(prices: &AssetSeries) -> AllocationResult<ReturnMatrix> {
    let p = prices.prices();

    // NaN is a missing day and zero yields an undefined return; anything
    // else that is not a positive finite price is bad upstream data
    if let Some(bad) = p.iter().find(|v| v.is_infinite() || **v < 0.0) {
        return Err(AllocationError::InvalidInput(format!(
            "prices must be positive, found {}",
            bad
        )));
    }

    let n = p.nrows();
    if n < 2 {
        return Err(AllocationError::InsufficientData(format!(
            "at least 2 price observations are required, got {}",
            n
        )));
    }

    let mut kept = Vec::with_capacity((n - 1) * p.ncols());
    let mut dropped_rows = 0;
    for t in 1..n {
        let row: Vec<f64> = p
            .row(t)
            .iter()
            .zip(p.row(t - 1).iter())
            .map(|(curr, prev)| (curr - prev) / prev)
            .collect();

        if row.iter().all(|r| r.is_finite()) {
            kept.extend(row);
        } else {
            dropped_rows += 1;
        }
    }

    let rows = n - 1 - dropped_rows;
    let returns = Array2::from_shape_vec((rows, p.ncols()), kept)
        .map_err(|e| AllocationError::InvalidInput(e.to_string()))?;

    Ok(ReturnMatrix {
        tickers: prices.tickers().to_vec(),
        returns,
        dropped_rows,
    })
}

/// Annualized mean returns and sample covariance (N-1 divisor) of the daily
/// returns in `prices`.
pub fn estimate(
    prices: &AssetSeries,
    trading_days_per_year: u32,
) -> AllocationResult<(MeanReturnVector, CovarianceMatrix)> {
    let matrix = daily_returns(prices)?;
    estimate_from_returns(&matrix, trading_days_per_year)
}

pub fn estimate_from_returns(
    matrix: &ReturnMatrix,
    trading_days_per_year: u32,
) -> AllocationResult<(MeanReturnVector, CovarianceMatrix)> {
    if trading_days_per_year == 0 {
        return Err(AllocationError::InvalidInput(
            "trading_days_per_year must be positive".to_string(),
        ));
    }
    let annualization = f64::from(trading_days_per_year);

    let rows = matrix.num_rows();
    debug!(
        "Return matrix: {} usable rows, {} dropped, {} assets",
        rows,
        matrix.dropped_rows,
        matrix.tickers.len()
    );

    if rows == 0 {
        return Err(AllocationError::InsufficientData(
            "no usable return rows after dropping undefined values".to_string(),
        ));
    }
    if rows < 2 {
        return Err(AllocationError::InsufficientData(
            "sample covariance needs at least 2 usable return rows".to_string(),
        ));
    }

    let mean = matrix
        .returns
        .mean_axis(Axis(0))
        .ok_or_else(|| AllocationError::InsufficientData("empty return matrix".to_string()))?;

    let centered = &matrix.returns - &mean;
    let cov = centered.t().dot(&centered) / (rows as f64 - 1.0);
    // keep the result exactly symmetric regardless of summation order
    let cov = (&cov + &cov.t()) * (0.5 * annualization);

    info!(
        "Estimated statistics for {} assets from {} daily returns",
        matrix.tickers.len(),
        rows
    );

    Ok((
        MeanReturnVector::from_array(matrix.tickers.clone(), mean * annualization)?,
        CovarianceMatrix::from_array(matrix.tickers.clone(), cov)?,
    ))
}
