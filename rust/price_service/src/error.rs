// src/error.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Request to price provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Could not decode price provider response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Price provider rejected the request for {ticker}: {message}")]
    Provider { ticker: String, message: String },
    #[error("Invalid date format encountered: {0}")]
    InvalidDateFormat(String),
    #[error("No price history returned for {0}")]
    EmptyHistory(String),
    #[error("Tickers share no common trading days")]
    NoCommonDates,
    #[error("No tickers supplied")]
    NoTickers,
    #[error("Lookback of {0} days reaches outside the supported date range")]
    InvalidLookback(i64),
}
