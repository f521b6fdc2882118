// src/loader.rs

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::QueryError;
use crate::models::{DailyApiResponse, PriceHistory};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// Thin client over the provider's daily time-series endpoint.
#[derive(Debug, Clone)]
pub struct PriceClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PriceClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        PriceClient {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_daily_closes(&self, ticker: &str) -> Result<PriceHistory, QueryError> {
        let url = format!("{}/query", self.base_url);
        debug!("Requesting daily series for {} from {}", ticker, url);

        let body = self
            .client
            .get(&url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", ticker),
                ("outputsize", "full"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        match serde_json::from_str::<DailyApiResponse>(&body)? {
            DailyApiResponse::Prices(response) => {
                let history = PriceHistory::from_response(ticker, response)?;
                info!("Fetched {} daily closes for {}", history.len(), ticker);
                Ok(history)
            }
            DailyApiResponse::Error { message }
            | DailyApiResponse::Note { message }
            | DailyApiResponse::Information { message } => {
                warn!("Price provider refused {}: {}", ticker, message);
                Err(QueryError::Provider {
                    ticker: ticker.to_string(),
                    message,
                })
            }
        }
    }

    // Fetches sequentially; the free provider tier throttles parallel calls
    pub async fn fetch_all(&self, tickers: &[String]) -> Result<Vec<PriceHistory>, QueryError> {
        if tickers.is_empty() {
            return Err(QueryError::NoTickers);
        }

        let mut histories = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            histories.push(self.fetch_daily_closes(ticker).await?);
        }
        Ok(histories)
    }
}
