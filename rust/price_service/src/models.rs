// src/models.rs

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::QueryError;

/// Trailing window of daily closes used when no lookback is requested.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 3 * 365;

fn today() -> NaiveDate {
    Utc::now().naive_utc().date()
}

/// First day of a window of `lookback_days` ending at `current_date` (today
/// when not given). Negative lookbacks count as zero.
pub fn lookback_start(
    lookback_days: i64,
    current_date: Option<NaiveDate>,
) -> Result<NaiveDate, QueryError> {
    let now = current_date.unwrap_or_else(today);
    Duration::try_days(lookback_days.max(0))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or(QueryError::InvalidLookback(lookback_days))
}

// Custom function to convert a JSON string to f64
fn string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

// Custom function to convert a JSON string to i64
fn string_to_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<i64>().map_err(serde::de::Error::custom)
}

// Custom function to convert a JSON string to a NaiveDate
fn string_to_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
pub struct DailyMetaData {
    #[serde(rename = "1. Information")]
    pub information: String,

    #[serde(rename = "2. Symbol")]
    pub symbol: String,

    #[serde(rename = "3. Last Refreshed", deserialize_with = "string_to_date")]
    pub last_refreshed: NaiveDate,

    #[serde(rename = "4. Output Size")]
    pub output_size: String,

    #[serde(rename = "5. Time Zone")]
    pub time_zone: String,
}

// One trading day of the daily series
#[derive(Debug, Deserialize)]
pub struct DailyBar {
    #[serde(rename = "1. open", deserialize_with = "string_to_f64")]
    pub open: f64,

    #[serde(rename = "2. high", deserialize_with = "string_to_f64")]
    pub high: f64,

    #[serde(rename = "3. low", deserialize_with = "string_to_f64")]
    pub low: f64,

    #[serde(rename = "4. close", deserialize_with = "string_to_f64")]
    pub close: f64,

    #[serde(rename = "5. volume", deserialize_with = "string_to_i64")]
    pub volume: i64,
}

#[derive(Debug, Deserialize)]
pub struct DailyPriceResponse {
    #[serde(rename = "Meta Data")]
    pub meta_data: DailyMetaData,

    #[serde(rename = "Time Series (Daily)")]
    pub daily_time_series: BTreeMap<String, DailyBar>, // Date -> DailyBar
}

/// Everything the TIME_SERIES_DAILY endpoint may answer with. The provider
/// reports bad symbols and throttling with HTTP 200 and a one-key payload.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DailyApiResponse {
    Prices(DailyPriceResponse),
    Error {
        #[serde(rename = "Error Message")]
        message: String,
    },
    Note {
        #[serde(rename = "Note")]
        message: String,
    },
    Information {
        #[serde(rename = "Information")]
        message: String,
    },
}

/// Daily closing prices for one ticker, keyed by trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub ticker: String,
    pub closes: BTreeMap<NaiveDate, f64>,
}

impl PriceHistory {
    pub fn new(ticker: impl Into<String>, closes: BTreeMap<NaiveDate, f64>) -> Self {
        PriceHistory {
            ticker: ticker.into(),
            closes,
        }
    }

    pub fn from_response(ticker: &str, response: DailyPriceResponse) -> Result<Self, QueryError> {
        let mut closes = BTreeMap::new();
        for (date_str, bar) in response.daily_time_series {
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .map_err(|_| QueryError::InvalidDateFormat(date_str.clone()))?;
            closes.insert(date, bar.close);
        }

        if closes.is_empty() {
            return Err(QueryError::EmptyHistory(ticker.to_string()));
        }

        Ok(PriceHistory::new(ticker, closes))
    }

    // Keeps the observations that fall inside the trailing window ending at
    // `current_date` (today when not given)
    pub fn within_lookback(
        &self,
        lookback_days: i64,
        current_date: Option<NaiveDate>,
    ) -> Result<Self, QueryError> {
        let now = current_date.unwrap_or_else(today);
        let start = lookback_start(lookback_days, Some(now))?;

        Ok(PriceHistory {
            ticker: self.ticker.clone(),
            closes: self.closes.range(start..=now).map(|(d, p)| (*d, *p)).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}
