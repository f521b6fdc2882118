// src/align.rs

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::QueryError;
use crate::models::PriceHistory;

/// Date-aligned closing prices: one row per shared trading day, one column
/// per ticker in the order the histories were given.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedPrices {
    pub tickers: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Vec<f64>>,
}

impl AlignedPrices {
    pub fn num_days(&self) -> usize {
        self.dates.len()
    }
}

/// Keeps only the trading days present in every history, ascending.
pub fn align_histories(histories: &[PriceHistory]) -> Result<AlignedPrices, QueryError> {
    let (first, rest) = histories.split_first().ok_or(QueryError::NoTickers)?;

    for history in histories {
        if history.is_empty() {
            return Err(QueryError::EmptyHistory(history.ticker.clone()));
        }
    }

    let mut common: BTreeSet<NaiveDate> = first.closes.keys().copied().collect();
    for history in rest {
        common.retain(|date| history.closes.contains_key(date));
    }

    if common.is_empty() {
        return Err(QueryError::NoCommonDates);
    }

    let dates: Vec<NaiveDate> = common.into_iter().collect();
    let rows = dates
        .iter()
        .map(|date| histories.iter().map(|h| h.closes[date]).collect())
        .collect();

    let dropped = histories.iter().map(|h| h.len()).max().unwrap_or(0) - dates.len();
    debug!(
        "Aligned {} tickers on {} days ({} unmatched days dropped)",
        histories.len(),
        dates.len(),
        dropped
    );

    Ok(AlignedPrices {
        tickers: histories.iter().map(|h| h.ticker.clone()).collect(),
        dates,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn history(ticker: &str, points: &[(&str, f64)]) -> PriceHistory {
        let closes: BTreeMap<NaiveDate, f64> = points.iter().map(|(d, p)| (date(d), *p)).collect();
        PriceHistory::new(ticker, closes)
    }

    #[test]
    fn test_align_keeps_shared_days_in_order() {
        let a = history("AAA", &[("2024-01-04", 12.0), ("2024-01-02", 10.0), ("2024-01-03", 11.0)]);
        let b = history("BBB", &[("2024-01-02", 20.0), ("2024-01-04", 22.0), ("2024-01-05", 23.0)]);

        let aligned = align_histories(&[a, b]).unwrap();

        assert_eq!(aligned.tickers, vec!["AAA".to_string(), "BBB".to_string()]);
        assert_eq!(aligned.dates, vec![date("2024-01-02"), date("2024-01-04")]);
        assert_eq!(aligned.rows, vec![vec![10.0, 20.0], vec![12.0, 22.0]]);
        assert_eq!(aligned.num_days(), 2);
    }

    #[test]
    fn test_align_single_history_is_identity() {
        let a = history("AAA", &[("2024-01-02", 10.0), ("2024-01-03", 11.0)]);
        let aligned = align_histories(&[a]).unwrap();
        assert_eq!(aligned.rows, vec![vec![10.0], vec![11.0]]);
    }

    #[test]
    fn test_align_disjoint_histories_fails() {
        let a = history("AAA", &[("2024-01-02", 10.0)]);
        let b = history("BBB", &[("2024-01-03", 20.0)]);
        assert!(matches!(align_histories(&[a, b]), Err(QueryError::NoCommonDates)));
    }

    #[test]
    fn test_align_rejects_empty_input() {
        assert!(matches!(align_histories(&[]), Err(QueryError::NoTickers)));

        let empty = PriceHistory::new("AAA", BTreeMap::new());
        match align_histories(&[empty]) {
            Err(QueryError::EmptyHistory(ticker)) => assert_eq!(ticker, "AAA"),
            other => panic!("expected EmptyHistory, got {:?}", other),
        }
    }
}
