// src/report.rs

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::portfolio::{PortfolioStats, WeightVector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub weight: f64,
}

/// Presentation view of an allocation. Holdings at or below the display
/// threshold are hidden; the underlying weights are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub holdings: Vec<Holding>,
    pub stats: PortfolioStats,
    pub min_weight_display_threshold: f64,
}

impl AllocationReport {
    pub fn new(
        weights: &WeightVector,
        stats: PortfolioStats,
        min_weight_display_threshold: f64,
    ) -> Self {
        let holdings = weights
            .iter()
            .filter(|(_, weight)| *weight > min_weight_display_threshold)
            .map(|(ticker, weight)| Holding {
                ticker: ticker.to_string(),
                weight,
            })
            .collect();

        AllocationReport {
            holdings,
            stats,
            min_weight_display_threshold,
        }
    }
}

impl fmt::Display for AllocationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{}", rule)?;
        writeln!(f, "OPTIMAL PORTFOLIO ALLOCATION")?;
        writeln!(f, "{}", rule)?;
        for holding in &self.holdings {
            writeln!(f, "{}: {:.2}%", holding.ticker, holding.weight * 100.0)?;
        }
        writeln!(f)?;
        writeln!(f, "Portfolio Performance:")?;
        writeln!(f, "Expected Annual Return: {:.2}%", self.stats.expected_return * 100.0)?;
        writeln!(f, "Expected Volatility: {:.2}%", self.stats.expected_volatility * 100.0)?;
        writeln!(f, "Sharpe Ratio: {:.2}", self.stats.sharpe_ratio)?;
        write!(f, "{}", rule)
    }
}
