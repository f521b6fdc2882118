// src/config.rs

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use price_service::loader::DEFAULT_BASE_URL;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;
pub const DEFAULT_TRADING_DAYS_PER_YEAR: u32 = 252;
pub const DEFAULT_MIN_WEIGHT_DISPLAY_THRESHOLD: f64 = 0.01;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("Configuration failed validation: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Stopping rules and tolerances handed to SLSQP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SolverConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    pub xtol_rel: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub ftol_rel: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub equality_tolerance: f64,
    #[validate(range(min = 1))]
    pub max_eval: u32,
    /// Wall-clock budget in seconds, unbounded when absent.
    #[validate(range(min = 0.0))]
    pub max_time_secs: Option<f64>,
    /// How far the final weights may stray from the simplex.
    #[validate(range(min = 0.0, max = 1.0))]
    pub weight_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            xtol_rel: 1e-6,
            ftol_rel: 1e-10,
            equality_tolerance: 1e-8,
            max_eval: 1000,
            max_time_secs: None,
            weight_tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AllocationConfig {
    #[validate(range(min = -1.0, max = 1.0))]
    pub risk_free_rate: f64,
    #[validate(range(min = 1, max = 366))]
    pub trading_days_per_year: u32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_weight_display_threshold: f64,
    #[validate(nested)]
    pub solver: SolverConfig,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        AllocationConfig {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            trading_days_per_year: DEFAULT_TRADING_DAYS_PER_YEAR,
            min_weight_display_threshold: DEFAULT_MIN_WEIGHT_DISPLAY_THRESHOLD,
            solver: SolverConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub bind_address: String,
    #[validate(length(min = 1))]
    pub price_api_base_url: String,
    pub price_api_key: String,
    #[validate(nested)]
    pub allocation: AllocationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            price_api_base_url: DEFAULT_BASE_URL.to_string(),
            price_api_key: "demo".to_string(),
            allocation: AllocationConfig::default(),
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from defaults overridden by whatever `lookup`
    /// resolves, then validates it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServerConfig::default();

        if let Some(addr) = lookup("ALLOCATION_BIND_ADDR") {
            config.bind_address = addr;
        }
        if let Some(url) = lookup("PRICE_API_BASE_URL") {
            config.price_api_base_url = url;
        }
        if let Some(key) = lookup("PRICE_API_KEY") {
            config.price_api_key = key;
        }

        let allocation = &mut config.allocation;
        if let Some(rate) = parse_var(&lookup, "ALLOCATION_RISK_FREE_RATE")? {
            allocation.risk_free_rate = rate;
        }
        if let Some(days) = parse_var(&lookup, "ALLOCATION_TRADING_DAYS")? {
            allocation.trading_days_per_year = days;
        }
        if let Some(threshold) = parse_var(&lookup, "ALLOCATION_MIN_WEIGHT_DISPLAY")? {
            allocation.min_weight_display_threshold = threshold;
        }
        if let Some(max_eval) = parse_var(&lookup, "ALLOCATION_MAX_EVAL")? {
            allocation.solver.max_eval = max_eval;
        }
        if let Some(secs) = parse_var(&lookup, "ALLOCATION_MAX_TIME_SECS")? {
            allocation.solver.max_time_secs = Some(secs);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.allocation.risk_free_rate, 0.02);
        assert_eq!(config.allocation.trading_days_per_year, 252);
        assert_eq!(config.allocation.min_weight_display_threshold, 0.01);
        assert_eq!(config.bind_address, "127.0.0.1:8080");
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("ALLOCATION_BIND_ADDR", "0.0.0.0:9000"),
            ("ALLOCATION_RISK_FREE_RATE", "-0.005"),
            ("ALLOCATION_TRADING_DAYS", "260"),
            ("ALLOCATION_MAX_EVAL", "50"),
            ("ALLOCATION_MAX_TIME_SECS", "2.5"),
            ("PRICE_API_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.allocation.risk_free_rate, -0.005);
        assert_eq!(config.allocation.trading_days_per_year, 260);
        assert_eq!(config.allocation.solver.max_eval, 50);
        assert_eq!(config.allocation.solver.max_time_secs, Some(2.5));
        assert_eq!(config.price_api_key, "secret");
    }

    #[test]
    fn test_unparsable_value() {
        let result = ServerConfig::from_lookup(lookup_from(&[("ALLOCATION_TRADING_DAYS", "many")]));
        match result {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, "ALLOCATION_TRADING_DAYS");
                assert_eq!(value, "many");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_value_fails_validation() {
        let result = ServerConfig::from_lookup(lookup_from(&[("ALLOCATION_TRADING_DAYS", "0")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let result =
            ServerConfig::from_lookup(lookup_from(&[("ALLOCATION_MIN_WEIGHT_DISPLAY", "1.5")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_allocation_config_deserializes_with_defaults() {
        let config: AllocationConfig = serde_json::from_str(r#"{"risk_free_rate": 0.03}"#).unwrap();
        assert_eq!(config.risk_free_rate, 0.03);
        assert_eq!(config.trading_days_per_year, 252);
        assert_eq!(config.solver, SolverConfig::default());
        assert!(config.validate().is_ok());
    }
}
