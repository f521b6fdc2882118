// src/lib.rs

pub mod config;
pub mod error;
pub mod estimator;
pub mod handlers;
pub mod models;
pub mod objective;
pub mod optimizer;
pub mod portfolio;
pub mod report;
pub mod utils;

use config::{AllocationConfig, ServerConfig};
use error::AllocationResult;
use portfolio::{AssetSeries, CovarianceMatrix, MeanReturnVector, PortfolioStats, WeightVector};

/// Request bodies carry whole price histories.
pub const JSON_PAYLOAD_LIMIT: usize = 8 * 1024 * 1024;

/// Everything one estimate-then-optimize pass produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub mean_returns: MeanReturnVector,
    pub cov_matrix: CovarianceMatrix,
    pub weights: WeightVector,
    pub stats: PortfolioStats,
}

pub fn allocate(
    prices: &AssetSeries,
    risk_free_rate: f64,
    config: &AllocationConfig,
) -> AllocationResult<Allocation> {
    let (mean_returns, cov_matrix) = estimator::estimate(prices, config.trading_days_per_year)?;
    let (weights, stats) =
        optimizer::optimize(&mean_returns, &cov_matrix, risk_free_rate, &config.solver)?;

    Ok(Allocation {
        mean_returns,
        cov_matrix,
        weights,
        stats,
    })
}

pub async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    use actix_web::{web, App, HttpServer};
    use handlers::{allocate, allocate_tickers, estimate, health_check, optimize};
    use price_service::PriceClient;

    let allocation_config = web::Data::new(config.allocation.clone());
    let price_client = web::Data::new(PriceClient::new(
        config.price_api_base_url.clone(),
        config.price_api_key.clone(),
    ));

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(JSON_PAYLOAD_LIMIT))
            .app_data(allocation_config.clone())
            .app_data(price_client.clone())
            .service(estimate)
            .service(optimize)
            .service(allocate)
            .service(allocate_tickers)
            .service(health_check)
    })
    .bind(config.bind_address.as_str())?
    .run()
    .await
}
