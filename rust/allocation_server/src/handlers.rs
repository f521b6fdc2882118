// src/handlers.rs

use actix_web::{get, post, web, HttpResponse, Responder};
use price_service::models::{lookback_start, DEFAULT_LOOKBACK_DAYS};
use price_service::{align_histories, AlignedPrices, PriceClient, QueryError};
use tracing::{error, info, warn};

use crate::config::AllocationConfig;
use crate::error::AllocationError;
use crate::estimator;
use crate::models::{
    rows_with_gaps, AllocationRequest, AllocationResponse, EstimateRequest, EstimateResponse,
    OptimizationRequest, OptimizationResult, TickerAllocationRequest,
};
use crate::optimizer;
use crate::portfolio::{AssetSeries, CovarianceMatrix, MeanReturnVector};
use crate::report::AllocationReport;

// Maps a core error onto the optimization envelope. Non-convergence is not a
// transport failure: the caller gets 200 with success=false and the last iterate.
fn optimization_failure(tickers: Vec<String>, err: AllocationError) -> HttpResponse {
    let message = err.to_string();
    match err {
        AllocationError::InvalidInput(_) => {
            HttpResponse::BadRequest().json(OptimizationResult::failure(tickers, message))
        }
        AllocationError::InsufficientData(_) => {
            HttpResponse::UnprocessableEntity().json(OptimizationResult::failure(tickers, message))
        }
        AllocationError::DidNotConverge { last_iterate, status } => {
            HttpResponse::Ok().json(OptimizationResult {
                last_iterate: Some(last_iterate),
                status: Some(status),
                ..OptimizationResult::failure(tickers, message)
            })
        }
    }
}

fn allocation_failure(tickers: Vec<String>, err: AllocationError) -> HttpResponse {
    let mut result = OptimizationResult::failure(tickers, err.to_string());
    let mut builder = match err {
        AllocationError::InvalidInput(_) => HttpResponse::BadRequest(),
        AllocationError::InsufficientData(_) => HttpResponse::UnprocessableEntity(),
        AllocationError::DidNotConverge { last_iterate, status } => {
            result.last_iterate = Some(last_iterate);
            result.status = Some(status);
            HttpResponse::Ok()
        }
    };

    builder.json(AllocationResponse {
        result,
        report: None,
        summary: None,
    })
}

fn run_allocation(
    prices: &AssetSeries,
    risk_free_rate: f64,
    config: &AllocationConfig,
) -> HttpResponse {
    let tickers = prices.tickers().to_vec();
    match crate::allocate(prices, risk_free_rate, config) {
        Ok(allocation) => {
            let report = AllocationReport::new(
                &allocation.weights,
                allocation.stats,
                config.min_weight_display_threshold,
            );
            let summary = report.to_string();
            info!("Allocation computed\n{}", summary);

            HttpResponse::Ok().json(AllocationResponse {
                result: OptimizationResult {
                    success: true,
                    tickers,
                    weights: Some(allocation.weights.weights),
                    stats: Some(allocation.stats),
                    last_iterate: None,
                    status: None,
                    message: "Optimization succeeded".to_string(),
                },
                report: Some(report),
                summary: Some(summary),
            })
        }
        Err(err) => {
            warn!("Allocation failed: {}", err);
            allocation_failure(tickers, err)
        }
    }
}

// Rejects an unusable lookback before any provider call is made
async fn recent_prices(
    client: &PriceClient,
    tickers: &[String],
    lookback_days: i64,
) -> Result<AlignedPrices, QueryError> {
    lookback_start(lookback_days, None)?;
    let histories = client.fetch_all(tickers).await?;
    let recent = histories
        .iter()
        .map(|h| h.within_lookback(lookback_days, None))
        .collect::<Result<Vec<_>, _>>()?;
    align_histories(&recent)
}

#[post("/estimate")]
pub async fn estimate(
    params: web::Json<EstimateRequest>,
    config: web::Data<AllocationConfig>,
) -> impl Responder {
    let tickers = params.tickers.clone();

    let estimated = AssetSeries::new(tickers.clone(), rows_with_gaps(&params.prices))
        .and_then(|prices| estimator::daily_returns(&prices))
        .and_then(|returns| {
            estimator::estimate_from_returns(&returns, config.trading_days_per_year)
                .map(|(mean, cov)| (mean, cov, returns.num_rows()))
        });

    match estimated {
        Ok((mean_returns, cov_matrix, observations)) => HttpResponse::Ok().json(EstimateResponse {
            success: true,
            tickers,
            mean_returns: Some(mean_returns.values().to_vec()),
            covariance: Some(cov_matrix.to_rows()),
            observations: Some(observations),
            message: "Estimation succeeded".to_string(),
        }),
        Err(err) => {
            warn!("Estimation failed: {}", err);
            let body = EstimateResponse {
                success: false,
                tickers,
                mean_returns: None,
                covariance: None,
                observations: None,
                message: err.to_string(),
            };
            match err {
                AllocationError::InsufficientData(_) => {
                    HttpResponse::UnprocessableEntity().json(body)
                }
                _ => HttpResponse::BadRequest().json(body),
            }
        }
    }
}

#[post("/optimize")]
pub async fn optimize(
    params: web::Json<OptimizationRequest>,
    config: web::Data<AllocationConfig>,
) -> impl Responder {
    let tickers = params.tickers.clone();
    let risk_free_rate = params.risk_free_rate.unwrap_or(config.risk_free_rate);

    let mean_returns = match MeanReturnVector::new(tickers.clone(), params.mean_returns.clone()) {
        Ok(mean_returns) => mean_returns,
        Err(err) => return optimization_failure(tickers, err),
    };
    let cov_matrix = match CovarianceMatrix::new(tickers.clone(), params.covariance.clone()) {
        Ok(cov_matrix) => cov_matrix,
        Err(err) => return optimization_failure(tickers, err),
    };

    match optimizer::optimize(&mean_returns, &cov_matrix, risk_free_rate, &config.solver) {
        Ok((weights, stats)) => HttpResponse::Ok().json(OptimizationResult {
            success: true,
            tickers,
            weights: Some(weights.weights),
            stats: Some(stats),
            last_iterate: None,
            status: None,
            message: "Optimization succeeded".to_string(),
        }),
        Err(err) => optimization_failure(tickers, err),
    }
}

#[post("/allocate")]
pub async fn allocate(
    params: web::Json<AllocationRequest>,
    config: web::Data<AllocationConfig>,
) -> impl Responder {
    let risk_free_rate = params.risk_free_rate.unwrap_or(config.risk_free_rate);

    match AssetSeries::new(params.tickers.clone(), rows_with_gaps(&params.prices)) {
        Ok(prices) => run_allocation(&prices, risk_free_rate, &config),
        Err(err) => allocation_failure(params.tickers.clone(), err),
    }
}

#[post("/allocate/tickers")]
pub async fn allocate_tickers(
    params: web::Json<TickerAllocationRequest>,
    config: web::Data<AllocationConfig>,
    client: web::Data<PriceClient>,
) -> impl Responder {
    let tickers: Vec<String> = params
        .tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect();
    let lookback_days = params.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
    let risk_free_rate = params.risk_free_rate.unwrap_or(config.risk_free_rate);

    let aligned = recent_prices(&client, &tickers, lookback_days).await;

    let aligned = match aligned {
        Ok(aligned) => aligned,
        Err(err) => {
            error!("Could not assemble prices for {:?}: {}", tickers, err);
            let mut builder = match err {
                QueryError::NoTickers | QueryError::InvalidLookback(_) => {
                    HttpResponse::BadRequest()
                }
                QueryError::EmptyHistory(_) | QueryError::NoCommonDates => {
                    HttpResponse::UnprocessableEntity()
                }
                _ => HttpResponse::BadGateway(),
            };
            return builder.json(AllocationResponse {
                result: OptimizationResult::failure(tickers, err.to_string()),
                report: None,
                summary: None,
            });
        }
    };

    info!(
        "Analyzing {} trading days for {}",
        aligned.num_days(),
        aligned.tickers.join(", ")
    );

    match AssetSeries::new(aligned.tickers, aligned.rows) {
        Ok(prices) => run_allocation(&prices, risk_free_rate, &config),
        Err(err) => allocation_failure(tickers, err),
    }
}

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}
