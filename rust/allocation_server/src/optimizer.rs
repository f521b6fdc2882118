// src/optimizer.rs

use nlopt::{Algorithm, FailState, Nlopt, SuccessState, Target};
use tracing::{debug, info, warn};

use crate::config::SolverConfig;
use crate::error::{AllocationError, AllocationResult};
use crate::objective::{objective_function, sum_constraint, SharpeParams};
use crate::portfolio::{
    CovarianceMatrix, MeanReturnVector, PortfolioStats, WeightVector, MIN_VOLATILITY,
};
use crate::utils::calculate_portfolio_volatility;

/// Status reported when the final point has no defined Sharpe ratio.
pub const DEGENERATE_RISK_STATUS: &str = "DegenerateRisk";

/// Status reported when the solver stops outside the simplex.
pub const INFEASIBLE_STATUS: &str = "InfeasibleFinalIterate";

fn not_converged(last_iterate: &[f64], status: impl Into<String>) -> AllocationError {
    AllocationError::DidNotConverge {
        last_iterate: last_iterate.to_vec(),
        status: status.into(),
    }
}

fn check_inputs(
    mean_returns: &MeanReturnVector,
    cov_matrix: &CovarianceMatrix,
    risk_free_rate: f64,
) -> AllocationResult<()> {
    if mean_returns.len() != cov_matrix.dim() {
        return Err(AllocationError::InvalidInput(format!(
            "{} mean returns but a {}x{} covariance matrix",
            mean_returns.len(),
            cov_matrix.dim(),
            cov_matrix.dim()
        )));
    }
    if mean_returns.tickers() != cov_matrix.tickers() {
        return Err(AllocationError::InvalidInput(
            "mean returns and covariance matrix list assets in a different order".to_string(),
        ));
    }
    if !risk_free_rate.is_finite() {
        return Err(AllocationError::InvalidInput(format!(
            "risk-free rate must be finite, got {}",
            risk_free_rate
        )));
    }
    Ok(())
}

// Accepts a point within `tolerance` of the simplex and snaps it onto it.
fn project_to_simplex(x: &[f64], tolerance: f64) -> AllocationResult<Vec<f64>> {
    let total: f64 = x.iter().sum();
    let in_box = x
        .iter()
        .all(|w| w.is_finite() && *w >= -tolerance && *w <= 1.0 + tolerance);

    if !in_box || (total - 1.0).abs() > tolerance {
        return Err(not_converged(x, INFEASIBLE_STATUS));
    }

    let clamped: Vec<f64> = x.iter().map(|w| w.clamp(0.0, 1.0)).collect();
    let clamped_total: f64 = clamped.iter().sum();
    Ok(clamped.iter().map(|w| w / clamped_total).collect())
}

// Uniform weights, unless they carry no risk (a perfect hedge). The penalty is
// flat there and SLSQP would not move, so the run starts from the
// single risky asset with the best Sharpe ratio instead.
fn starting_point(
    mean_returns: &MeanReturnVector,
    cov_matrix: &CovarianceMatrix,
    risk_free_rate: f64,
) -> Vec<f64> {
    let dimension = mean_returns.len();
    let uniform = vec![1.0 / dimension as f64; dimension];
    if calculate_portfolio_volatility(&uniform, cov_matrix.values()) > MIN_VOLATILITY {
        return uniform;
    }

    let cov = cov_matrix.values();
    let best = (0..dimension)
        .filter(|&i| cov[[i, i]].sqrt() > MIN_VOLATILITY)
        .map(|i| (i, (mean_returns.values()[i] - risk_free_rate) / cov[[i, i]].sqrt()))
        .fold(None, |best: Option<(usize, f64)>, (i, sharpe)| match best {
            Some((_, top)) if top >= sharpe => best,
            _ => Some((i, sharpe)),
        });

    match best {
        Some((i, sharpe)) => {
            warn!(
                "Uniform allocation has zero volatility; starting from {} (Sharpe {:.4})",
                mean_returns.tickers()[i],
                sharpe
            );
            let mut x = vec![0.0; dimension];
            x[i] = 1.0;
            x
        }
        None => uniform,
    }
}

fn finish(
    weights: Vec<f64>,
    mean_returns: &MeanReturnVector,
    cov_matrix: &CovarianceMatrix,
    risk_free_rate: f64,
) -> AllocationResult<(WeightVector, PortfolioStats)> {
    let stats = match PortfolioStats::compute(&weights, mean_returns, cov_matrix, risk_free_rate) {
        Some(stats) => stats,
        None => {
            warn!("Final allocation has zero volatility; Sharpe ratio is undefined");
            return Err(not_converged(&weights, DEGENERATE_RISK_STATUS));
        }
    };

    Ok((
        WeightVector {
            tickers: mean_returns.tickers().to_vec(),
            weights,
        },
        stats,
    ))
}

/// Finds the long-only, fully invested weights with the highest Sharpe
/// ratio using SLSQP from the uniform allocation.
///
/// A single asset always takes the whole allocation without running the
/// solver. If that asset has zero variance its Sharpe ratio is undefined,
/// and the call deliberately fails with `DidNotConverge` and status
/// `DegenerateRisk` (last iterate `[1.0]`) rather than reporting stats.
pub fn optimize(
    mean_returns: &MeanReturnVector,
    cov_matrix: &CovarianceMatrix,
    risk_free_rate: f64,
    solver: &SolverConfig,
) -> AllocationResult<(WeightVector, PortfolioStats)> {
    check_inputs(mean_returns, cov_matrix, risk_free_rate)?;
    let dimension = mean_returns.len();

    // The simplex is a single point
    if dimension == 1 {
        return finish(vec![1.0], mean_returns, cov_matrix, risk_free_rate);
    }

    let params = SharpeParams::new(
        mean_returns.values().to_vec(),
        cov_matrix.values().clone(),
        risk_free_rate,
    );

    // Create the optimizer
    let mut opt = Nlopt::new(
        Algorithm::Slsqp,
        dimension,
        objective_function,
        Target::Minimize,
        params,
    );

    let mut x = starting_point(mean_returns, cov_matrix, risk_free_rate);

    opt.set_lower_bounds(&vec![0.0; dimension])
        .map_err(|err| not_converged(&x, format!("failed to set lower bounds: {:?}", err)))?;
    opt.set_upper_bounds(&vec![1.0; dimension])
        .map_err(|err| not_converged(&x, format!("failed to set upper bounds: {:?}", err)))?;
    opt.add_equality_constraint(sum_constraint, (), solver.equality_tolerance)
        .map_err(|err| not_converged(&x, format!("failed to add equality constraint: {:?}", err)))?;
    opt.set_xtol_rel(solver.xtol_rel)
        .map_err(|err| not_converged(&x, format!("failed to set xtol_rel: {:?}", err)))?;
    opt.set_ftol_rel(solver.ftol_rel)
        .map_err(|err| not_converged(&x, format!("failed to set ftol_rel: {:?}", err)))?;
    opt.set_maxeval(solver.max_eval)
        .map_err(|err| not_converged(&x, format!("failed to set maxeval: {:?}", err)))?;
    if let Some(secs) = solver.max_time_secs {
        opt.set_maxtime(secs)
            .map_err(|err| not_converged(&x, format!("failed to set maxtime: {:?}", err)))?;
    }

    debug!("Running SLSQP over {} assets (rf = {})", dimension, risk_free_rate);

    // Run the optimization
    match opt.optimize(&mut x) {
        // NLopt counts a spent budget as success; here it is not an optimum
        Ok((state @ SuccessState::MaxEvalReached, _))
        | Ok((state @ SuccessState::MaxTimeReached, _)) => {
            warn!("SLSQP exhausted its budget before converging ({:?})", state);
            return Err(not_converged(&x, format!("{:?}", state)));
        }
        Ok((state, value)) => {
            info!("SLSQP converged with status {:?} (objective {:.6})", state, value);
        }
        // NLopt documents this stop as typically still holding a useful point;
        // the feasibility check below decides whether it is kept
        Err((FailState::RoundoffLimited, value)) => {
            warn!("SLSQP stopped on roundoff limits (objective {:.6})", value);
        }
        Err((state, _)) => {
            warn!("SLSQP failed with status {:?}", state);
            return Err(not_converged(&x, format!("{:?}", state)));
        }
    }

    let weights = project_to_simplex(&x, solver.weight_tolerance)?;
    finish(weights, mean_returns, cov_matrix, risk_free_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_to_simplex_snaps_rounding_noise() {
        let weights = project_to_simplex(&[1.0 + 1e-9, -1e-10, 1e-9], 1e-6).unwrap();
        let total: f64 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-15);
        assert!(weights.iter().all(|w| (0.0..=1.0).contains(w)));
        assert_eq!(weights[1], 0.0);
    }

    fn hedged_pair(mean: [f64; 2]) -> (MeanReturnVector, CovarianceMatrix) {
        let tickers = vec!["LONG".to_string(), "SHORT".to_string()];
        (
            MeanReturnVector::new(tickers.clone(), mean.to_vec()).unwrap(),
            CovarianceMatrix::new(tickers, vec![vec![0.04, -0.04], vec![-0.04, 0.04]]).unwrap(),
        )
    }

    #[test]
    fn test_starting_point_is_uniform_when_risky() {
        let tickers = vec!["A".to_string(), "B".to_string()];
        let mean = MeanReturnVector::new(tickers.clone(), vec![0.1, 0.2]).unwrap();
        let cov = CovarianceMatrix::new(tickers, vec![vec![0.04, 0.0], vec![0.0, 0.09]]).unwrap();
        assert_eq!(starting_point(&mean, &cov, 0.02), vec![0.5, 0.5]);
    }

    #[test]
    fn test_starting_point_avoids_zero_volatility() {
        let (mean, cov) = hedged_pair([0.01, 0.03]);
        assert_eq!(starting_point(&mean, &cov, 0.02), vec![0.0, 1.0]);

        // ties go to the first asset
        let (mean, cov) = hedged_pair([0.01, 0.01]);
        assert_eq!(starting_point(&mean, &cov, 0.02), vec![1.0, 0.0]);
    }

    #[test]
    fn test_starting_point_without_risky_assets() {
        let tickers = vec!["A".to_string(), "B".to_string()];
        let mean = MeanReturnVector::new(tickers.clone(), vec![0.1, 0.2]).unwrap();
        let cov = CovarianceMatrix::new(tickers, vec![vec![0.0, 0.0], vec![0.0, 0.0]]).unwrap();
        assert_eq!(starting_point(&mean, &cov, 0.02), vec![0.5, 0.5]);
    }

    #[test]
    fn test_project_to_simplex_rejects_infeasible_points() {
        match project_to_simplex(&[0.7, 0.7], 1e-6) {
            Err(AllocationError::DidNotConverge { last_iterate, status }) => {
                assert_eq!(last_iterate, vec![0.7, 0.7]);
                assert_eq!(status, INFEASIBLE_STATUS);
            }
            other => panic!("expected DidNotConverge, got {:?}", other),
        }

        assert!(project_to_simplex(&[1.5, -0.5], 1e-6).is_err());
        assert!(project_to_simplex(&[f64::NAN, 1.0], 1e-6).is_err());
    }
}
