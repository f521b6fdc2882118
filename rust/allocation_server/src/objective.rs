// src/objective.rs

use ndarray::Array2;

use crate::portfolio::MIN_VOLATILITY;
use crate::utils::{calculate_covariance_product, calculate_portfolio_return};

/// Objective value reported at zero-volatility points. Any real negated
/// Sharpe ratio sits far below it, so the solver backs away.
pub const DEGENERATE_PENALTY: f64 = 1.0e6;

#[derive(Clone, Debug)]
pub struct SharpeParams {
    pub mean_returns: Vec<f64>,
    pub cov: Array2<f64>,
    pub risk_free_rate: f64,
}

impl SharpeParams {
    pub fn new(mean_returns: Vec<f64>, cov: Array2<f64>, risk_free_rate: f64) -> Self {
        SharpeParams {
            mean_returns,
            cov,
            risk_free_rate,
        }
    }
}

/// Negated Sharpe ratio with its analytic gradient:
/// d/dw [-(w·μ - rf) / σ] = -μ/σ + (w·μ - rf) Σw / σ³
pub fn objective_function(x: &[f64], grad: Option<&mut [f64]>, params: &mut SharpeParams) -> f64 {
    let portfolio_return = calculate_portfolio_return(x, &params.mean_returns);
    let cov_x = calculate_covariance_product(x, &params.cov);
    let variance: f64 = x.iter().zip(cov_x.iter()).map(|(xi, ci)| xi * ci).sum();
    let volatility = variance.max(0.0).sqrt();

    if !(volatility > MIN_VOLATILITY) || !portfolio_return.is_finite() {
        if let Some(grad) = grad {
            for g in grad.iter_mut() {
                *g = 0.0;
            }
        }
        return DEGENERATE_PENALTY;
    }

    let excess = portfolio_return - params.risk_free_rate;

    if let Some(grad) = grad {
        let vol_cubed = volatility * volatility * volatility;
        for i in 0..x.len() {
            grad[i] = -params.mean_returns[i] / volatility + excess * cov_x[i] / vol_cubed;
        }
    }

    -excess / volatility
}

// Equality constraint: sum of x_i - 1 == 0
pub fn sum_constraint(x: &[f64], grad: Option<&mut [f64]>, _user_data: &mut ()) -> f64 {
    if let Some(grad) = grad {
        for g in grad.iter_mut() {
            *g = 1.0;
        }
    }
    x.iter().sum::<f64>() - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn three_asset_params() -> SharpeParams {
        SharpeParams::new(
            vec![0.12, 0.10, 0.07],
            array![[0.04, 0.006, 0.002], [0.006, 0.02, 0.001], [0.002, 0.001, 0.01]],
            0.02,
        )
    }

    #[test]
    fn test_objective_is_negated_sharpe() {
        let mut params =
            SharpeParams::new(vec![0.10, 0.20], array![[0.04, 0.0], [0.0, 0.09]], 0.02);
        let value = objective_function(&[0.0, 1.0], None, &mut params);
        assert!((value + 0.6).abs() < 1e-12);

        let value = objective_function(&[1.0, 0.0], None, &mut params);
        assert!((value + 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let mut params = three_asset_params();
        let x = vec![0.5, 0.3, 0.2];

        let mut grad = vec![0.0; 3];
        let f0 = objective_function(&x, Some(&mut grad), &mut params);

        let eps = 1e-7;
        for i in 0..x.len() {
            let mut x_eps = x.clone();
            x_eps[i] += eps;
            let f_eps = objective_function(&x_eps, None, &mut params);
            let numerical = (f_eps - f0) / eps;
            assert!(
                (numerical - grad[i]).abs() < 1e-5,
                "component {}: analytic {} vs numerical {}",
                i,
                grad[i],
                numerical
            );
        }
    }

    #[test]
    fn test_zero_volatility_is_penalized() {
        let mut params = SharpeParams::new(
            vec![0.10, 0.10],
            array![[0.04, -0.04], [-0.04, 0.04]],
            0.02,
        );
        let mut grad = vec![1.0, 1.0];

        let value = objective_function(&[0.5, 0.5], Some(&mut grad), &mut params);

        assert_eq!(value, DEGENERATE_PENALTY);
        assert_eq!(grad, vec![0.0, 0.0]);
    }

    #[test]
    fn test_sum_constraint() {
        let mut grad = vec![0.0; 3];
        let value = sum_constraint(&[0.2, 0.3, 0.6], Some(&mut grad), &mut ());
        assert!((value - 0.1).abs() < 1e-12);
        assert_eq!(grad, vec![1.0, 1.0, 1.0]);
    }
}
