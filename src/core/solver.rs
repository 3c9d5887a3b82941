use serde::Serialize;

use super::engine::project_asset;
use super::error::ProjectionError;
use super::pension::project_pension;
use super::types::ComparisonInputs;

#[derive(Debug, Clone, Copy)]
pub struct BreakEvenConfig {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub trials_per_iteration: u32,
    pub final_trials: u32,
}

impl Default for BreakEvenConfig {
    fn default() -> Self {
        Self {
            search_min: -0.05,
            search_max: 0.20,
            tolerance: 0.0001,
            max_iterations: 40,
            trials_per_iteration: 500,
            final_trials: 2_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakEvenIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_return: f64,
    pub median_gap: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakEvenResult {
    pub target_cumulative_payout: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub trials_per_iteration: u32,
    pub final_trials: u32,
    pub solved_return: Option<f64>,
    pub achieved_median_balance: Option<f64>,
    pub iterations: Vec<BreakEvenIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Finds the lowest mean asset return at which the terminal median balance
/// reaches the terminal cumulative pension payout.
///
/// Every candidate reuses `inputs.seed`, so successive evaluations see the same
/// shocks and differ only by the mean.
pub fn solve_break_even_return(
    inputs: &ComparisonInputs,
    config: BreakEvenConfig,
) -> Result<BreakEvenResult, ProjectionError> {
    validate_config(config)?;

    let target = project_pension(&inputs.pension_inputs())?
        .last()
        .map_or(0.0, |point| point.cumulative_payout);

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let low_gap = median_gap(inputs, config.search_min, config.trials_per_iteration, target)?;
    let high_gap = median_gap(inputs, config.search_max, config.trials_per_iteration, target)?;

    let mut solved_return = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_gap >= 0.0 {
        solved_return = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "Assets already match the pension at the lower return bound.".to_string();
    } else if high_gap < 0.0 {
        feasible = false;
        message = "No break-even return found within the search bounds.".to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let gap = median_gap(inputs, mid, config.trials_per_iteration, target)?;
            tracing::debug!(iteration = it, candidate = mid, gap, "break-even iteration");
            iterations.push(BreakEvenIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_return: mid,
                median_gap: gap,
            });

            if gap >= 0.0 {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_return = Some(hi);
        feasible = true;
        message = if converged {
            "Solved break-even return.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate.".to_string()
        };
    }

    let achieved_median_balance = match solved_return {
        Some(mean) => Some(median_gap(inputs, mean, config.final_trials, target)? + target),
        None => None,
    };

    Ok(BreakEvenResult {
        target_cumulative_payout: target,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        trials_per_iteration: config.trials_per_iteration,
        final_trials: config.final_trials,
        solved_return,
        achieved_median_balance,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn median_gap(
    base_inputs: &ComparisonInputs,
    mean_return: f64,
    trials: u32,
    target: f64,
) -> Result<f64, ProjectionError> {
    let mut inputs = base_inputs.asset_inputs();
    inputs.mean_return = mean_return;
    inputs.trial_count = trials;
    let bands = project_asset(&inputs)?;
    let terminal_median = bands.last().map_or(0.0, |point| point.p50);
    Ok(terminal_median - target)
}

fn validate_config(config: BreakEvenConfig) -> Result<(), ProjectionError> {
    let invalid = |msg: &str| Err(ProjectionError::InvalidSolverConfig(msg.to_string()));

    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return invalid("search bounds must be finite");
    }
    if config.search_max <= config.search_min {
        return invalid("search_max must be greater than search_min");
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return invalid("tolerance must be > 0");
    }
    if config.max_iterations == 0 {
        return invalid("max_iterations must be > 0");
    }
    if config.trials_per_iteration == 0 {
        return invalid("trials_per_iteration must be > 0");
    }
    if config.final_trials == 0 {
        return invalid("final_trials must be > 0");
    }
    Ok(())
}
