use rayon::prelude::*;

use super::error::{ProjectionError, ensure_finite, ensure_period};
use super::percentile::aggregate_percentiles;
use super::rng::{Rng, VariateSource};
use super::schedule::CashFlowSchedule;
use super::types::{AssetInputs, CashFlowKind, PercentilePoint, year_count};

/// Balances for every `(trial, year)` pair, stored row-major by trial in one
/// fixed allocation.
#[derive(Debug, Clone)]
pub struct PathMatrix {
    start_year: i32,
    year_count: usize,
    trial_count: usize,
    balances: Vec<f64>,
}

impl PathMatrix {
    fn zeroed(start_year: i32, year_count: usize, trial_count: usize) -> Self {
        Self {
            start_year,
            year_count,
            trial_count,
            balances: vec![0.0; year_count * trial_count],
        }
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn year_count(&self) -> usize {
        self.year_count
    }

    pub fn trial_count(&self) -> usize {
        self.trial_count
    }

    pub fn path(&self, trial: usize) -> &[f64] {
        let from = trial * self.year_count;
        &self.balances[from..from + self.year_count]
    }

    pub fn paths(&self) -> impl Iterator<Item = &[f64]> {
        self.balances.chunks_exact(self.year_count)
    }

    /// Copies the balance of every trial at `year_index` into `out`.
    pub fn fill_column(&self, year_index: usize, out: &mut Vec<f64>) {
        out.clear();
        out.extend(self.paths().map(|path| path[year_index]));
    }

    pub fn terminal_balances(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.trial_count);
        if self.year_count > 0 {
            self.fill_column(self.year_count - 1, &mut out);
        }
        out
    }
}

/// Runs the seeded Monte Carlo projection and reduces it to percentile bands.
pub fn project_asset(inputs: &AssetInputs) -> Result<Vec<PercentilePoint>, ProjectionError> {
    let schedule =
        CashFlowSchedule::build(&inputs.cash_flows, inputs.sim_start_year, inputs.sim_end_year)?;
    let paths = simulate_paths(inputs, &schedule)?;
    aggregate_percentiles(paths)
}

/// Simulates every trial with its own generator derived from `inputs.seed`.
pub fn simulate_paths(
    inputs: &AssetInputs,
    schedule: &CashFlowSchedule,
) -> Result<PathMatrix, ProjectionError> {
    let seed = inputs.seed;
    simulate_paths_with(inputs, schedule, |trial| Rng::for_trial(seed, trial))
}

/// Simulates `inputs.trial_count` independent paths in parallel.
///
/// `make_source` is called once per trial inside the worker that runs it, so
/// no generator is ever shared between trials.
pub fn simulate_paths_with<S, F>(
    inputs: &AssetInputs,
    schedule: &CashFlowSchedule,
    make_source: F,
) -> Result<PathMatrix, ProjectionError>
where
    S: VariateSource,
    F: Fn(u32) -> S + Sync,
{
    validate_asset_inputs(inputs)?;

    let year_count = year_count(inputs.sim_start_year, inputs.sim_end_year);
    let trial_count = inputs.trial_count as usize;
    tracing::debug!(
        trials = trial_count,
        years = year_count,
        start_year = inputs.sim_start_year,
        "simulating asset paths"
    );

    let mut matrix = PathMatrix::zeroed(inputs.sim_start_year, year_count, trial_count);
    matrix
        .balances
        .par_chunks_mut(year_count)
        .enumerate()
        .for_each(|(trial, row)| {
            let mut source = make_source(trial as u32);
            simulate_trial(inputs, schedule, &mut source, row);
        });
    Ok(matrix)
}

fn validate_asset_inputs(inputs: &AssetInputs) -> Result<(), ProjectionError> {
    if inputs.trial_count == 0 {
        return Err(ProjectionError::InvalidTrialCount);
    }
    ensure_period("simulation", inputs.sim_start_year, inputs.sim_end_year)?;
    ensure_finite("initial asset value", inputs.initial_asset_value)?;
    ensure_finite("mean return", inputs.mean_return)?;
    ensure_finite("volatility", inputs.volatility)?;
    if inputs.volatility < 0.0 {
        return Err(ProjectionError::InvalidParameter {
            name: "volatility",
            reason: "must be >= 0",
        });
    }
    Ok(())
}

fn simulate_trial<S: VariateSource>(
    inputs: &AssetInputs,
    schedule: &CashFlowSchedule,
    source: &mut S,
    row: &mut [f64],
) {
    // An account opened before the visible range enters it already funded.
    let mut balance = if inputs.asset_start_year < inputs.sim_start_year {
        inputs.initial_asset_value
    } else {
        0.0
    };

    for (offset, slot) in row.iter_mut().enumerate() {
        let year = (i64::from(inputs.sim_start_year) + offset as i64) as i32;
        if year < inputs.asset_start_year {
            *slot = 0.0;
            continue;
        }
        if year == inputs.asset_start_year {
            balance = inputs.initial_asset_value;
            *slot = balance;
            continue;
        }

        let z = source.standard_normal();
        balance = advance_year(balance, year, inputs, schedule, z);
        *slot = balance;
    }
}

/// One simulated year: withdrawals come out before the return is applied and
/// contributions land after it.
fn advance_year(
    balance: f64,
    year: i32,
    inputs: &AssetInputs,
    schedule: &CashFlowSchedule,
    z: f64,
) -> f64 {
    let withdrawals = schedule.total_for(CashFlowKind::Withdrawal, year, inputs.current_year);
    let after_withdrawal = balance - withdrawals;

    let random_return = inputs.mean_return + z * inputs.volatility;
    let grown = after_withdrawal + after_withdrawal * random_return;

    grown + schedule.total_for(CashFlowKind::Contribution, year, inputs.current_year)
}
