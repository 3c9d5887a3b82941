use super::engine::simulate_paths;
use super::error::{ProjectionError, ensure_finite, ensure_period};
use super::pension::project_pension;
use super::percentile::aggregate_percentiles;
use super::schedule::CashFlowSchedule;
use super::types::{
    ComparisonInputs, ComparisonResult, ComparisonRow, ComparisonSummary, PercentilePoint,
    YearPoint,
};

/// Projects both scenarios over the union of the payout and asset periods and
/// lines them up year by year.
pub fn run_comparison(inputs: &ComparisonInputs) -> Result<ComparisonResult, ProjectionError> {
    validate_comparison(inputs)?;
    let (sim_start_year, sim_end_year) = inputs.sim_range();
    tracing::info!(
        sim_start_year,
        sim_end_year,
        trials = inputs.trial_count,
        cash_flows = inputs.cash_flows.len(),
        "running scenario comparison"
    );

    let schedule = CashFlowSchedule::build(&inputs.cash_flows, sim_start_year, sim_end_year)?;
    let pension = project_pension(&inputs.pension_inputs())?;

    let paths = simulate_paths(&inputs.asset_inputs(), &schedule)?;
    let final_cumulative_payout = pension.last().map_or(0.0, |p| p.cumulative_payout);
    let share_of_trials_ahead =
        share_at_or_above(&paths.terminal_balances(), final_cumulative_payout);
    let asset = aggregate_percentiles(paths)?;

    let rows = build_rows(&pension, &asset, inputs.birth_year);
    let summary = summarize(
        sim_start_year,
        sim_end_year,
        &rows,
        final_cumulative_payout,
        share_of_trials_ahead,
    );
    tracing::info!(
        final_cumulative_payout = summary.final_cumulative_payout,
        final_median = summary.final_p50,
        first_year_median_ahead = ?summary.first_year_median_ahead,
        "scenario comparison finished"
    );

    Ok(ComparisonResult {
        pension,
        asset,
        rows,
        summary,
    })
}

fn validate_comparison(inputs: &ComparisonInputs) -> Result<(), ProjectionError> {
    ensure_period("payout", inputs.payout_start_year, inputs.payout_end_year)?;
    ensure_period("asset", inputs.asset_start_year, inputs.asset_end_year)?;
    if inputs.trial_count == 0 {
        return Err(ProjectionError::InvalidTrialCount);
    }
    ensure_finite("first payout", inputs.first_payout_at_start)?;
    ensure_finite("payout COLA", inputs.payout_cola)?;
    ensure_finite("initial asset value", inputs.initial_asset_value)?;
    ensure_finite("mean return", inputs.mean_return)?;
    ensure_finite("volatility", inputs.volatility)?;
    Ok(())
}

fn build_rows(
    pension: &[YearPoint],
    asset: &[PercentilePoint],
    birth_year: Option<i32>,
) -> Vec<ComparisonRow> {
    pension
        .iter()
        .zip(asset)
        .map(|(payout, band)| ComparisonRow {
            year: payout.year,
            age: birth_year.and_then(|born| payout.year.checked_sub(born)),
            cumulative_payout: payout.cumulative_payout,
            p5: band.p5,
            p50: band.p50,
            p95: band.p95,
        })
        .collect()
}

fn summarize(
    sim_start_year: i32,
    sim_end_year: i32,
    rows: &[ComparisonRow],
    final_cumulative_payout: f64,
    share_of_trials_ahead: f64,
) -> ComparisonSummary {
    let last = rows.last();
    ComparisonSummary {
        sim_start_year,
        sim_end_year,
        final_cumulative_payout,
        final_p5: last.map_or(0.0, |r| r.p5),
        final_p50: last.map_or(0.0, |r| r.p50),
        final_p95: last.map_or(0.0, |r| r.p95),
        first_year_median_ahead: rows
            .iter()
            .find(|row| row.cumulative_payout > 0.0 && row.p50 >= row.cumulative_payout)
            .map(|row| row.year),
        share_of_trials_ahead,
    }
}

fn share_at_or_above(balances: &[f64], threshold: f64) -> f64 {
    if balances.is_empty() {
        return 0.0;
    }
    let ahead = balances.iter().filter(|b| **b >= threshold).count();
    ahead as f64 / balances.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CashFlowEntry, CashFlowKind};

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_inputs() -> ComparisonInputs {
        ComparisonInputs {
            current_year: 2025,
            birth_year: Some(1970),
            payout_start_year: 2027,
            payout_end_year: 2030,
            first_payout_at_start: 20_000.0,
            payout_cola: 0.0,
            asset_start_year: 2025,
            asset_end_year: 2028,
            initial_asset_value: 50_000.0,
            mean_return: 0.0,
            volatility: 0.0,
            trial_count: 10,
            seed: 42,
            cash_flows: Vec::new(),
        }
    }

    #[test]
    fn range_spans_both_periods() {
        let result = run_comparison(&sample_inputs()).expect("valid inputs");
        let years: Vec<i32> = result.rows.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2025, 2026, 2027, 2028, 2029, 2030]);
        assert_eq!(result.pension.len(), 6);
        assert_eq!(result.asset.len(), 6);
        assert_eq!(result.rows[0].age, Some(55));
        assert_eq!(result.summary.sim_start_year, 2025);
        assert_eq!(result.summary.sim_end_year, 2030);
    }

    #[test]
    fn summary_reports_first_year_median_is_ahead() {
        let result = run_comparison(&sample_inputs()).expect("valid inputs");
        // Flat 50k against payouts of 20k, 40k, 60k, 80k.
        assert_eq!(result.summary.first_year_median_ahead, Some(2027));
        assert_approx(result.summary.final_cumulative_payout, 80_000.0);
        assert_approx(result.summary.final_p50, 50_000.0);
        assert_approx(result.summary.share_of_trials_ahead, 0.0);
    }

    #[test]
    fn share_ahead_counts_terminal_balances() {
        let mut inputs = sample_inputs();
        inputs.initial_asset_value = 100_000.0;
        let result = run_comparison(&inputs).expect("valid inputs");
        assert_approx(result.summary.share_of_trials_ahead, 1.0);
    }

    #[test]
    fn invalid_cash_flow_fails_before_any_projection() {
        let mut inputs = sample_inputs();
        inputs.cash_flows = vec![CashFlowEntry {
            id: 9,
            kind: CashFlowKind::Contribution,
            amount: 1_000.0,
            start_year: 2029,
            end_year: 2026,
            cola_rate: 0.0,
        }];
        let err = run_comparison(&inputs).expect_err("must reject");
        assert!(matches!(
            err,
            ProjectionError::InvalidCashFlowEntry { id: 9, .. }
        ));
    }

    #[test]
    fn inverted_asset_period_is_rejected() {
        let mut inputs = sample_inputs();
        inputs.asset_end_year = 2024;
        let err = run_comparison(&inputs).expect_err("must reject");
        assert!(matches!(
            err,
            ProjectionError::InvalidPeriod { label: "asset", .. }
        ));
    }

    #[test]
    fn unrepresentable_age_is_left_out() {
        let mut inputs = sample_inputs();
        inputs.birth_year = Some(i32::MIN);
        let result = run_comparison(&inputs).expect("valid inputs");
        assert!(result.rows.iter().all(|row| row.age.is_none()));
    }

    #[test]
    fn runaway_payout_cola_is_rejected() {
        let mut inputs = sample_inputs();
        inputs.payout_end_year = 2400;
        inputs.payout_cola = 9.0;
        inputs.trial_count = 1;
        let err = run_comparison(&inputs).expect_err("must reject");
        assert!(matches!(err, ProjectionError::NonFinitePayout { .. }));
    }

    #[test]
    fn zero_trials_are_rejected() {
        let mut inputs = sample_inputs();
        inputs.trial_count = 0;
        assert_eq!(
            run_comparison(&inputs).expect_err("must reject"),
            ProjectionError::InvalidTrialCount
        );
    }
}
