use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CashFlowKind {
    Contribution,
    Withdrawal,
}

/// A recurring deposit into or draw from the asset account.
///
/// `amount` is expressed in today's money and grows at `cola_rate` per year
/// counted from the projection's `current_year`, not from `start_year`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowEntry {
    pub id: u64,
    pub kind: CashFlowKind,
    pub amount: f64,
    pub start_year: i32,
    pub end_year: i32,
    pub cola_rate: f64,
}

impl CashFlowEntry {
    pub fn is_active_in(&self, year: i32) -> bool {
        self.start_year <= year && year <= self.end_year
    }

    pub fn adjusted_amount(&self, year: i32, current_year: i32) -> f64 {
        let periods = year.saturating_sub(current_year).max(0);
        self.amount * (1.0 + self.cola_rate).powi(periods)
    }
}

/// Number of years in the inclusive range `[start, end]`, for `start <= end`.
pub(crate) fn year_count(start: i32, end: i32) -> usize {
    (i64::from(end) - i64::from(start)) as usize + 1
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearPoint {
    pub year: i32,
    pub cumulative_payout: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentilePoint {
    pub year: i32,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
}

/// Scenario 1 parameters. Rates are decimal fractions.
#[derive(Debug, Clone, Copy)]
pub struct PensionInputs {
    pub sim_start_year: i32,
    pub sim_end_year: i32,
    pub payout_start_year: i32,
    pub payout_end_year: i32,
    pub first_payout_at_start: f64,
    pub payout_cola: f64,
}

/// Scenario 2 parameters. Rates are decimal fractions.
#[derive(Debug, Clone)]
pub struct AssetInputs {
    pub cash_flows: Vec<CashFlowEntry>,
    pub current_year: i32,
    pub sim_start_year: i32,
    pub sim_end_year: i32,
    pub asset_start_year: i32,
    pub initial_asset_value: f64,
    pub mean_return: f64,
    pub volatility: f64,
    pub trial_count: u32,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct ComparisonInputs {
    pub current_year: i32,
    pub birth_year: Option<i32>,
    pub payout_start_year: i32,
    pub payout_end_year: i32,
    pub first_payout_at_start: f64,
    pub payout_cola: f64,
    pub asset_start_year: i32,
    pub asset_end_year: i32,
    pub initial_asset_value: f64,
    pub mean_return: f64,
    pub volatility: f64,
    pub trial_count: u32,
    pub seed: u64,
    pub cash_flows: Vec<CashFlowEntry>,
}

impl ComparisonInputs {
    pub fn sim_range(&self) -> (i32, i32) {
        (
            self.asset_start_year.min(self.payout_start_year),
            self.asset_end_year.max(self.payout_end_year),
        )
    }

    pub fn pension_inputs(&self) -> PensionInputs {
        let (sim_start_year, sim_end_year) = self.sim_range();
        PensionInputs {
            sim_start_year,
            sim_end_year,
            payout_start_year: self.payout_start_year,
            payout_end_year: self.payout_end_year,
            first_payout_at_start: self.first_payout_at_start,
            payout_cola: self.payout_cola,
        }
    }

    pub fn asset_inputs(&self) -> AssetInputs {
        let (sim_start_year, sim_end_year) = self.sim_range();
        AssetInputs {
            cash_flows: self.cash_flows.clone(),
            current_year: self.current_year,
            sim_start_year,
            sim_end_year,
            asset_start_year: self.asset_start_year,
            initial_asset_value: self.initial_asset_value,
            mean_return: self.mean_return,
            volatility: self.volatility,
            trial_count: self.trial_count,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub year: i32,
    pub age: Option<i32>,
    pub cumulative_payout: f64,
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub sim_start_year: i32,
    pub sim_end_year: i32,
    pub final_cumulative_payout: f64,
    pub final_p5: f64,
    pub final_p50: f64,
    pub final_p95: f64,
    pub first_year_median_ahead: Option<i32>,
    pub share_of_trials_ahead: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub pension: Vec<YearPoint>,
    pub asset: Vec<PercentilePoint>,
    pub rows: Vec<ComparisonRow>,
    pub summary: ComparisonSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_count_spans_the_full_i32_range() {
        assert_eq!(year_count(2025, 2025), 1);
        assert_eq!(year_count(2025, 2069), 45);
        assert_eq!(year_count(i32::MIN, i32::MAX), 1_usize << 32);
    }

    #[test]
    fn cola_periods_saturate_for_extreme_years() {
        let entry = CashFlowEntry {
            id: 1,
            kind: CashFlowKind::Contribution,
            amount: 500.0,
            start_year: i32::MIN,
            end_year: i32::MAX,
            cola_rate: 0.0,
        };
        assert_eq!(entry.adjusted_amount(i32::MAX, i32::MIN), 500.0);
        assert_eq!(entry.adjusted_amount(i32::MIN, i32::MAX), 500.0);
    }
}
