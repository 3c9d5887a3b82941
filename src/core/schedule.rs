use super::error::{ProjectionError, ensure_period};
use super::types::{CashFlowEntry, CashFlowKind, year_count};

/// Year-indexed view over a set of cash-flow entries, covering one projection
/// window.
///
/// Built once per request and read-only afterwards, so it can be shared by
/// reference across simulation workers.
#[derive(Debug, Default)]
pub struct CashFlowSchedule {
    start_year: i32,
    by_year: Vec<Vec<CashFlowEntry>>,
}

impl CashFlowSchedule {
    /// Indexes every entry under each year of its inclusive `[start_year, end_year]`
    /// range that falls inside `[window_start, window_end]`. Malformed entries are
    /// rejected on their full declared range rather than left inert.
    pub fn build(
        entries: &[CashFlowEntry],
        window_start: i32,
        window_end: i32,
    ) -> Result<Self, ProjectionError> {
        ensure_period("simulation", window_start, window_end)?;
        let mut by_year = vec![Vec::new(); year_count(window_start, window_end)];
        for entry in entries {
            validate_entry(entry)?;
            let from = entry.start_year.max(window_start);
            let to = entry.end_year.min(window_end);
            if from > to {
                continue;
            }
            let first = year_count(window_start, from) - 1;
            let last = year_count(window_start, to) - 1;
            for slot in &mut by_year[first..=last] {
                slot.push(*entry);
            }
        }
        Ok(Self {
            start_year: window_start,
            by_year,
        })
    }

    /// Entries active in `year`; empty for years outside the window.
    pub fn active_in(&self, year: i32) -> &[CashFlowEntry] {
        let offset = i64::from(year) - i64::from(self.start_year);
        usize::try_from(offset)
            .ok()
            .and_then(|index| self.by_year.get(index))
            .map_or(&[], Vec::as_slice)
    }

    /// COLA-adjusted total of one kind of flow for `year`.
    pub fn total_for(&self, kind: CashFlowKind, year: i32, current_year: i32) -> f64 {
        self.active_in(year)
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.adjusted_amount(year, current_year))
            .sum()
    }
}

fn validate_entry(entry: &CashFlowEntry) -> Result<(), ProjectionError> {
    let reject = |reason: String| ProjectionError::InvalidCashFlowEntry {
        id: entry.id,
        reason,
    };

    if entry.start_year > entry.end_year {
        return Err(reject(format!(
            "start year {} is after end year {}",
            entry.start_year, entry.end_year
        )));
    }
    if !entry.amount.is_finite() || entry.amount < 0.0 {
        return Err(reject("amount must be a finite value >= 0".to_string()));
    }
    if !entry.cola_rate.is_finite() || entry.cola_rate < -1.0 {
        return Err(reject("COLA rate must be finite and >= -100%".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, kind: CashFlowKind, start_year: i32, end_year: i32) -> CashFlowEntry {
        CashFlowEntry {
            id,
            kind,
            amount: 1_000.0,
            start_year,
            end_year,
            cola_rate: 0.0,
        }
    }

    #[test]
    fn entries_are_indexed_for_every_year_in_their_inclusive_range() {
        let schedule = CashFlowSchedule::build(
            &[
                entry(1, CashFlowKind::Contribution, 2026, 2028),
                entry(2, CashFlowKind::Withdrawal, 2028, 2028),
            ],
            2024,
            2030,
        )
        .expect("valid entries");

        assert!(schedule.active_in(2025).is_empty());
        assert_eq!(schedule.active_in(2026).len(), 1);
        assert_eq!(schedule.active_in(2027)[0].id, 1);
        let both: Vec<u64> = schedule.active_in(2028).iter().map(|e| e.id).collect();
        assert_eq!(both, vec![1, 2]);
        assert!(schedule.active_in(2029).is_empty());
        for year in 2024..=2030 {
            assert!(schedule.active_in(year).iter().all(|e| e.is_active_in(year)));
        }
    }

    #[test]
    fn inverted_entry_is_rejected_instead_of_dropped() {
        let inverted = entry(7, CashFlowKind::Contribution, 2030, 2029);
        let err = CashFlowSchedule::build(&[inverted], 2025, 2040)
            .expect_err("must reject inverted range");
        assert!(matches!(
            err,
            ProjectionError::InvalidCashFlowEntry { id: 7, .. }
        ));
    }

    #[test]
    fn negative_amount_is_rejected() {
        let mut bad = entry(3, CashFlowKind::Withdrawal, 2026, 2027);
        bad.amount = -5.0;
        assert!(CashFlowSchedule::build(&[bad], 2025, 2030).is_err());
    }

    #[test]
    fn totals_apply_cola_from_current_year() {
        let mut grown = entry(1, CashFlowKind::Contribution, 2024, 2030);
        grown.cola_rate = 0.10;
        let schedule = CashFlowSchedule::build(
            &[grown, entry(2, CashFlowKind::Withdrawal, 2024, 2030)],
            2024,
            2030,
        )
        .expect("valid entries");

        let before_current = schedule.total_for(CashFlowKind::Contribution, 2024, 2025);
        assert!((before_current - 1_000.0).abs() < 1e-9);
        let two_years_on = schedule.total_for(CashFlowKind::Contribution, 2027, 2025);
        assert!((two_years_on - 1_210.0).abs() < 1e-9);
        let withdrawals = schedule.total_for(CashFlowKind::Withdrawal, 2027, 2025);
        assert!((withdrawals - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_builds_empty_schedule() {
        let schedule = CashFlowSchedule::build(&[], 2025, 2027).expect("empty is valid");
        for year in 2025..=2027 {
            assert!(schedule.active_in(year).is_empty());
        }
    }

    #[test]
    fn huge_entry_ranges_are_clipped_to_the_window() {
        let wide = entry(5, CashFlowKind::Contribution, i32::MIN, i32::MAX);
        let schedule = CashFlowSchedule::build(&[wide], 2025, 2069).expect("valid entry");
        assert_eq!(schedule.by_year.len(), 45);
        assert!(schedule.by_year.iter().all(|slot| slot.len() == 1));
        assert!(schedule.active_in(2024).is_empty());
        assert!(schedule.active_in(2070).is_empty());
        assert!(schedule.active_in(i32::MIN).is_empty());
        assert_eq!(schedule.active_in(2069)[0].id, 5);
    }

    #[test]
    fn entries_outside_the_window_are_validated_but_not_indexed() {
        let schedule = CashFlowSchedule::build(
            &[entry(1, CashFlowKind::Withdrawal, 1990, 2000)],
            2025,
            2030,
        )
        .expect("valid entry");
        assert!(schedule.by_year.iter().all(Vec::is_empty));

        let err = CashFlowSchedule::build(
            &[entry(2, CashFlowKind::Withdrawal, 2000, 1990)],
            2025,
            2030,
        )
        .expect_err("inverted entry outside the window is still rejected");
        assert!(matches!(
            err,
            ProjectionError::InvalidCashFlowEntry { id: 2, .. }
        ));
    }
}
