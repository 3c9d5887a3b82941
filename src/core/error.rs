use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("invalid {label} period: end year {end} precedes start year {start}")]
    InvalidPeriod {
        label: &'static str,
        start: i32,
        end: i32,
    },

    #[error("trial count must be at least 1")]
    InvalidTrialCount,

    #[error("invalid cash-flow entry {id}: {reason}")]
    InvalidCashFlowEntry { id: u64, reason: String },

    #[error("{name} must be a finite number")]
    NonFiniteInput { name: &'static str },

    #[error("invalid {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },

    #[error("current date is after the payout start ({years_until_start:.2} years until start)")]
    InvalidChronology { years_until_start: f64 },

    #[error("simulated balance became non-finite in year {year}")]
    NonFiniteBalance { year: i32 },

    #[error("cumulative pension payout became non-finite in year {year}")]
    NonFinitePayout { year: i32 },

    #[error("invalid solver configuration: {0}")]
    InvalidSolverConfig(String),
}

pub(crate) fn ensure_finite(name: &'static str, value: f64) -> Result<(), ProjectionError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProjectionError::NonFiniteInput { name })
    }
}

pub(crate) fn ensure_period(
    label: &'static str,
    start: i32,
    end: i32,
) -> Result<(), ProjectionError> {
    if end < start {
        return Err(ProjectionError::InvalidPeriod { label, start, end });
    }
    Ok(())
}
