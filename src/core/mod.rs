mod compare;
mod engine;
mod error;
mod pension;
mod percentile;
mod rng;
mod schedule;
mod solver;
mod types;

pub use compare::run_comparison;
pub use engine::{PathMatrix, project_asset, simulate_paths, simulate_paths_with};
pub use error::ProjectionError;
pub use pension::{inflate_payout, project_pension};
pub use percentile::{aggregate_percentiles, nearest_rank};
pub use rng::{Rng, VariateSource};
pub use schedule::CashFlowSchedule;
pub use solver::{BreakEvenConfig, BreakEvenIteration, BreakEvenResult, solve_break_even_return};
pub use types::{
    AssetInputs, CashFlowEntry, CashFlowKind, ComparisonInputs, ComparisonResult, ComparisonRow,
    ComparisonSummary, PensionInputs, PercentilePoint, YearPoint,
};
