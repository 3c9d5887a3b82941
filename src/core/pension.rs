use super::error::{ProjectionError, ensure_finite, ensure_period};
use super::types::{PensionInputs, YearPoint, year_count};

/// Cumulative payout for every year of the simulation range.
///
/// Years before the payout period report zero; years after it hold the
/// terminal total flat.
pub fn project_pension(inputs: &PensionInputs) -> Result<Vec<YearPoint>, ProjectionError> {
    ensure_period("payout", inputs.payout_start_year, inputs.payout_end_year)?;
    ensure_period("simulation", inputs.sim_start_year, inputs.sim_end_year)?;
    ensure_finite("first payout", inputs.first_payout_at_start)?;
    ensure_finite("payout COLA", inputs.payout_cola)?;

    let mut points = Vec::with_capacity(year_count(inputs.sim_start_year, inputs.sim_end_year));
    let mut cumulative_payout = 0.0;
    for year in inputs.sim_start_year..=inputs.sim_end_year {
        if (inputs.payout_start_year..=inputs.payout_end_year).contains(&year) {
            cumulative_payout += payout_in_year(inputs, year);
            if !cumulative_payout.is_finite() {
                return Err(ProjectionError::NonFinitePayout { year });
            }
        }
        points.push(YearPoint {
            year,
            cumulative_payout,
        });
    }
    Ok(points)
}

fn payout_in_year(inputs: &PensionInputs, year: i32) -> f64 {
    let periods = i64::from(year) - i64::from(inputs.payout_start_year);
    let periods = i32::try_from(periods).unwrap_or(i32::MAX);
    inputs.first_payout_at_start * (1.0 + inputs.payout_cola).powi(periods)
}

/// Grows a payout quoted in today's money to its value at the payout start.
pub fn inflate_payout(
    annual_payout_today: f64,
    inflation_rate: f64,
    years_until_start: f64,
) -> Result<f64, ProjectionError> {
    ensure_finite("annual payout", annual_payout_today)?;
    ensure_finite("inflation rate", inflation_rate)?;
    ensure_finite("years until payout start", years_until_start)?;
    if years_until_start < 0.0 {
        return Err(ProjectionError::InvalidChronology { years_until_start });
    }
    Ok(annual_payout_today * (1.0 + inflation_rate).powf(years_until_start))
}
