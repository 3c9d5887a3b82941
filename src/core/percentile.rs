use super::engine::PathMatrix;
use super::error::ProjectionError;
use super::types::PercentilePoint;

const P5: f64 = 0.05;
const P50: f64 = 0.50;
const P95: f64 = 0.95;

/// Collapses simulated paths into 5th/50th/95th percentile bands per year.
///
/// Consumes the matrix; paths are not kept once the bands exist.
pub fn aggregate_percentiles(paths: PathMatrix) -> Result<Vec<PercentilePoint>, ProjectionError> {
    let mut column = Vec::with_capacity(paths.trial_count());
    let mut points = Vec::with_capacity(paths.year_count());

    for year_index in 0..paths.year_count() {
        let year = paths.start_year() + year_index as i32;
        paths.fill_column(year_index, &mut column);
        if column.iter().any(|balance| !balance.is_finite()) {
            return Err(ProjectionError::NonFiniteBalance { year });
        }
        column.sort_by(|a, b| a.total_cmp(b));

        points.push(PercentilePoint {
            year,
            p5: nearest_rank(&column, P5),
            p50: nearest_rank(&column, P50),
            p95: nearest_rank(&column, P95),
        });
    }
    Ok(points)
}

/// Nearest-rank selection at `floor(n * p)` on an ascending slice; no
/// interpolation between neighbours.
pub fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = (sorted.len() as f64 * p).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}
