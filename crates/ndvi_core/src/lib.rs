use std::{path::Path, time::Duration};

use anyhow::{anyhow, Context};
use chrono::{DateTime, TimeZone, Utc};
use futures::{stream, StreamExt};
use geocompute_integration::{ComputeEngine, ThumbnailStyle};
use shared::{
    boundary::BoundaryGeometry,
    domain::{Year, YearRange},
};
use tracing::{debug, info, warn};

pub mod error;
pub mod report;

pub use error::AnalysisError;
pub use report::{IndexDelta, NdviSeries, YearResult};

/// Fixed parameters of the yearly index computation. These mirror the
/// upstream imagery product and are not configuration.
pub const IMAGE_COLLECTION: &str = "LANDSAT/LC08/C01/T1_TOA";
pub const NIR_BAND: &str = "B5";
pub const RED_BAND: &str = "B4";
pub const SAMPLING_SCALE_M: f64 = 30.0;
pub const THUMBNAIL_DIMENSIONS: &str = "1024x768";
pub const NDVI_PALETTE: [&str; 3] = ["red", "green", "blue"];
pub const NDVI_MIN: f64 = -1.0;
pub const NDVI_MAX: f64 = 1.0;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;
pub const DEFAULT_PER_YEAR_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Upper bound on concurrently processed years.
    pub max_in_flight: usize,
    /// Budget for one year's full remote chain, admission to completion.
    pub per_year_timeout: Duration,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            per_year_timeout: DEFAULT_PER_YEAR_TIMEOUT,
        }
    }
}

pub fn ndvi_thumbnail_style() -> ThumbnailStyle {
    ThumbnailStyle {
        palette: NDVI_PALETTE.iter().map(|color| color.to_string()).collect(),
        dimensions: THUMBNAIL_DIMENSIONS.to_string(),
        min: NDVI_MIN,
        max: NDVI_MAX,
    }
}

/// Inclusive year range as requested by a caller.
pub fn requested_range(start: i32, end: i32) -> Result<YearRange, AnalysisError> {
    Ok(YearRange::new(Year(start), Year(end))?)
}

pub fn boundary_from_file(path: &Path) -> Result<BoundaryGeometry, AnalysisError> {
    let raw = std::fs::read_to_string(path).map_err(|source| AnalysisError::BoundaryIo {
        path: path.display().to_string(),
        source,
    })?;
    boundary_from_str(&raw)
}

pub fn boundary_from_str(raw: &str) -> Result<BoundaryGeometry, AnalysisError> {
    Ok(BoundaryGeometry::from_geojson_str(raw)?)
}

/// Full calendar year of `year` in UTC, inclusive on both ends.
pub fn year_window(year: Year) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year.0, 1, 1, 0, 0, 0).single()?;
    let end = Utc.with_ymd_and_hms(year.0, 12, 31, 23, 59, 59).single()?;
    Some((start, end))
}

/// Runs the per-year computation chain for every year of `range` against
/// `engine` and collects the results into a series keyed by year.
///
/// At most `options.max_in_flight` years run concurrently; completion order
/// is irrelevant. The failure policy is all-or-nothing: the first year to
/// fail (or exceed `options.per_year_timeout`) aborts the run with that year
/// named, queued years are never admitted, and in-flight years are dropped
/// along with their outstanding requests. No partial series is returned.
pub async fn compute_yearly_index(
    engine: &dyn ComputeEngine,
    boundary: &BoundaryGeometry,
    range: YearRange,
    options: &AnalysisOptions,
) -> Result<NdviSeries, AnalysisError> {
    // A zero bound would never admit a task and stall the stream.
    let max_in_flight = options.max_in_flight.max(1);
    let per_year_timeout = options.per_year_timeout;

    info!(
        start = range.start().0,
        end = range.end().0,
        span = range.span(),
        max_in_flight,
        "analysis: dispatching yearly index computations"
    );

    let mut series = NdviSeries::new(range);
    let mut years = stream::iter(range.years().map(|year| async move {
        let outcome =
            tokio::time::timeout(per_year_timeout, compute_year(engine, boundary, year)).await;
        (year, outcome)
    }))
    .buffer_unordered(max_in_flight);

    // Returning early drops the stream: in-flight years are cancelled and
    // queued years are never admitted.
    while let Some((year, outcome)) = years.next().await {
        match outcome {
            Ok(Ok(result)) => {
                info!(
                    year = year.0,
                    mean_index = result.mean_index,
                    "analysis: year complete"
                );
                series.insert(result);
            }
            Ok(Err(source)) => {
                warn!(year = year.0, error = %source, "analysis: year failed, aborting run");
                return Err(AnalysisError::YearFailed {
                    year: year.0,
                    source,
                });
            }
            Err(_) => {
                warn!(
                    year = year.0,
                    timeout_secs = per_year_timeout.as_secs(),
                    "analysis: year timed out, aborting run"
                );
                return Err(AnalysisError::YearTimedOut {
                    year: year.0,
                    timeout_secs: per_year_timeout.as_secs(),
                });
            }
        }
    }

    debug_assert_eq!(series.len(), range.span());
    Ok(series)
}

async fn compute_year(
    engine: &dyn ComputeEngine,
    boundary: &BoundaryGeometry,
    year: Year,
) -> anyhow::Result<YearResult> {
    let (date_start, date_end) = year_window(year)
        .ok_or_else(|| anyhow!("calendar window out of range for year {}", year.0))?;

    debug!(year = year.0, "analysis: building composite");
    let composite_id = engine
        .build_composite(IMAGE_COLLECTION, boundary, date_start, date_end)
        .await
        .context("building composite")?;

    debug!(year = year.0, composite_id = %composite_id.0, "analysis: deriving index");
    let index_id = engine
        .normalized_difference(&composite_id, NIR_BAND, RED_BAND)
        .await
        .context("deriving normalized difference index")?;

    debug!(year = year.0, index_id = %index_id.0, "analysis: reducing region mean");
    let mean_index = engine
        .region_mean(&index_id, boundary, SAMPLING_SCALE_M)
        .await
        .context("reducing region mean")?;

    debug!(year = year.0, index_id = %index_id.0, "analysis: rendering thumbnail");
    let thumbnail_url = engine
        .render_thumbnail(&index_id, boundary, &ndvi_thumbnail_style())
        .await
        .context("rendering thumbnail")?;

    Ok(YearResult {
        year,
        thumbnail_url,
        mean_index,
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
