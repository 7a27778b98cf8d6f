use shared::{boundary::BoundaryError, domain::InvalidYearRange};
use thiserror::Error;

/// Caller-facing failures of one calculation run. Everything except the two
/// per-year variants is raised before a single remote call goes out.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid year range: {0}")]
    InvalidRange(#[from] InvalidYearRange),
    #[error("no boundary supplied")]
    MissingBoundary,
    #[error("failed to read boundary file {path}: {source}")]
    BoundaryIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed boundary: {0}")]
    MalformedBoundary(#[from] BoundaryError),
    #[error("index computation failed for year {year}: {source}")]
    YearFailed { year: i32, source: anyhow::Error },
    #[error("index computation for year {year} timed out after {timeout_secs}s")]
    YearTimedOut { year: i32, timeout_secs: u64 },
}
