use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

macro_rules! handle_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);
    };
}

handle_newtype!(CompositeId);
handle_newtype!(IndexId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Year(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("start year {} is after end year {}", start.0, end.0)]
pub struct InvalidYearRange {
    pub start: Year,
    pub end: Year,
}

/// Inclusive span of calendar years. `start <= end` always holds; both
/// constructors and deserialization go through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawYearRange")]
pub struct YearRange {
    start: Year,
    end: Year,
}

impl YearRange {
    pub fn new(start: Year, end: Year) -> Result<Self, InvalidYearRange> {
        if start > end {
            return Err(InvalidYearRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(year: Year) -> Self {
        Self {
            start: year,
            end: year,
        }
    }

    pub fn start(&self) -> Year {
        self.start
    }

    pub fn end(&self) -> Year {
        self.end
    }

    /// Number of years covered, never zero. The difference is taken in
    /// `i64`, which holds the full `i32` year domain.
    pub fn span(&self) -> usize {
        (i64::from(self.end.0) - i64::from(self.start.0) + 1) as usize
    }

    pub fn years(&self) -> impl Iterator<Item = Year> {
        (self.start.0..=self.end.0).map(Year)
    }
}

#[derive(Debug, Deserialize)]
struct RawYearRange {
    start: Year,
    end: Year,
}

impl TryFrom<RawYearRange> for YearRange {
    type Error = InvalidYearRange;

    fn try_from(raw: RawYearRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

/// Identifier for one orchestrated run, tagged onto its log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
