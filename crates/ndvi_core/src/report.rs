use std::collections::BTreeMap;

use serde::Serialize;
use shared::domain::{Year, YearRange};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearResult {
    pub year: Year,
    pub thumbnail_url: String,
    pub mean_index: f64,
}

/// Completed per-year results for one requested range, keyed by year.
/// The orchestrator only ever returns a series holding every year of the
/// range; a partially filled one never leaves it.
#[derive(Debug, Clone)]
pub struct NdviSeries {
    range: YearRange,
    results: BTreeMap<Year, YearResult>,
}

impl NdviSeries {
    pub(crate) fn new(range: YearRange) -> Self {
        Self {
            range,
            results: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, result: YearResult) {
        self.results.insert(result.year, result);
    }

    pub fn range(&self) -> YearRange {
        self.range
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, year: Year) -> Option<&YearResult> {
        self.results.get(&year)
    }

    /// Ascending year order, regardless of completion order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &YearResult> {
        self.results.values()
    }

    /// First-vs-last-year change in mean index. `None` only for an empty
    /// series, which the orchestrator never produces.
    pub fn delta(&self) -> Option<IndexDelta> {
        let first = self.results.values().next()?;
        let last = self.results.values().next_back()?;
        Some(IndexDelta::between(first.mean_index, last.mean_index))
    }
}

/// Change in mean index across the series endpoints. Sign and magnitude are
/// reported separately for display: `'+'` only for a strictly positive
/// change, `'-'` otherwise (including zero).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexDelta {
    pub value: f64,
}

impl IndexDelta {
    pub fn between(first_mean: f64, last_mean: f64) -> Self {
        Self {
            value: last_mean - first_mean,
        }
    }

    pub fn sign(&self) -> char {
        if self.value > 0.0 {
            '+'
        } else {
            '-'
        }
    }

    pub fn magnitude(&self) -> f64 {
        self.value.abs()
    }
}
