use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_MIN_WINDOW_SIZE, DEFAULT_WINDOW_STEP_SIZE};
use crate::errors::{BumpHuntError, BumpHuntResult};
use crate::models::BinnedSpectrum;

/// A closed, 1-based range of bins `[first, last]` tested for a bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub first: usize,
    pub last: usize,
}

impl Window {
    pub fn new(first: usize, last: usize) -> Self {
        debug_assert!(first >= 1 && first <= last, "invalid window [{first}, {last}]");
        Window { first, last }
    }

    pub fn width(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn contains(&self, bin: usize) -> bool {
        (self.first..=self.last).contains(&bin)
    }
}

impl Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.first, self.last)
    }
}

/// The resolved search region, as an inclusive 1-based bin range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BinRange {
    pub start_bin: usize,
    pub stop_bin: usize,
}

impl BinRange {
    pub fn new(start_bin: usize, stop_bin: usize) -> Self {
        BinRange {
            start_bin,
            stop_bin,
        }
    }

    /// Number of bins in the range, zero when inverted.
    pub fn len(&self) -> usize {
        (self.stop_bin + 1).saturating_sub(self.start_bin)
    }

    pub fn is_empty(&self) -> bool {
        self.stop_bin < self.start_bin
    }

    pub fn contains(&self, bin: usize) -> bool {
        (self.start_bin..=self.stop_bin).contains(&bin)
    }

    pub fn bins(&self) -> std::ops::RangeInclusive<usize> {
        self.start_bin..=self.stop_bin
    }
}

///
/// Where to hunt for bumps, in physical units of the spectrum axis.
///
/// `Auto` picks the widest contiguous run of non-empty background bins.
///
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchRegion {
    #[default]
    Auto,
    Range {
        low: f64,
        high: f64,
    },
}

impl From<(f64, f64)> for SearchRegion {
    fn from((low, high): (f64, f64)) -> Self {
        SearchRegion::Range { low, high }
    }
}

impl From<Option<(f64, f64)>> for SearchRegion {
    fn from(value: Option<(f64, f64)>) -> Self {
        value.map(SearchRegion::from).unwrap_or_default()
    }
}

impl SearchRegion {
    ///
    /// Map the region onto the bins of `background`.
    ///
    /// An explicit range covers the bin containing `low` up to the bin containing
    /// `high`; a `high` that falls exactly on a bin edge does not pull in the bin
    /// starting there.
    ///
    pub fn resolve(&self, background: &BinnedSpectrum) -> BumpHuntResult<BinRange> {
        match *self {
            SearchRegion::Auto => widest_non_empty_run(background),
            SearchRegion::Range { low, high } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(BumpHuntError::InvalidSearchRegion(format!(
                        "bounds must be finite, got [{low}, {high}]"
                    )));
                }
                if high <= low {
                    return Err(BumpHuntError::InvalidSearchRegion(format!(
                        "empty or inverted region [{low}, {high}]"
                    )));
                }

                let (min, max) = background.range();
                if high <= min || low >= max {
                    return Err(BumpHuntError::InvalidSearchRegion(format!(
                        "region [{low}, {high}] lies outside the spectrum range [{min}, {max}]"
                    )));
                }

                let start_bin = background.find_bin(low).unwrap_or(1);
                let stop_bin = match background.find_bin(high) {
                    Some(bin) if background.low_edge(bin) == high => bin - 1,
                    Some(bin) => bin,
                    None => background.n_bins(),
                };

                if stop_bin < start_bin {
                    return Err(BumpHuntError::InvalidSearchRegion(format!(
                        "region [{low}, {high}] covers no bins"
                    )));
                }

                Ok(BinRange::new(start_bin, stop_bin))
            }
        }
    }
}

fn widest_non_empty_run(background: &BinnedSpectrum) -> BumpHuntResult<BinRange> {
    let mut best: Option<BinRange> = None;
    let mut run_start: Option<usize> = None;

    for bin in 1..=background.n_bins() + 1 {
        let filled = bin <= background.n_bins() && !background.is_empty_bin(bin);
        match (filled, run_start) {
            (true, None) => run_start = Some(bin),
            (false, Some(start)) => {
                let run = BinRange::new(start, bin - 1);
                if best.is_none_or(|b| run.len() > b.len()) {
                    best = Some(run);
                }
                run_start = None;
            }
            _ => {}
        }
    }

    best.ok_or(BumpHuntError::AllBinsEmpty)
}

/// Window sizes as configured; unset values fall back to defaults derived from the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowSizeSettings {
    pub min_size: Option<usize>,
    pub max_size: Option<usize>,
    pub step_size: Option<usize>,
}

/// Concrete window sizes, in bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowSizePolicy {
    pub min_size: usize,
    pub max_size: usize,
    pub step_size: usize,
}

impl WindowSizeSettings {
    ///
    /// Resolve the settings for a search region.
    ///
    /// Defaults: minimum 1 bin, maximum half the region (never below the minimum),
    /// step 1 bin.
    ///
    pub fn resolve(&self, region: &BinRange) -> BumpHuntResult<WindowSizePolicy> {
        let min_size = self.min_size.unwrap_or(DEFAULT_MIN_WINDOW_SIZE);
        let step_size = self.step_size.unwrap_or(DEFAULT_WINDOW_STEP_SIZE);
        let max_size = self
            .max_size
            .unwrap_or_else(|| (region.len() / 2).max(min_size));

        if min_size == 0 {
            return Err(BumpHuntError::InvalidWindowPolicy(
                "minimum window size must be at least one bin".to_string(),
            ));
        }
        if step_size == 0 {
            return Err(BumpHuntError::InvalidWindowPolicy(
                "window step size must be at least one bin".to_string(),
            ));
        }
        if min_size > max_size {
            return Err(BumpHuntError::InvalidWindowPolicy(format!(
                "minimum window size {min_size} exceeds maximum window size {max_size}"
            )));
        }

        Ok(WindowSizePolicy {
            min_size,
            max_size,
            step_size,
        })
    }
}
