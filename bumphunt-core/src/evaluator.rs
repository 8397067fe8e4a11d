use std::fmt::{self, Display};
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::bin_models::BinModelKind;
use crate::errors::{BumpHuntError, BumpHuntResult};
use crate::models::{BinnedSpectrum, Window};

/// Which direction of deviation counts as interesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatisticKind {
    /// Hunt for bumps: windows without an excess get p = 1.
    #[default]
    ExcessOnly,
    /// Hunt for dips: windows without a deficit get p = 1.
    DeficitOnly,
}

impl Display for TestStatisticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatisticKind::ExcessOnly => f.write_str("excess_only"),
            TestStatisticKind::DeficitOnly => f.write_str("deficit_only"),
        }
    }
}

impl FromStr for TestStatisticKind {
    type Err = BumpHuntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "excess_only" | "excess" | "bump" => Ok(TestStatisticKind::ExcessOnly),
            "deficit_only" | "deficit" | "dip" => Ok(TestStatisticKind::DeficitOnly),
            other => Err(BumpHuntError::InvalidConfig(format!(
                "unknown test statistic: {other}"
            ))),
        }
    }
}

/// Result of scanning one spectrum over all windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanOutcome {
    /// `-ln(best_p_value)`, larger for more extreme bumps.
    pub statistic: f64,
    pub best_window: Window,
    pub best_p_value: f64,
}

///
/// Scans a spectrum against a background over a set of windows and reduces the
/// window p-values to the BumpHunter test statistic.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestStatisticEvaluator {
    model: BinModelKind,
    kind: TestStatisticKind,
}

impl TestStatisticEvaluator {
    pub fn new(model: BinModelKind, kind: TestStatisticKind) -> Self {
        TestStatisticEvaluator { model, kind }
    }

    pub fn model(&self) -> BinModelKind {
        self.model
    }

    pub fn kind(&self) -> TestStatisticKind {
        self.kind
    }

    /// Expected count in the window and its uncertainty, aggregated as the model requires.
    pub fn expectation(&self, background: &BinnedSpectrum, window: &Window) -> (f64, f64) {
        if self.model.correlated_errors() {
            background.integral_and_linear_error(window)
        } else {
            background.integral_and_error(window)
        }
    }

    /// p-value of a single window after the test statistic filter.
    pub fn window_p_value(
        &self,
        spectrum: &BinnedSpectrum,
        background: &BinnedSpectrum,
        window: &Window,
    ) -> f64 {
        let nobs = spectrum.integral(window);
        let (nexp, nexp_err) = self.expectation(background, window);
        self.filtered_p_value(nobs, nexp, nexp_err)
    }

    fn filtered_p_value(&self, nobs: f64, nexp: f64, nexp_err: f64) -> f64 {
        match self.kind {
            TestStatisticKind::ExcessOnly if nobs <= nexp => 1.0,
            TestStatisticKind::DeficitOnly if nobs >= nexp => 1.0,
            _ => self.model.p_value(nobs, nexp, nexp_err),
        }
    }

    ///
    /// Evaluate the test statistic of `spectrum` over `windows`.
    ///
    /// The window with the smallest p-value wins; on ties the first one in scan order.
    ///
    /// # Arguments
    /// * `spectrum` - observed or pseudo data
    /// * `background` - expected counts and their errors, same binning as `spectrum`
    /// * `windows` - scan windows, see [crate::windows::WindowPatternGenerator]
    ///
    pub fn evaluate(
        &self,
        spectrum: &BinnedSpectrum,
        background: &BinnedSpectrum,
        windows: &[Window],
    ) -> BumpHuntResult<ScanOutcome> {
        self.scan(spectrum, background, windows, false)
    }

    /// Same as [TestStatisticEvaluator::evaluate], logging every window at debug level.
    pub fn evaluate_verbose(
        &self,
        spectrum: &BinnedSpectrum,
        background: &BinnedSpectrum,
        windows: &[Window],
    ) -> BumpHuntResult<ScanOutcome> {
        self.scan(spectrum, background, windows, true)
    }

    fn scan(
        &self,
        spectrum: &BinnedSpectrum,
        background: &BinnedSpectrum,
        windows: &[Window],
        verbose: bool,
    ) -> BumpHuntResult<ScanOutcome> {
        let mut best: Option<(Window, f64)> = None;

        for window in windows {
            let nobs = spectrum.integral(window);
            let (nexp, nexp_err) = self.expectation(background, window);
            let p_value = self.filtered_p_value(nobs, nexp, nexp_err);

            if verbose {
                let (low, high) = background.window_bounds(window);
                debug!(
                    "window {window} [{low}, {high}]: p-value {p_value:e} (expected {nexp:.3} +- {nexp_err:.3}, observed {nobs:.3})"
                );
            }

            if best.is_none_or(|(_, best_p)| p_value < best_p) {
                best = Some((*window, p_value));
            }
        }

        let (best_window, best_p_value) = best.ok_or(BumpHuntError::NoWindows)?;
        // p-values that underflow to 0 keep a finite statistic
        let statistic = if best_p_value < 1.0 {
            -best_p_value.max(f64::MIN_POSITIVE).ln()
        } else {
            0.0
        };

        Ok(ScanOutcome {
            statistic,
            best_window,
            best_p_value,
        })
    }
}
