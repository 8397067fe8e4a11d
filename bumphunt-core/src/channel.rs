use log::debug;
use rand::Rng;
use serde::Serialize;

use crate::errors::{BumpHuntError, BumpHuntResult};
use crate::evaluator::{ScanOutcome, TestStatisticEvaluator};
use crate::models::{BinRange, BinnedSpectrum, SearchRegion, Window, WindowSizeSettings};
use crate::pseudo::PseudoDataGenerator;
use crate::windows::{PatternEntry, WindowPatternGenerator, describe_pattern};

/// The most significant window of a channel, with its physical bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bump {
    pub window: Window,
    pub low_edge: f64,
    pub high_edge: f64,
    pub p_value: f64,
}

impl Bump {
    pub fn width(&self) -> f64 {
        self.high_edge - self.low_edge
    }
}

///
/// One independent search channel: a background prediction, the observed data and
/// the scan windows derived from its search region.
///
#[derive(Debug, Clone)]
pub struct Channel {
    background: BinnedSpectrum,
    observed: BinnedSpectrum,
    search_region: SearchRegion,
    region: BinRange,
    windows: Vec<Window>,
    bump: Option<Bump>,
}

impl Channel {
    ///
    /// Create a channel and resolve its search pattern.
    ///
    /// # Arguments
    /// * `background` - expected contents and errors
    /// * `observed` - data, with the binning of `background`
    /// * `search_region` - where to look for bumps
    /// * `window_sizes` - window size settings, unset values are derived from the region
    ///
    pub fn new(
        background: BinnedSpectrum,
        observed: BinnedSpectrum,
        search_region: SearchRegion,
        window_sizes: &WindowSizeSettings,
    ) -> BumpHuntResult<Self> {
        if !background.same_binning(&observed) {
            return Err(BumpHuntError::BinningMismatch(format!(
                "background has {} bins, observed has {} bins with different edges",
                background.n_bins(),
                observed.n_bins()
            )));
        }

        let mut channel = Channel {
            background,
            observed,
            search_region,
            region: BinRange::new(1, 0),
            windows: Vec::new(),
            bump: None,
        };
        channel.update_search_pattern(window_sizes)?;
        Ok(channel)
    }

    pub fn background(&self) -> &BinnedSpectrum {
        &self.background
    }

    pub fn observed(&self) -> &BinnedSpectrum {
        &self.observed
    }

    pub fn search_region(&self) -> SearchRegion {
        self.search_region
    }

    /// The resolved search region in bins.
    pub fn region(&self) -> BinRange {
        self.region
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    /// Bump found by the last scan of the observed data.
    pub fn bump(&self) -> Option<Bump> {
        self.bump
    }

    /// Change the search region; the scan windows are rebuilt.
    pub fn set_search_region(
        &mut self,
        search_region: SearchRegion,
        window_sizes: &WindowSizeSettings,
    ) -> BumpHuntResult<()> {
        let previous = self.search_region;
        self.search_region = search_region;
        if let Err(e) = self.update_search_pattern(window_sizes) {
            self.search_region = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Resolve the search region and window sizes into the list of scan windows.
    pub fn update_search_pattern(&mut self, window_sizes: &WindowSizeSettings) -> BumpHuntResult<()> {
        let region = self.search_region.resolve(&self.background)?;
        let policy = window_sizes.resolve(&region)?;
        let windows = WindowPatternGenerator::new(region, policy).generate();
        if windows.is_empty() {
            return Err(BumpHuntError::NoWindows);
        }

        debug!(
            "search region bins [{}, {}], window sizes {}..={} step {}: {} windows",
            region.start_bin,
            region.stop_bin,
            policy.min_size,
            policy.max_size,
            policy.step_size,
            windows.len()
        );

        self.region = region;
        self.windows = windows;
        self.bump = None;
        Ok(())
    }

    /// Scan windows with their physical bounds.
    pub fn search_pattern(&self) -> Vec<PatternEntry> {
        describe_pattern(&self.background, &self.windows)
    }

    /// Scan the observed data and remember the bump.
    pub fn scan_observed(&mut self, evaluator: &TestStatisticEvaluator) -> BumpHuntResult<ScanOutcome> {
        let outcome = evaluator.evaluate_verbose(&self.observed, &self.background, &self.windows)?;
        let (low_edge, high_edge) = self.background.window_bounds(&outcome.best_window);
        self.bump = Some(Bump {
            window: outcome.best_window,
            low_edge,
            high_edge,
            p_value: outcome.best_p_value,
        });
        Ok(outcome)
    }

    /// Draw pseudo-data into `scratch` and scan it; the observed bump is left untouched.
    pub fn scan_pseudo<R: Rng + ?Sized>(
        &self,
        evaluator: &TestStatisticEvaluator,
        generator: &PseudoDataGenerator,
        scratch: &mut BinnedSpectrum,
        rng: &mut R,
    ) -> BumpHuntResult<ScanOutcome> {
        self.generate_pseudo(generator, scratch, rng)?;
        evaluator.evaluate(scratch, &self.background, &self.windows)
    }

    pub fn generate_pseudo<R: Rng + ?Sized>(
        &self,
        generator: &PseudoDataGenerator,
        scratch: &mut BinnedSpectrum,
        rng: &mut R,
    ) -> BumpHuntResult<()> {
        generator.sample_into(&self.background, &self.region, scratch, rng)
    }

    /// A zeroed spectrum suitable as pseudo-data scratch space for this channel.
    pub fn scratch(&self) -> BinnedSpectrum {
        BinnedSpectrum::zeroed_like(&self.background)
    }
}
