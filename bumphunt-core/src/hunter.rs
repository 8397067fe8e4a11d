use log::info;

use crate::bin_models::BinModelKind;
use crate::calibration::{CalibrationResult, Calibrator};
use crate::channel::Channel;
use crate::combiner::ChannelCombiner;
use crate::errors::{BumpHuntError, BumpHuntResult};
use crate::evaluator::{ScanOutcome, TestStatisticEvaluator, TestStatisticKind};
use crate::models::{BinnedSpectrum, HuntConfig, SearchRegion};
use crate::windows::PatternEntry;

///
/// Entry point of a bump hunt: holds the settings and the channels to search.
///
/// Settings that affect the scan windows are applied to the *current* channel, which
/// is the most recently added one unless selected with [BumpHunter::select_channel].
///
/// # Example
/// ```
/// use bumphunt_core::{BinModelKind, BinnedSpectrum, BumpHunter, HuntConfig};
///
/// let edges = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
/// let background = BinnedSpectrum::new(edges.clone(), vec![100.0; 5], vec![10.0; 5]).unwrap();
/// let observed = BinnedSpectrum::with_poisson_errors(edges, vec![100.0, 100.0, 180.0, 100.0, 100.0]).unwrap();
///
/// let mut hunter = BumpHunter::new(HuntConfig {
///     bin_model: BinModelKind::Poisson,
///     min_window_size: Some(1),
///     max_window_size: Some(1),
///     n_pseudo_experiments: 100,
///     ..Default::default()
/// })
/// .unwrap();
/// hunter.add_channel(background, observed).unwrap();
///
/// let result = hunter.run().unwrap();
/// assert_eq!(result.bumps[0].window.first, 3);
/// ```
///
#[derive(Debug, Clone)]
pub struct BumpHunter {
    config: HuntConfig,
    channels: Vec<Channel>,
    current: usize,
}

impl BumpHunter {
    pub fn new(config: HuntConfig) -> BumpHuntResult<Self> {
        config.validate()?;
        Ok(BumpHunter {
            config,
            channels: Vec::new(),
            current: 0,
        })
    }

    pub fn config(&self) -> &HuntConfig {
        &self.config
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn current_channel(&self) -> BumpHuntResult<&Channel> {
        self.channels.get(self.current).ok_or(BumpHuntError::NoChannels)
    }

    fn current_channel_mut(&mut self) -> BumpHuntResult<&mut Channel> {
        self.channels.get_mut(self.current).ok_or(BumpHuntError::NoChannels)
    }

    /// Add a channel with the configured search region and make it current. Returns its index.
    pub fn add_channel(&mut self, background: BinnedSpectrum, observed: BinnedSpectrum) -> BumpHuntResult<usize> {
        let channel = Channel::new(
            background,
            observed,
            self.config.search_region,
            &self.config.window_sizes(),
        )?;
        self.channels.push(channel);
        self.current = self.channels.len() - 1;
        info!(
            "[{}] added channel {} with {} search windows",
            self.config.name,
            self.current,
            self.channels[self.current].windows().len()
        );
        Ok(self.current)
    }

    pub fn select_channel(&mut self, index: usize) -> BumpHuntResult<()> {
        if index >= self.channels.len() {
            return Err(BumpHuntError::ChannelOutOfRange(index, self.channels.len()));
        }
        self.current = index;
        Ok(())
    }

    /// Restrict the current channel to a search region.
    pub fn set_search_region(&mut self, region: impl Into<SearchRegion>) -> BumpHuntResult<()> {
        let sizes = self.config.window_sizes();
        self.current_channel_mut()?
            .set_search_region(region.into(), &sizes)
    }

    /// Change the window sizes and rebuild the scan windows of every channel.
    pub fn set_window_sizes(
        &mut self,
        min_size: Option<usize>,
        max_size: Option<usize>,
        step_size: Option<usize>,
    ) -> BumpHuntResult<()> {
        let mut config = self.config.clone();
        config.min_window_size = min_size;
        config.max_window_size = max_size;
        config.window_step_size = step_size;
        config.validate()?;

        let sizes = config.window_sizes();
        let mut channels = self.channels.clone();
        for channel in channels.iter_mut() {
            channel.update_search_pattern(&sizes)?;
        }

        self.config = config;
        self.channels = channels;
        Ok(())
    }

    pub fn set_bin_model(&mut self, bin_model: BinModelKind) {
        self.config.bin_model = bin_model;
    }

    pub fn set_test_statistic(&mut self, test_statistic: TestStatisticKind) {
        self.config.test_statistic = test_statistic;
    }

    pub fn set_n_pseudo_experiments(&mut self, n: u64) {
        self.config.n_pseudo_experiments = n;
    }

    pub fn set_overlap_factor(&mut self, overlap_factor: f64) -> BumpHuntResult<()> {
        ChannelCombiner::new(overlap_factor)?;
        self.config.overlap_factor = overlap_factor;
        Ok(())
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.config.seed = seed;
    }

    /// Scan windows of the current channel.
    pub fn search_pattern(&self) -> BumpHuntResult<Vec<PatternEntry>> {
        Ok(self.current_channel()?.search_pattern())
    }

    fn evaluator(&self) -> TestStatisticEvaluator {
        TestStatisticEvaluator::new(self.config.bin_model, self.config.test_statistic)
    }

    /// Scan the observed data of the current channel without calibrating.
    pub fn scan(&mut self) -> BumpHuntResult<ScanOutcome> {
        let evaluator = self.evaluator();
        self.current_channel_mut()?.scan_observed(&evaluator)
    }

    /// Scan every channel and calibrate the combined statistic with pseudo-experiments.
    pub fn run(&mut self) -> BumpHuntResult<CalibrationResult> {
        let calibrator = Calibrator::new(
            self.config.name.clone(),
            self.evaluator(),
            ChannelCombiner::new(self.config.overlap_factor)?,
            self.config.seed,
        )
        .with_threads(self.config.threads)
        .with_progress(self.config.progress);

        calibrator.run(&mut self.channels, self.config.n_pseudo_experiments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use crate::models::{BinRange, Window};

    #[fixture]
    fn background() -> BinnedSpectrum {
        BinnedSpectrum::uniform(0.0, 100.0, vec![50.0; 10], vec![5.0; 10]).unwrap()
    }

    #[rstest]
    fn test_add_channel_uses_configured_region(background: BinnedSpectrum) {
        let mut hunter = BumpHunter::new(HuntConfig {
            search_region: SearchRegion::from((20.0, 70.0)),
            ..Default::default()
        })
        .unwrap();
        let index = hunter.add_channel(background.clone(), background).unwrap();
        assert_eq!(index, 0);
        assert_eq!(hunter.current_channel().unwrap().region(), BinRange::new(3, 7));
    }

    #[rstest]
    fn test_set_window_sizes_rebuilds_patterns(background: BinnedSpectrum) {
        let mut hunter = BumpHunter::new(HuntConfig::default()).unwrap();
        hunter.add_channel(background.clone(), background.clone()).unwrap();
        hunter.add_channel(background.clone(), background).unwrap();

        hunter.set_window_sizes(Some(2), Some(2), None).unwrap();
        for channel in hunter.channels() {
            assert!(channel.windows().iter().all(|w| w.width() == 2));
        }

        assert!(hunter.set_window_sizes(Some(3), Some(2), None).is_err());
        assert_eq!(hunter.config().min_window_size, Some(2));
    }

    #[rstest]
    fn test_select_channel(background: BinnedSpectrum) {
        let mut hunter = BumpHunter::new(HuntConfig::default()).unwrap();
        hunter.add_channel(background.clone(), background.clone()).unwrap();
        hunter.add_channel(background.clone(), background).unwrap();

        hunter.select_channel(0).unwrap();
        hunter.set_search_region((0.0, 30.0)).unwrap();
        assert_eq!(hunter.channels()[0].region(), BinRange::new(1, 3));
        assert_eq!(hunter.channels()[1].region(), BinRange::new(1, 10));

        assert!(matches!(
            hunter.select_channel(2),
            Err(BumpHuntError::ChannelOutOfRange(2, 2))
        ));
    }

    #[rstest]
    fn test_scan_without_channels() {
        let mut hunter = BumpHunter::new(HuntConfig::default()).unwrap();
        assert!(matches!(hunter.scan(), Err(BumpHuntError::NoChannels)));
        assert!(matches!(hunter.run(), Err(BumpHuntError::NoChannels)));
    }

    #[rstest]
    fn test_scan_current_channel(background: BinnedSpectrum) {
        let mut observed = background.contents().to_vec();
        observed[6] = 90.0;
        let observed = BinnedSpectrum::with_poisson_errors(background.edges().to_vec(), observed).unwrap();

        let mut hunter = BumpHunter::new(HuntConfig {
            bin_model: BinModelKind::Poisson,
            max_window_size: Some(1),
            ..Default::default()
        })
        .unwrap();
        hunter.add_channel(background, observed).unwrap();

        let outcome = hunter.scan().unwrap();
        assert_eq!(outcome.best_window, Window::new(7, 7));
        assert_eq!(hunter.search_pattern().unwrap().len(), 10);
    }

    #[rstest]
    fn test_invalid_overlap_factor_is_rejected() {
        let mut hunter = BumpHunter::new(HuntConfig::default()).unwrap();
        assert!(hunter.set_overlap_factor(0.0).is_err());
        assert_eq!(hunter.config().overlap_factor, 1.0);
    }
}
