//! Monte-Carlo calibration of the BumpHunter test statistic.
//!
//! The observed data is scanned once to fix the bumps and the local p-value; pseudo-data
//! drawn from the background is then scanned many times to build the null
//! distribution of the statistic, which turns the local p-value into a global one
//! (the look-elsewhere correction).
//!
//! The trial loop is cut into shards of `n / 1000 + 1` trials. Shard `k` draws from
//! its own `StdRng` seeded with `seed + k`, so results only depend on the seed and
//! never on the number of worker threads.

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::{Beta, ContinuousCDF};

use crate::bin_models::{Significance, z_value};
use crate::channel::{Bump, Channel};
use crate::combiner::ChannelCombiner;
use crate::consts::{
    AUTO_PSEUDO_CAP_P_VALUE, CAPPED_AUTO_PSEUDO_EXPERIMENTS, MIN_AUTO_PSEUDO_EXPERIMENTS,
    NULL_DISTRIBUTION_BINS, NULL_DISTRIBUTION_RANGE, TRACE_CONFIDENCE_LEVEL, TRACE_POINTS,
};
use crate::errors::{BumpHuntError, BumpHuntResult};
use crate::evaluator::TestStatisticEvaluator;
use crate::models::{BinnedSpectrum, Window};
use crate::pseudo::PseudoDataGenerator;

/// One point of the convergence trace of the global p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialRecord {
    /// Pseudo-experiments run so far.
    pub trials: u64,
    /// Running global p-value.
    pub p_value: f64,
    pub low_error: f64,
    pub high_error: f64,
}

/// Bump of one channel in the observed data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BumpReport {
    pub channel: usize,
    pub window: Window,
    pub low_edge: f64,
    pub high_edge: f64,
    pub local_p_value: f64,
    pub local_significance: Significance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationResult {
    pub name: String,
    pub observed_statistic: f64,
    /// Combined local p-value, `exp(-observed_statistic)`.
    pub local_p_value: f64,
    pub local_significance: Significance,
    pub global_p_value: f64,
    /// Set when no pseudo-experiment exceeded the observed statistic; `global_p_value`
    /// is then `1 / n_pseudo_experiments` and only an upper bound.
    pub global_p_is_upper_bound: bool,
    pub global_significance: Significance,
    pub n_pseudo_experiments: u64,
    /// Pseudo-experiments whose statistic exceeded the observed one.
    pub n_greater: u64,
    pub bumps: Vec<BumpReport>,
    /// Whether the channel bumps passed the overlap requirement.
    pub channels_agree: bool,
    pub trials_history: Vec<TrialRecord>,
    /// Histogram of the pseudo-experiment statistics.
    pub null_distribution: BinnedSpectrum,
    /// Pseudo-experiment statistics beyond the histogram range.
    pub null_overflow: u64,
}

/// Counters of one shard of pseudo-experiments.
struct ShardTally {
    trials: u64,
    greater: u64,
    /// 1-based trial of the shard that first exceeded the observed statistic.
    first_greater: Option<u64>,
    counts: Vec<u64>,
    overflow: u64,
}

///
/// Runs the observed scan and the pseudo-experiments of a bump hunt.
///
#[derive(Debug, Clone)]
pub struct Calibrator {
    name: String,
    evaluator: TestStatisticEvaluator,
    generator: PseudoDataGenerator,
    combiner: ChannelCombiner,
    seed: u64,
    threads: Option<usize>,
    progress: bool,
}

impl Calibrator {
    pub fn new(
        name: impl Into<String>,
        evaluator: TestStatisticEvaluator,
        combiner: ChannelCombiner,
        seed: u64,
    ) -> Self {
        Calibrator {
            name: name.into(),
            generator: PseudoDataGenerator::new(evaluator.model()),
            evaluator,
            combiner,
            seed,
            threads: None,
            progress: false,
        }
    }

    /// Worker threads; `None` uses the rayon default.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    ///
    /// Number of pseudo-experiments to run.
    ///
    /// A non-zero `requested` count is used as is. Otherwise the count follows the local
    /// p-value, `max(1000, ceil(1 / local_p))`, and `1_000_000` for `local_p < 1e-7`.
    ///
    pub fn pseudo_experiment_count(requested: u64, local_p: f64) -> u64 {
        if requested > 0 {
            return requested;
        }
        if local_p < AUTO_PSEUDO_CAP_P_VALUE {
            return CAPPED_AUTO_PSEUDO_EXPERIMENTS;
        }
        ((1.0 / local_p).ceil() as u64).max(MIN_AUTO_PSEUDO_EXPERIMENTS)
    }

    ///
    /// Scan the observed data of every channel and calibrate the combined statistic.
    ///
    /// # Arguments
    /// * `channels` - channels to hunt in; their observed bumps are updated
    /// * `requested` - number of pseudo-experiments, `0` to derive it from the local p-value
    ///
    pub fn run(&self, channels: &mut [Channel], requested: u64) -> BumpHuntResult<CalibrationResult> {
        if channels.is_empty() {
            return Err(BumpHuntError::NoChannels);
        }

        let mut bumps = Vec::with_capacity(channels.len());
        for channel in channels.iter_mut() {
            channel.scan_observed(&self.evaluator)?;
            let bump = channel.bump().ok_or(BumpHuntError::NoWindows)?;
            bumps.push(bump);
        }

        let reports = self.bump_reports(&bumps);
        let channels_agree = self.combiner.agree(&bumps);
        if !channels_agree {
            warn!(
                "[{}] channel bumps do not overlap by {}, combined statistic is 0",
                self.name,
                self.combiner.overlap_factor()
            );
        }

        let observed_statistic = self.combiner.combine(&bumps);
        let local_p_value = (-observed_statistic).exp();
        let local_significance = z_value(local_p_value);
        info!(
            "[{}] observed statistic {observed_statistic:.4}, local p-value {local_p_value:e} ({local_significance})",
            self.name
        );

        let n = Self::pseudo_experiment_count(requested, local_p_value);
        info!("[{}] running {n} pseudo-experiments", self.name);

        let channels: &[Channel] = channels;
        let hist_high = if observed_statistic > 0.0 {
            NULL_DISTRIBUTION_RANGE * observed_statistic
        } else {
            1.0
        };
        let tallies = self.run_shards(channels, n, observed_statistic, hist_high)?;

        let mut trials = 0;
        let mut greater = 0;
        let mut counts = vec![0u64; NULL_DISTRIBUTION_BINS];
        let mut null_overflow = 0;
        let mut trials_history = Vec::with_capacity(tallies.len());
        for tally in &tallies {
            // extra trace point when the very first exceeding trial lands inside a shard
            if let Some(first) = tally.first_greater.filter(|f| greater == 0 && *f < tally.trials) {
                trials_history.push(trace_record(trials + first, 1)?);
            }
            trials += tally.trials;
            greater += tally.greater;
            null_overflow += tally.overflow;
            counts
                .iter_mut()
                .zip(&tally.counts)
                .for_each(|(total, c)| *total += c);
            trials_history.push(trace_record(trials, greater)?);
        }

        let (global_p_value, global_p_is_upper_bound) = if greater == 0 {
            warn!(
                "[{}] no pseudo-experiment exceeded the observed statistic, global p-value < {:e}",
                self.name,
                1.0 / n as f64
            );
            (1.0 / n as f64, true)
        } else {
            (greater as f64 / n as f64, false)
        };
        let global_significance = z_value(global_p_value);
        info!(
            "[{}] global p-value {}{global_p_value:e} ({global_significance})",
            self.name,
            if global_p_is_upper_bound { "< " } else { "" }
        );

        let null_distribution = BinnedSpectrum::uniform(
            0.0,
            hist_high,
            counts.iter().map(|c| *c as f64).collect(),
            counts.iter().map(|c| (*c as f64).sqrt()).collect(),
        )?;

        Ok(CalibrationResult {
            name: self.name.clone(),
            observed_statistic,
            local_p_value,
            local_significance,
            global_p_value,
            global_p_is_upper_bound,
            global_significance,
            n_pseudo_experiments: n,
            n_greater: greater,
            bumps: reports,
            channels_agree,
            trials_history,
            null_distribution,
            null_overflow,
        })
    }

    fn bump_reports(&self, bumps: &[Bump]) -> Vec<BumpReport> {
        bumps
            .iter()
            .enumerate()
            .map(|(channel, bump)| {
                let report = BumpReport {
                    channel,
                    window: bump.window,
                    low_edge: bump.low_edge,
                    high_edge: bump.high_edge,
                    local_p_value: bump.p_value,
                    local_significance: z_value(bump.p_value),
                };
                info!(
                    "[{}] channel {channel}: bump in bins {} = [{}, {}], local p-value {:e} ({})",
                    self.name,
                    report.window,
                    report.low_edge,
                    report.high_edge,
                    report.local_p_value,
                    report.local_significance
                );
                report
            })
            .collect()
    }

    fn run_shards(
        &self,
        channels: &[Channel],
        n: u64,
        observed_statistic: f64,
        hist_high: f64,
    ) -> BumpHuntResult<Vec<ShardTally>> {
        let shard_size = n / TRACE_POINTS + 1;
        let n_shards = n.div_ceil(shard_size);
        debug!("{n_shards} shards of up to {shard_size} pseudo-experiments");

        let bar = if self.progress {
            ProgressBar::new(n)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.set_message(self.name.clone());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads.unwrap_or(0))
            .build()?;

        let tallies = pool.install(|| {
            (0..n_shards as usize)
                .into_par_iter()
                .map(|shard| {
                    let shard = shard as u64;
                    let trials = shard_size.min(n - shard * shard_size);
                    let tally =
                        self.run_shard(channels, shard, trials, observed_statistic, hist_high)?;
                    bar.inc(trials);
                    Ok(tally)
                })
                .collect::<BumpHuntResult<Vec<ShardTally>>>()
        })?;

        bar.finish_and_clear();
        Ok(tallies)
    }

    fn run_shard(
        &self,
        channels: &[Channel],
        shard: u64,
        trials: u64,
        observed_statistic: f64,
        hist_high: f64,
    ) -> BumpHuntResult<ShardTally> {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(shard));
        let mut scratch: Vec<BinnedSpectrum> = channels.iter().map(Channel::scratch).collect();
        let mut bumps = Vec::with_capacity(channels.len());

        let bin_width = hist_high / NULL_DISTRIBUTION_BINS as f64;
        let mut tally = ShardTally {
            trials,
            greater: 0,
            first_greater: None,
            counts: vec![0; NULL_DISTRIBUTION_BINS],
            overflow: 0,
        };

        for trial in 1..=trials {
            bumps.clear();
            for (channel, scratch) in channels.iter().zip(scratch.iter_mut()) {
                let outcome =
                    channel.scan_pseudo(&self.evaluator, &self.generator, scratch, &mut rng)?;
                let (low_edge, high_edge) = channel.background().window_bounds(&outcome.best_window);
                bumps.push(Bump {
                    window: outcome.best_window,
                    low_edge,
                    high_edge,
                    p_value: outcome.best_p_value,
                });
            }

            let statistic = self.combiner.combine(&bumps);
            if statistic > observed_statistic {
                tally.greater += 1;
                tally.first_greater = tally.first_greater.or(Some(trial));
            }
            if statistic >= hist_high {
                tally.overflow += 1;
            } else {
                let bin = ((statistic / bin_width) as usize).min(NULL_DISTRIBUTION_BINS - 1);
                tally.counts[bin] += 1;
            }
        }

        Ok(tally)
    }
}

///
/// Trace point after `trials` pseudo-experiments of which `greater` exceeded the
/// observed statistic, with the central 68.3% interval of `Beta(greater + 1, trials - greater + 1)`.
///
pub fn trace_record(trials: u64, greater: u64) -> BumpHuntResult<TrialRecord> {
    let p_value = if trials > 0 {
        greater as f64 / trials as f64
    } else {
        0.0
    };
    let posterior = Beta::new((greater + 1) as f64, (trials - greater + 1) as f64)
        .map_err(|e| BumpHuntError::Sampling(e.to_string()))?;
    let tail = (1.0 - TRACE_CONFIDENCE_LEVEL) / 2.0;
    let low = posterior.inverse_cdf(tail);
    let high = posterior.inverse_cdf(1.0 - tail);

    Ok(TrialRecord {
        trials,
        p_value,
        low_error: (p_value - low).max(0.0),
        high_error: (high - p_value).max(0.0),
    })
}
