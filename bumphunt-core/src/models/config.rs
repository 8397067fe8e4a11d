use std::ffi::OsStr;
use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bin_models::BinModelKind;
use crate::consts::{DEFAULT_OVERLAP_FACTOR, DEFAULT_SEED};
use crate::errors::{BumpHuntError, BumpHuntResult};
use crate::evaluator::TestStatisticKind;
use crate::models::{SearchRegion, WindowSizeSettings};

#[derive(Debug)]
pub enum HuntConfigFileType {
    Toml,
    Yaml,
}

impl HuntConfigFileType {
    pub fn from_path(path: &Path) -> BumpHuntResult<Self> {
        match path.extension().and_then(OsStr::to_str) {
            Some("toml") => Ok(HuntConfigFileType::Toml),
            Some("yaml") | Some("yml") => Ok(HuntConfigFileType::Yaml),
            other => Err(BumpHuntError::UnsupportedConfigFile(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

///
/// Settings of a bump hunt. Every field has a default, so a config file only
/// needs to list what it changes.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntConfig {
    /// Label used in log lines and output file names.
    pub name: String,
    pub bin_model: BinModelKind,
    pub test_statistic: TestStatisticKind,
    /// Number of pseudo-experiments, `0` picks a count from the local p-value.
    pub n_pseudo_experiments: u64,
    /// Search region applied to channels when they are added.
    pub search_region: SearchRegion,
    pub min_window_size: Option<usize>,
    pub max_window_size: Option<usize>,
    pub window_step_size: Option<usize>,
    /// Fraction of every channel's bump that must lie in the common window.
    pub overlap_factor: f64,
    /// Master seed of the pseudo-experiment random streams.
    pub seed: u64,
    /// Worker threads for the calibration, `None` lets rayon decide.
    pub threads: Option<usize>,
    /// Show a progress bar during the calibration.
    pub progress: bool,
}

impl Default for HuntConfig {
    fn default() -> Self {
        HuntConfig {
            name: "bumphunt".to_string(),
            bin_model: BinModelKind::default(),
            test_statistic: TestStatisticKind::default(),
            n_pseudo_experiments: 0,
            search_region: SearchRegion::Auto,
            min_window_size: None,
            max_window_size: None,
            window_step_size: None,
            overlap_factor: DEFAULT_OVERLAP_FACTOR,
            seed: DEFAULT_SEED,
            threads: None,
            progress: false,
        }
    }
}

impl HuntConfig {
    pub fn window_sizes(&self) -> WindowSizeSettings {
        WindowSizeSettings {
            min_size: self.min_window_size,
            max_size: self.max_window_size,
            step_size: self.window_step_size,
        }
    }

    /// Reject settings that can never produce a scan.
    pub fn validate(&self) -> BumpHuntResult<()> {
        if !(self.overlap_factor > 0.0 && self.overlap_factor <= 1.0) {
            return Err(BumpHuntError::InvalidConfig(format!(
                "overlap factor must lie in (0, 1], got {}",
                self.overlap_factor
            )));
        }
        if let (Some(min), Some(max)) = (self.min_window_size, self.max_window_size) {
            if min > max {
                return Err(BumpHuntError::InvalidWindowPolicy(format!(
                    "minimum window size {min} exceeds maximum window size {max}"
                )));
            }
        }
        if self.min_window_size == Some(0) {
            return Err(BumpHuntError::InvalidWindowPolicy(
                "minimum window size must be at least one bin".to_string(),
            ));
        }
        if self.window_step_size == Some(0) {
            return Err(BumpHuntError::InvalidWindowPolicy(
                "window step size must be at least one bin".to_string(),
            ));
        }
        Ok(())
    }
}

impl TryFrom<&Path> for HuntConfig {
    type Error = BumpHuntError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let raw = read_to_string(path)?;
        let config: HuntConfig = match HuntConfigFileType::from_path(path)? {
            HuntConfigFileType::Toml => toml::from_str(&raw)?,
            HuntConfigFileType::Yaml => serde_yaml::from_str(&raw)?,
        };
        config.validate()?;
        Ok(config)
    }
}
