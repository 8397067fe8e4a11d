//! # bumphunt-core
//!
//! The BumpHunter search for localized excesses (or deficits) in a binned spectrum,
//! and the Monte-Carlo calibration of its global significance.
//!
//! ## How a hunt works
//!
//! - The search region of each channel is covered by overlapping windows at several
//!   scales ([windows::WindowPatternGenerator]).
//! - Every window gets a one-sided p-value from a bin model ([BinModelKind]), and the
//!   smallest one becomes the test statistic `-ln(p_min)` ([evaluator::TestStatisticEvaluator]).
//! - Pseudo-data drawn from the background ([pseudo::PseudoDataGenerator]) is scanned
//!   the same way to build the null distribution of the statistic; the fraction of
//!   pseudo-experiments above the observed statistic is the global p-value
//!   ([calibration::Calibrator]).
//! - Several channels combine into one statistic as long as their bumps overlap
//!   ([combiner::ChannelCombiner]).
//!
//! ## Example
//!
//! ```rust
//! use bumphunt_core::{BinModelKind, BinnedSpectrum, BumpHunter, HuntConfig};
//!
//! let edges = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
//! let background = BinnedSpectrum::new(edges.clone(), vec![100.0; 5], vec![10.0; 5]).unwrap();
//! let observed = BinnedSpectrum::with_poisson_errors(edges, vec![100.0; 5]).unwrap();
//!
//! let mut hunter = BumpHunter::new(HuntConfig {
//!     bin_model: BinModelKind::Poisson,
//!     ..Default::default()
//! })
//! .unwrap();
//! hunter.add_channel(background, observed).unwrap();
//!
//! let outcome = hunter.scan().unwrap();
//! assert_eq!(outcome.statistic, 0.0);
//! ```
//!
pub mod bin_models;
pub mod calibration;
pub mod channel;
pub mod combiner;
pub mod consts;
pub mod errors;
pub mod evaluator;
pub mod hunter;
pub mod models;
pub mod pseudo;
pub mod windows;

pub use bin_models::{BinModelKind, Significance, z_value};
pub use calibration::{BumpReport, CalibrationResult, Calibrator, TrialRecord};
pub use channel::{Bump, Channel};
pub use combiner::ChannelCombiner;
pub use errors::{BumpHuntError, BumpHuntResult, ErrorCategory};
pub use evaluator::{ScanOutcome, TestStatisticEvaluator, TestStatisticKind};
pub use hunter::BumpHunter;
pub use models::{BinnedSpectrum, HuntConfig, SearchRegion, Window};
pub use pseudo::PseudoDataGenerator;
pub use windows::{PatternEntry, WindowPatternGenerator};
