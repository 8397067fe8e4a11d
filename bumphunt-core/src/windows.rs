use log::debug;

use crate::models::{BinRange, BinnedSpectrum, Window, WindowSizePolicy};

///
/// Produces the ordered list of overlapping scan windows for a search region.
///
/// Windows are emitted scale by scale, starting at the minimum size. Within one
/// scale consecutive windows are shifted by half their width (at least one bin),
/// so neighbouring windows overlap by about half.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPatternGenerator {
    region: BinRange,
    policy: WindowSizePolicy,
}

impl WindowPatternGenerator {
    pub fn new(region: BinRange, policy: WindowSizePolicy) -> Self {
        WindowPatternGenerator { region, policy }
    }

    pub fn region(&self) -> BinRange {
        self.region
    }

    pub fn policy(&self) -> WindowSizePolicy {
        self.policy
    }

    /// All windows in scan order. An empty or inverted region yields no windows.
    pub fn generate(&self) -> Vec<Window> {
        let mut windows = Vec::new();
        if self.region.is_empty() || self.policy.min_size == 0 || self.policy.step_size == 0 {
            return windows;
        }

        let mut size = self.policy.min_size;
        while size <= self.policy.max_size {
            let emitted = windows.len();
            let shift = (size / 2).max(1);

            let mut first = self.region.start_bin;
            while first + size - 1 <= self.region.stop_bin {
                windows.push(Window::new(first, first + size - 1));
                first += shift;
            }

            if windows.len() == emitted {
                break;
            }
            size += self.policy.step_size;
        }

        windows
    }
}

/// A scan window together with its physical bounds on the spectrum axis.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PatternEntry {
    pub window: Window,
    pub low_edge: f64,
    pub high_edge: f64,
}

/// Attach physical bounds to each window and log the pattern at debug level.
pub fn describe_pattern(spectrum: &BinnedSpectrum, windows: &[Window]) -> Vec<PatternEntry> {
    windows
        .iter()
        .map(|window| {
            let (low_edge, high_edge) = spectrum.window_bounds(window);
            debug!("search window {window}: [{low_edge}, {high_edge}]");
            PatternEntry {
                window: *window,
                low_edge,
                high_edge,
            }
        })
        .collect()
}
