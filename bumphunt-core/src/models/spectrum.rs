use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{BumpHuntError, BumpHuntResult};
use crate::models::Window;

///
/// A one dimensional binned spectrum: bin contents, their uncertainties and the bin edges.
///
/// Bins are numbered from 1 to `n_bins` (inclusive), so bin `i` spans
/// `[edges[i - 1], edges[i])`. Contents and errors are validated to be finite and
/// non-negative when the spectrum is built.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpectrum")]
pub struct BinnedSpectrum {
    edges: Vec<f64>,
    contents: Vec<f64>,
    errors: Vec<f64>,
}

/// On-disk representation, errors default to `sqrt(content)`.
#[derive(Deserialize)]
struct RawSpectrum {
    edges: Vec<f64>,
    contents: Vec<f64>,
    #[serde(default)]
    errors: Option<Vec<f64>>,
}

impl TryFrom<RawSpectrum> for BinnedSpectrum {
    type Error = BumpHuntError;

    fn try_from(raw: RawSpectrum) -> Result<Self, Self::Error> {
        match raw.errors {
            Some(errors) => BinnedSpectrum::new(raw.edges, raw.contents, errors),
            None => BinnedSpectrum::with_poisson_errors(raw.edges, raw.contents),
        }
    }
}

impl TryFrom<&Path> for BinnedSpectrum {
    type Error = BumpHuntError;

    ///
    /// Read a spectrum from a JSON file of the form
    /// `{ "edges": [...], "contents": [...], "errors": [...] }`.
    ///
    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let json = read_to_string(path)?;
        let spectrum = serde_json::from_str(&json)?;
        Ok(spectrum)
    }
}

impl TryFrom<&str> for BinnedSpectrum {
    type Error = BumpHuntError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        BinnedSpectrum::try_from(Path::new(value))
    }
}

impl BinnedSpectrum {
    ///
    /// Build a spectrum from explicit edges, contents and errors.
    ///
    /// # Arguments
    /// * `edges` - `n_bins + 1` strictly increasing bin edges
    /// * `contents` - `n_bins` non-negative bin contents
    /// * `errors` - `n_bins` non-negative bin uncertainties
    ///
    pub fn new(edges: Vec<f64>, contents: Vec<f64>, errors: Vec<f64>) -> BumpHuntResult<Self> {
        if contents.is_empty() {
            return Err(BumpHuntError::EmptySpectrum);
        }
        if edges.len() != contents.len() + 1 {
            return Err(BumpHuntError::MalformedSpectrum(format!(
                "expected {} edges for {} bins, got {}",
                contents.len() + 1,
                contents.len(),
                edges.len()
            )));
        }
        if errors.len() != contents.len() {
            return Err(BumpHuntError::MalformedSpectrum(format!(
                "expected {} errors, got {}",
                contents.len(),
                errors.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(BumpHuntError::MalformedSpectrum(
                "bin edges must be finite".to_string(),
            ));
        }
        if let Some(pair) = edges.windows(2).find(|pair| pair[1] <= pair[0]) {
            return Err(BumpHuntError::MalformedSpectrum(format!(
                "bin edges must be strictly increasing ({} followed by {})",
                pair[0], pair[1]
            )));
        }
        if let Some((i, c)) = contents
            .iter()
            .enumerate()
            .find(|(_, c)| !c.is_finite() || **c < 0.0)
        {
            return Err(BumpHuntError::MalformedSpectrum(format!(
                "content of bin {} is {}, expected a finite non-negative value",
                i + 1,
                c
            )));
        }
        if let Some((i, e)) = errors
            .iter()
            .enumerate()
            .find(|(_, e)| !e.is_finite() || **e < 0.0)
        {
            return Err(BumpHuntError::MalformedSpectrum(format!(
                "error of bin {} is {}, expected a finite non-negative value",
                i + 1,
                e
            )));
        }

        Ok(BinnedSpectrum {
            edges,
            contents,
            errors,
        })
    }

    /// Build a spectrum whose errors are the Poisson `sqrt(content)`.
    pub fn with_poisson_errors(edges: Vec<f64>, contents: Vec<f64>) -> BumpHuntResult<Self> {
        let errors = contents.iter().map(|c| c.max(0.0).sqrt()).collect();
        BinnedSpectrum::new(edges, contents, errors)
    }

    /// Build a spectrum with `contents.len()` equal-width bins on `[low, high]`.
    pub fn uniform(
        low: f64,
        high: f64,
        contents: Vec<f64>,
        errors: Vec<f64>,
    ) -> BumpHuntResult<Self> {
        let n_bins = contents.len();
        let width = (high - low) / n_bins.max(1) as f64;
        let edges = (0..=n_bins).map(|i| low + width * i as f64).collect();
        BinnedSpectrum::new(edges, contents, errors)
    }

    /// A spectrum with the same binning as `other` and every bin zeroed.
    pub fn zeroed_like(other: &BinnedSpectrum) -> Self {
        BinnedSpectrum {
            edges: other.edges.clone(),
            contents: vec![0.0; other.n_bins()],
            errors: vec![0.0; other.n_bins()],
        }
    }

    pub fn n_bins(&self) -> usize {
        self.contents.len()
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    /// Content of the 1-based `bin`.
    pub fn content(&self, bin: usize) -> f64 {
        self.contents[bin - 1]
    }

    /// Error of the 1-based `bin`.
    pub fn error(&self, bin: usize) -> f64 {
        self.errors[bin - 1]
    }

    pub fn low_edge(&self, bin: usize) -> f64 {
        self.edges[bin - 1]
    }

    pub fn high_edge(&self, bin: usize) -> f64 {
        self.edges[bin]
    }

    /// Lowest and highest edge of the whole spectrum.
    pub fn range(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }

    /// A bin with neither content nor error carries no information.
    pub fn is_empty_bin(&self, bin: usize) -> bool {
        self.content(bin) == 0.0 && self.error(bin) == 0.0
    }

    ///
    /// Find the 1-based bin containing `x`, i.e. `low_edge(bin) <= x < high_edge(bin)`.
    ///
    /// Returns `None` for values outside the spectrum range.
    ///
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        let (low, high) = self.range();
        if !(low..high).contains(&x) {
            return None;
        }
        // first edge strictly above x is the high edge of the containing bin
        let idx = self.edges.partition_point(|e| *e <= x);
        Some(idx)
    }

    /// Physical bounds `[low_edge(first), high_edge(last)]` of a window.
    pub fn window_bounds(&self, window: &Window) -> (f64, f64) {
        (self.low_edge(window.first), self.high_edge(window.last))
    }

    /// Sum of contents over the window.
    pub fn integral(&self, window: &Window) -> f64 {
        self.contents[window.first - 1..window.last].iter().sum()
    }

    /// Sum of contents and the quadrature sum of errors over the window.
    pub fn integral_and_error(&self, window: &Window) -> (f64, f64) {
        let range = window.first - 1..window.last;
        let sum = self.contents[range.clone()].iter().sum();
        let err2: f64 = self.errors[range].iter().map(|e| e * e).sum();
        (sum, err2.sqrt())
    }

    /// Sum of contents and the linear sum of errors over the window (fully correlated errors).
    pub fn integral_and_linear_error(&self, window: &Window) -> (f64, f64) {
        let range = window.first - 1..window.last;
        let sum = self.contents[range.clone()].iter().sum();
        let err = self.errors[range].iter().sum();
        (sum, err)
    }

    /// Whether both spectra have identical bin edges.
    pub fn same_binning(&self, other: &BinnedSpectrum) -> bool {
        self.edges == other.edges
    }

    /// Overwrite a bin; only the pseudo-data generator writes into spectra.
    pub(crate) fn set_bin(&mut self, bin: usize, content: f64, error: f64) {
        self.contents[bin - 1] = content;
        self.errors[bin - 1] = error;
    }

    pub(crate) fn reset(&mut self) {
        self.contents.iter_mut().for_each(|c| *c = 0.0);
        self.errors.iter_mut().for_each(|e| *e = 0.0);
    }
}
