use rand::prelude::*;
use rand_distr::{Gamma, Normal, Poisson};
use statrs::distribution::{ContinuousCDF, Gamma as GammaDist, Normal as NormalDist};

use crate::bin_models::BinModelKind;
use crate::consts::GAMMA_QUANTILE_NORMAL_SHAPE;
use crate::errors::{BumpHuntError, BumpHuntResult};
use crate::models::{BinRange, BinnedSpectrum};

///
/// Draws pseudo-data spectra from a background under the generative assumption of a
/// bin model.
///
/// Only bins inside the search region are filled; everything else stays zero.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PseudoDataGenerator {
    model: BinModelKind,
}

impl PseudoDataGenerator {
    pub fn new(model: BinModelKind) -> Self {
        PseudoDataGenerator { model }
    }

    pub fn model(&self) -> BinModelKind {
        self.model
    }

    /// Draw a fresh pseudo-data spectrum with the binning of `background`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        background: &BinnedSpectrum,
        region: &BinRange,
        rng: &mut R,
    ) -> BumpHuntResult<BinnedSpectrum> {
        let mut target = BinnedSpectrum::zeroed_like(background);
        self.sample_into(background, region, &mut target, rng)?;
        Ok(target)
    }

    ///
    /// Overwrite `target` with a pseudo-data draw.
    ///
    /// # Arguments
    /// * `background` - expected contents and errors
    /// * `region` - bins to fill
    /// * `target` - scratch spectrum with the binning of `background`
    /// * `rng` - random stream, owned by the caller
    ///
    pub fn sample_into<R: Rng + ?Sized>(
        &self,
        background: &BinnedSpectrum,
        region: &BinRange,
        target: &mut BinnedSpectrum,
        rng: &mut R,
    ) -> BumpHuntResult<()> {
        if !target.same_binning(background) {
            return Err(BumpHuntError::BinningMismatch(
                "pseudo-data target and background differ in binning".to_string(),
            ));
        }
        target.reset();

        // one quantile shared by all bins of this pseudo-experiment
        let quantile = match self.model {
            BinModelKind::PoissonConvolvedGammaCorrelated => rng.r#gen::<f64>(),
            _ => 0.0,
        };

        for bin in region.bins().filter(|b| *b <= background.n_bins()) {
            let mean = background.content(bin);
            let err = background.error(bin);
            if mean == 0.0 && err == 0.0 {
                continue;
            }

            let content = match self.model {
                BinModelKind::Poisson => sample_poisson(mean, rng)?,
                BinModelKind::Gaussian => sample_normal(mean, err, rng)?,
                BinModelKind::PoissonConvolvedGamma => {
                    let smeared = sample_gamma_mean(mean, err, rng)?;
                    sample_poisson(smeared, rng)?
                }
                BinModelKind::PoissonConvolvedGammaCorrelated => {
                    let shifted = gamma_quantile(mean, err, quantile)?;
                    sample_poisson(shifted, rng)?
                }
            };
            target.set_bin(bin, content, content.abs().sqrt());
        }

        Ok(())
    }
}

fn sample_poisson<R: Rng + ?Sized>(mean: f64, rng: &mut R) -> BumpHuntResult<f64> {
    if mean <= 0.0 {
        return Ok(0.0);
    }
    let poisson = Poisson::new(mean).map_err(|e| BumpHuntError::Sampling(e.to_string()))?;
    Ok(poisson.sample(rng))
}

fn sample_normal<R: Rng + ?Sized>(mean: f64, err: f64, rng: &mut R) -> BumpHuntResult<f64> {
    if err == 0.0 {
        return Ok(mean);
    }
    let normal = Normal::new(mean, err).map_err(|e| BumpHuntError::Sampling(e.to_string()))?;
    Ok(normal.sample(rng))
}

/// Gamma distribution of the true mean given `mean +- err`, as `(shape, rate)`.
fn gamma_parameters(mean: f64, err: f64) -> (f64, f64) {
    let rate = mean / (err * err);
    (mean * rate, rate)
}

fn sample_gamma_mean<R: Rng + ?Sized>(mean: f64, err: f64, rng: &mut R) -> BumpHuntResult<f64> {
    if err == 0.0 || mean <= 0.0 {
        return Ok(mean);
    }
    let (shape, rate) = gamma_parameters(mean, err);
    let gamma = Gamma::new(shape, 1.0 / rate).map_err(|e| BumpHuntError::Sampling(e.to_string()))?;
    Ok(gamma.sample(rng))
}

fn gamma_quantile(mean: f64, err: f64, quantile: f64) -> BumpHuntResult<f64> {
    if err == 0.0 || mean <= 0.0 {
        return Ok(mean);
    }
    let (shape, rate) = gamma_parameters(mean, err);
    if shape > GAMMA_QUANTILE_NORMAL_SHAPE {
        return wilson_hilferty_quantile(mean, shape, quantile);
    }
    let gamma = GammaDist::new(shape, rate).map_err(|e| BumpHuntError::Sampling(e.to_string()))?;
    match gamma.inverse_cdf(quantile) {
        x if x.is_finite() => Ok(x),
        _ => wilson_hilferty_quantile(mean, shape, quantile),
    }
}

/// Gamma quantile through the cube-root normal approximation, stable for large shapes.
fn wilson_hilferty_quantile(mean: f64, shape: f64, quantile: f64) -> BumpHuntResult<f64> {
    let z = NormalDist::new(0.0, 1.0)
        .map_err(|e| BumpHuntError::Sampling(e.to_string()))?
        .inverse_cdf(quantile);
    let nine_a = 9.0 * shape;
    let cube_root = 1.0 - 1.0 / nine_a + z / nine_a.sqrt();
    Ok(mean * cube_root.max(0.0).powi(3))
}
