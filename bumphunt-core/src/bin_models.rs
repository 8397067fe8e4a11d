//! One-sided p-values of an observed count given an expected count and its uncertainty.
//!
//! An observation is an *excess* when `nobs > nexp` and a *deficit* otherwise; every
//! model returns the probability, under the background-only hypothesis, of a
//! fluctuation at least as extreme in the same direction.

use std::f64::consts::SQRT_2;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::erf::erf_inv;
use statrs::function::gamma::{gamma_lr, gamma_ur};

use crate::consts::{
    POISSON_GAMMA_LOG_SPACE_SHAPE, POISSON_GAMMA_STAT_DOMINANCE, POISSON_GAMMA_TAIL_MAX_TERMS,
    POISSON_GAMMA_TAIL_SWITCH, Z_OVERFLOW_P_VALUE, Z_OVERFLOW_VALUE, Z_UNDERFLOW_P_VALUE,
};
use crate::errors::BumpHuntError;

/// Statistical model of the content of a bin (or a window of bins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinModelKind {
    /// Poisson counts with an exactly known mean; the bin error is ignored.
    Poisson,
    /// Gaussian counts with the bin error as standard deviation.
    Gaussian,
    /// Poisson counts whose mean is Gamma distributed, errors combined in quadrature.
    #[default]
    #[serde(alias = "poisson_gamma")]
    PoissonConvolvedGamma,
    /// As `PoissonConvolvedGamma`, with errors fully correlated across bins.
    #[serde(alias = "poisson_gamma_correlated")]
    PoissonConvolvedGammaCorrelated,
}

impl BinModelKind {
    pub const ALL: [BinModelKind; 4] = [
        BinModelKind::Poisson,
        BinModelKind::Gaussian,
        BinModelKind::PoissonConvolvedGamma,
        BinModelKind::PoissonConvolvedGammaCorrelated,
    ];

    /// p-value of observing `nobs` given `nexp +- nexp_err` under this model.
    pub fn p_value(&self, nobs: f64, nexp: f64, nexp_err: f64) -> f64 {
        match self {
            BinModelKind::Poisson => poisson_p_value(nobs, nexp),
            BinModelKind::Gaussian => gaussian_p_value(nobs, nexp, nexp_err),
            BinModelKind::PoissonConvolvedGamma
            | BinModelKind::PoissonConvolvedGammaCorrelated => {
                poisson_gamma_p_value(nobs, nexp, nexp_err)
            }
        }
    }

    /// Whether bin errors inside a window add linearly rather than in quadrature.
    pub fn correlated_errors(&self) -> bool {
        matches!(self, BinModelKind::PoissonConvolvedGammaCorrelated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinModelKind::Poisson => "poisson",
            BinModelKind::Gaussian => "gaussian",
            BinModelKind::PoissonConvolvedGamma => "poisson_convolved_gamma",
            BinModelKind::PoissonConvolvedGammaCorrelated => "poisson_convolved_gamma_correlated",
        }
    }
}

impl Display for BinModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BinModelKind {
    type Err = BumpHuntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "poisson" => Ok(BinModelKind::Poisson),
            "gaussian" => Ok(BinModelKind::Gaussian),
            "poisson_gamma" | "poisson_convolved_gamma" => Ok(BinModelKind::PoissonConvolvedGamma),
            "poisson_gamma_correlated" | "poisson_convolved_gamma_correlated" => {
                Ok(BinModelKind::PoissonConvolvedGammaCorrelated)
            }
            other => Err(BumpHuntError::InvalidConfig(format!(
                "unknown bin model: {other}"
            ))),
        }
    }
}

///
/// Poisson p-value of observing `nobs` events when `nexp` are expected.
///
/// Deficit: `P(X <= nobs) = Q(nobs + 1, nexp)`. Excess: `P(X >= nobs) = P(nobs, nexp)`,
/// where `P`/`Q` are the regularized lower/upper incomplete gamma functions.
///
pub fn poisson_p_value(nobs: f64, nexp: f64) -> f64 {
    if nobs > nexp {
        if nexp <= 0.0 {
            return 0.0;
        }
        return gamma_lr(nobs, nexp);
    }

    if nexp <= 0.0 {
        return 1.0;
    }
    gamma_ur(nobs + 1.0, nexp)
}

///
/// Gaussian p-value: upper tail above `nobs` for an excess, lower tail below it
/// for a deficit. A zero `sigma` degenerates into a step at `nexp`.
///
pub fn gaussian_p_value(nobs: f64, nexp: f64, sigma: f64) -> f64 {
    match Normal::new(nexp, sigma) {
        Ok(normal) if nobs > nexp => normal.sf(nobs),
        Ok(normal) => normal.cdf(nobs),
        Err(_) if nobs != nexp => 0.0,
        Err(_) => 1.0,
    }
}

///
/// p-value of observing `nobs` under a Poisson whose mean is itself Gamma distributed
/// with mean `nexp` and variance `nexp_err²` (shape `a = nexp²/err²`, rate `b = nexp/err²`).
///
/// Integrating the unknown mean out gives a negative binomial, summed with the
/// recursion `P(k) = P(k-1) (a+k-1) / (k (1+b))` from `P(0) = (b/(1+b))^a`.
/// When the statistical error dominates (`a > 100 nobs`) the plain Poisson
/// p-value is returned instead.
///
pub fn poisson_gamma_p_value(nobs: f64, nexp: f64, nexp_err: f64) -> f64 {
    if nexp <= 0.0 || nexp_err <= 0.0 {
        return poisson_p_value(nobs, nexp);
    }

    let b = nexp / (nexp_err * nexp_err);
    let a = nexp * b;

    if a > POISSON_GAMMA_STAT_DOMINANCE * nobs {
        return poisson_p_value(nobs, nexp);
    }

    let excess = nobs > nexp;
    let n = nobs.max(0.0).floor() as u64;
    let stop = if excess { n.checked_sub(1) } else { Some(n) };

    let sum = match stop {
        None => 0.0,
        Some(stop) if a > POISSON_GAMMA_LOG_SPACE_SHAPE => {
            // large shapes underflow (b/(1+b))^a, stay in log space
            let mut log_prob = a * (b / (1.0 + b)).ln();
            let mut sum = log_prob.exp();
            for k in 1..=stop {
                let k = k as f64;
                log_prob += ((a + k - 1.0) / (k * (1.0 + b))).ln();
                sum += log_prob.exp();
            }
            sum
        }
        Some(stop) => {
            let mut prob = (b / (1.0 + b)).powf(a);
            let mut sum = prob;
            for k in 1..=stop {
                let k = k as f64;
                prob *= (a + k - 1.0) / (k * (1.0 + b));
                sum += prob;
            }
            sum
        }
    };

    let p = match excess {
        false => sum,
        true if sum < POISSON_GAMMA_TAIL_SWITCH => 1.0 - sum,
        // 1 - sum cancels once the head carries nearly all the mass
        true => poisson_gamma_upper_tail(n, a, b),
    };
    p.clamp(0.0, 1.0)
}

/// `P(X >= n)` of the negative binomial, summed upwards from `n` in log space.
fn poisson_gamma_upper_tail(n: u64, a: f64, b: f64) -> f64 {
    let log_ratio = |k: f64| ((a + k - 1.0) / (k * (1.0 + b))).ln();

    let mut log_prob = a * (b / (1.0 + b)).ln();
    for k in 1..=n {
        log_prob += log_ratio(k as f64);
    }

    // past the mode every ratio is below 1, so the terms shrink monotonically
    let mut tail = 0.0;
    let mut k = n;
    for _ in 0..POISSON_GAMMA_TAIL_MAX_TERMS {
        let term = log_prob.exp();
        tail += term;
        if term <= tail * f64::EPSILON {
            break;
        }
        k += 1;
        log_prob += log_ratio(k as f64);
    }
    tail
}

/// Gaussian-equivalent one-sided significance of a p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Significance {
    /// Number of sigma, `sqrt(2) erfinv(1 - 2p)`.
    pub z: f64,
    /// Set when the p-value was too small to convert and `z` is a lower bound.
    pub overflow: bool,
}

impl Display for Significance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.overflow {
            write!(f, "> {:.3} sigma", self.z)
        } else {
            write!(f, "{:.3} sigma", self.z)
        }
    }
}

///
/// Convert a p-value to a Z-value; p-values below `1e-9` report `Z = 6` with the overflow flag.
///
/// p-values above `1 - 1e-9` (including `p = 1` for windows without any excess) are
/// clamped there, so `z` stays finite at about `-6`.
///
pub fn z_value(p_value: f64) -> Significance {
    if p_value < Z_OVERFLOW_P_VALUE {
        return Significance {
            z: Z_OVERFLOW_VALUE,
            overflow: true,
        };
    }
    let p = p_value.min(Z_UNDERFLOW_P_VALUE);
    Significance {
        z: SQRT_2 * erf_inv(1.0 - 2.0 * p),
        overflow: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * b.abs().max(1e-300)
    }

    #[rstest]
    fn test_poisson_deficit_matches_cdf() {
        // P(X <= 2 | mu = 3) = e^-3 (1 + 3 + 4.5)
        let expected = (-3.0_f64).exp() * 8.5;
        assert!(close(poisson_p_value(2.0, 3.0), expected, 1e-10));
    }

    #[rstest]
    fn test_poisson_excess_matches_tail() {
        // P(X >= 3 | mu = 1) = 1 - e^-1 (1 + 1 + 0.5)
        let expected = 1.0 - (-1.0_f64).exp() * 2.5;
        assert!(close(poisson_p_value(3.0, 1.0), expected, 1e-10));
    }

    #[rstest]
    fn test_poisson_extreme_excess_does_not_cancel() {
        let p = poisson_p_value(180.0, 100.0);
        assert!(p > 0.0);
        assert!(p < 1e-9);
    }

    #[rstest]
    fn test_poisson_monotone_in_excess() {
        let p: Vec<f64> = [101.0, 110.0, 120.0, 140.0, 160.0, 200.0]
            .iter()
            .map(|&nobs| poisson_p_value(nobs, 100.0))
            .collect();
        assert!(p.windows(2).all(|w| w[1] < w[0]), "{p:?}");
    }

    #[rstest]
    fn test_poisson_saturated_excess_stays_positive() {
        // P(X >= nobs | 10) is far below f64::EPSILON here
        let p: Vec<f64> = [60.0, 80.0, 90.0]
            .iter()
            .map(|&nobs| poisson_p_value(nobs, 10.0))
            .collect();
        assert!(p.iter().all(|&p| p > 0.0), "{p:?}");
        assert!(p.windows(2).all(|w| w[1] < w[0]), "{p:?}");
        assert!(close(p[1], 7.2e-44, 0.05), "{p:?}");
    }

    #[rstest]
    fn test_poisson_excess_keeps_precision() {
        assert!(close(poisson_p_value(180.0, 100.0), 4.1049e-13, 1e-4));
    }

    #[rstest]
    fn test_poisson_zero_expectation() {
        assert_eq!(poisson_p_value(0.0, 0.0), 1.0);
        assert_eq!(poisson_p_value(3.0, 0.0), 0.0);
    }

    #[rstest]
    fn test_gaussian_tails() {
        let one_sigma_tail = 0.15865525393145707;
        assert!(close(gaussian_p_value(110.0, 100.0, 10.0), one_sigma_tail, 1e-6));
        assert!(close(gaussian_p_value(90.0, 100.0, 10.0), one_sigma_tail, 1e-6));
        assert!(close(gaussian_p_value(100.0, 100.0, 10.0), 0.5, 1e-9));
    }

    #[rstest]
    fn test_gaussian_zero_sigma() {
        assert_eq!(gaussian_p_value(101.0, 100.0, 0.0), 0.0);
        assert_eq!(gaussian_p_value(99.0, 100.0, 0.0), 0.0);
        assert_eq!(gaussian_p_value(100.0, 100.0, 0.0), 1.0);
    }

    #[rstest]
    fn test_poisson_gamma_falls_back_to_poisson() {
        // a = 100^2 / 0.1^2 = 1e6 > 100 * nobs
        let p = poisson_gamma_p_value(120.0, 100.0, 0.1);
        assert_eq!(p, poisson_p_value(120.0, 100.0));
        assert_eq!(poisson_gamma_p_value(120.0, 100.0, 0.0), poisson_p_value(120.0, 100.0));
    }

    #[rstest]
    fn test_poisson_gamma_wider_than_poisson() {
        // a systematic uncertainty on the mean makes an excess less significant
        let plain = poisson_p_value(150.0, 100.0);
        let smeared = poisson_gamma_p_value(150.0, 100.0, 20.0);
        assert!(smeared > plain);
        assert!(smeared < 1.0);
    }

    #[rstest]
    fn test_poisson_gamma_geometric_case() {
        // a = 1, b = 1: P(k) = 2^-(k+1), so P(X <= 1) = 3/4
        let p = poisson_gamma_p_value(1.0, 1.0, 1.0);
        assert!(close(p, 0.75, 1e-12));
        // excess: P(X >= 3) = 1/8
        let p = poisson_gamma_p_value(3.0, 1.0, 1.0);
        assert!(close(p, 0.125, 1e-12));
    }

    #[rstest]
    fn test_poisson_gamma_log_space_agrees() {
        // a = 400 / 1.21 > 100 forces the log-space branch, a < 100 * nobs keeps the mixture
        let p = poisson_gamma_p_value(30.0, 20.0, 1.1);
        let plain = poisson_p_value(30.0, 20.0);
        assert!(p.is_finite());
        assert!(p > plain);
        assert!(close(p, plain, 0.5));
    }

    #[rstest]
    fn test_poisson_gamma_saturated_excess_stays_positive() {
        // a = 25, so the mixture is kept; the head sum rounds to 1 for these counts
        let p: Vec<f64> = [60.0, 80.0, 100.0]
            .iter()
            .map(|&nobs| poisson_gamma_p_value(nobs, 10.0, 2.0))
            .collect();
        assert!(p.iter().all(|&p| p > 0.0), "{p:?}");
        assert!(p.windows(2).all(|w| w[1] < w[0]), "{p:?}");
    }

    #[rstest]
    fn test_poisson_gamma_tail_matches_complement() {
        // 1 - head and the summed tail agree where neither cancels
        let (a, b) = (25.0, 2.5);
        let tail = poisson_gamma_upper_tail(14, a, b);
        let p = poisson_gamma_p_value(14.0, 10.0, 2.0);
        assert!(close(tail, p, 1e-10), "{tail} vs {p}");
    }

    #[rstest]
    fn test_p_values_in_unit_interval() {
        for model in BinModelKind::ALL {
            for (nobs, nexp, err) in [(0.0, 5.0, 2.0), (12.0, 5.0, 2.0), (5.0, 5.0, 1.0)] {
                let p = model.p_value(nobs, nexp, err);
                assert!((0.0..=1.0).contains(&p), "{model}: p = {p}");
            }
        }
    }

    #[rstest]
    #[case(0.5, 0.0)]
    #[case(0.15865525393145707, 1.0)]
    #[case(0.0013498980316301, 3.0)]
    fn test_z_value(#[case] p: f64, #[case] z: f64) {
        let significance = z_value(p);
        assert!((significance.z - z).abs() < 1e-6, "{significance:?}");
        assert!(!significance.overflow);
    }

    #[rstest]
    fn test_z_value_overflow() {
        let significance = z_value(1e-12);
        assert_eq!(
            significance,
            Significance {
                z: 6.0,
                overflow: true
            }
        );
        assert_eq!(significance.to_string(), "> 6.000 sigma");
    }

    #[rstest]
    fn test_z_value_of_certain_p_is_finite() {
        let significance = z_value(1.0);
        assert!(significance.z.is_finite());
        assert!(significance.z < -5.9 && significance.z > -6.1, "{significance:?}");
        assert!(!significance.overflow);

        let json = serde_json::to_value(significance).unwrap();
        assert!(json["z"].is_f64());
    }

    #[rstest]
    #[case("poisson", BinModelKind::Poisson)]
    #[case("Gaussian", BinModelKind::Gaussian)]
    #[case("poisson-gamma", BinModelKind::PoissonConvolvedGamma)]
    #[case("poisson_convolved_gamma_correlated", BinModelKind::PoissonConvolvedGammaCorrelated)]
    fn test_parse_bin_model(#[case] raw: &str, #[case] expected: BinModelKind) {
        assert_eq!(raw.parse::<BinModelKind>().unwrap(), expected);
    }

    #[rstest]
    fn test_parse_unknown_bin_model() {
        assert!("binomial".parse::<BinModelKind>().is_err());
    }
}
