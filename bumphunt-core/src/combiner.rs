use crate::channel::Bump;
use crate::errors::{BumpHuntError, BumpHuntResult};

///
/// Combines the bumps found in several channels into one test statistic.
///
/// The statistic is the sum of `-ln p` over channels, provided the bumps agree:
/// the intersection of all bump intervals must cover at least `overlap_factor`
/// of every single bump. Disagreeing bumps combine to 0.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelCombiner {
    overlap_factor: f64,
}

impl ChannelCombiner {
    pub fn new(overlap_factor: f64) -> BumpHuntResult<Self> {
        if !(overlap_factor > 0.0 && overlap_factor <= 1.0) {
            return Err(BumpHuntError::InvalidConfig(format!(
                "overlap factor must lie in (0, 1], got {overlap_factor}"
            )));
        }
        Ok(ChannelCombiner { overlap_factor })
    }

    pub fn overlap_factor(&self) -> f64 {
        self.overlap_factor
    }

    /// Combined statistic of `bumps`, in channel order.
    pub fn combine(&self, bumps: &[Bump]) -> f64 {
        if !self.agree(bumps) {
            return 0.0;
        }
        let statistic: f64 = bumps
            .iter()
            .map(|bump| -bump.p_value.max(f64::MIN_POSITIVE).ln())
            .sum();
        // -ln(1) is -0.0
        statistic.max(0.0)
    }

    /// Whether the bumps pass the overlap requirement, checked after each channel is added.
    pub fn agree(&self, bumps: &[Bump]) -> bool {
        let mut common_low = f64::NEG_INFINITY;
        let mut common_high = f64::INFINITY;

        for (j, bump) in bumps.iter().enumerate() {
            common_low = common_low.max(bump.low_edge);
            common_high = common_high.min(bump.high_edge);

            if !self.overlaps(&bumps[..=j], common_low, common_high) {
                return false;
            }
        }
        true
    }

    /// Whether `[common_low, common_high]` covers enough of every bump.
    pub fn overlaps(&self, bumps: &[Bump], common_low: f64, common_high: f64) -> bool {
        bumps.iter().all(|bump| {
            let fraction = (common_high - common_low) / bump.width();
            fraction >= self.overlap_factor
        })
    }
}
