//! Head-and-shoulders detector

use tracing::trace;

use super::helpers::{extrema_window, local_extrema};
use crate::{
    ChartDetector, DetectorMetadata, FeatureSet, PatternError, PatternType, PriceArrays, Result,
};

/// Three prominent peaks (top) or valleys (bottom) with an ordering constraint.
///
/// The three most extreme points are sorted from most to least extreme; the
/// pattern matches when their indices strictly decrease in that order. Top is
/// checked before bottom.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HeadShouldersDetector {
    pub min_bars: usize,
    /// Extrema window is `max(3, n / window_divisor)`
    pub window_divisor: usize,
    pub min_peaks: usize,
    pub min_valleys: usize,
}

impl Default for HeadShouldersDetector {
    fn default() -> Self {
        Self {
            min_bars: 30,
            window_divisor: 15,
            min_peaks: 3,
            min_valleys: 2,
        }
    }
}

/// Which end of the close ordering counts as most extreme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rank {
    Highest,
    Lowest,
}

/// True when the three most extreme points appear in strictly decreasing index order.
///
/// Points are sorted ascending by close with a stable sort. For [`Rank::Highest`]
/// the order is then reversed, so among equal peaks the later index ranks first;
/// among equal valleys the earlier index ranks first.
fn ranked_indices_decrease(closes: &[f64], points: &[usize], rank: Rank) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut ranked = points.to_vec();
    ranked.sort_by(|&a, &b| closes[a].total_cmp(&closes[b]));
    if rank == Rank::Highest {
        ranked.reverse();
    }
    ranked[0] > ranked[1] && ranked[1] > ranked[2]
}

impl ChartDetector for HeadShouldersDetector {
    fn id(&self) -> &'static str {
        "HEAD_SHOULDERS"
    }

    fn min_bars(&self) -> usize {
        self.min_bars
    }

    fn detect(&self, prices: &PriceArrays, _features: &FeatureSet) -> Option<PatternType> {
        let closes = &prices.closes;
        let n = closes.len();
        if n < self.min_bars {
            return None;
        }

        let extrema = local_extrema(closes, extrema_window(n, self.window_divisor));
        trace!(peaks = ?extrema.peaks, valleys = ?extrema.valleys, "head and shoulders extrema");
        if extrema.peaks.len() < self.min_peaks || extrema.valleys.len() < self.min_valleys {
            return None;
        }

        if ranked_indices_decrease(closes, &extrema.peaks, Rank::Highest) {
            return Some(PatternType::HeadShoulderTop);
        }
        if ranked_indices_decrease(closes, &extrema.valleys, Rank::Lowest) {
            return Some(PatternType::HeadShoulderBottom);
        }
        None
    }

    fn validate_config(&self) -> Result<()> {
        if self.window_divisor == 0 {
            return Err(PatternError::InvalidConfig(
                "head-shoulders window_divisor must be > 0".to_string(),
            ));
        }
        if self.min_peaks < 3 {
            return Err(PatternError::InvalidConfig(
                "head-shoulders needs at least 3 peaks".to_string(),
            ));
        }
        Ok(())
    }

    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            name: "Head and shoulders",
            description: "Three ordered peaks or valleys",
            emits: &[PatternType::HeadShoulderTop, PatternType::HeadShoulderBottom],
        }
    }
}
