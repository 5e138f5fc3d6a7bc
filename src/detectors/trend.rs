//! Single-direction trend detector
//!
//! First stage of the cascade. A series that moved strongly in one direction is
//! labelled a single trend before any consolidation shape is considered.

use tracing::trace;

use super::helpers::{linear_fit, mean, min_max, r_squared, total_return, up_day_ratio, EPSILON};
use crate::{
    ChartDetector, DetectorMetadata, FeatureSet, PatternError, PatternType, PriceArrays, Result,
};

/// Start of the "recent" segment as a fraction of the series
pub const RECENT_SEGMENT_START: f64 = 0.7;

// ============================================================
// TREND STATISTICS
// ============================================================

/// Path statistics the trend rules are evaluated on
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct TrendStats {
    pub total_return: f64,
    /// `(max - min) / max`, 0 when the max is not positive
    pub max_drawdown: f64,
    pub up_ratio: f64,
    /// Goodness of the linear fit. Reported only; no rule reads it.
    pub r_squared: f64,
    pub normalized_slope: f64,
    /// Return over the bars from `floor(0.7 * n)` to the end
    pub recent_return: f64,
}

impl TrendStats {
    /// `None` for fewer than 2 closes
    pub fn compute(closes: &[f64]) -> Option<Self> {
        let n = closes.len();
        let overall = total_return(closes)?;
        let (lo, hi) = min_max(closes)?;
        let max_drawdown = if hi > 0.0 { (hi - lo) / hi } else { 0.0 };

        let fit = linear_fit(closes);
        let recent_start = (n as f64 * RECENT_SEGMENT_START) as usize;

        Some(Self {
            total_return: overall,
            max_drawdown,
            up_ratio: up_day_ratio(closes).unwrap_or(0.0),
            r_squared: r_squared(closes, &fit),
            normalized_slope: fit.slope / (mean(closes) + EPSILON),
            recent_return: total_return(&closes[recent_start..]).unwrap_or(0.0),
        })
    }
}

// ============================================================
// DETECTOR
// ============================================================

/// Labels strong one-directional moves as [`PatternType::SingleUp`] or
/// [`PatternType::SingleDown`].
///
/// Up is matched when any of four rule sets holds:
///
/// | rule      | total return | slope     | other                          |
/// |-----------|--------------|-----------|--------------------------------|
/// | steady    | > 0.08       | > 0.02    | drawdown < 0.5, up days > 0.45 |
/// | strong    | > 0.15       | > 0.015   | up days > 0.40                 |
/// | recent    | > 0.05       | > 0.01    | recent > 0.10, up days > 0.45  |
/// | large     | > 0.25       | > 0.01    | up days > 0.35                 |
///
/// Down mirrors only the first two rule sets.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrendDetector {
    pub steady_return: f64,
    pub steady_slope: f64,
    pub steady_max_drawdown: f64,
    pub steady_up_ratio: f64,

    pub strong_return: f64,
    pub strong_slope: f64,
    pub strong_up_ratio: f64,

    pub recent_min_return: f64,
    pub recent_total_return: f64,
    pub recent_slope: f64,
    pub recent_up_ratio: f64,

    pub large_return: f64,
    pub large_slope: f64,
    pub large_up_ratio: f64,
}

impl Default for TrendDetector {
    fn default() -> Self {
        Self {
            steady_return: 0.08,
            steady_slope: 0.02,
            steady_max_drawdown: 0.5,
            steady_up_ratio: 0.45,
            strong_return: 0.15,
            strong_slope: 0.015,
            strong_up_ratio: 0.40,
            recent_min_return: 0.10,
            recent_total_return: 0.05,
            recent_slope: 0.01,
            recent_up_ratio: 0.45,
            large_return: 0.25,
            large_slope: 0.01,
            large_up_ratio: 0.35,
        }
    }
}

impl TrendDetector {
    fn is_up(&self, s: &TrendStats) -> bool {
        let steady = s.total_return > self.steady_return
            && s.normalized_slope > self.steady_slope
            && s.max_drawdown < self.steady_max_drawdown
            && s.up_ratio > self.steady_up_ratio;
        let strong = s.total_return > self.strong_return
            && s.normalized_slope > self.strong_slope
            && s.up_ratio > self.strong_up_ratio;
        let recent = s.recent_return > self.recent_min_return
            && s.total_return > self.recent_total_return
            && s.normalized_slope > self.recent_slope
            && s.up_ratio > self.recent_up_ratio;
        let large = s.total_return > self.large_return
            && s.normalized_slope > self.large_slope
            && s.up_ratio > self.large_up_ratio;
        steady || strong || recent || large
    }

    fn is_down(&self, s: &TrendStats) -> bool {
        let steady = s.total_return < -self.steady_return
            && s.normalized_slope < -self.steady_slope
            && s.max_drawdown < self.steady_max_drawdown
            && s.up_ratio < self.steady_up_ratio;
        let strong = s.total_return < -self.strong_return
            && s.normalized_slope < -self.strong_slope
            && s.up_ratio < self.strong_up_ratio;
        steady || strong
    }
}

impl ChartDetector for TrendDetector {
    fn id(&self) -> &'static str {
        "SINGLE_TREND"
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect(&self, prices: &PriceArrays, _features: &FeatureSet) -> Option<PatternType> {
        let stats = TrendStats::compute(&prices.closes)?;
        trace!(?stats, "trend statistics");

        if self.is_up(&stats) {
            Some(PatternType::SingleUp)
        } else if self.is_down(&stats) {
            Some(PatternType::SingleDown)
        } else {
            None
        }
    }

    fn validate_config(&self) -> Result<()> {
        let return_floors = [
            self.steady_return,
            self.strong_return,
            self.recent_total_return,
            self.large_return,
        ];
        if return_floors.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(PatternError::InvalidConfig(
                "trend return thresholds must be finite and >= 0".to_string(),
            ));
        }
        let up_ratios = [
            self.steady_up_ratio,
            self.strong_up_ratio,
            self.recent_up_ratio,
            self.large_up_ratio,
        ];
        if up_ratios.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(PatternError::InvalidConfig(
                "trend up-day ratios must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            name: "Single trend",
            description: "Sustained move in one direction",
            emits: &[PatternType::SingleUp, PatternType::SingleDown],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_on_geometric_series() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 * 1.015f64.powi(i)).collect();
        let s = TrendStats::compute(&closes).unwrap();
        assert!((s.total_return - (1.015f64.powi(59) - 1.0)).abs() < 1e-9);
        assert_eq!(s.up_ratio, 1.0);
        assert!(s.r_squared > 0.9);
        assert!(s.normalized_slope > 0.014);
        assert!(s.recent_return > 0.2);
    }

    #[test]
    fn test_stats_need_two_closes() {
        assert!(TrendStats::compute(&[]).is_none());
        assert!(TrendStats::compute(&[1.0]).is_none());
    }

    #[test]
    fn test_recent_segment_too_short() {
        // floor(0.7 * 2) = 1 leaves a single recent bar
        let s = TrendStats::compute(&[100.0, 110.0]).unwrap();
        assert_eq!(s.recent_return, 0.0);
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let detector = TrendDetector {
            strong_return: -0.1,
            ..TrendDetector::default()
        };
        assert!(detector.validate_config().is_err());
        assert!(TrendDetector::default().validate_config().is_ok());
    }
}
