//! Rounding top / bottom detector

use tracing::trace;

use super::helpers::{mean, quadratic_coefficient, EPSILON};
use crate::{
    ChartDetector, DetectorMetadata, FeatureSet, PatternError, PatternType, PriceArrays, Result,
};

/// Fits a parabola to the closes. A curvature `a / mean * n^2` beyond the
/// threshold, on a series whose halves average out, is a rounding shape.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RoundDetector {
    pub min_bars: usize,
    /// Series above this volatility are skipped
    pub max_volatility: f64,
    /// Magnitude the normalized curvature must exceed
    pub min_curvature: f64,
    /// Symmetry score must exceed this
    pub min_symmetry: f64,
}

impl Default for RoundDetector {
    fn default() -> Self {
        Self {
            min_bars: 30,
            max_volatility: 0.2,
            min_curvature: 0.001,
            min_symmetry: 0.8,
        }
    }
}

impl RoundDetector {
    /// Leading parabola coefficient normalized by mean price and scaled by `n^2`
    pub fn normalized_curvature(closes: &[f64]) -> f64 {
        let n = closes.len() as f64;
        quadratic_coefficient(closes) / (mean(closes) + EPSILON) * n * n
    }
}

impl ChartDetector for RoundDetector {
    fn id(&self) -> &'static str {
        "ROUND"
    }

    fn min_bars(&self) -> usize {
        self.min_bars
    }

    fn detect(&self, prices: &PriceArrays, features: &FeatureSet) -> Option<PatternType> {
        let closes = &prices.closes;
        if closes.len() < self.min_bars || features.volatility > self.max_volatility {
            return None;
        }

        let curvature = Self::normalized_curvature(closes);
        trace!(curvature, symmetry = features.symmetry_score, "rounding curvature");
        if features.symmetry_score <= self.min_symmetry {
            return None;
        }

        if curvature < -self.min_curvature {
            Some(PatternType::RoundTop)
        } else if curvature > self.min_curvature {
            Some(PatternType::RoundBottom)
        } else {
            None
        }
    }

    fn validate_config(&self) -> Result<()> {
        if !self.min_curvature.is_finite() || self.min_curvature < 0.0 {
            return Err(PatternError::InvalidConfig(
                "round min_curvature must be finite and >= 0".to_string(),
            ));
        }
        Ok(())
    }

    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            name: "Rounding",
            description: "Parabolic arch or bowl",
            emits: &[PatternType::RoundTop, PatternType::RoundBottom],
        }
    }
}
