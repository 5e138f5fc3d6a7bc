//! Converging-boundary detectors: wedges and triangles
//!
//! Both shapes are read from the regression slopes of highs and lows plus the
//! [convergence ratio](super::helpers::convergence_ratio) between the first and
//! last thirds of the window.

use std::collections::HashMap;

use tracing::trace;

use super::helpers::{convergence_ratio, normalized_slope, total_return, up_day_ratio};
use crate::{
    params::{get_period, get_threshold, ParamMeta, ParameterizedDetector},
    ChartDetector, DetectorMetadata, FeatureSet, PatternError, PatternType, Period, PriceArrays,
    Result,
};

/// Slopes and convergence of the high/low envelope
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct BoundaryStats {
    pub high_slope: f64,
    pub low_slope: f64,
    pub convergence: f64,
}

impl BoundaryStats {
    /// `None` when the series is too short to form thirds
    pub fn compute(prices: &PriceArrays) -> Option<Self> {
        let convergence = convergence_ratio(&prices.highs, &prices.lows)?;
        Some(Self {
            high_slope: normalized_slope(&prices.highs),
            low_slope: normalized_slope(&prices.lows),
            convergence,
        })
    }
}

// ============================================================
// WEDGE
// ============================================================

/// Both boundaries slope the same way while the channel narrows.
///
/// Rising wedge: highs and lows climb, lows faster. Falling wedge: both fall,
/// highs faster.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WedgeDetector {
    pub min_bars: Period,
    /// Convergence must strictly exceed this
    pub min_convergence: f64,
    /// Both boundary slopes must exceed this in absolute value, in the wedge direction
    pub min_slope: f64,
}

impl Default for WedgeDetector {
    fn default() -> Self {
        Self {
            min_bars: Period::new_const(20),
            min_convergence: 0.15,
            min_slope: 0.01,
        }
    }
}

impl ChartDetector for WedgeDetector {
    fn id(&self) -> &'static str {
        "WEDGE"
    }

    fn min_bars(&self) -> usize {
        self.min_bars.get()
    }

    fn detect(&self, prices: &PriceArrays, _features: &FeatureSet) -> Option<PatternType> {
        if prices.len() < self.min_bars.get() {
            return None;
        }
        let stats = BoundaryStats::compute(prices)?;
        trace!(?stats, "wedge boundaries");

        if stats.convergence <= self.min_convergence {
            return None;
        }

        let (hs, ls) = (stats.high_slope, stats.low_slope);
        if hs > self.min_slope && ls > self.min_slope && hs < ls {
            Some(PatternType::AscWedge)
        } else if hs < -self.min_slope && ls < -self.min_slope && ls.abs() < hs.abs() {
            Some(PatternType::DescWedge)
        } else {
            None
        }
    }

    fn validate_config(&self) -> Result<()> {
        if !(self.min_convergence.is_finite() && self.min_slope.is_finite())
            || self.min_slope < 0.0
        {
            return Err(PatternError::InvalidConfig(
                "wedge thresholds must be finite and min_slope >= 0".to_string(),
            ));
        }
        Ok(())
    }

    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            name: "Wedge",
            description: "Same-direction boundaries converging",
            emits: &[PatternType::AscWedge, PatternType::DescWedge],
        }
    }
}

static WEDGE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("min_bars", 20.0, (20.0, 120.0, 10.0), "Minimum series length"),
    ParamMeta::threshold("min_convergence", 0.15, (0.05, 0.4, 0.05), "Convergence floor (exclusive)"),
    ParamMeta::threshold("min_slope", 0.01, (0.005, 0.03, 0.005), "Boundary slope magnitude floor"),
];

impl ParameterizedDetector for WedgeDetector {
    fn param_meta() -> &'static [ParamMeta] {
        WEDGE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            min_bars: get_period(params, "min_bars", 20)?,
            min_convergence: get_threshold(params, "min_convergence", 0.15)?,
            min_slope: get_threshold(params, "min_slope", 0.01)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn detector_id_str() -> &'static str {
        "WEDGE"
    }
}

// ============================================================
// TRIANGLE
// ============================================================

/// Narrowing range with no overall trend.
///
/// Ascending: flat highs and rising lows. Descending: falling highs and flat lows.
/// Symmetric: neither boundary slopes much. Subtypes are checked in that order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TriangleDetector {
    /// Trending series are rejected when |total return| exceeds this...
    pub max_trend_return: f64,
    /// ...and |normalized slope| exceeds this
    pub max_trend_slope: f64,
    pub min_up_ratio: f64,
    pub max_up_ratio: f64,
    /// Convergence must strictly exceed this
    pub min_convergence: f64,
    /// |slope| below this counts as a flat boundary
    pub flat_slope: f64,
    /// Slope magnitude of the sloped boundary in ascending/descending triangles
    pub sloped_boundary: f64,
}

impl Default for TriangleDetector {
    fn default() -> Self {
        Self {
            max_trend_return: 0.08,
            max_trend_slope: 0.015,
            min_up_ratio: 0.45,
            max_up_ratio: 0.55,
            min_convergence: 0.20,
            flat_slope: 0.03,
            sloped_boundary: 0.02,
        }
    }
}

impl ChartDetector for TriangleDetector {
    fn id(&self) -> &'static str {
        "TRIANGLE"
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn detect(&self, prices: &PriceArrays, _features: &FeatureSet) -> Option<PatternType> {
        let closes = &prices.closes;
        let trend_return = total_return(closes)?;
        let slope = normalized_slope(closes);
        if trend_return.abs() > self.max_trend_return && slope.abs() > self.max_trend_slope {
            return None;
        }

        let up_ratio = up_day_ratio(closes).unwrap_or(0.5);
        if up_ratio > self.max_up_ratio || up_ratio < self.min_up_ratio {
            return None;
        }

        let stats = BoundaryStats::compute(prices)?;
        trace!(?stats, up_ratio, "triangle boundaries");
        if stats.convergence <= self.min_convergence {
            return None;
        }

        let (hs, ls) = (stats.high_slope, stats.low_slope);
        if hs.abs() < self.flat_slope && ls > self.sloped_boundary {
            Some(PatternType::AscTriangle)
        } else if hs < -self.sloped_boundary && ls.abs() < self.flat_slope {
            Some(PatternType::DescTriangle)
        } else if hs.abs() < self.flat_slope && ls.abs() < self.flat_slope {
            Some(PatternType::SymTriangle)
        } else {
            None
        }
    }

    fn validate_config(&self) -> Result<()> {
        if self.min_up_ratio > self.max_up_ratio {
            return Err(PatternError::InvalidConfig(
                "triangle min_up_ratio must not exceed max_up_ratio".to_string(),
            ));
        }
        if self.flat_slope < 0.0 || self.sloped_boundary < 0.0 {
            return Err(PatternError::InvalidConfig(
                "triangle slope thresholds must be >= 0".to_string(),
            ));
        }
        Ok(())
    }

    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            name: "Triangle",
            description: "Converging range without an overall trend",
            emits: &[
                PatternType::AscTriangle,
                PatternType::DescTriangle,
                PatternType::SymTriangle,
            ],
        }
    }
}

static TRIANGLE_PARAMS: &[ParamMeta] = &[
    ParamMeta::threshold("max_trend_return", 0.08, (0.04, 0.16, 0.02), "Trend rejection: |total return|"),
    ParamMeta::threshold("max_trend_slope", 0.015, (0.005, 0.03, 0.005), "Trend rejection: |normalized slope|"),
    ParamMeta::ratio("min_up_ratio", 0.45, (0.35, 0.5, 0.05), "Lowest accepted up-day ratio"),
    ParamMeta::ratio("max_up_ratio", 0.55, (0.5, 0.65, 0.05), "Highest accepted up-day ratio"),
    ParamMeta::threshold("min_convergence", 0.20, (0.1, 0.5, 0.05), "Convergence floor (exclusive)"),
    ParamMeta::threshold("flat_slope", 0.03, (0.01, 0.05, 0.01), "Flat boundary slope ceiling"),
    ParamMeta::threshold("sloped_boundary", 0.02, (0.01, 0.05, 0.01), "Sloped boundary slope floor"),
];

impl ParameterizedDetector for TriangleDetector {
    fn param_meta() -> &'static [ParamMeta] {
        TRIANGLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            max_trend_return: get_threshold(params, "max_trend_return", 0.08)?,
            max_trend_slope: get_threshold(params, "max_trend_slope", 0.015)?,
            min_up_ratio: get_threshold(params, "min_up_ratio", 0.45)?,
            max_up_ratio: get_threshold(params, "max_up_ratio", 0.55)?,
            min_convergence: get_threshold(params, "min_convergence", 0.20)?,
            flat_slope: get_threshold(params, "flat_slope", 0.03)?,
            sloped_boundary: get_threshold(params, "sloped_boundary", 0.02)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn detector_id_str() -> &'static str {
        "TRIANGLE"
    }
}
