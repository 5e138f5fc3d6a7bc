//! Rectangle (horizontal channel) detector

use std::collections::HashMap;

use tracing::trace;

use super::helpers::{coefficient_of_variation, normalized_slope, percentile};
use crate::{
    params::{get_period, get_ratio, ParamMeta, ParameterizedDetector},
    ChartDetector, DetectorMetadata, FeatureSet, PatternError, PatternType, Period, PriceArrays,
    Ratio, Result,
};

/// Sideways channel: closes stay between the 10th percentile of lows and the 90th
/// percentile of highs while neither the closes nor the boundaries trend.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RectangleDetector {
    pub min_bars: Period,
    /// Percentile of highs used as the upper boundary
    pub upper_percentile: Ratio,
    /// Percentile of lows used as the lower boundary
    pub lower_percentile: Ratio,
    /// Fraction of closes inside the band must exceed this
    pub min_in_range: Ratio,
    /// |normalized slope of closes| must stay below this
    pub max_slope: Ratio,
    /// |normalized slope| of highs and of lows must stay below this
    pub max_boundary_slope: Ratio,
    pub min_volatility: Ratio,
    pub max_volatility: Ratio,
}

impl Default for RectangleDetector {
    fn default() -> Self {
        Self {
            min_bars: Period::new_const(20),
            upper_percentile: Ratio::new_const(0.9),
            lower_percentile: Ratio::new_const(0.1),
            min_in_range: Ratio::new_const(0.7),
            max_slope: Ratio::new_const(0.01),
            max_boundary_slope: Ratio::new_const(0.015),
            min_volatility: Ratio::new_const(0.05),
            max_volatility: Ratio::new_const(0.25),
        }
    }
}

impl ChartDetector for RectangleDetector {
    fn id(&self) -> &'static str {
        "RECTANGLE"
    }

    fn min_bars(&self) -> usize {
        self.min_bars.get()
    }

    fn detect(&self, prices: &PriceArrays, _features: &FeatureSet) -> Option<PatternType> {
        let closes = &prices.closes;
        let n = closes.len();
        if n < self.min_bars.get() {
            return None;
        }

        let upper = percentile(&prices.highs, self.upper_percentile.get())?;
        let lower = percentile(&prices.lows, self.lower_percentile.get())?;
        let inside = closes.iter().filter(|c| (lower..=upper).contains(*c)).count();
        let in_range = inside as f64 / n as f64;

        let slope = normalized_slope(closes).abs();
        let volatility = coefficient_of_variation(closes);
        let high_slope = normalized_slope(&prices.highs).abs();
        let low_slope = normalized_slope(&prices.lows).abs();
        trace!(in_range, slope, volatility, high_slope, low_slope, "rectangle statistics");

        let boundaries_flat = high_slope < self.max_boundary_slope.get()
            && low_slope < self.max_boundary_slope.get();
        let volatility_in_band =
            volatility > self.min_volatility.get() && volatility < self.max_volatility.get();

        (in_range > self.min_in_range.get()
            && slope < self.max_slope.get()
            && boundaries_flat
            && volatility_in_band)
            .then_some(PatternType::Rectangle)
    }

    fn validate_config(&self) -> Result<()> {
        if self.min_volatility >= self.max_volatility {
            return Err(PatternError::InvalidConfig(
                "rectangle min_volatility must be below max_volatility".to_string(),
            ));
        }
        if self.lower_percentile >= self.upper_percentile {
            return Err(PatternError::InvalidConfig(
                "rectangle lower_percentile must be below upper_percentile".to_string(),
            ));
        }
        Ok(())
    }

    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            name: "Rectangle",
            description: "Range-bound consolidation between flat boundaries",
            emits: &[PatternType::Rectangle],
        }
    }
}

static RECTANGLE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("min_bars", 20.0, (20.0, 120.0, 10.0), "Minimum series length"),
    ParamMeta::ratio("upper_percentile", 0.9, (0.75, 0.95, 0.05), "Percentile of highs for the upper boundary"),
    ParamMeta::ratio("lower_percentile", 0.1, (0.05, 0.25, 0.05), "Percentile of lows for the lower boundary"),
    ParamMeta::ratio("min_in_range", 0.7, (0.5, 0.9, 0.05), "Minimum fraction of closes inside the band"),
    ParamMeta::ratio("max_slope", 0.01, (0.005, 0.02, 0.005), "Maximum |normalized slope| of closes"),
    ParamMeta::ratio("max_boundary_slope", 0.015, (0.005, 0.03, 0.005), "Maximum |normalized slope| of highs and lows"),
    ParamMeta::ratio("min_volatility", 0.05, (0.01, 0.1, 0.01), "Lower volatility bound (exclusive)"),
    ParamMeta::ratio("max_volatility", 0.25, (0.15, 0.4, 0.05), "Upper volatility bound (exclusive)"),
];

impl ParameterizedDetector for RectangleDetector {
    fn param_meta() -> &'static [ParamMeta] {
        RECTANGLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            min_bars: get_period(params, "min_bars", 20)?,
            upper_percentile: get_ratio(params, "upper_percentile", 0.9)?,
            lower_percentile: get_ratio(params, "lower_percentile", 0.1)?,
            min_in_range: get_ratio(params, "min_in_range", 0.7)?,
            max_slope: get_ratio(params, "max_slope", 0.01)?,
            max_boundary_slope: get_ratio(params, "max_boundary_slope", 0.015)?,
            min_volatility: get_ratio(params, "min_volatility", 0.05)?,
            max_volatility: get_ratio(params, "max_volatility", 0.25)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn detector_id_str() -> &'static str {
        "RECTANGLE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::extract_features;

    fn oscillation(amplitude: f64) -> PriceArrays {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + amplitude * (2.0 * std::f64::consts::PI * i as f64 / 10.0).sin())
            .collect();
        PriceArrays {
            highs: closes.iter().map(|c| c + 1.0).collect(),
            lows: closes.iter().map(|c| c - 1.0).collect(),
            volumes: vec![0.0; closes.len()],
            closes,
        }
    }

    fn detect(detector: &RectangleDetector, prices: &PriceArrays) -> Option<PatternType> {
        let features = extract_features(prices).unwrap();
        detector.detect(prices, &features)
    }

    #[test]
    fn test_oscillation_inside_band() {
        let prices = oscillation(10.0);
        assert_eq!(detect(&RectangleDetector::default(), &prices), Some(PatternType::Rectangle));
    }

    #[test]
    fn test_quiet_oscillation_below_volatility_band() {
        // volatility ~0.014 is under the 0.05 floor
        let prices = oscillation(2.0);
        assert_eq!(detect(&RectangleDetector::default(), &prices), None);

        let mut params = HashMap::new();
        params.insert("min_volatility", 0.01);
        let relaxed = RectangleDetector::with_params(&params).unwrap();
        assert_eq!(detect(&relaxed, &prices), Some(PatternType::Rectangle));
    }

    #[test]
    fn test_with_params_rejects_inverted_band() {
        let mut params = HashMap::new();
        params.insert("min_volatility", 0.3);
        assert!(RectangleDetector::with_params(&params).is_err());
    }

    #[test]
    fn test_params_cover_every_field() {
        let names: Vec<_> = RectangleDetector::param_meta().iter().map(|p| p.name).collect();
        assert_eq!(names.len(), 8);
        assert!(names.contains(&"max_volatility"));
    }
}
