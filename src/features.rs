//! Shape features extracted once per price series
//!
//! A [`FeatureSet`] is the shared read-only input of every detector in the cascade.
//! Extraction needs at least [`MIN_FEATURE_BARS`] bars with finite closes and
//! otherwise returns `None`, which callers treat as "insufficient data".

use crate::detectors::helpers::{
    extrema_window, linear_fit, local_extrema, mean, min_max, population_std, EPSILON,
};
use crate::{PriceArrays, OHLCV};

/// Minimum number of bars for feature extraction
pub const MIN_FEATURE_BARS: usize = 10;

/// Extrema window divisor used during feature extraction: `max(3, n / 20)`
pub const FEATURE_EXTREMA_DIVISOR: usize = 20;

/// Nine scalar statistics describing the overall shape of a series
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureSet {
    /// Linear-regression slope of closes divided by the mean close
    pub trend_slope: f64,
    /// Population std of closes divided by their mean
    pub volatility: f64,
    /// (max - min) / mean of closes
    pub price_range: f64,
    pub peak_count: usize,
    pub valley_count: usize,
    /// Highest peak close / mean close, 0 when there are no peaks
    pub peak_ratio: f64,
    /// Lowest valley close / mean close, 0 when there are no valleys
    pub valley_ratio: f64,
    /// 1 - |mean(first half) - mean(second half)| / mean
    pub symmetry_score: f64,
    /// 1 - std(detrended) / std(closes)
    pub consolidation_ratio: f64,
}

impl FeatureSet {
    /// Extract features directly from bars
    pub fn from_bars<T: OHLCV>(bars: &[T]) -> Option<Self> {
        extract_features(&PriceArrays::from_bars(bars))
    }

    /// True when every scalar is finite
    pub fn is_finite(&self) -> bool {
        [
            self.trend_slope,
            self.volatility,
            self.price_range,
            self.peak_ratio,
            self.valley_ratio,
            self.symmetry_score,
            self.consolidation_ratio,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Compute the [`FeatureSet`] of a series.
///
/// Returns `None` for fewer than [`MIN_FEATURE_BARS`] bars or when any close is
/// not finite.
pub fn extract_features(prices: &PriceArrays) -> Option<FeatureSet> {
    let closes = &prices.closes;
    let n = closes.len();
    if n < MIN_FEATURE_BARS || closes.iter().any(|c| !c.is_finite()) {
        return None;
    }

    let mean_close = mean(closes);
    let std_close = population_std(closes);
    let (min_close, max_close) = min_max(closes)?;

    let fit = linear_fit(closes);
    let trend_slope = fit.slope / (mean_close + EPSILON);
    let volatility = std_close / (mean_close + EPSILON);
    let price_range = (max_close - min_close) / (mean_close + EPSILON);

    let extrema = local_extrema(closes, extrema_window(n, FEATURE_EXTREMA_DIVISOR));
    let peak_ratio = extrema
        .peaks
        .iter()
        .map(|&i| closes[i])
        .reduce(f64::max)
        .map_or(0.0, |peak| peak / (mean_close + EPSILON));
    let valley_ratio = extrema
        .valleys
        .iter()
        .map(|&i| closes[i])
        .reduce(f64::min)
        .map_or(0.0, |valley| valley / (mean_close + EPSILON));

    let (first_half, second_half) = closes.split_at(n / 2);
    let symmetry_score =
        1.0 - (mean(first_half) - mean(second_half)).abs() / (mean_close + EPSILON);

    // Line anchored at the first close; the offset does not change the std.
    let detrended: Vec<f64> = closes
        .iter()
        .enumerate()
        .map(|(i, c)| c - (fit.slope * i as f64 + closes[0]))
        .collect();
    let consolidation_ratio = 1.0 - population_std(&detrended) / (std_close + EPSILON);

    Some(FeatureSet {
        trend_slope,
        volatility,
        price_range,
        peak_count: extrema.peaks.len(),
        valley_count: extrema.valleys.len(),
        peak_ratio,
        valley_ratio,
        symmetry_score,
        consolidation_ratio,
    })
}
