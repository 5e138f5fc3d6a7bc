//! Fixed-length numeric encoding of a price window
//!
//! [`encode_pattern_features`] turns a series into a `[f32; 100]` vector suitable as
//! model input. Unused slots stay zero.
//!
//! | slots    | content                                                       |
//! |----------|---------------------------------------------------------------|
//! | 0..60    | last 60 closes, min-max normalized over the whole series      |
//! | 60..64   | peak count / 10, max peak / max close, valley count / 10, min valley / min close |
//! | 64..67   | normalized trend slope * 100, volatility, price range         |
//! | 74..78   | last SMA(5, 10, 20, 60) / last close                          |
//! | 78       | last RSI / 100                                                |
//! | 79       | last MACD histogram / last close * 10                         |
//! | 90..100  | last 10 volumes, min-max normalized over the whole series     |

use crate::detectors::helpers::{
    coefficient_of_variation, local_extrema, mean, min_max, normalized_slope, EPSILON,
};
use crate::indicators::{macd, rsi, sma, IndicatorConfig};
use crate::{PriceArrays, OHLCV};

/// Length of the encoded vector
pub const FEATURE_VECTOR_LEN: usize = 100;

/// Series shorter than this encode to all zeros
pub const MIN_ENCODE_BARS: usize = 20;

/// Extrema window used by the encoder
pub const ENCODER_EXTREMA_WINDOW: usize = 5;

const CLOSE_SLOTS: usize = 60;
const PEAK_SLOT: usize = 60;
const TREND_SLOT: usize = 64;
const MA_SLOT: usize = 74;
const RSI_SLOT: usize = 78;
const MACD_SLOT: usize = 79;
const VOLUME_SLOT: usize = 90;
const VOLUME_SLOTS: usize = 10;

/// Encode bars with the default indicator configuration
pub fn encode_pattern_features<T: OHLCV>(bars: &[T]) -> [f32; FEATURE_VECTOR_LEN] {
    encode_prices(&PriceArrays::from_bars(bars), &IndicatorConfig::default())
}

/// Encode prebuilt columns.
///
/// Slots 74..78 read the first four entries of `config.ma_periods`.
pub fn encode_prices(prices: &PriceArrays, config: &IndicatorConfig) -> [f32; FEATURE_VECTOR_LEN] {
    let mut out = [0.0f32; FEATURE_VECTOR_LEN];
    let closes = &prices.closes;
    let n = closes.len();
    if n < MIN_ENCODE_BARS || closes.iter().any(|c| !c.is_finite()) {
        return out;
    }
    let Some((min_close, max_close)) = min_max(closes) else {
        return out;
    };
    let last_close = closes[n - 1];

    let take = n.min(CLOSE_SLOTS);
    for (slot, c) in out.iter_mut().zip(&closes[n - take..]) {
        *slot = ((c - min_close) / (max_close - min_close + EPSILON)) as f32;
    }

    let extrema = local_extrema(closes, ENCODER_EXTREMA_WINDOW);
    if !extrema.peaks.is_empty() {
        let top = extrema.peaks.iter().map(|&i| closes[i]).fold(f64::MIN, f64::max);
        out[PEAK_SLOT] = (extrema.peaks.len() as f64 / 10.0) as f32;
        out[PEAK_SLOT + 1] = (top / (max_close + EPSILON)) as f32;
    }
    if !extrema.valleys.is_empty() {
        let bottom = extrema.valleys.iter().map(|&i| closes[i]).fold(f64::MAX, f64::min);
        out[PEAK_SLOT + 2] = (extrema.valleys.len() as f64 / 10.0) as f32;
        out[PEAK_SLOT + 3] = (bottom / (min_close + EPSILON)) as f32;
    }

    out[TREND_SLOT] = (normalized_slope(closes) * 100.0) as f32;
    out[TREND_SLOT + 1] = coefficient_of_variation(closes) as f32;
    out[TREND_SLOT + 2] = ((max_close - min_close) / (mean(closes) + EPSILON)) as f32;

    for (slot, &period) in out[MA_SLOT..RSI_SLOT].iter_mut().zip(&config.ma_periods) {
        let last_ma = sma(closes, period).last().copied().flatten().unwrap_or(0.0);
        *slot = (last_ma / (last_close + EPSILON)) as f32;
    }

    let last_rsi = rsi(closes, config.rsi_period)
        .last()
        .copied()
        .flatten()
        .unwrap_or(50.0);
    out[RSI_SLOT] = (last_rsi / 100.0) as f32;

    let last_hist = macd(closes, config.macd_fast, config.macd_slow, config.macd_signal)
        .last()
        .map_or(0.0, |p| p.hist);
    out[MACD_SLOT] = (last_hist / (last_close + EPSILON) * 10.0) as f32;

    // a non-finite volume leaves the whole volume block at zero
    let volumes = &prices.volumes;
    if !volumes.iter().all(|v| v.is_finite()) {
        return out;
    }
    if let Some((min_vol, max_vol)) = min_max(volumes) {
        let take = volumes.len().min(VOLUME_SLOTS);
        for (slot, v) in out[VOLUME_SLOT..].iter_mut().zip(&volumes[volumes.len() - take..]) {
            *slot = ((v - min_vol) / (max_vol - min_vol + EPSILON)) as f32;
        }
    }

    out
}
