//! Rolling technical indicators over close/high/low columns
//!
//! Rolling outputs are aligned with the input: index `i` holds the value for the
//! window ending at bar `i`, and `None` until the window is full.

use crate::detectors::helpers::{mean, sample_std};

// ============================================================
// CONFIGURATION
// ============================================================

/// Indicator periods used by the feature encoder
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ma_periods: Vec<usize>,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_window: usize,
    pub bollinger_std: f64,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub volatility_window: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_periods: vec![5, 10, 20, 60],
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_window: 20,
            bollinger_std: 2.0,
            rsi_period: 14,
            atr_period: 14,
            volatility_window: 20,
        }
    }
}

/// Trading days per year used to annualize volatility
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

// ============================================================
// MOVING AVERAGES
// ============================================================

/// Simple moving average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, mean)
}

/// Exponential moving average with `alpha = 2 / (span + 1)`, seeded with the first
/// value. Defined from the first bar.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            Some(p) => alpha * v + (1.0 - alpha) * p,
            None => v,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

fn rolling(values: &[f64], period: usize, f: impl Fn(&[f64]) -> f64) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            (period > 0 && i + 1 >= period).then(|| f(&values[i + 1 - period..=i]))
        })
        .collect()
}

// ============================================================
// MACD
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MacdPoint {
    /// Fast EMA minus slow EMA
    pub dif: f64,
    /// Signal EMA of `dif`
    pub dea: f64,
    /// `2 * (dif - dea)`
    pub hist: f64,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<MacdPoint> {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    let dif: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let dea = ema(&dif, signal);
    dif.iter()
        .zip(&dea)
        .map(|(&dif, &dea)| MacdPoint {
            dif,
            dea,
            hist: 2.0 * (dif - dea),
        })
        .collect()
}

// ============================================================
// BOLLINGER BANDS
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct BollingerPoint {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
    /// `(upper - lower) / middle`
    pub width: f64,
    /// Position of the close within the band, 0 at the lower band and 1 at the upper.
    /// `None` when the band has zero width.
    pub position: Option<f64>,
}

/// Bollinger bands using the sample standard deviation
pub fn bollinger(values: &[f64], window: usize, num_std: f64) -> Vec<Option<BollingerPoint>> {
    (0..values.len())
        .map(|i| {
            if window < 2 || i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let middle = mean(slice);
            let std = sample_std(slice)?;
            let upper = middle + num_std * std;
            let lower = middle - num_std * std;
            let band = upper - lower;
            Some(BollingerPoint {
                middle,
                upper,
                lower,
                width: band / middle,
                position: (band > 0.0).then(|| (values[i] - lower) / band),
            })
        })
        .collect()
}

// ============================================================
// OSCILLATORS
// ============================================================

/// Relative strength index from simple rolling means of gains and losses.
///
/// The first bar counts as a zero change, so the first value appears at index
/// `period - 1`. A window with no losses reads 100; a window with no movement at
/// all reads 50.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut gains = Vec::with_capacity(values.len());
    let mut losses = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let delta = if i == 0 { 0.0 } else { values[i] - values[i - 1] };
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }
    let avg_gain = sma(&gains, period);
    let avg_loss = sma(&losses, period);
    avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|(gain, loss)| {
            let (gain, loss) = (gain?, loss?);
            Some(match (gain > 0.0, loss > 0.0) {
                (_, true) => 100.0 - 100.0 / (1.0 + gain / loss),
                (true, false) => 100.0,
                (false, false) => 50.0,
            })
        })
        .collect()
}

/// Average true range (simple mean of true ranges). The first bar's true range is
/// its high-low spread.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = highs.len().min(lows.len()).min(closes.len());
    let true_ranges: Vec<f64> = (0..n)
        .map(|i| {
            let spread = highs[i] - lows[i];
            if i == 0 {
                return spread;
            }
            let prev_close = closes[i - 1];
            spread
                .max((highs[i] - prev_close).abs())
                .max((lows[i] - prev_close).abs())
        })
        .collect();
    sma(&true_ranges, period)
}

/// Day-over-day percentage changes; element 0 is `None`
pub fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| (i > 0 && values[i - 1] != 0.0).then(|| values[i] / values[i - 1] - 1.0))
        .collect()
}

/// Annualized rolling volatility: sample std of `window` percentage changes times
/// `sqrt(252)`
pub fn rolling_volatility(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let changes = pct_change(closes);
    (0..closes.len())
        .map(|i| {
            if window < 2 || i < window {
                return None;
            }
            let slice: Option<Vec<f64>> = changes[i + 1 - window..=i].iter().copied().collect();
            sample_std(&slice?).map(|s| s * TRADING_DAYS_PER_YEAR.sqrt())
        })
        .collect()
}
