//! Return statistics over a period of closes
//!
//! Every function drops non-finite closes first and returns `None` when fewer than
//! two closes remain.

use crate::detectors::helpers::{mean, min_max, sample_std};
use crate::indicators::pct_change;

// ============================================================
// CONFIGURATION
// ============================================================

/// Defaults used by the period statistics
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReturnCalculator {
    /// Annual risk-free rate for the Sharpe ratio
    pub risk_free_rate: f64,
    pub trading_days: usize,
    /// Trailing window for drawdown and rebound, in bars
    pub drawdown_window: usize,
    /// Minimum closes for [`return_volatility`]
    pub volatility_window: usize,
}

impl Default for ReturnCalculator {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.03,
            trading_days: 252,
            drawdown_window: 252,
            volatility_window: 20,
        }
    }
}

impl ReturnCalculator {
    pub fn period_return(&self, closes: &[f64]) -> Option<f64> {
        period_return(closes)
    }

    pub fn max_drawdown(&self, closes: &[f64]) -> Option<f64> {
        max_drawdown(closes, self.drawdown_window)
    }

    pub fn max_rebound(&self, closes: &[f64]) -> Option<f64> {
        max_rebound(closes, self.drawdown_window)
    }

    pub fn sharpe_ratio(&self, closes: &[f64]) -> Option<f64> {
        sharpe_ratio(closes, self.risk_free_rate, self.trading_days)
    }

    /// Full statistics for one period, `None` for fewer than two closes
    pub fn period_stats(&self, closes: &[f64]) -> Option<PeriodStats> {
        let closes = finite(closes);
        if closes.len() < 2 {
            return None;
        }
        let (min_close, max_close) = min_max(&closes)?;
        Some(PeriodStats {
            start_close: closes[0],
            end_close: closes[closes.len() - 1],
            period_return: period_return(&closes),
            max_close,
            min_close,
            max_drawdown: max_drawdown(&closes, self.drawdown_window),
            max_gain: max_gain(&closes),
            volatility: return_volatility(&closes, self.volatility_window),
            trading_days: closes.len(),
        })
    }

    /// Statistics for both periods plus the return difference
    pub fn compare_periods(&self, current: &[f64], previous: &[f64]) -> PeriodComparison {
        let current = self.period_stats(current);
        let previous = self.period_stats(previous);
        let curr_return = current.as_ref().and_then(|s| s.period_return);
        let prev_return = previous.as_ref().and_then(|s| s.period_return);
        // a zero return on either side leaves the difference unset
        let return_diff = match (curr_return, prev_return) {
            (Some(c), Some(p)) if c != 0.0 && p != 0.0 => Some(c - p),
            _ => None,
        };
        PeriodComparison {
            current,
            previous,
            curr_return,
            prev_return,
            return_diff,
        }
    }
}

// ============================================================
// AGGREGATES
// ============================================================

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PeriodStats {
    pub start_close: f64,
    pub end_close: f64,
    pub period_return: Option<f64>,
    pub max_close: f64,
    pub min_close: f64,
    pub max_drawdown: Option<f64>,
    pub max_gain: Option<f64>,
    pub volatility: Option<f64>,
    pub trading_days: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PeriodComparison {
    pub current: Option<PeriodStats>,
    pub previous: Option<PeriodStats>,
    pub curr_return: Option<f64>,
    pub prev_return: Option<f64>,
    pub return_diff: Option<f64>,
}

// ============================================================
// STATISTICS
// ============================================================

fn finite(closes: &[f64]) -> Vec<f64> {
    closes.iter().copied().filter(|c| c.is_finite()).collect()
}

/// `last / first - 1`
pub fn period_return(closes: &[f64]) -> Option<f64> {
    let closes = finite(closes);
    if closes.len() < 2 || closes[0] == 0.0 {
        return None;
    }
    Some(closes[closes.len() - 1] / closes[0] - 1.0)
}

/// Worst decline from a trailing `window`-bar high
pub fn max_drawdown(closes: &[f64], window: usize) -> Option<f64> {
    let closes = finite(closes);
    if closes.len() < 2 || window == 0 {
        return None;
    }
    (0..closes.len())
        .filter_map(|i| {
            let start = (i + 1).saturating_sub(window);
            let (_, peak) = min_max(&closes[start..=i])?;
            (peak != 0.0).then(|| (peak - closes[i]) / peak)
        })
        .reduce(f64::max)
}

/// Largest rise above a trailing `window`-bar low
pub fn max_rebound(closes: &[f64], window: usize) -> Option<f64> {
    let closes = finite(closes);
    if closes.len() < 2 || window == 0 {
        return None;
    }
    (0..closes.len())
        .filter_map(|i| {
            let start = (i + 1).saturating_sub(window);
            let (trough, _) = min_max(&closes[start..=i])?;
            (trough != 0.0).then(|| (closes[i] - trough) / trough)
        })
        .reduce(f64::max)
}

/// `(max - min) / min` over the whole period
pub fn max_gain(closes: &[f64]) -> Option<f64> {
    let closes = finite(closes);
    if closes.len() < 2 {
        return None;
    }
    let (lo, hi) = min_max(&closes)?;
    (lo != 0.0).then(|| (hi - lo) / lo)
}

fn daily_returns(closes: &[f64]) -> Vec<f64> {
    pct_change(closes).into_iter().flatten().collect()
}

/// Sample std of daily percentage changes. `None` for fewer than `window` closes.
pub fn return_volatility(closes: &[f64], window: usize) -> Option<f64> {
    let closes = finite(closes);
    if closes.len() < window.max(2) {
        return None;
    }
    sample_std(&daily_returns(&closes))
}

/// Annualized Sharpe ratio of daily returns. `None` when returns have no spread.
pub fn sharpe_ratio(closes: &[f64], risk_free_rate: f64, trading_days: usize) -> Option<f64> {
    let closes = finite(closes);
    if closes.len() < 2 {
        return None;
    }
    let returns = daily_returns(&closes);
    let std = sample_std(&returns).filter(|s| *s != 0.0)?;
    let days = trading_days as f64;
    let annual_return = mean(&returns) * days;
    let annual_volatility = std * days.sqrt();
    Some((annual_return - risk_free_rate) / annual_volatility)
}

/// Format a fractional return as a percentage string, e.g. `0.1523` -> `"15.23%"`
pub fn format_return_pct(value: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, value * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_return() {
        assert!((period_return(&[100.0, 90.0, 115.0]).unwrap() - 0.15).abs() < 1e-12);
        assert_eq!(period_return(&[100.0]), None);
        assert_eq!(period_return(&[0.0, 5.0]), None);
        // NaN closes are dropped before the first/last lookup
        assert!((period_return(&[f64::NAN, 100.0, 110.0]).unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_drawdown_and_rebound() {
        let closes = [100.0, 120.0, 90.0, 110.0, 80.0, 100.0];
        assert!((max_drawdown(&closes, 252).unwrap() - (120.0 - 80.0) / 120.0).abs() < 1e-12);
        assert!((max_rebound(&closes, 252).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_drawdown_window_forgets_old_highs() {
        let closes = [200.0, 100.0, 100.0, 100.0, 95.0];
        // with a 2-bar window the 200 high drops out after one bar
        assert!((max_drawdown(&closes, 2).unwrap() - 0.5).abs() < 1e-12);
        let closes = [200.0, 150.0, 100.0, 100.0, 95.0];
        let windowed = max_drawdown(&closes, 2).unwrap();
        assert!((windowed - 1.0 / 3.0).abs() < 1e-12);
        assert!((max_drawdown(&closes, 252).unwrap() - 0.525).abs() < 1e-12);
    }

    #[test]
    fn test_max_gain() {
        assert!((max_gain(&[120.0, 80.0, 100.0]).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(max_gain(&[0.0, 1.0]), None);
    }

    #[test]
    fn test_volatility_needs_window() {
        let closes: Vec<f64> = (0..19).map(|i| 100.0 + (i % 2) as f64).collect();
        assert_eq!(return_volatility(&closes, 20), None);
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 2) as f64).collect();
        assert!(return_volatility(&closes, 20).unwrap() > 0.0);
    }

    #[test]
    fn test_sharpe() {
        assert_eq!(sharpe_ratio(&[100.0, 100.0, 100.0], 0.03, 252), None);
        let closes = [100.0, 102.0, 101.0, 104.0, 103.0, 106.0];
        assert!(sharpe_ratio(&closes, 0.03, 252).unwrap() > 0.0);
    }

    #[test]
    fn test_format_return_pct() {
        assert_eq!(format_return_pct(0.1523, 2), "15.23%");
        assert_eq!(format_return_pct(-0.05, 1), "-5.0%");
    }

    #[test]
    fn test_compare_periods() {
        let calc = ReturnCalculator::default();
        let cmp = calc.compare_periods(&[100.0, 110.0], &[100.0, 105.0]);
        assert!((cmp.return_diff.unwrap() - 0.05).abs() < 1e-12);
        assert_eq!(cmp.current.unwrap().trading_days, 2);

        let flat = calc.compare_periods(&[100.0, 110.0], &[100.0, 100.0]);
        assert_eq!(flat.prev_return, Some(0.0));
        assert_eq!(flat.return_diff, None);

        let missing = calc.compare_periods(&[100.0, 110.0], &[]);
        assert!(missing.previous.is_none());
        assert_eq!(missing.return_diff, None);
    }
}
