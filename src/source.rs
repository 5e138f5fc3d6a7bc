//! Price data seam
//!
//! The classifier never fetches data itself. Callers inject a [`PriceSource`];
//! [`InMemorySource`] serves tests and callers that already hold the bars.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::periods::PeriodWindows;
use crate::returns::{PeriodComparison, ReturnCalculator};
use crate::{Classification, Classifier, PatternError, Result, OHLCV};

// ============================================================
// DAILY BAR
// ============================================================

/// One trading day of an instrument
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DailyBar {
    pub trade_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl OHLCV for DailyBar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    /// Midnight UTC of the trade date, in seconds
    fn timestamp(&self) -> Option<i64> {
        self.trade_date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
    }
}

// ============================================================
// SOURCE TRAIT
// ============================================================

/// Supplier of daily bars
pub trait PriceSource {
    /// Bars of `instrument_id` with `start <= trade_date <= end`, sorted ascending.
    /// An empty vector is a valid answer.
    fn fetch_price_series(
        &self,
        instrument_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>>;

    /// Most recent trade date known to the source
    fn latest_trade_date(&self) -> Result<Option<NaiveDate>> {
        Ok(None)
    }
}

/// Bars held in memory, keyed by instrument id
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: HashMap<String, Vec<DailyBar>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the bars of an instrument. Bars are stored sorted by date.
    pub fn insert(&mut self, instrument_id: impl Into<String>, mut bars: Vec<DailyBar>) {
        bars.sort_by_key(|b| b.trade_date);
        self.series.insert(instrument_id.into(), bars);
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

impl PriceSource for InMemorySource {
    fn fetch_price_series(
        &self,
        instrument_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        let bars = self
            .series
            .get(instrument_id)
            .ok_or_else(|| PatternError::Source(format!("unknown instrument {instrument_id}")))?;
        Ok(bars
            .iter()
            .filter(|b| start <= b.trade_date && b.trade_date <= end)
            .copied()
            .collect())
    }

    fn latest_trade_date(&self) -> Result<Option<NaiveDate>> {
        Ok(self
            .series
            .values()
            .filter_map(|bars| bars.last().map(|b| b.trade_date))
            .max())
    }
}

// ============================================================
// CLASSIFICATION OVER A SOURCE
// ============================================================

/// Fetch and classify one instrument.
///
/// A failing source is logged and yields [`PatternType::Other`](crate::PatternType::Other)
/// with no features.
pub fn classify_instrument<S: PriceSource + ?Sized>(
    source: &S,
    classifier: &Classifier,
    instrument_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Classification {
    match source.fetch_price_series(instrument_id, start, end) {
        Ok(bars) => {
            debug!(instrument_id, bars = bars.len(), "classifying instrument");
            classifier.classify_with_features(&bars)
        }
        Err(err) => {
            warn!(instrument_id, error = %err, "price source failed");
            classifier.classify_with_features::<DailyBar>(&[])
        }
    }
}

/// Pattern of the current window plus return statistics of both windows
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PeriodAnalysis {
    pub instrument_id: String,
    pub windows: PeriodWindows,
    pub classification: Classification,
    pub comparison: PeriodComparison,
}

/// Classify the current window and compare its returns against the previous one
pub fn analyze_period<S: PriceSource + ?Sized>(
    source: &S,
    classifier: &Classifier,
    returns: &ReturnCalculator,
    instrument_id: &str,
    windows: PeriodWindows,
) -> Result<PeriodAnalysis> {
    let current =
        source.fetch_price_series(instrument_id, windows.current.start, windows.current.end)?;
    let previous =
        source.fetch_price_series(instrument_id, windows.previous.start, windows.previous.end)?;

    let closes = |bars: &[DailyBar]| bars.iter().map(|b| b.close).collect::<Vec<_>>();
    Ok(PeriodAnalysis {
        instrument_id: instrument_id.to_string(),
        windows,
        classification: classifier.classify_with_features(&current),
        comparison: returns.compare_periods(&closes(&current), &closes(&previous)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::periods::period_windows;
    use crate::PatternType;

    fn bar(date: NaiveDate, close: f64) -> DailyBar {
        DailyBar {
            trade_date: date,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    fn daily(start: NaiveDate, closes: &[f64]) -> Vec<DailyBar> {
        closes
            .iter()
            .zip(start.iter_days())
            .map(|(c, d)| bar(d, *c))
            .collect()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_in_memory_filters_inclusive_range() {
        let mut source = InMemorySource::new();
        let mut bars = daily(day(2024, 1, 1), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        bars.reverse();
        source.insert("AAA", bars);

        let got = source
            .fetch_price_series("AAA", day(2024, 1, 2), day(2024, 1, 4))
            .unwrap();
        assert_eq!(got.iter().map(|b| b.close).collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert_eq!(source.latest_trade_date().unwrap(), Some(day(2024, 1, 5)));
        assert!(source.fetch_price_series("BBB", day(2024, 1, 1), day(2024, 1, 5)).is_err());
    }

    #[test]
    fn test_classify_instrument_maps_errors_to_other() {
        let source = InMemorySource::new();
        let c = classify_instrument(
            &source,
            &Classifier::with_defaults(),
            "MISSING",
            day(2024, 1, 1),
            day(2024, 3, 1),
        );
        assert_eq!(c.pattern, PatternType::Other);
        assert!(c.features.is_none());
    }

    #[test]
    fn test_classify_instrument_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 * 1.015f64.powi(i)).collect();
        let mut source = InMemorySource::new();
        source.insert("UP", daily(day(2024, 1, 1), &closes));
        let c = classify_instrument(
            &source,
            &Classifier::with_defaults(),
            "UP",
            day(2024, 1, 1),
            day(2024, 12, 31),
        );
        assert_eq!(c.pattern, PatternType::SingleUp);
    }

    #[test]
    fn test_bar_timestamp() {
        assert_eq!(bar(day(1970, 1, 2), 1.0).timestamp(), Some(86_400));
    }

    #[test]
    fn test_analyze_period() {
        let closes: Vec<f64> = (0..200).map(|i| 100.0 + i as f64 * 0.1).collect();
        let mut source = InMemorySource::new();
        source.insert("AAA", daily(day(2024, 1, 1), &closes));
        let end = source.latest_trade_date().unwrap().unwrap();
        let windows = period_windows(end, 3).unwrap();

        let analysis = analyze_period(
            &source,
            &Classifier::with_defaults(),
            &ReturnCalculator::default(),
            "AAA",
            windows,
        )
        .unwrap();
        assert_eq!(analysis.instrument_id, "AAA");
        assert!(analysis.comparison.curr_return.unwrap() > 0.0);
        assert!(analysis.comparison.prev_return.unwrap() > 0.0);
        assert!(analysis.comparison.return_diff.is_some());
    }
}
