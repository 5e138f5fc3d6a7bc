//! Calendar windows for period-over-period comparisons
//!
//! A window is an inclusive date range. Month arithmetic clamps to the end of the
//! month, so one month before March 31st is February 28th/29th.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, Months, NaiveDate};

use crate::{PatternError, Result};

/// Minimum trading days a window should cover
pub const DEFAULT_MIN_TRADING_DAYS: usize = 30;

/// Accepted input formats for [`parse_date`]
pub const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

// ============================================================
// PERIOD TYPE
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PeriodType {
    #[default]
    ThreeMonths,
    SixMonths,
    NineMonths,
    TwelveMonths,
    Custom,
}

impl PeriodType {
    /// Month count, `None` for custom windows
    pub fn months(self) -> Option<u32> {
        match self {
            PeriodType::ThreeMonths => Some(3),
            PeriodType::SixMonths => Some(6),
            PeriodType::NineMonths => Some(9),
            PeriodType::TwelveMonths => Some(12),
            PeriodType::Custom => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PeriodType::ThreeMonths => "3m",
            PeriodType::SixMonths => "6m",
            PeriodType::NineMonths => "9m",
            PeriodType::TwelveMonths => "12m",
            PeriodType::Custom => "custom",
        }
    }
}

impl FromStr for PeriodType {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "3m" => Ok(PeriodType::ThreeMonths),
            "6m" => Ok(PeriodType::SixMonths),
            "9m" => Ok(PeriodType::NineMonths),
            "12m" => Ok(PeriodType::TwelveMonths),
            "custom" => Ok(PeriodType::Custom),
            other => Err(PatternError::InvalidPeriod(other.to_string())),
        }
    }
}

impl TryFrom<String> for PeriodType {
    type Error = PatternError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<PeriodType> for String {
    fn from(p: PeriodType) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// WINDOWS
// ============================================================

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Calendar days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Current window and the equal-length window right before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PeriodWindows {
    pub current: DateRange,
    pub previous: DateRange,
}

fn date_error(what: &str, date: NaiveDate) -> PatternError {
    PatternError::InvalidDate(format!("{what} out of range from {date}"))
}

fn months_back_plus_one_day(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_sub_months(Months::new(months))
        .and_then(|d| d.checked_add_days(Days::new(1)))
        .ok_or_else(|| date_error("month window", date))
}

fn day_before(date: NaiveDate) -> Result<NaiveDate> {
    date.pred_opt().ok_or_else(|| date_error("previous day", date))
}

/// Windows of `months` months ending on `end`
pub fn period_windows(end: NaiveDate, months: u32) -> Result<PeriodWindows> {
    let current_start = months_back_plus_one_day(end, months)?;
    let previous_end = day_before(current_start)?;
    let previous_start = months_back_plus_one_day(previous_end, months)?;
    Ok(PeriodWindows {
        current: DateRange {
            start: current_start,
            end,
        },
        previous: DateRange {
            start: previous_start,
            end: previous_end,
        },
    })
}

/// Custom window `start..=end`; the previous window is shifted back by its length
pub fn custom_windows(start: NaiveDate, end: NaiveDate) -> Result<PeriodWindows> {
    if end < start {
        return Err(PatternError::InvalidDate(format!(
            "custom window ends ({end}) before it starts ({start})"
        )));
    }
    let current = DateRange { start, end };
    let previous_end = day_before(start)?;
    let previous_start = previous_end
        .checked_sub_days(Days::new((current.days() - 1) as u64))
        .ok_or_else(|| date_error("custom window", start))?;
    Ok(PeriodWindows {
        current,
        previous: DateRange {
            start: previous_start,
            end: previous_end,
        },
    })
}

// ============================================================
// TRADING CALENDAR
// ============================================================

/// Number of trading days inside `start..=end`
pub fn trading_days_count(start: NaiveDate, end: NaiveDate, trading_days: &[NaiveDate]) -> usize {
    trading_days
        .iter()
        .filter(|d| start <= **d && **d <= end)
        .count()
}

/// Move `start` back over `trading_days` (sorted ascending) until the window holds
/// `min_days` trading days, or the calendar runs out.
pub fn adjust_start_for_min_days(
    start: NaiveDate,
    end: NaiveDate,
    min_days: usize,
    trading_days: &[NaiveDate],
) -> NaiveDate {
    let have = trading_days_count(start, end, trading_days);
    if have >= min_days {
        return start;
    }
    trading_days
        .iter()
        .rev()
        .filter(|d| **d < start)
        .take(min_days - have)
        .last()
        .copied()
        .unwrap_or(start)
}

// ============================================================
// DATES
// ============================================================

/// Parse `YYYY-MM-DD`, `YYYY/MM/DD` or `YYYYMMDD`
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| PatternError::InvalidDate(s.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// ============================================================
// CALCULATOR
// ============================================================

/// Description of one window in a [`PeriodInfo`]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WindowInfo {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub months: Option<u32>,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PeriodInfo {
    pub period_type: PeriodType,
    pub current: WindowInfo,
    pub previous: WindowInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PeriodCalculator {
    pub min_trading_days: usize,
}

impl Default for PeriodCalculator {
    fn default() -> Self {
        Self {
            min_trading_days: DEFAULT_MIN_TRADING_DAYS,
        }
    }
}

impl PeriodCalculator {
    /// Windows for a period type. Custom periods need both `custom` dates.
    pub fn calculate_windows(
        &self,
        end: NaiveDate,
        period_type: PeriodType,
        custom: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<PeriodWindows> {
        match (period_type.months(), custom) {
            (Some(months), _) => period_windows(end, months),
            (None, Some((start, custom_end))) => custom_windows(start, custom_end),
            (None, None) => Err(PatternError::InvalidPeriod(
                "custom period requires start and end dates".to_string(),
            )),
        }
    }

    pub fn period_info(
        &self,
        end: NaiveDate,
        period_type: PeriodType,
        custom: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<PeriodInfo> {
        let windows = self.calculate_windows(end, period_type, custom)?;
        let describe = |range: DateRange| WindowInfo {
            start: range.start,
            end: range.end,
            months: period_type.months(),
            days: range.days(),
        };
        Ok(PeriodInfo {
            period_type,
            current: describe(windows.current),
            previous: describe(windows.previous),
        })
    }

    /// Start date widened to cover at least `min_trading_days` bars
    pub fn adjusted_start(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        trading_days: &[NaiveDate],
    ) -> NaiveDate {
        adjust_start_for_min_days(start, end, self.min_trading_days, trading_days)
    }
}
