//! # YACPC - Yet Another Chart Pattern Classifier
//!
//! Classifies the price history of an instrument over a window into one of a fixed
//! set of chart patterns (single trend, triangle, wedge, rectangle, cup with handle,
//! head and shoulders, rounding top/bottom or "other").
//!
//! ## Quick Start
//!
//! ```rust
//! use yacpc::prelude::*;
//!
//! // Define your OHLCV data
//! struct Bar { o: f64, h: f64, l: f64, c: f64 }
//!
//! impl OHLCV for Bar {
//!     fn open(&self) -> f64 { self.o }
//!     fn high(&self) -> f64 { self.h }
//!     fn low(&self) -> f64 { self.l }
//!     fn close(&self) -> f64 { self.c }
//! }
//!
//! // Classifier with the default detector cascade
//! let classifier = ClassifierBuilder::new()
//!     .with_default_cascade()
//!     .build()
//!     .unwrap();
//!
//! // Classify your data
//! let bars: Vec<Bar> = vec![];
//! assert_eq!(classifier.classify(&bars), PatternType::Other);
//! ```

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, trace, warn};

pub mod detectors;
pub mod encoding;
pub mod features;
pub mod indicators;
pub mod params;
pub mod periods;
pub mod returns;
pub mod source;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Encoding
        encoding::{encode_pattern_features, FEATURE_VECTOR_LEN},
        // Features
        features::{extract_features, FeatureSet},
        // Parameters
        params::{get_period, get_ratio, get_threshold, ParamMeta, ParamType, ParameterizedDetector},
        // Statistics
        periods::{PeriodCalculator, PeriodType, PeriodWindows},
        returns::{PeriodStats, ReturnCalculator},
        // Data source
        source::{classify_instrument, DailyBar, InMemorySource, PriceSource},
        // Free functions
        batch_classify,
        classify,
        classify_parallel,
        classify_pattern,
        // Engine
        BuiltinDetector,
        // Core traits
        ChartDetector,
        Classification,
        Classifier,
        ClassifierBuilder,
        ClassifierConfig,
        ClassifyMode,
        Direction,
        OHLCVExt,
        // Errors
        PatternError,
        PatternType,
        Period,
        PriceArrays,
        Ratio,
        Result,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors raised at configuration and data-source seams.
///
/// Classification itself never fails: insufficient or malformed data maps to
/// [`PatternType::Other`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Invalid period type: {0}")]
    InvalidPeriod(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Data source error: {0}")]
    Source(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Bar count (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core bar trait. Volume is optional and only used by the feature encoder.
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;

    fn volume(&self) -> f64 {
        0.0
    }

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// Validate the fields the classifier reads
    fn validate(&self) -> Result<()> {
        if !(self.close().is_finite() && self.high().is_finite() && self.low().is_finite()) {
            return Err(PatternError::InvalidBar {
                index: 0,
                reason: "non-finite close/high/low",
            });
        }
        if self.high() < self.low() {
            return Err(PatternError::InvalidBar {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// PRICE ARRAYS
// ============================================================

/// Column view of a series, built once per classification call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceArrays {
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl PriceArrays {
    pub fn from_bars<T: OHLCV>(bars: &[T]) -> Self {
        let mut prices = Self {
            closes: Vec::with_capacity(bars.len()),
            highs: Vec::with_capacity(bars.len()),
            lows: Vec::with_capacity(bars.len()),
            volumes: Vec::with_capacity(bars.len()),
        };
        for bar in bars {
            prices.closes.push(bar.close());
            prices.highs.push(bar.high());
            prices.lows.push(bar.low());
            prices.volumes.push(bar.volume());
        }
        prices
    }

    /// Close-only series: highs and lows equal the closes, volumes are zero
    pub fn from_closes(closes: Vec<f64>) -> Self {
        Self {
            highs: closes.clone(),
            lows: closes.clone(),
            volumes: vec![0.0; closes.len()],
            closes,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Index of the first bar with a non-finite close, high or low
    pub fn first_invalid(&self) -> Option<usize> {
        (0..self.len()).find(|&i| {
            !(self.closes[i].is_finite()
                && self.highs.get(i).is_some_and(|v| v.is_finite())
                && self.lows.get(i).is_some_and(|v| v.is_finite()))
        })
    }
}

// ============================================================
// PATTERN TYPE
// ============================================================

/// Directional bias commonly associated with a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

/// Chart pattern categories with fixed integer codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PatternType {
    SingleUp = 1,
    SingleDown = 2,
    AscTriangle = 3,
    DescTriangle = 4,
    SymTriangle = 5,
    CupHandle = 6,
    HeadShoulderTop = 7,
    HeadShoulderBottom = 8,
    RoundTop = 9,
    RoundBottom = 10,
    Other = 11,
    AscWedge = 12,
    DescWedge = 13,
    Rectangle = 14,
}

static PATTERN_TABLE: &[(PatternType, &str)] = &[
    (PatternType::SingleUp, "single-up"),
    (PatternType::SingleDown, "single-down"),
    (PatternType::AscTriangle, "ascending triangle"),
    (PatternType::DescTriangle, "descending triangle"),
    (PatternType::SymTriangle, "symmetric triangle"),
    (PatternType::CupHandle, "cup with handle"),
    (PatternType::HeadShoulderTop, "head and shoulders top"),
    (PatternType::HeadShoulderBottom, "head and shoulders bottom"),
    (PatternType::RoundTop, "rounding top"),
    (PatternType::RoundBottom, "rounding bottom"),
    (PatternType::Other, "other"),
    (PatternType::AscWedge, "rising wedge"),
    (PatternType::DescWedge, "falling wedge"),
    (PatternType::Rectangle, "rectangle"),
];

static ALL_PATTERNS: [PatternType; 14] = [
    PatternType::SingleUp,
    PatternType::SingleDown,
    PatternType::AscTriangle,
    PatternType::DescTriangle,
    PatternType::SymTriangle,
    PatternType::CupHandle,
    PatternType::HeadShoulderTop,
    PatternType::HeadShoulderBottom,
    PatternType::RoundTop,
    PatternType::RoundBottom,
    PatternType::Other,
    PatternType::AscWedge,
    PatternType::DescWedge,
    PatternType::Rectangle,
];

impl PatternType {
    /// Stable integer code
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        ALL_PATTERNS.iter().copied().find(|p| p.code() == code)
    }

    /// Display name
    pub fn name(self) -> &'static str {
        PATTERN_TABLE
            .iter()
            .find(|(p, _)| *p == self)
            .map_or("unknown", |(_, name)| name)
    }

    /// Every category, in declaration order
    pub fn all() -> &'static [PatternType] {
        &ALL_PATTERNS
    }

    /// Returns the bias the pattern usually signals.
    ///
    /// Wedges are read as reversals: a rising wedge is bearish, a falling wedge bullish.
    pub fn typical_bias(self) -> Direction {
        match self {
            PatternType::SingleUp
            | PatternType::AscTriangle
            | PatternType::CupHandle
            | PatternType::HeadShoulderBottom
            | PatternType::RoundBottom
            | PatternType::DescWedge => Direction::Bullish,
            PatternType::SingleDown
            | PatternType::DescTriangle
            | PatternType::HeadShoulderTop
            | PatternType::RoundTop
            | PatternType::AscWedge => Direction::Bearish,
            PatternType::SymTriangle | PatternType::Rectangle | PatternType::Other => {
                Direction::Neutral
            }
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl serde::Serialize for PatternType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u8(self.code())
    }
}

impl<'de> serde::Deserialize<'de> for PatternType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let code = u8::deserialize(d)?;
        PatternType::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown pattern code {code}")))
    }
}

// ============================================================
// DETECTOR TRAIT
// ============================================================

/// Metadata about a detector
#[derive(Debug, Clone)]
pub struct DetectorMetadata {
    pub name: &'static str,
    pub description: &'static str,
    /// Categories the detector can return
    pub emits: &'static [PatternType],
}

/// One stage of the classification cascade.
///
/// Detectors are pure: they read the price columns and the shared features and
/// either name a pattern or pass.
pub trait ChartDetector: Send + Sync {
    fn id(&self) -> &'static str;
    fn min_bars(&self) -> usize;
    fn detect(&self, prices: &PriceArrays, features: &FeatureSet) -> Option<PatternType>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            name: self.id(),
            description: "",
            emits: &[],
        }
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;
use features::FeatureSet;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - fast path via enum dispatch
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
        #[serde(tag = "kind", content = "params")]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect(&self, prices: &PriceArrays, features: &FeatureSet) -> Option<PatternType> {
                match self {
                    $(Self::$variant(d) => ChartDetector::detect(d, prices, features)),*
                }
            }

            #[inline]
            pub fn id(&self) -> &'static str {
                match self {
                    $(Self::$variant(d) => ChartDetector::id(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => ChartDetector::min_bars(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => ChartDetector::validate_config(d)),*
                }
            }

            pub fn metadata(&self) -> DetectorMetadata {
                match self {
                    $(Self::$variant(d) => ChartDetector::metadata(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    Trend(TrendDetector),
    Rectangle(RectangleDetector),
    Wedge(WedgeDetector),
    Triangle(TriangleDetector),
    CupHandle(CupHandleDetector),
    HeadShoulders(HeadShouldersDetector),
    Round(RoundDetector),
}

// ============================================================
// CLASSIFIER
// ============================================================

/// How a classification is produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifyMode {
    /// Rule cascade
    #[default]
    Rule,
    /// Reserved for a learned model; currently runs the rule cascade
    Ai,
}

/// Classifier configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub mode: ClassifyMode,
    /// Series shorter than this are classified as [`PatternType::Other`].
    /// Must be at least [`DEFAULT_MIN_BARS`]; [`ClassifierBuilder::build`] rejects lower values.
    pub min_bars: usize,
    /// Reject series with non-finite close/high/low before running detectors
    pub validate_data: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            mode: ClassifyMode::Rule,
            min_bars: DEFAULT_MIN_BARS,
            validate_data: true,
        }
    }
}

/// Minimum series length for the cascade to run
pub const DEFAULT_MIN_BARS: usize = 20;

/// Label plus the features it was derived from
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Classification {
    pub pattern: PatternType,
    pub features: Option<FeatureSet>,
    /// Id of the detector that matched, `None` for the fallback
    pub detector: Option<&'static str>,
}

impl Classification {
    fn other(features: Option<FeatureSet>) -> Self {
        Self {
            pattern: PatternType::Other,
            features,
            detector: None,
        }
    }
}

/// Ordered detector cascade
pub struct Classifier {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn ChartDetector>>,
    config: ClassifierConfig,
}

impl Classifier {
    /// Classifier with the default cascade and configuration
    pub fn with_defaults() -> Self {
        Self {
            builtin: default_cascade().to_vec(),
            custom: Vec::new(),
            config: ClassifierConfig::default(),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Detector ids in evaluation order
    pub fn detector_ids(&self) -> Vec<&'static str> {
        self.builtin
            .iter()
            .map(|d| d.id())
            .chain(self.custom.iter().map(|d| d.id()))
            .collect()
    }

    // ===========================================
    // Single series
    // ===========================================

    /// Classify a series. Total: every input yields a label.
    pub fn classify<T: OHLCV>(&self, bars: &[T]) -> PatternType {
        self.classify_prices(&PriceArrays::from_bars(bars)).pattern
    }

    /// Classify and return the features alongside the label
    pub fn classify_with_features<T: OHLCV>(&self, bars: &[T]) -> Classification {
        self.classify_prices(&PriceArrays::from_bars(bars))
    }

    /// Run the cascade over prebuilt columns
    pub fn classify_prices(&self, prices: &PriceArrays) -> Classification {
        if self.config.mode == ClassifyMode::Ai {
            debug!("model mode has no backing model, using rule cascade");
        }

        if self.config.validate_data {
            if let Some(index) = prices.first_invalid() {
                warn!(index, "non-finite price in series, classifying as other");
                return Classification::other(None);
            }
        }

        let features = features::extract_features(prices);
        if prices.len() < self.config.min_bars {
            trace!(bars = prices.len(), "series too short for cascade");
            return Classification::other(features);
        }
        let Some(feature_set) = features else {
            return Classification::other(None);
        };
        if !feature_set.is_finite() {
            warn!("non-finite features, classifying as other");
            return Classification::other(features);
        }

        let len = prices.len();

        // Fast path: builtin detectors (enum dispatch, no vtable)
        for detector in &self.builtin {
            if len >= detector.min_bars() {
                if let Some(pattern) = detector.detect(prices, &feature_set) {
                    debug!(detector = detector.id(), %pattern, "pattern matched");
                    return Classification {
                        pattern,
                        features,
                        detector: Some(detector.id()),
                    };
                }
            }
        }

        // Slow path: custom detectors (vtable)
        for detector in &self.custom {
            if len >= detector.min_bars() {
                if let Some(pattern) = detector.detect(prices, &feature_set) {
                    debug!(detector = detector.id(), %pattern, "pattern matched");
                    return Classification {
                        pattern,
                        features,
                        detector: Some(detector.id()),
                    };
                }
            }
        }

        Classification::other(features)
    }

    // ===========================================
    // Batch
    // ===========================================

    /// Classify many instruments sequentially.
    pub fn classify_batch<'a, T, I>(&self, instruments: I) -> HashMap<String, Classification>
    where
        T: OHLCV + 'a,
        I: IntoIterator<Item = (&'a str, &'a [T])>,
    {
        instruments
            .into_iter()
            .map(|(id, bars)| (id.to_string(), self.classify_with_features(bars)))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.config.min_bars < DEFAULT_MIN_BARS {
            return Err(PatternError::InvalidConfig(format!(
                "min_bars must be >= {DEFAULT_MIN_BARS}, got {}",
                self.config.min_bars
            )));
        }
        for d in &self.builtin {
            d.validate_config()?;
        }
        for d in &self.custom {
            d.validate_config()?;
        }
        Ok(())
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// The default cascade in priority order
pub fn default_cascade() -> [BuiltinDetector; 7] {
    [
        BuiltinDetector::Trend(TrendDetector::default()),
        BuiltinDetector::Rectangle(RectangleDetector::default()),
        BuiltinDetector::Wedge(WedgeDetector::default()),
        BuiltinDetector::Triangle(TriangleDetector::default()),
        BuiltinDetector::CupHandle(CupHandleDetector::default()),
        BuiltinDetector::HeadShoulders(HeadShouldersDetector::default()),
        BuiltinDetector::Round(RoundDetector::default()),
    ]
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating Classifier instances
pub struct ClassifierBuilder {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn ChartDetector>>,
    config: ClassifierConfig,
}

impl Default for ClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierBuilder {
    pub fn new() -> Self {
        Self {
            builtin: Vec::new(),
            custom: Vec::new(),
            config: ClassifierConfig::default(),
        }
    }

    /// Add the seven builtin detectors in their default priority order
    pub fn with_default_cascade(mut self) -> Self {
        self.builtin.extend(default_cascade());
        self
    }

    /// Append a builtin detector to the cascade
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.builtin.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.builtin.push(detector);
        Ok(self)
    }

    /// Add a custom detector, evaluated after every builtin detector
    pub fn add_custom<D: ChartDetector + 'static>(mut self, detector: D) -> Self {
        self.custom.push(Box::new(detector));
        self
    }

    pub fn config(mut self, config: ClassifierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn mode(mut self, mode: ClassifyMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Raise the minimum series length. Values below [`DEFAULT_MIN_BARS`] fail in `build`.
    pub fn min_bars(mut self, bars: usize) -> Self {
        self.config.min_bars = bars;
        self
    }

    /// Enable/disable input validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Build the classifier
    pub fn build(self) -> Result<Classifier> {
        let classifier = Classifier {
            builtin: self.builtin,
            custom: self.custom,
            config: self.config,
        };
        classifier.validate()?;
        Ok(classifier)
    }
}

// ============================================================
// FREE FUNCTIONS
// ============================================================

/// Classify with the default cascade
pub fn classify<T: OHLCV>(bars: &[T]) -> PatternType {
    classify_pattern(bars, ClassifyMode::Rule)
}

/// Classify with the default cascade in the given mode
pub fn classify_pattern<T: OHLCV>(bars: &[T], mode: ClassifyMode) -> PatternType {
    let classifier = Classifier {
        builtin: default_cascade().to_vec(),
        custom: Vec::new(),
        config: ClassifierConfig {
            mode,
            ..ClassifierConfig::default()
        },
    };
    classifier.classify(bars)
}

/// Classify every entry of a map with the default cascade
pub fn batch_classify<T: OHLCV>(
    instruments: &HashMap<String, Vec<T>>,
) -> HashMap<String, (PatternType, Option<FeatureSet>)> {
    let classifier = Classifier::with_defaults();
    instruments
        .iter()
        .map(|(id, bars)| {
            let c = classifier.classify_with_features(bars);
            (id.clone(), (c.pattern, c.features))
        })
        .collect()
}

// ============================================================
// PARALLEL CLASSIFICATION
// ============================================================

use rayon::prelude::*;

/// Parallel classification of multiple instruments
pub fn classify_parallel<'a, T, I>(
    classifier: &Classifier,
    instruments: I,
) -> HashMap<String, Classification>
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    instruments
        .into_par_iter()
        .map(|(id, bars)| (id.to_string(), classifier.classify_with_features(bars)))
        .collect()
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Test OHLCV bar
    #[derive(Debug, Clone)]
    struct Bar {
        h: f64,
        l: f64,
        c: f64,
    }

    impl Bar {
        fn at(c: f64) -> Self {
            Self {
                h: c + 1.0,
                l: c - 1.0,
                c,
            }
        }
    }

    impl OHLCV for Bar {
        fn open(&self) -> f64 {
            self.c
        }

        fn high(&self) -> f64 {
            self.h
        }

        fn low(&self) -> f64 {
            self.l
        }

        fn close(&self) -> f64 {
            self.c
        }
    }

    fn make_uptrend_bars(n: usize) -> Vec<Bar> {
        (0..n).map(|i| Bar::at(100.0 * 1.015f64.powi(i as i32))).collect()
    }

    fn make_flat_bars(n: usize) -> Vec<Bar> {
        (0..n).map(|_| Bar::at(100.0)).collect()
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_pattern_codes_round_trip() {
        for p in PatternType::all() {
            assert_eq!(PatternType::from_code(p.code()), Some(*p));
        }
        assert_eq!(PatternType::Other.code(), 11);
        assert_eq!(PatternType::Rectangle.code(), 14);
        assert_eq!(PatternType::from_code(0), None);
        assert_eq!(PatternType::from_code(15), None);
        assert_eq!(PatternType::all().len(), 14);
    }

    #[test]
    fn test_pattern_names() {
        assert_eq!(PatternType::CupHandle.name(), "cup with handle");
        assert_eq!(PatternType::DescWedge.to_string(), "falling wedge");
        assert!(PatternType::all().iter().all(|p| p.name() != "unknown"));
    }

    #[test]
    fn test_typical_bias() {
        assert!(PatternType::SingleUp.typical_bias().is_bullish());
        assert!(PatternType::AscWedge.typical_bias().is_bearish());
        assert_eq!(PatternType::Rectangle.typical_bias(), Direction::Neutral);
    }

    #[test]
    fn test_builder_default_cascade_order() {
        let classifier = ClassifierBuilder::new()
            .with_default_cascade()
            .build()
            .unwrap();
        assert_eq!(
            classifier.detector_ids(),
            vec![
                "SINGLE_TREND",
                "RECTANGLE",
                "WEDGE",
                "TRIANGLE",
                "CUP_HANDLE",
                "HEAD_SHOULDERS",
                "ROUND"
            ]
        );
    }

    #[test]
    fn test_builder_rejects_min_bars_below_default() {
        assert!(ClassifierBuilder::new().min_bars(0).build().is_err());
        assert!(ClassifierBuilder::new().min_bars(19).build().is_err());
        assert!(ClassifierBuilder::new().min_bars(20).build().is_ok());
        let config = ClassifierConfig {
            min_bars: 10,
            ..ClassifierConfig::default()
        };
        assert!(ClassifierBuilder::new().config(config).build().is_err());
    }

    #[test]
    fn test_empty_and_short_series() {
        let classifier = Classifier::with_defaults();
        let empty: Vec<Bar> = vec![];
        assert_eq!(classifier.classify(&empty), PatternType::Other);
        assert_eq!(classifier.classify(&make_uptrend_bars(19)), PatternType::Other);
    }

    #[test]
    fn test_short_series_still_reports_features() {
        let c = Classifier::with_defaults().classify_with_features(&make_flat_bars(15));
        assert_eq!(c.pattern, PatternType::Other);
        assert!(c.features.is_some());
        assert!(c.detector.is_none());
    }

    #[test]
    fn test_uptrend_matches_trend_detector() {
        let c = Classifier::with_defaults().classify_with_features(&make_uptrend_bars(60));
        assert_eq!(c.pattern, PatternType::SingleUp);
        assert_eq!(c.detector, Some("SINGLE_TREND"));
    }

    #[test]
    fn test_flat_series_is_other() {
        assert_eq!(classify(&make_flat_bars(60)), PatternType::Other);
    }

    #[test]
    fn test_nan_input_is_other() {
        let mut bars = make_uptrend_bars(60);
        bars[10].c = f64::NAN;
        let c = Classifier::with_defaults().classify_with_features(&bars);
        assert_eq!(c.pattern, PatternType::Other);
        assert!(c.features.is_none());
    }

    #[test]
    fn test_ai_mode_matches_rule_mode() {
        let bars = make_uptrend_bars(60);
        assert_eq!(
            classify_pattern(&bars, ClassifyMode::Ai),
            classify_pattern(&bars, ClassifyMode::Rule)
        );
    }

    #[test]
    fn test_empty_builder_yields_other() {
        let classifier = ClassifierBuilder::new().build().unwrap();
        assert_eq!(classifier.classify(&make_uptrend_bars(60)), PatternType::Other);
    }

    struct AlwaysRectangle;

    impl ChartDetector for AlwaysRectangle {
        fn id(&self) -> &'static str {
            "ALWAYS_RECTANGLE"
        }

        fn min_bars(&self) -> usize {
            1
        }

        fn detect(&self, _prices: &PriceArrays, _features: &FeatureSet) -> Option<PatternType> {
            Some(PatternType::Rectangle)
        }
    }

    #[test]
    fn test_custom_detector_runs_after_builtins() {
        let classifier = ClassifierBuilder::new()
            .with_default_cascade()
            .add_custom(AlwaysRectangle)
            .build()
            .unwrap();
        assert_eq!(classifier.classify(&make_flat_bars(60)), PatternType::Rectangle);
        assert_eq!(classifier.classify(&make_uptrend_bars(60)), PatternType::SingleUp);
    }

    #[test]
    fn test_batch_classify() {
        let mut instruments = HashMap::new();
        instruments.insert("UP".to_string(), make_uptrend_bars(60));
        instruments.insert("SHORT".to_string(), make_uptrend_bars(5));
        let results = batch_classify(&instruments);
        assert_eq!(results["UP"].0, PatternType::SingleUp);
        assert!(results["UP"].1.is_some());
        assert_eq!(results["SHORT"].0, PatternType::Other);
        assert!(results["SHORT"].1.is_none());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let classifier = Classifier::with_defaults();
        let up = make_uptrend_bars(60);
        let flat = make_flat_bars(60);
        let instruments: Vec<(&str, &[Bar])> = vec![("UP", &up), ("FLAT", &flat)];

        let parallel = classify_parallel(&classifier, instruments.clone());
        let sequential = classifier.classify_batch(instruments);
        assert_eq!(parallel, sequential);
        assert_eq!(parallel["UP"].pattern, PatternType::SingleUp);
        assert_eq!(parallel["FLAT"].pattern, PatternType::Other);
    }
}
