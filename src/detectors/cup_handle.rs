//! Cup-with-handle detector

use tracing::trace;

use super::helpers::{argmax, min_max, EPSILON};
use crate::{
    ChartDetector, DetectorMetadata, FeatureSet, PatternError, PatternType, PriceArrays, Result,
};

/// Rim high in the middle of the window, a cup of bounded depth, then a short
/// shallow handle.
///
/// Depth and handle bounds are inclusive.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CupHandleDetector {
    pub min_bars: usize,
    /// Earliest position of the highest close, as a fraction of the series
    pub rim_start: f64,
    /// Latest position of the highest close
    pub rim_end: f64,
    /// The cup spans at least this fraction of the series
    pub cup_fraction: f64,
    pub min_depth: f64,
    pub max_depth: f64,
    /// Handle length is `n / handle_divisor` bars
    pub handle_divisor: usize,
    pub min_handle_bars: usize,
    pub min_handle_range: f64,
    pub max_handle_range: f64,
}

impl Default for CupHandleDetector {
    fn default() -> Self {
        Self {
            min_bars: 40,
            rim_start: 0.3,
            rim_end: 0.6,
            cup_fraction: 0.7,
            min_depth: 0.15,
            max_depth: 0.5,
            handle_divisor: 8,
            min_handle_bars: 5,
            min_handle_range: 0.02,
            max_handle_range: 0.1,
        }
    }
}

impl ChartDetector for CupHandleDetector {
    fn id(&self) -> &'static str {
        "CUP_HANDLE"
    }

    fn min_bars(&self) -> usize {
        self.min_bars
    }

    fn detect(&self, prices: &PriceArrays, _features: &FeatureSet) -> Option<PatternType> {
        let closes = &prices.closes;
        let n = closes.len();
        if n < self.min_bars {
            return None;
        }

        let max_idx = argmax(closes)?;
        let nf = n as f64;
        if max_idx < (nf * self.rim_start) as usize || max_idx > (nf * self.rim_end) as usize {
            return None;
        }

        let cup_end = (nf * self.cup_fraction).max((max_idx + n / 10) as f64) as usize;
        let cup_end = cup_end.min(n);
        let (cup_min, cup_max) = min_max(&closes[..cup_end])?;
        let depth = (cup_max - cup_min) / (cup_max + EPSILON);
        if depth < self.min_depth || depth > self.max_depth {
            return None;
        }

        let handle_end = n.min(cup_end + n / self.handle_divisor);
        if handle_end - cup_end < self.min_handle_bars {
            return None;
        }
        let (handle_min, handle_max) = min_max(&closes[cup_end..handle_end])?;
        let handle_range = (handle_max - handle_min) / (cup_max + EPSILON);
        trace!(max_idx, depth, handle_range, "cup and handle");

        (handle_range >= self.min_handle_range && handle_range <= self.max_handle_range)
            .then_some(PatternType::CupHandle)
    }

    fn validate_config(&self) -> Result<()> {
        if self.handle_divisor == 0 {
            return Err(PatternError::InvalidConfig(
                "cup handle_divisor must be > 0".to_string(),
            ));
        }
        if self.min_depth > self.max_depth || self.min_handle_range > self.max_handle_range {
            return Err(PatternError::InvalidConfig(
                "cup bounds must satisfy min <= max".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.rim_start)
            || !(self.rim_start..=1.0).contains(&self.rim_end)
        {
            return Err(PatternError::InvalidConfig(
                "cup rim window must satisfy 0 <= rim_start <= rim_end <= 1".to_string(),
            ));
        }
        Ok(())
    }

    fn metadata(&self) -> DetectorMetadata {
        DetectorMetadata {
            name: "Cup with handle",
            description: "Rounded dip followed by a shallow pullback",
            emits: &[PatternType::CupHandle],
        }
    }
}
