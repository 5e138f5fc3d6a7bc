//! Numeric primitives shared by the feature extractor, the detectors and the encoder
//!
//! Every ratio divides by `denominator + EPSILON` so that flat or near-zero series
//! never produce inf/NaN. Changing [`EPSILON`] moves classification boundaries on
//! low-volatility series.

// ============================================================
// CONSTANTS
// ============================================================

/// Additive guard for every ratio denominator
pub const EPSILON: f64 = 1e-8;

/// Lower bound for the local-extrema comparison window
pub const MIN_EXTREMA_WINDOW: usize = 3;

// ============================================================
// BASIC STATISTICS
// ============================================================

/// Arithmetic mean. Returns 0.0 for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (ddof = 0)
#[inline]
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Sample standard deviation (ddof = 1). `None` for fewer than 2 values.
#[inline]
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// `std / (mean + EPSILON)`
#[inline]
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    population_std(values) / (mean(values) + EPSILON)
}

/// Index of the first maximum value
#[inline]
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, v) in values.iter().enumerate() {
        match best {
            Some(b) if *v <= values[b] => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Min and max of a slice, `None` when empty
#[inline]
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is a fraction in `0.0..=1.0` (0.9 is the 90th percentile).
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

// ============================================================
// REGRESSION
// ============================================================

/// Ordinary least-squares line through `(index, value)` pairs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    #[inline]
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit `value = slope * index + intercept` over indices `0..n`.
///
/// A single point (or none) yields a flat line.
pub fn linear_fit(values: &[f64]) -> LinearFit {
    let n = values.len();
    if n < 2 {
        return LinearFit {
            slope: 0.0,
            intercept: values.first().copied().unwrap_or(0.0),
        };
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);
    let (sxx, sxy) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sxx, sxy), (i, y)| {
            let dx = i as f64 - x_mean;
            (sxx + dx * dx, sxy + dx * (y - y_mean))
        });
    let slope = sxy / sxx;
    LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
    }
}

/// Regression slope divided by the mean value, comparable across price scales
#[inline]
pub fn normalized_slope(values: &[f64]) -> f64 {
    linear_fit(values).slope / (mean(values) + EPSILON)
}

/// Coefficient of determination of the linear fit
pub fn r_squared(values: &[f64], fit: &LinearFit) -> f64 {
    let m = mean(values);
    let (ss_res, ss_tot) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(res, tot), (i, y)| {
            let err = y - fit.predict(i as f64);
            (res + err * err, tot + (y - m).powi(2))
        });
    1.0 - ss_res / (ss_tot + EPSILON)
}

/// Leading coefficient `a` of the least-squares parabola `a*x^2 + b*x + c`.
///
/// Solved on indices centered at the midpoint: odd moments vanish there and `a`
/// is invariant under the shift.
pub fn quadratic_coefficient(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let center = (n - 1) as f64 / 2.0;
    let (mut s2, mut s4, mut sy, mut st2y) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let t = i as f64 - center;
        let t2 = t * t;
        s2 += t2;
        s4 += t2 * t2;
        sy += y;
        st2y += t2 * y;
    }
    let s0 = n as f64;
    let denom = s0 * s4 - s2 * s2;
    if denom.abs() <= f64::EPSILON {
        return 0.0;
    }
    (s0 * st2y - s2 * sy) / denom
}

// ============================================================
// LOCAL EXTREMA
// ============================================================

/// Window for local extrema: `max(3, n / divisor)`
#[inline]
pub fn extrema_window(len: usize, divisor: usize) -> usize {
    MIN_EXTREMA_WINDOW.max(len / divisor.max(1))
}

/// Indices of local maxima and minima
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extrema {
    pub peaks: Vec<usize>,
    pub valleys: Vec<usize>,
}

/// Indices `i` where `cmp(values[i], neighbour)` holds for every neighbour within
/// `order` positions on both sides. Neighbour indices are clipped to the slice, so
/// the first and last points compare against themselves and never qualify.
fn relative_extrema(values: &[f64], order: usize, cmp: impl Fn(f64, f64) -> bool) -> Vec<usize> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .filter(|&i| {
            (1..=order).all(|shift| {
                let right = (i + shift).min(n - 1);
                let left = i.saturating_sub(shift);
                cmp(values[i], values[right]) && cmp(values[i], values[left])
            })
        })
        .collect()
}

/// Strict local maxima within a symmetric window of `order` bars
#[inline]
pub fn local_maxima(values: &[f64], order: usize) -> Vec<usize> {
    relative_extrema(values, order, |a, b| a > b)
}

/// Strict local minima within a symmetric window of `order` bars
#[inline]
pub fn local_minima(values: &[f64], order: usize) -> Vec<usize> {
    relative_extrema(values, order, |a, b| a < b)
}

/// Peaks and valleys in one call
pub fn local_extrema(values: &[f64], order: usize) -> Extrema {
    Extrema {
        peaks: local_maxima(values, order),
        valleys: local_minima(values, order),
    }
}

// ============================================================
// PRICE-PATH STATISTICS
// ============================================================

/// `(last - first) / first`. `None` for fewer than 2 values.
#[inline]
pub fn total_return(values: &[f64]) -> Option<f64> {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) if values.len() > 1 => Some((last - first) / first),
        _ => None,
    }
}

/// Fraction of day-over-day changes that are strictly positive.
/// `None` for fewer than 2 values.
pub fn up_day_ratio(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let ups = values.windows(2).filter(|w| w[1] > w[0]).count();
    Some(ups as f64 / (values.len() - 1) as f64)
}

/// Relative shrinkage of the high-low spread between the first and last thirds:
/// `(early_range - late_range) / (early_range + EPSILON)`.
///
/// `None` when a third holds no bars.
pub fn convergence_ratio(highs: &[f64], lows: &[f64]) -> Option<f64> {
    let n = highs.len().min(lows.len());
    let third = n / 3;
    if third == 0 {
        return None;
    }
    let early_range = mean(&highs[..third]) - mean(&lows[..third]);
    let late_range = mean(&highs[n - third..n]) - mean(&lows[n - third..n]);
    Some((early_range - late_range) / (early_range + EPSILON))
}
