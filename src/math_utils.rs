//! Mathematical utility functions for power-law and regime analysis.
//!
//! Ordering helpers that tolerate NaN, order statistics, closed-form
//! least squares, and the rolling-window primitives the signal modules are
//! built from. Rolling helpers operate on `Option<f64>` series: `None` marks
//! an undefined day and poisons any window that contains it, the same way a
//! full-window rolling statistic behaves on missing data.

use crate::errors::{PowerLawError, PowerLawResult};
use statrs::statistics::Statistics;

/// Numerical constants shared across the crate.
pub mod constants {
    /// Minimum spread of a regressor before a fit is considered degenerate
    pub const MIN_VARIANCE: f64 = 1e-14;
    /// Trading days per year used to annualize daily quantities
    pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
    /// Calendar days per year used to measure elapsed spans
    pub const DAYS_PER_YEAR: f64 = 365.25;
}

/// Safe comparison for floating point values (handles NaN)
pub fn float_total_cmp(a: &f64, b: &f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater, // push NaN to end
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a.total_cmp(b),
    }
}

/// Calculate median of already-sorted data (handles even-length correctly)
pub fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Calculate median (handles even-length correctly)
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut v = values.to_vec();
    v.sort_by(float_total_cmp);
    median_of_sorted(&v)
}

/// Calculate percentile from sorted data using linear interpolation.
///
/// `p` is a fraction in `[0, 1]`; values between observations are
/// interpolated linearly, matching the usual quantile definition of
/// statistical packages.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return f64::NAN;
    }

    if p <= 0.0 {
        return sorted_data[0];
    }

    if p >= 1.0 {
        return sorted_data[sorted_data.len() - 1];
    }

    let n = sorted_data.len();
    let index = p * (n - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_data[lower]
    } else {
        let weight = index - lower as f64;
        sorted_data[lower] * (1.0 - weight) + sorted_data[upper] * weight
    }
}

/// Quantile of unsorted data, ignoring NaN values.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    v.sort_by(float_total_cmp);
    percentile(&v, q)
}

/// Result of an ordinary least-squares line fit.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    /// Fitted slope
    pub slope: f64,
    /// Fitted intercept
    pub intercept: f64,
    /// Coefficient of determination on the fitted points
    pub r_squared: f64,
    /// Residuals `y - (slope * x + intercept)` in input order
    pub residuals: Vec<f64>,
}

/// Closed-form two-parameter OLS regression of `y` on `x`.
///
/// Data is centered before the sums are formed to avoid cancellation when
/// `x` has a large mean relative to its spread. `r_squared` is NaN when `y`
/// is constant.
pub fn ols_regression(x: &[f64], y: &[f64]) -> PowerLawResult<LinearFit> {
    if x.len() != y.len() {
        return Err(PowerLawError::LengthMismatch {
            field: "regression y".to_string(),
            expected: x.len(),
            actual: y.len(),
        });
    }
    if x.len() < 2 {
        return Err(PowerLawError::InsufficientData {
            required: 2,
            actual: x.len(),
        });
    }
    if !x.iter().chain(y).all(|v| v.is_finite()) {
        return Err(PowerLawError::NumericalError {
            reason: "Non-finite values in regression data".to_string(),
            operation: Some("ols_regression".to_string()),
        });
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let sxx: f64 = x.iter().map(|xi| (xi - mean_x).powi(2)).sum();
    let sxy: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
        .sum();

    if sxx <= constants::MIN_VARIANCE {
        return Err(PowerLawError::NumericalError {
            reason: "Predictor variable has zero variance (constant values)".to_string(),
            operation: Some("ols_regression".to_string()),
        });
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let residuals: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| yi - (slope * xi + intercept))
        .collect();
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let ss_tot: f64 = y.iter().map(|yi| (yi - mean_y).powi(2)).sum();
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        f64::NAN
    };

    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
        residuals,
    })
}

/// Coefficient of determination of fixed predictions against observations.
///
/// Unlike the in-sample value from [`ols_regression`] this can be negative.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> f64 {
    if observed.is_empty() || observed.len() != predicted.len() {
        return f64::NAN;
    }
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let ss_res: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| (o - p).powi(2))
        .sum();
    let ss_tot: f64 = observed.iter().map(|o| (o - mean).powi(2)).sum();
    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        f64::NAN
    }
}

/// Collect the values of a full window, or `None` if any is undefined.
fn full_window(values: &[Option<f64>]) -> Option<Vec<f64>> {
    values.iter().copied().collect()
}

/// Rolling mean over the trailing `window` values ending at each index.
///
/// The output at `i` is defined only when all of `values[i + 1 - window..=i]`
/// are defined.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_apply(values, window, |w| Some(w.mean()))
}

/// Rolling sample standard deviation (n - 1 denominator).
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_apply(values, window, |w| {
        if w.len() < 2 {
            None
        } else {
            Some(w.std_dev())
        }
    })
}

fn rolling_apply<F>(values: &[Option<f64>], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            full_window(&values[i + 1 - window..=i]).and_then(|w| f(&w))
        })
        .collect()
}

/// Median of the `window` values strictly before each index.
///
/// Undefined values inside the look-back are skipped; the median is only
/// reported when more than `min_defined` values remain. Output at `i` is
/// `None` for `i < window`.
pub fn trailing_median(
    values: &[Option<f64>],
    window: usize,
    min_defined: usize,
) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if window == 0 || i < window {
                return None;
            }
            let history: Vec<f64> = values[i - window..i].iter().flatten().copied().collect();
            if history.len() > min_defined {
                Some(median(&history))
            } else {
                None
            }
        })
        .collect()
}

/// First difference; index 0 and any index touching an undefined value is `None`.
pub fn diff(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i == 0 {
            out.push(None);
            continue;
        }
        out.push(match (values[i - 1], values[i]) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        });
    }
    out
}

/// Numerical gradient `dy/dx` on a non-uniform grid.
///
/// Interior points use second-order central differences, the two edges use
/// one-sided first-order differences. Points whose spacing collapses to
/// zero produce `None`.
pub fn gradient(y: &[f64], x: &[f64]) -> Vec<Option<f64>> {
    let n = y.len().min(x.len());
    if n < 2 {
        return vec![None; n];
    }

    let finite = |v: f64| if v.is_finite() { Some(v) } else { None };
    let mut out = Vec::with_capacity(n);

    out.push(finite((y[1] - y[0]) / (x[1] - x[0])));
    for i in 1..n - 1 {
        let hs = x[i] - x[i - 1];
        let hd = x[i + 1] - x[i];
        let denom = hs * hd * (hd + hs);
        let num = hs * hs * y[i + 1] + (hd * hd - hs * hs) * y[i] - hd * hd * y[i - 1];
        out.push(finite(num / denom));
    }
    out.push(finite((y[n - 1] - y[n - 2]) / (x[n - 1] - x[n - 2])));
    out
}

/// Sample mean and sample standard deviation of a slice.
///
/// Returns `(NaN, NaN)` for empty input and a NaN deviation for one value.
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    (values.mean(), values.std_dev())
}
