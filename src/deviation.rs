//! Deviation of the empirical CCDF from its fitted power law.
//!
//! Positive deviation means the window holds more returns of a given
//! magnitude than the fitted law predicts (a fatter tail, "more chaotic");
//! negative deviation means fewer ("quieter"). Averaged over the moderate
//! volatility zone, the deviation becomes a per-day regime indicator.

use crate::config::TailFitConfig;
use crate::math_utils::{gradient, r_squared};
use crate::power_law::{fit_power_law, CcdfSample, PowerLawFit, TailFit};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Empirical versus predicted survival at each tail point.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviationProfile {
    /// Tail magnitudes (descending)
    pub x: Vec<f64>,
    /// Empirical survival probabilities
    pub actual: Vec<f64>,
    /// Power-law predictions at `x`
    pub predicted: Vec<f64>,
    /// `actual - predicted`
    pub deviation: Vec<f64>,
}

/// Power-law survival prediction at a single magnitude.
pub fn predicted_ccdf(fit: &PowerLawFit, x: f64) -> f64 {
    fit.predict(x)
}

/// Compare a CCDF sample against a fitted law point by point.
pub fn deviation_against(fit: &PowerLawFit, sample: &CcdfSample) -> DeviationProfile {
    let predicted: Vec<f64> = sample.x.iter().map(|x| predicted_ccdf(fit, *x)).collect();
    let deviation = sample
        .y
        .iter()
        .zip(&predicted)
        .map(|(a, p)| a - p)
        .collect();
    DeviationProfile {
        x: sample.x.clone(),
        actual: sample.y.clone(),
        predicted,
        deviation,
    }
}

/// Deviation profile of a fit over its own tail sample.
pub fn deviation_profile(tail_fit: &TailFit) -> DeviationProfile {
    deviation_against(&tail_fit.fit, &tail_fit.tail)
}

/// Mean deviation over magnitudes in the inclusive band `zone`.
///
/// `None` when no tail point falls inside the band.
pub fn mean_deviation(profile: &DeviationProfile, zone: (f64, f64)) -> Option<f64> {
    let (low, high) = zone;
    let (sum, count) = profile
        .x
        .iter()
        .zip(&profile.deviation)
        .filter(|(x, _)| **x >= low && **x <= high)
        .fold((0.0, 0usize), |(s, c), (_, d)| (s + d, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Log-log R² of a fitted law on a sample it may not have been fitted on.
///
/// Non-positive points are masked out first. Out of sample the value can be
/// negative.
pub fn r_squared_out_of_sample(fit: &PowerLawFit, sample: &CcdfSample) -> Option<f64> {
    let positive = sample.filter(|x, y| x > 0.0 && y > 0.0);
    if positive.len() < 2 {
        return None;
    }
    let log_y: Vec<f64> = positive.y.iter().map(|y| y.ln()).collect();
    let predicted: Vec<f64> = positive
        .x
        .iter()
        .map(|x| fit.slope * x.ln() + fit.intercept)
        .collect();
    let r2 = r_squared(&log_y, &predicted);
    r2.is_finite().then_some(r2)
}

/// Local exponents: discrete `d log y / d log x` between consecutive points.
///
/// Returns `(x_mid, derivative)` with arithmetic midpoints. Steps where
/// `log x` does not change report a derivative of zero. When
/// `min_derivative` is given, steeper (more negative) values are dropped as
/// extreme-tail noise.
pub fn local_exponents(ccdf: &CcdfSample, min_derivative: Option<f64>) -> (Vec<f64>, Vec<f64>) {
    let valid = ccdf.filter(|x, y| x > 0.0 && y > 0.0);
    if valid.len() < 2 {
        return (Vec::new(), Vec::new());
    }

    let mut x_mid = Vec::with_capacity(valid.len() - 1);
    let mut derivative = Vec::with_capacity(valid.len() - 1);
    for i in 0..valid.len() - 1 {
        let d_log_x = valid.x[i + 1].ln() - valid.x[i].ln();
        let d_log_y = valid.y[i + 1].ln() - valid.y[i].ln();
        let d = if d_log_x != 0.0 { d_log_y / d_log_x } else { 0.0 };
        if min_derivative.is_some_and(|m| d < m) {
            continue;
        }
        x_mid.push((valid.x[i] + valid.x[i + 1]) / 2.0);
        derivative.push(d);
    }
    (x_mid, derivative)
}

/// Continuous local-exponent estimate at every CCDF point.
///
/// Numerical gradient of `log y` against `log x`; points where tied
/// magnitudes make the gradient undefined are `None`.
pub fn gradient_exponents(ccdf: &CcdfSample) -> Vec<Option<f64>> {
    let valid = ccdf.filter(|x, y| x > 0.0 && y > 0.0);
    let log_x: Vec<f64> = valid.x.iter().map(|x| x.ln()).collect();
    let log_y: Vec<f64> = valid.y.iter().map(|y| y.ln()).collect();
    gradient(&log_y, &log_x)
}

/// Mean CCDF deviation of every trailing window.
///
/// Entry `i` uses `returns[i - window..i]`. Undefined when the window has
/// no fit or no tail point in the moderate zone.
pub fn rolling_mean_deviation(returns: &[f64], window: usize, config: &TailFitConfig) -> Vec<Option<f64>> {
    (0..returns.len())
        .map(|i| {
            if window == 0 || i < window {
                return None;
            }
            let tail_fit = fit_power_law(&returns[i - window..i], config)?;
            mean_deviation(&deviation_profile(&tail_fit), config.moderate_zone)
        })
        .collect()
}

/// Empirical minus predicted survival at fixed magnitudes.
///
/// The empirical side counts `|r| >= threshold` over the whole window, not
/// only its tail.
pub fn threshold_gaps(returns: &[f64], fit: &PowerLawFit, thresholds: &[f64]) -> Vec<f64> {
    if returns.is_empty() {
        return Vec::new();
    }
    let n = returns.len() as f64;
    thresholds
        .iter()
        .map(|&t| {
            let actual = returns.iter().filter(|r| r.abs() >= t).count() as f64 / n;
            actual - fit.predict(t)
        })
        .collect()
}

/// Average threshold gap over the trailing windows ending in `start..end`.
///
/// Windows with no defined fit are skipped; `None` if every window is.
pub fn mean_threshold_gap(
    returns: &[f64],
    start: usize,
    end: usize,
    window: usize,
    thresholds: &[f64],
    config: &TailFitConfig,
) -> Option<f64> {
    let mut gaps = Vec::new();
    for i in start.max(window)..end.min(returns.len() + 1) {
        let slice = &returns[i - window..i];
        if let Some(tail_fit) = fit_power_law(slice, config) {
            gaps.extend(threshold_gaps(slice, &tail_fit.fit, thresholds));
        }
    }
    if gaps.is_empty() {
        None
    } else {
        Some(gaps.iter().sum::<f64>() / gaps.len() as f64)
    }
}
