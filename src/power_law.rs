//! Power-law tail fitting on the empirical CCDF of absolute returns.
//!
//! Absolute returns are ranked in descending order and paired with their
//! rank-based survival probability `y_i = i / n`. Points above the tail
//! threshold are fitted with `log y = slope * log x + intercept`; the tail
//! exponent is `alpha = -slope`.
//!
//! A window without enough tail points has no fit. This is reported as
//! `None` and callers skip the window.

use crate::config::TailFitConfig;
use crate::math_utils::{float_total_cmp, ols_regression, r_squared};
use crate::signal_state::SignalState;
use std::collections::BTreeMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Empirical CCDF: `x` descending absolute values, `y` the survival rank `i / n`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CcdfSample {
    /// Absolute values in descending order
    pub x: Vec<f64>,
    /// Survival probabilities, non-decreasing along `x` order, in `(0, 1]`
    pub y: Vec<f64>,
}

impl CcdfSample {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// True when the sample has no points.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Keep the points satisfying `keep(x, y)`.
    pub fn filter<F>(&self, keep: F) -> Self
    where
        F: Fn(f64, f64) -> bool,
    {
        let (x, y) = self
            .x
            .iter()
            .zip(&self.y)
            .filter(|(xi, yi)| keep(**xi, **yi))
            .map(|(xi, yi)| (*xi, *yi))
            .unzip();
        Self { x, y }
    }
}

/// Build the empirical CCDF of `values` (signs are discarded).
///
/// Non-finite values are ignored. The result does not depend on input order.
pub fn empirical_ccdf(values: &[f64]) -> CcdfSample {
    let mut x: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| v.abs())
        .collect();
    x.sort_by(|a, b| float_total_cmp(b, a));
    let n = x.len() as f64;
    let y = (1..=x.len()).map(|i| i as f64 / n).collect();
    CcdfSample { x, y }
}

/// Tail of a CCDF: strictly positive points with `x > min_return`.
pub fn tail_sample(ccdf: &CcdfSample, min_return: f64) -> CcdfSample {
    ccdf.filter(|x, y| x > 0.0 && y > 0.0 && x > min_return)
}

/// Fitted power-law tail.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PowerLawFit {
    /// Log-log slope
    pub slope: f64,
    /// Log-log intercept
    pub intercept: f64,
    /// Tail exponent, `-slope`
    pub alpha: f64,
    /// In-sample coefficient of determination of the log-log fit
    pub r_squared: f64,
    /// Number of tail points used
    pub tail_points: usize,
}

impl PowerLawFit {
    /// Predicted survival probability `exp(intercept) * x^slope`.
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept.exp() * x.powf(self.slope)
    }
}

/// A fit together with the tail points it was estimated on.
#[derive(Debug, Clone, PartialEq)]
pub struct TailFit {
    /// Fitted parameters
    pub fit: PowerLawFit,
    /// Tail sample used for the fit
    pub tail: CcdfSample,
    /// Log-space residuals `log y - (slope * log x + intercept)`
    pub residuals: Vec<f64>,
}

/// Log-transform a tail sample, or `None` when it cannot support a line fit.
fn log_tail(tail: &CcdfSample, min_points: usize) -> Option<(Vec<f64>, Vec<f64>)> {
    if tail.len() < min_points.max(2) {
        return None;
    }
    let log_x: Vec<f64> = tail.x.iter().map(|v| v.ln()).collect();
    let log_y: Vec<f64> = tail.y.iter().map(|v| v.ln()).collect();
    let first = log_x[0];
    if log_x.iter().all(|v| *v == first) {
        return None;
    }
    Some((log_x, log_y))
}

/// Fit a power law to the tail of `returns`.
///
/// Returns `None` if fewer than `config.min_points` absolute returns exceed
/// `config.min_return`, or if they are all identical.
pub fn fit_power_law(returns: &[f64], config: &TailFitConfig) -> Option<TailFit> {
    let ccdf = empirical_ccdf(returns);
    let tail = tail_sample(&ccdf, config.min_return);
    let (log_x, log_y) = log_tail(&tail, config.min_points)?;

    let line = ols_regression(&log_x, &log_y).ok()?;
    Some(TailFit {
        fit: PowerLawFit {
            slope: line.slope,
            intercept: line.intercept,
            alpha: -line.slope,
            r_squared: line.r_squared,
            tail_points: tail.len(),
        },
        tail,
        residuals: line.residuals,
    })
}

/// R² of the tail of `returns` under a fixed exponent.
///
/// Only the intercept is estimated, as `mean(log y - slope * log x)`, so the
/// value can fall below zero when the imposed exponent is a poor match.
pub fn fit_with_fixed_alpha(returns: &[f64], alpha: f64, config: &TailFitConfig) -> Option<f64> {
    let ccdf = empirical_ccdf(returns);
    let tail = tail_sample(&ccdf, config.min_return);
    let (log_x, log_y) = log_tail(&tail, config.min_points)?;

    let slope = -alpha;
    let intercept = log_x
        .iter()
        .zip(&log_y)
        .map(|(lx, ly)| ly - slope * lx)
        .sum::<f64>()
        / log_x.len() as f64;
    let predicted: Vec<f64> = log_x.iter().map(|lx| slope * lx + intercept).collect();
    let r2 = r_squared(&log_y, &predicted);
    if r2.is_finite() {
        Some(r2)
    } else {
        None
    }
}

/// Fit every trailing window of length `window`.
///
/// Entry `i` is fitted on `returns[i - window..i]` (day `i` itself is not
/// part of its own window); entries before `window` are `None`.
pub fn rolling_fits(returns: &[f64], window: usize, config: &TailFitConfig) -> Vec<Option<PowerLawFit>> {
    let fits: Vec<Option<PowerLawFit>> = (0..returns.len())
        .map(|i| {
            if window == 0 || i < window {
                None
            } else {
                fit_power_law(&returns[i - window..i], config).map(|t| t.fit)
            }
        })
        .collect();

    let skipped = fits.iter().skip(window).filter(|f| f.is_none()).count();
    if skipped > 0 {
        log::debug!(
            "{}-day rolling fit: {} windows skipped for too few tail points",
            window,
            skipped
        );
    }
    fits
}

/// CCDFs of all returns and of the returns observed in each state.
#[derive(Debug, Clone, Default)]
pub struct StateCcdfs {
    /// CCDF of every return
    pub all: CcdfSample,
    /// CCDF of returns on days labelled with each state
    pub by_state: BTreeMap<SignalState, CcdfSample>,
}

/// Split returns by signal state and build each group's CCDF.
///
/// Pairs beyond the shorter of the two inputs are ignored.
pub fn ccdf_by_state(returns: &[f64], states: &[SignalState]) -> StateCcdfs {
    let mut grouped: BTreeMap<SignalState, Vec<f64>> = BTreeMap::new();
    for (r, s) in returns.iter().zip(states) {
        grouped.entry(*s).or_default().push(*r);
    }
    StateCcdfs {
        all: empirical_ccdf(returns),
        by_state: grouped
            .into_iter()
            .map(|(state, values)| (state, empirical_ccdf(&values)))
            .collect(),
    }
}
