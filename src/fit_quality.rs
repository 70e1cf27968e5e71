//! Power-law fit quality diagnostics.
//!
//! How well do returns follow a single power law, how does that change
//! over time and across volatility regimes, and at which magnitudes does the
//! fit bend away?

use crate::config::TailFitConfig;
use crate::errors::{validate_data_length, validate_window, PowerLawResult};
use crate::market_stats::realized_volatility;
use crate::math_utils::quantile;
use crate::power_law::{fit_power_law, rolling_fits, TailFit};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rolling tail exponent and in-sample R².
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitQuality {
    /// Tail exponent
    pub alpha: f64,
    /// Log-log coefficient of determination
    pub r_squared: f64,
}

/// Alpha and R² of every trailing window; `None` where no fit exists.
pub fn rolling_fit_quality(returns: &[f64], window: usize, config: &TailFitConfig) -> Vec<Option<FitQuality>> {
    rolling_fits(returns, window, config)
        .into_iter()
        .map(|fit| {
            fit.map(|f| FitQuality {
                alpha: f.alpha,
                r_squared: f.r_squared,
            })
        })
        .collect()
}

/// Tail fits of returns grouped into realized-volatility terciles.
#[derive(Debug, Clone)]
pub struct RegimeFits {
    /// Fit of days at or below the lower cut
    pub low_vol: Option<TailFit>,
    /// Fit of days between the cuts
    pub medium_vol: Option<TailFit>,
    /// Fit of days above the upper cut
    pub high_vol: Option<TailFit>,
    /// Volatility at the 0.33 and 0.67 quantiles
    pub thresholds: (f64, f64),
}

/// Split days by trailing realized volatility and fit each bucket.
///
/// Volatility is the rolling sample standard deviation over `vol_window`
/// days; days without a defined volatility are left out of every bucket.
pub fn fit_by_volatility_regime(
    returns: &[f64],
    vol_window: usize,
    config: &TailFitConfig,
) -> PowerLawResult<RegimeFits> {
    validate_window(vol_window, "vol_window")?;
    validate_data_length(returns, vol_window, "volatility regime fit")?;
    let vol = realized_volatility(returns, vol_window, false);
    let defined: Vec<f64> = vol.iter().flatten().copied().collect();
    let low_cut = quantile(&defined, 0.33);
    let high_cut = quantile(&defined, 0.67);

    let mut low = Vec::new();
    let mut medium = Vec::new();
    let mut high = Vec::new();
    for (r, v) in returns.iter().zip(&vol) {
        match v {
            Some(v) if *v <= low_cut => low.push(*r),
            Some(v) if *v <= high_cut => medium.push(*r),
            Some(_) => high.push(*r),
            None => {}
        }
    }
    log::debug!(
        "Volatility regimes: {} low, {} medium, {} high days",
        low.len(),
        medium.len(),
        high.len()
    );

    Ok(RegimeFits {
        low_vol: fit_power_law(&low, config),
        medium_vol: fit_power_law(&medium, config),
        high_vol: fit_power_law(&high, config),
        thresholds: (low_cut, high_cut),
    })
}

/// Mean log-space residual of a fit within one magnitude bin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResidualBin {
    /// Geometric mean of the magnitudes in the bin
    pub center: f64,
    /// Mean residual of the bin
    pub mean_residual: f64,
    /// Points in the bin
    pub count: usize,
}

/// Average fit residuals over `n_bins` log-spaced bin edges.
///
/// Edges run from the smallest to the largest tail magnitude, so there are
/// `n_bins - 1` half-open bins. Points at the largest magnitude sit on the
/// top edge and fall outside every bin. Empty bins are omitted.
pub fn residuals_by_magnitude(tail_fit: &TailFit, n_bins: usize) -> Vec<ResidualBin> {
    let x = &tail_fit.tail.x;
    let (Some(min), Some(max)) = (
        x.iter().copied().reduce(f64::min),
        x.iter().copied().reduce(f64::max),
    ) else {
        return Vec::new();
    };
    if n_bins < 2 || min <= 0.0 || min == max {
        return Vec::new();
    }

    let (log_min, log_max) = (min.log10(), max.log10());
    let step = (log_max - log_min) / (n_bins - 1) as f64;
    let mut edges: Vec<f64> = (0..n_bins)
        .map(|k| 10f64.powf(log_min + step * k as f64))
        .collect();
    edges[0] = min;
    edges[n_bins - 1] = max;

    let mut sums = vec![(0.0f64, 0.0f64, 0usize); n_bins - 1];
    for (xi, ri) in x.iter().zip(&tail_fit.residuals) {
        let Some(bin) = edges[1..].iter().position(|upper| xi < upper) else {
            continue;
        };
        let entry = &mut sums[bin];
        entry.0 += xi.ln();
        entry.1 += ri;
        entry.2 += 1;
    }

    sums.into_iter()
        .filter(|(_, _, count)| *count > 0)
        .map(|(log_sum, residual_sum, count)| ResidualBin {
            center: (log_sum / count as f64).exp(),
            mean_residual: residual_sum / count as f64,
            count,
        })
        .collect()
}
