//! Market context statistics: realized volatility and drawdown episodes.

use crate::errors::{validate_parameter, PowerLawResult};
use crate::math_utils::constants::TRADING_DAYS_PER_YEAR;
use crate::math_utils::rolling_std;
use crate::series::ReturnSeries;
use chrono::NaiveDate;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rolling realized volatility of percentage returns.
///
/// Sample standard deviation over the trailing `window` days including the
/// current one; multiplied by `sqrt(252)` when `annualize` is set, which
/// makes it a synthetic stand-in for an implied-volatility index.
pub fn realized_volatility(returns: &[f64], window: usize, annualize: bool) -> Vec<Option<f64>> {
    let values: Vec<Option<f64>> = returns.iter().map(|r| Some(*r)).collect();
    let factor = if annualize {
        TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        1.0
    };
    rolling_std(&values, window)
        .into_iter()
        .map(|v| v.map(|s| s * factor))
        .collect()
}

/// Synthetic volatility index: 21-day annualized realized volatility.
pub fn synthetic_vix(returns: &[f64]) -> Vec<Option<f64>> {
    realized_volatility(returns, 21, true)
}

/// A peak-to-trough decline deeper than the detection threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Drawdown {
    /// Index of the highest close before the decline
    pub peak_index: usize,
    /// Index of the deepest point of the decline
    pub trough_index: usize,
    /// Date of the peak
    pub peak_date: NaiveDate,
    /// Date of the trough
    pub trough_date: NaiveDate,
    /// Depth at the trough relative to the running maximum (negative percent)
    pub depth_pct: f64,
}

/// Drawdowns from the running maximum that reach `-threshold_pct`.
///
/// An episode opens when the close falls `threshold_pct` below its running
/// maximum; its peak is the highest close in the year before the last new
/// high. It closes once the drawdown recovers to within half the threshold,
/// and the trough is the deepest point between peak and exit.
pub fn identify_drawdowns(series: &ReturnSeries, threshold_pct: f64) -> PowerLawResult<Vec<Drawdown>> {
    validate_parameter(threshold_pct, f64::EPSILON, 100.0, "threshold_pct")?;
    let closes = series.closes();
    let dates = series.dates();

    let mut running_max = f64::NEG_INFINITY;
    let drawdown: Vec<f64> = closes
        .iter()
        .map(|c| {
            running_max = running_max.max(*c);
            (c - running_max) / running_max * 100.0
        })
        .collect();

    let mut episodes = Vec::new();
    let mut in_drawdown = false;
    let mut peak = 0usize;
    let mut high = closes.first().copied().unwrap_or(0.0);

    for i in 1..closes.len() {
        high = high.max(closes[i]);
        if closes[i] >= high && !in_drawdown {
            peak = i;
        }

        if drawdown[i] <= -threshold_pct && !in_drawdown {
            in_drawdown = true;
            let lookback = peak.saturating_sub(252);
            peak = argmax_first(&closes[lookback..=i]) + lookback;
        }

        if in_drawdown && drawdown[i] > -threshold_pct * 0.5 {
            let trough = argmin_first(&drawdown[peak..=i]) + peak;
            episodes.push(Drawdown {
                peak_index: peak,
                trough_index: trough,
                peak_date: dates[peak],
                trough_date: dates[trough],
                depth_pct: drawdown[trough],
            });
            in_drawdown = false;
        }
    }

    log::debug!(
        "Found {} drawdowns deeper than {:.1}%",
        episodes.len(),
        threshold_pct
    );
    Ok(episodes)
}

fn argmax_first(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| if *v > best.1 { (i, *v) } else { best })
        .0
}

fn argmin_first(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, v)| if *v < best.1 { (i, *v) } else { best })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::business_dates;
    use assert_approx_eq::assert_approx_eq;

    fn series_from_closes(closes: Vec<f64>) -> ReturnSeries {
        let n = closes.len();
        let dates = business_dates(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), n);
        ReturnSeries::from_parts(dates, closes, vec![0.0; n]).unwrap()
    }

    #[test]
    fn test_realized_volatility_window_and_scaling() {
        let returns = [1.0, -1.0, 1.0, -1.0];
        let daily = realized_volatility(&returns, 2, false);
        assert_eq!(daily[0], None);
        assert_approx_eq!(daily[1].unwrap(), 2.0f64.sqrt());
        let annual = realized_volatility(&returns, 2, true);
        assert_approx_eq!(annual[3].unwrap(), 2.0f64.sqrt() * 252.0f64.sqrt());
        assert_eq!(synthetic_vix(&returns).iter().flatten().count(), 0);
    }

    #[test]
    fn test_single_drawdown_episode() {
        let closes = vec![100.0, 110.0, 120.0, 100.0, 90.0, 95.0, 112.0, 125.0];
        let episodes = identify_drawdowns(&series_from_closes(closes), 15.0).unwrap();
        assert_eq!(episodes.len(), 1);
        let dd = episodes[0];
        assert_eq!(dd.peak_index, 2);
        assert_eq!(dd.trough_index, 4);
        assert_approx_eq!(dd.depth_pct, -25.0);
    }

    #[test]
    fn test_shallow_dip_is_ignored() {
        let closes = vec![100.0, 95.0, 90.0, 100.0];
        assert!(identify_drawdowns(&series_from_closes(closes), 15.0)
            .unwrap()
            .is_empty());
        assert!(identify_drawdowns(&series_from_closes(vec![1.0]), 0.0).is_err());
    }
}
