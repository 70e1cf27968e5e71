//! Leveraged backtests of per-day signal states.
//!
//! A signal is traded by mapping each day's state to a position multiplier
//! and applying it to that day's return. Buy-and-hold and strategy value are
//! running products of `(1 + r / 100)`, so the buy-and-hold curve never
//! depends on the signal, its lag, or the leverage map.

use crate::errors::{validate_all_finite, validate_same_length, PowerLawError, PowerLawResult};
use crate::math_utils::constants::{DAYS_PER_YEAR, TRADING_DAYS_PER_YEAR};
use crate::math_utils::mean_and_std;
use crate::series::ReturnSeries;
use crate::signal_state::{SignalOutput, SignalState};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position used for unmapped states and for days a lag shifts past the end.
pub const DEFAULT_POSITION: f64 = 2.0;

/// State to position-multiplier mapping.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LeverageMap {
    positions: BTreeMap<SignalState, f64>,
    /// Position for states missing from the map
    pub fallback: f64,
    /// Position for the trailing days vacated by a lag
    pub lag_fill: f64,
}

impl Default for LeverageMap {
    /// RED 1x, ORANGE 1x, GREEN 2x.
    fn default() -> Self {
        Self::from_pairs(&[
            (SignalState::Red, 1.0),
            (SignalState::Orange, 1.0),
            (SignalState::Green, 2.0),
        ])
    }
}

impl LeverageMap {
    /// Map only the listed states; others use [`DEFAULT_POSITION`].
    pub fn from_pairs(pairs: &[(SignalState, f64)]) -> Self {
        Self {
            positions: pairs.iter().copied().collect(),
            fallback: DEFAULT_POSITION,
            lag_fill: DEFAULT_POSITION,
        }
    }

    /// Every state at the same multiplier, lag fill included.
    pub fn uniform(position: f64) -> Self {
        Self {
            positions: SignalState::ALL.iter().map(|s| (*s, position)).collect(),
            fallback: position,
            lag_fill: position,
        }
    }

    /// Builder-style override for one state.
    pub fn with(mut self, state: SignalState, position: f64) -> Self {
        self.positions.insert(state, position);
        self
    }

    /// Explicit entry for `state`, if any.
    pub fn get(&self, state: SignalState) -> Option<f64> {
        self.positions.get(&state).copied()
    }

    /// Position for `state`, falling back for unmapped states.
    pub fn position(&self, state: SignalState) -> f64 {
        self.get(state).unwrap_or(self.fallback)
    }

    /// Position for a binary signal: on trades as RED, off as GREEN.
    pub fn binary_position(&self, on: bool) -> f64 {
        if on {
            self.get(SignalState::Red).unwrap_or(1.0)
        } else {
            self.get(SignalState::Green).unwrap_or(DEFAULT_POSITION)
        }
    }
}

/// Inputs of a backtest. At least one signal representation is required;
/// `states` wins when both are present.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BacktestFrame {
    /// Trading dates
    pub dates: Vec<NaiveDate>,
    /// Daily percentage returns
    pub returns: Vec<f64>,
    /// Per-day signal states
    pub states: Option<Vec<SignalState>>,
    /// Filtered binary signal (on = elevated risk)
    pub binary_signal: Option<Vec<bool>>,
}

impl BacktestFrame {
    /// Frame trading a state sequence.
    pub fn from_states(series: &ReturnSeries, states: Vec<SignalState>) -> Self {
        Self {
            dates: series.dates().to_vec(),
            returns: series.returns().to_vec(),
            states: Some(states),
            binary_signal: None,
        }
    }

    /// Frame trading a binary signal.
    pub fn from_binary(series: &ReturnSeries, signal: Vec<bool>) -> Self {
        Self {
            dates: series.dates().to_vec(),
            returns: series.returns().to_vec(),
            states: None,
            binary_signal: Some(signal),
        }
    }

    /// Frame trading a signal output from its first valid day onwards.
    ///
    /// A signal that never becomes valid yields an empty frame.
    pub fn from_signal(series: &ReturnSeries, output: &SignalOutput) -> Self {
        let start = output.valid_from.unwrap_or(series.len());
        Self::from_states(series, output.states.clone()).tail_from(start)
    }

    /// Number of days.
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    /// True when there are no days.
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Copy of days `start..`.
    pub fn tail_from(&self, start: usize) -> Self {
        let cut = |len: usize| start.min(len);
        Self {
            dates: self.dates[cut(self.dates.len())..].to_vec(),
            returns: self.returns[cut(self.returns.len())..].to_vec(),
            states: self.states.as_ref().map(|s| s[cut(s.len())..].to_vec()),
            binary_signal: self.binary_signal.as_ref().map(|s| s[cut(s.len())..].to_vec()),
        }
    }

    /// Copy of this frame trading another state sequence.
    pub fn with_states(&self, states: Vec<SignalState>) -> Self {
        Self {
            states: Some(states),
            ..self.clone()
        }
    }

    /// Un-lagged daily positions.
    fn positions(&self, leverage: &LeverageMap) -> PowerLawResult<Vec<f64>> {
        validate_same_length(self.returns.len(), self.dates.len(), "dates")?;
        validate_all_finite(&self.returns, "returns")?;
        if let Some(states) = &self.states {
            validate_same_length(self.returns.len(), states.len(), "states")?;
            Ok(states.iter().map(|s| leverage.position(*s)).collect())
        } else if let Some(signal) = &self.binary_signal {
            validate_same_length(self.returns.len(), signal.len(), "binary_signal")?;
            Ok(signal.iter().map(|on| leverage.binary_position(*on)).collect())
        } else {
            Err(PowerLawError::ConfigurationError {
                reason: "backtest frame needs either states or a binary signal".to_string(),
            })
        }
    }
}

/// Shift positions so that day `t` trades the position computed for `t + lag`.
pub fn apply_lag(positions: &[f64], lag: usize, fill: f64) -> Vec<f64> {
    if lag == 0 {
        return positions.to_vec();
    }
    let n = positions.len();
    (0..n)
        .map(|t| if t + lag < n { positions[t + lag] } else { fill })
        .collect()
}

/// Running product of `(1 + r / 100)`.
pub fn cumulative_growth(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |value, r| {
            *value *= 1.0 + r / 100.0;
            Some(*value)
        })
        .collect()
}

/// Deepest percentage fall of a value curve below its running peak.
pub fn max_drawdown_pct(curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for &value in curve {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.min((value - peak) / peak * 100.0);
        }
    }
    worst
}

/// Headline figures of a backtest.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BacktestSummary {
    /// Days positions were delayed by
    pub lag: usize,
    /// First traded day
    pub first_date: Option<NaiveDate>,
    /// Last traded day
    pub last_date: Option<NaiveDate>,
    /// Final buy-and-hold growth factor
    pub final_bh: f64,
    /// Final strategy growth factor
    pub final_strategy: f64,
    /// `final_strategy / final_bh`
    pub ratio: f64,
    /// Calendar span in years (days / 365.25)
    pub years: f64,
    /// Annualized buy-and-hold growth (%), undefined for a zero span
    pub bh_cagr: Option<f64>,
    /// Annualized strategy growth (%), undefined for a zero span
    pub strategy_cagr: Option<f64>,
    /// Annualized Sharpe ratio of strategy returns, 0 without variance
    pub sharpe: f64,
    /// Worst strategy drawdown (%, non-positive)
    pub max_drawdown_pct: f64,
    /// Days with a positive position
    pub long_days: usize,
    /// Days with a negative position
    pub short_days: usize,
    /// Days with no position
    pub neutral_days: usize,
}

impl BacktestSummary {
    fn neutral(lag: usize) -> Self {
        Self {
            lag,
            first_date: None,
            last_date: None,
            final_bh: 1.0,
            final_strategy: 1.0,
            ratio: 1.0,
            years: 0.0,
            bh_cagr: None,
            strategy_cagr: None,
            sharpe: 0.0,
            max_drawdown_pct: 0.0,
            long_days: 0,
            short_days: 0,
            neutral_days: 0,
        }
    }
}

impl fmt::Display for BacktestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cagr = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |c| format!("{:.2}%", c));
        writeln!(f, "Backtest (T+{}):", self.lag)?;
        if let (Some(first), Some(last)) = (self.first_date, self.last_date) {
            writeln!(f, "  Period: {} to {} ({:.1} years)", first, last, self.years)?;
        }
        writeln!(f, "  Buy & Hold: {:.2}x ({} CAGR)", self.final_bh, cagr(self.bh_cagr))?;
        writeln!(f, "  Strategy:   {:.2}x ({} CAGR)", self.final_strategy, cagr(self.strategy_cagr))?;
        writeln!(f, "  Ratio: {:.2}x", self.ratio)?;
        writeln!(f, "  Sharpe: {:.3}  Max drawdown: {:.2}%", self.sharpe, self.max_drawdown_pct)?;
        write!(
            f,
            "  Long/short/neutral days: {}/{}/{}",
            self.long_days, self.short_days, self.neutral_days
        )
    }
}

/// Per-day curves and summary of a backtest.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BacktestRun {
    /// Lagged position multipliers
    pub positions: Vec<f64>,
    /// `return * position`
    pub strategy_returns: Vec<f64>,
    /// Buy-and-hold growth factor per day
    pub bh_cumulative: Vec<f64>,
    /// Strategy growth factor per day
    pub strategy_cumulative: Vec<f64>,
    /// Headline figures
    pub summary: BacktestSummary,
}

fn annualized(final_value: f64, years: f64) -> Option<f64> {
    if years > 0.0 {
        Some((final_value.powf(1.0 / years) - 1.0) * 100.0)
    } else {
        None
    }
}

/// Trade `frame` with `leverage`, positions delayed by `lag` days.
///
/// Fails with [`PowerLawError::ConfigurationError`] when the frame carries
/// no signal. An empty frame yields empty curves and a neutral summary.
pub fn run_backtest(frame: &BacktestFrame, lag: usize, leverage: &LeverageMap) -> PowerLawResult<BacktestRun> {
    let raw_positions = frame.positions(leverage)?;
    let positions = apply_lag(&raw_positions, lag, leverage.lag_fill);

    let strategy_returns: Vec<f64> = frame
        .returns
        .iter()
        .zip(&positions)
        .map(|(r, p)| r * p)
        .collect();
    let bh_cumulative = cumulative_growth(&frame.returns);
    let strategy_cumulative = cumulative_growth(&strategy_returns);

    let (final_bh, final_strategy) = match (bh_cumulative.last(), strategy_cumulative.last()) {
        (Some(bh), Some(strategy)) => (*bh, *strategy),
        _ => {
            return Ok(BacktestRun {
                positions,
                strategy_returns,
                bh_cumulative,
                strategy_cumulative,
                summary: BacktestSummary::neutral(lag),
            })
        }
    };

    let first_date = frame.dates.first().copied();
    let last_date = frame.dates.last().copied();
    let years = match (first_date, last_date) {
        (Some(first), Some(last)) => (last - first).num_days() as f64 / DAYS_PER_YEAR,
        _ => 0.0,
    };
    if years <= 0.0 {
        log::warn!("Backtest spans no calendar time; growth rates are undefined");
    }

    let (mean, std) = mean_and_std(&strategy_returns);
    let sharpe = if std > 0.0 {
        mean / std * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let summary = BacktestSummary {
        lag,
        first_date,
        last_date,
        final_bh,
        final_strategy,
        ratio: final_strategy / final_bh,
        years,
        bh_cagr: annualized(final_bh, years),
        strategy_cagr: annualized(final_strategy, years),
        sharpe,
        max_drawdown_pct: max_drawdown_pct(&strategy_cumulative),
        long_days: positions.iter().filter(|p| **p > 0.0).count(),
        short_days: positions.iter().filter(|p| **p < 0.0).count(),
        neutral_days: positions.iter().filter(|p| **p == 0.0).count(),
    };
    log::debug!(
        "Backtest T+{}: strategy {:.2}x vs buy & hold {:.2}x",
        lag,
        final_strategy,
        final_bh
    );

    Ok(BacktestRun {
        positions,
        strategy_returns,
        bh_cumulative,
        strategy_cumulative,
        summary,
    })
}
