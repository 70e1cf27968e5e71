//! Signal states and the contract shared by every signal strategy.
//!
//! Each strategy turns a [`ReturnSeries`] into one [`SignalState`] per day.
//! Days without enough history still receive a state (the strategy's
//! documented default) so that every output lines up with its input;
//! `valid_from` tells callers where the warm-up ends.

use crate::backtest::LeverageMap;
use crate::errors::{PowerLawError, PowerLawResult};
use crate::series::ReturnSeries;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-day regime label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SignalState {
    /// Elevated risk
    Red,
    /// Neutral, or recovering after a drawdown
    Orange,
    /// Normal conditions
    Green,
}

impl SignalState {
    /// All states in canonical order.
    pub const ALL: [SignalState; 3] = [SignalState::Red, SignalState::Orange, SignalState::Green];

    /// Upper-case label.
    pub fn label(&self) -> &'static str {
        match self {
            SignalState::Red => "RED",
            SignalState::Orange => "ORANGE",
            SignalState::Green => "GREEN",
        }
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SignalState {
    type Err = PowerLawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RED" => Ok(SignalState::Red),
            "ORANGE" => Ok(SignalState::Orange),
            "GREEN" => Ok(SignalState::Green),
            other => Err(PowerLawError::ConfigurationError {
                reason: format!("unknown signal state '{}'", other),
            }),
        }
    }
}

/// Day counts per state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StateCounts {
    counts: BTreeMap<SignalState, usize>,
    total: usize,
}

impl StateCounts {
    /// Count the states of a sequence.
    pub fn from_states(states: &[SignalState]) -> Self {
        let mut counts = BTreeMap::new();
        for s in states {
            *counts.entry(*s).or_insert(0) += 1;
        }
        Self {
            counts,
            total: states.len(),
        }
    }

    /// Days spent in `state`.
    pub fn count(&self, state: SignalState) -> usize {
        self.counts.get(&state).copied().unwrap_or(0)
    }

    /// Fraction of days spent in `state` (0 for an empty sequence).
    pub fn fraction(&self, state: SignalState) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count(state) as f64 / self.total as f64
        }
    }

    /// Length of the counted sequence.
    pub fn total(&self) -> usize {
        self.total
    }

    /// States that occur at least once, in canonical order.
    pub fn observed(&self) -> Vec<SignalState> {
        self.counts.keys().copied().collect()
    }

    /// Iterate over `(state, count)` for observed states.
    pub fn iter(&self) -> impl Iterator<Item = (SignalState, usize)> + '_ {
        self.counts.iter().map(|(s, c)| (*s, *c))
    }
}

impl fmt::Display for StateCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (state, count)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {} days ({:.1}%)", state, count, self.fraction(state) * 100.0)?;
        }
        Ok(())
    }
}

/// Output of a signal strategy, aligned day-for-day with its input series.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalOutput {
    /// One state per input day
    pub states: Vec<SignalState>,
    /// The scalar that drove the raw trigger, where defined
    pub indicator: Vec<Option<f64>>,
    /// First day with enough history for a real decision
    pub valid_from: Option<usize>,
}

impl SignalOutput {
    /// States from `valid_from` onwards (empty if never valid).
    pub fn valid_states(&self) -> &[SignalState] {
        match self.valid_from {
            Some(start) => &self.states[start.min(self.states.len())..],
            None => &[],
        }
    }

    /// Per-state counts over the whole output.
    pub fn counts(&self) -> StateCounts {
        StateCounts::from_states(&self.states)
    }

    /// Copy of this output with `from` states folded into `into`.
    pub fn combined(&self, into: SignalState, from: &[SignalState]) -> Self {
        Self {
            states: combine_states(&self.states, into, from),
            ..self.clone()
        }
    }
}

/// A pluggable signal definition.
pub trait SignalStrategy {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    /// Derive one state per day of `series`.
    fn generate(&self, series: &ReturnSeries) -> PowerLawResult<SignalOutput>;

    /// Leverage map this signal is conventionally traded with.
    fn default_leverage(&self) -> LeverageMap {
        LeverageMap::default()
    }
}

/// Relabel every state listed in `from` as `into`.
pub fn combine_states(states: &[SignalState], into: SignalState, from: &[SignalState]) -> Vec<SignalState> {
    states
        .iter()
        .map(|s| if from.contains(s) { into } else { *s })
        .collect()
}

/// Log a one-line state summary for a finished signal.
pub(crate) fn log_state_summary(name: &str, states: &[SignalState]) {
    log::info!("{} signal calculated: {}", name, StateCounts::from_states(states));
}
