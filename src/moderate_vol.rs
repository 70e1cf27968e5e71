//! Moderate-volatility frequency signal.
//!
//! The indicator is the percentage of the last 30 days whose absolute return
//! lies in the moderate zone `[0.5%, 3.0%]`. A day is a raw trigger when the
//! indicator exceeds 110% of its two-year trailing median. Raw triggers pass
//! through a [`RallyFilter`] (RED ends early on a +1% rally) and a
//! [`RecoveryTracker`] (a RED period that draws down more than 1% leaves an
//! ORANGE recovery sub-state behind).

use crate::errors::{validate_parameter, validate_window, PowerLawResult};
use crate::hysteresis::{HysteresisConfig, RallyFilter, RecoveryTracker};
use crate::math_utils::trailing_median;
use crate::series::ReturnSeries;
use crate::signal_state::{log_state_summary, SignalOutput, SignalState, SignalStrategy};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of the moderate-volatility signal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModerateVolConfig {
    /// Trailing window for the frequency indicator
    pub window: usize,
    /// Fewer observations than this leave the indicator undefined
    pub min_observations: usize,
    /// Inclusive magnitude band counted as moderate (percent)
    pub zone: (f64, f64),
    /// Look-back of the median baseline
    pub baseline_window: usize,
    /// The baseline needs strictly more defined values than this
    pub min_baseline_points: usize,
    /// Threshold as a multiple of the baseline
    pub threshold_multiplier: f64,
    /// Rally-filter and recovery thresholds
    pub hysteresis: HysteresisConfig,
}

impl Default for ModerateVolConfig {
    fn default() -> Self {
        Self {
            window: 30,
            min_observations: 20,
            zone: (0.5, 3.0),
            baseline_window: 504,
            min_baseline_points: 100,
            threshold_multiplier: 1.10,
            hysteresis: HysteresisConfig::default(),
        }
    }
}

impl ModerateVolConfig {
    /// Check the configuration for usable values.
    pub fn validate(&self) -> PowerLawResult<()> {
        validate_window(self.window, "window")?;
        validate_window(self.baseline_window, "baseline_window")?;
        validate_parameter(self.threshold_multiplier, 0.0, 100.0, "threshold_multiplier")?;
        validate_parameter(self.zone.1, self.zone.0, 100.0, "zone.high")?;
        self.hysteresis.validate()
    }
}

/// Every intermediate series of the moderate-volatility signal.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModerateVolTrace {
    /// Percentage of moderate days in the trailing window
    pub moderate_pct: Vec<Option<f64>>,
    /// Trailing median of `moderate_pct`
    pub baseline: Vec<Option<f64>>,
    /// `baseline * threshold_multiplier`
    pub threshold: Vec<Option<f64>>,
    /// Indicator above threshold; false wherever either is undefined
    pub raw: Vec<bool>,
    /// Raw trigger after the rally filter
    pub filtered: Vec<bool>,
    /// Recovery sub-state flag
    pub in_recovery: Vec<bool>,
    /// Final per-day states
    pub states: Vec<SignalState>,
}

/// Moderate-volatility signal strategy.
#[derive(Debug, Clone, Default)]
pub struct ModerateVolSignal {
    /// Signal parameters
    pub config: ModerateVolConfig,
}

impl ModerateVolSignal {
    /// Strategy with the given parameters.
    pub fn new(config: ModerateVolConfig) -> Self {
        Self { config }
    }

    /// Percentage of the window's returns inside the moderate zone.
    pub fn moderate_pct(&self, window: &[f64]) -> Option<f64> {
        if window.is_empty() || window.len() < self.config.min_observations {
            return None;
        }
        let (low, high) = self.config.zone;
        let moderate = window
            .iter()
            .filter(|r| {
                let a = r.abs();
                a >= low && a <= high
            })
            .count();
        Some(moderate as f64 / window.len() as f64 * 100.0)
    }

    /// Run the full pipeline and keep every intermediate series.
    pub fn trace(&self, series: &ReturnSeries) -> PowerLawResult<ModerateVolTrace> {
        self.config.validate()?;
        let cfg = &self.config;
        let n = series.len();

        let moderate_pct: Vec<Option<f64>> = (0..n)
            .map(|i| series.window(i, cfg.window).and_then(|w| self.moderate_pct(w)))
            .collect();
        let baseline = trailing_median(&moderate_pct, cfg.baseline_window, cfg.min_baseline_points);
        let threshold: Vec<Option<f64>> = baseline
            .iter()
            .map(|b| b.map(|v| v * cfg.threshold_multiplier))
            .collect();
        let raw: Vec<bool> = moderate_pct
            .iter()
            .zip(&threshold)
            .map(|(pct, th)| matches!((pct, th), (Some(p), Some(t)) if p > t))
            .collect();

        let mut rally = RallyFilter::new(cfg.hysteresis.rally_exit_pct);
        let mut recovery = RecoveryTracker::from_config(&cfg.hysteresis);
        let mut filtered = Vec::with_capacity(n);
        let mut in_recovery = Vec::with_capacity(n);
        let mut states = Vec::with_capacity(n);
        for (on, price) in raw.iter().zip(series.closes()) {
            let red = rally.step(*on, *price);
            let recovering = recovery.step(red, *price);
            states.push(if red {
                SignalState::Red
            } else if recovering {
                SignalState::Orange
            } else {
                SignalState::Green
            });
            filtered.push(red);
            in_recovery.push(recovering);
        }

        Ok(ModerateVolTrace {
            moderate_pct,
            baseline,
            threshold,
            raw,
            filtered,
            in_recovery,
            states,
        })
    }
}

impl SignalStrategy for ModerateVolSignal {
    fn name(&self) -> &'static str {
        "moderate_vol"
    }

    fn generate(&self, series: &ReturnSeries) -> PowerLawResult<SignalOutput> {
        let trace = self.trace(series)?;
        log_state_summary(self.name(), &trace.states);
        Ok(SignalOutput {
            valid_from: trace.baseline.iter().position(Option::is_some),
            indicator: trace.moderate_pct,
            states: trace.states,
        })
    }
}
