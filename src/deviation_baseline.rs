//! Mean CCDF deviation against its own rolling baseline.
//!
//! The indicator is the 60-day mean deviation of the empirical CCDF from
//! its fitted power law over the moderate zone. Days whose deviation sits
//! above the rolling mean of the last year are RED, all others GREEN.
//!
//! [`significant_cross_unders`] scans the same indicator for excursions
//! above a shorter baseline that both started with a jump and peaked more
//! than one rolling standard deviation away, and reports where each
//! excursion crossed back under.

use crate::config::TailFitConfig;
use crate::deviation::rolling_mean_deviation;
use crate::errors::{validate_window, PowerLawResult};
use crate::math_utils::{rolling_mean, rolling_std};
use crate::series::ReturnSeries;
use crate::signal_state::{log_state_summary, SignalOutput, SignalState, SignalStrategy};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of the deviation-baseline signal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviationBaselineConfig {
    /// Trailing window of each mean-deviation fit
    pub window: usize,
    /// Tail fit parameters
    pub fit: TailFitConfig,
    /// Rolling-mean baseline length
    pub baseline_window: usize,
}

impl Default for DeviationBaselineConfig {
    fn default() -> Self {
        Self {
            window: 60,
            fit: TailFitConfig::strict(),
            baseline_window: 252,
        }
    }
}

/// Deviation-baseline signal strategy.
#[derive(Debug, Clone, Default)]
pub struct DeviationBaselineSignal {
    /// Signal parameters
    pub config: DeviationBaselineConfig,
}

impl DeviationBaselineSignal {
    /// Strategy with the given parameters.
    pub fn new(config: DeviationBaselineConfig) -> Self {
        Self { config }
    }

    /// Per-day mean deviation and its rolling baseline.
    pub fn indicator(&self, series: &ReturnSeries) -> PowerLawResult<(Vec<Option<f64>>, Vec<Option<f64>>)> {
        validate_window(self.config.window, "window")?;
        validate_window(self.config.baseline_window, "baseline_window")?;
        self.config.fit.validate()?;
        let deviation = rolling_mean_deviation(series.returns(), self.config.window, &self.config.fit);
        let baseline = rolling_mean(&deviation, self.config.baseline_window);
        Ok((deviation, baseline))
    }
}

impl SignalStrategy for DeviationBaselineSignal {
    fn name(&self) -> &'static str {
        "deviation_baseline"
    }

    fn generate(&self, series: &ReturnSeries) -> PowerLawResult<SignalOutput> {
        let (deviation, baseline) = self.indicator(series)?;
        let states: Vec<SignalState> = deviation
            .iter()
            .zip(&baseline)
            .map(|pair| match pair {
                (Some(d), Some(b)) if d > b => SignalState::Red,
                _ => SignalState::Green,
            })
            .collect();
        log_state_summary(self.name(), &states);
        Ok(SignalOutput {
            valid_from: baseline.iter().position(Option::is_some),
            indicator: deviation,
            states,
        })
    }
}

/// Parameters of the cross-under scan.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CrossUnderConfig {
    /// Rolling-mean baseline the indicator is compared against
    pub baseline_window: usize,
    /// Window of the rolling standard deviation of `deviation - baseline`
    pub sigma_window: usize,
}

impl Default for CrossUnderConfig {
    fn default() -> Self {
        Self {
            baseline_window: 84,
            sigma_window: 252,
        }
    }
}

/// An excursion above baseline that ended with a significant cross-under.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CrossUnder {
    /// Day the indicator fell back to or below its baseline
    pub index: usize,
    /// Largest `deviation - baseline` during the excursion
    pub peak_height: f64,
    /// Day-over-day indicator change on the crossing-up day
    pub jump: f64,
    /// Rolling standard deviation both moves had to exceed
    pub threshold: f64,
}

/// Cross-unders whose initial jump and peak both exceeded one rolling σ.
///
/// Pairs of days where the indicator or baseline is undefined are skipped
/// and leave the scan state untouched.
pub fn significant_cross_unders(deviation: &[Option<f64>], config: &CrossUnderConfig) -> Vec<CrossUnder> {
    let baseline = rolling_mean(deviation, config.baseline_window);
    let excess: Vec<Option<f64>> = deviation
        .iter()
        .zip(&baseline)
        .map(|(d, b)| Some((*d)? - (*b)?))
        .collect();
    let sigma = rolling_std(&excess, config.sigma_window);

    let mut events = Vec::new();
    let mut above = false;
    let mut peak_height = 0.0f64;
    let mut jump = 0.0f64;

    for i in 1..deviation.len() {
        let (Some(prev_dev), Some(curr_dev), Some(prev_base), Some(curr_base)) =
            (deviation[i - 1], deviation[i], baseline[i - 1], baseline[i])
        else {
            continue;
        };

        if prev_dev <= prev_base && curr_dev > curr_base {
            above = true;
            jump = curr_dev - prev_dev;
            peak_height = curr_dev - curr_base;
        } else if above && curr_dev > curr_base {
            peak_height = peak_height.max(curr_dev - curr_base);
        } else if above && prev_dev > prev_base && curr_dev <= curr_base {
            above = false;
            if let Some(threshold) = sigma[i] {
                if peak_height > threshold && jump.abs() > threshold {
                    events.push(CrossUnder {
                        index: i,
                        peak_height,
                        jump,
                        threshold,
                    });
                }
            }
            peak_height = 0.0;
            jump = 0.0;
        }
    }

    log::debug!("Found {} significant cross-unders", events.len());
    events
}
