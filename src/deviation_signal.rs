//! Point-wise power-law deviation signal.
//!
//! Each day a power law is fitted to the previous 60 days. If today's
//! absolute return is more common inside that window than the fitted law
//! predicts, the day is RED. Two-state: every other day is GREEN.

use crate::config::TailFitConfig;
use crate::errors::{validate_window, PowerLawResult};
use crate::power_law::fit_power_law;
use crate::series::ReturnSeries;
use crate::signal_state::{log_state_summary, SignalOutput, SignalState, SignalStrategy};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of the power-law deviation signal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PowerLawDeviationConfig {
    /// Trailing fit window
    pub window: usize,
    /// Tail fit parameters
    pub fit: TailFitConfig,
    /// Only days with `|r| >= min_return` may turn RED; when false any
    /// non-zero return is eligible
    pub filter_small_returns: bool,
}

impl Default for PowerLawDeviationConfig {
    fn default() -> Self {
        Self {
            window: 60,
            fit: TailFitConfig::strict(),
            filter_small_returns: true,
        }
    }
}

/// Power-law deviation signal strategy.
#[derive(Debug, Clone, Default)]
pub struct PowerLawDeviationSignal {
    /// Signal parameters
    pub config: PowerLawDeviationConfig,
}

impl PowerLawDeviationSignal {
    /// Strategy with the given parameters.
    pub fn new(config: PowerLawDeviationConfig) -> Self {
        Self { config }
    }

    /// Variant without the small-return filter.
    pub fn unfiltered() -> Self {
        Self::new(PowerLawDeviationConfig {
            filter_small_returns: false,
            ..Default::default()
        })
    }

    fn eligible(&self, abs_return: f64) -> bool {
        if self.config.filter_small_returns {
            abs_return >= self.config.fit.min_return
        } else {
            abs_return > 0.0
        }
    }

    /// Empirical minus predicted survival of today's return within the window.
    ///
    /// `None` when the window has no fit or today is not eligible.
    pub fn excess_survival(&self, window: &[f64], today: f64) -> Option<f64> {
        let magnitude = today.abs();
        if window.is_empty() || !self.eligible(magnitude) {
            return None;
        }
        let tail_fit = fit_power_law(window, &self.config.fit)?;
        let predicted = tail_fit.fit.predict(magnitude);
        let actual =
            window.iter().filter(|r| r.abs() >= magnitude).count() as f64 / window.len() as f64;
        Some(actual - predicted)
    }
}

impl SignalStrategy for PowerLawDeviationSignal {
    fn name(&self) -> &'static str {
        "power_law_deviation"
    }

    fn generate(&self, series: &ReturnSeries) -> PowerLawResult<SignalOutput> {
        validate_window(self.config.window, "window")?;
        self.config.fit.validate()?;

        let returns = series.returns();
        let indicator: Vec<Option<f64>> = (0..series.len())
            .map(|i| {
                series
                    .window(i, self.config.window)
                    .and_then(|w| self.excess_survival(w, returns[i]))
            })
            .collect();
        let states: Vec<SignalState> = indicator
            .iter()
            .map(|gap| match gap {
                Some(g) if *g > 0.0 => SignalState::Red,
                _ => SignalState::Green,
            })
            .collect();

        log_state_summary(self.name(), &states);
        log::debug!("{} valid from day {}", self.name(), self.config.window);
        Ok(SignalOutput {
            valid_from: (series.len() > self.config.window).then_some(self.config.window),
            indicator,
            states,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::business_dates;
    use chrono::NaiveDate;

    fn pareto_window(n: usize, alpha: f64, scale: f64) -> Vec<f64> {
        (1..=n)
            .map(|i| scale * (i as f64 / n as f64).powf(-1.0 / alpha))
            .collect()
    }

    fn series(returns: Vec<f64>) -> ReturnSeries {
        let n = returns.len();
        let dates = business_dates(NaiveDate::from_ymd_opt(2010, 1, 4).unwrap(), n);
        ReturnSeries::from_parts(dates, vec![100.0; n], returns).unwrap()
    }

    #[test]
    fn test_excess_survival_on_exact_law() {
        let window = pareto_window(60, 2.0, 0.6);
        let signal = PowerLawDeviationSignal::default();
        // within the fitted law the gap is zero to rounding
        let gap = signal.excess_survival(&window, window[30]).unwrap();
        assert!(gap.abs() < 1e-9);
        // small returns are filtered
        assert_eq!(signal.excess_survival(&window, 0.2), None);
        assert!(PowerLawDeviationSignal::unfiltered()
            .excess_survival(&window, 0.2)
            .is_some());
    }

    #[test]
    fn test_crowded_magnitude_turns_red() {
        let mut returns = pareto_window(60, 2.0, 0.6);
        // day 60 repeats a magnitude seen many times in a window of mostly 1.0
        returns[..30].iter_mut().for_each(|r| *r = 1.0);
        returns.push(-1.0);
        let output = PowerLawDeviationSignal::default().generate(&series(returns)).unwrap();
        assert_eq!(output.states.len(), 61);
        assert!(output.states[..60].iter().all(|s| *s == SignalState::Green));
        assert_eq!(output.states[60], SignalState::Red);
        assert_eq!(output.valid_from, Some(60));
    }

    #[test]
    fn test_short_series_never_valid() {
        let output = PowerLawDeviationSignal::default()
            .generate(&series(vec![1.0; 30]))
            .unwrap();
        assert_eq!(output.valid_from, None);
        assert!(output.states.iter().all(|s| *s == SignalState::Green));
    }
}
