//! Fit-quality derivative regime signal.
//!
//! A single tail exponent is fitted to the whole series. Every 21-day
//! window is then scored by how well that fixed exponent explains its tail
//! (R² with only the intercept refitted). Day-over-day changes of that
//! score beyond one standard deviation are breaches: upward breaches are
//! green markers, downward breaches red markers. Whenever two consecutive
//! markers share a colour, the span between them (both ends included)
//! takes that colour; everything else is neutral and reported as ORANGE.
//!
//! The conventional leverage is short on RED, long on the neutral state
//! and doubly long on GREEN.

use crate::backtest::LeverageMap;
use crate::config::TailFitConfig;
use crate::errors::{validate_parameter, validate_window, PowerLawError, PowerLawResult};
use crate::math_utils::mean_and_std;
use crate::power_law::{fit_power_law, fit_with_fixed_alpha};
use crate::series::ReturnSeries;
use crate::signal_state::{log_state_summary, SignalOutput, SignalState, SignalStrategy};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of the R²-derivative signal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct R2DerivativeConfig {
    /// Rolling fixed-alpha R² window
    pub window: usize,
    /// Breach threshold in standard deviations of the R² change
    pub threshold_sigma: f64,
    /// Tail fit parameters, for the global fit and each window
    pub fit: TailFitConfig,
}

impl Default for R2DerivativeConfig {
    fn default() -> Self {
        Self {
            window: 21,
            threshold_sigma: 1.0,
            fit: TailFitConfig::strict(),
        }
    }
}

/// A derivative breach beyond the sigma band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Breach {
    /// Day of the breach in the input series
    pub index: usize,
    /// `Green` for an upward breach, `Red` for a downward one
    pub state: SignalState,
}

/// R²-derivative signal strategy.
#[derive(Debug, Clone, Default)]
pub struct R2DerivativeSignal {
    /// Signal parameters
    pub config: R2DerivativeConfig,
}

impl R2DerivativeSignal {
    /// Strategy with the given parameters.
    pub fn new(config: R2DerivativeConfig) -> Self {
        Self { config }
    }

    /// Tail exponent of the whole series.
    pub fn global_alpha(&self, series: &ReturnSeries) -> PowerLawResult<f64> {
        fit_power_law(series.returns(), &self.config.fit)
            .map(|t| t.fit.alpha)
            .ok_or_else(|| PowerLawError::InsufficientData {
                required: self.config.fit.min_points,
                actual: series
                    .returns()
                    .iter()
                    .filter(|r| r.abs() > self.config.fit.min_return)
                    .count(),
            })
    }

    /// Per-day change of the fixed-alpha R² and the breaches it produces.
    ///
    /// Changes are taken between consecutive days that have an R², so a
    /// skipped window does not split the sequence.
    pub fn breaches(&self, series: &ReturnSeries) -> PowerLawResult<(Vec<Option<f64>>, Vec<Breach>)> {
        validate_window(self.config.window, "window")?;
        validate_parameter(self.config.threshold_sigma, 0.0, 100.0, "threshold_sigma")?;
        self.config.fit.validate()?;

        let alpha = self.global_alpha(series)?;
        let defined: Vec<(usize, f64)> = (0..series.len())
            .filter_map(|i| {
                let window = series.window(i, self.config.window)?;
                fit_with_fixed_alpha(window, alpha, &self.config.fit).map(|r2| (i, r2))
            })
            .collect();

        let mut derivative = vec![None; series.len()];
        let changes: Vec<(usize, f64)> = defined
            .windows(2)
            .map(|pair| (pair[1].0, pair[1].1 - pair[0].1))
            .collect();
        for (day, change) in &changes {
            derivative[*day] = Some(*change);
        }

        let values: Vec<f64> = changes.iter().map(|(_, c)| *c).collect();
        let (_, std) = mean_and_std(&values);
        if !std.is_finite() {
            log::warn!("R² derivative has fewer than two values; no breaches possible");
            return Ok((derivative, Vec::new()));
        }
        let band = self.config.threshold_sigma * std;
        let breaches = changes
            .iter()
            .filter_map(|(day, change)| {
                if *change > band {
                    Some(Breach {
                        index: *day,
                        state: SignalState::Green,
                    })
                } else if *change < -band {
                    Some(Breach {
                        index: *day,
                        state: SignalState::Red,
                    })
                } else {
                    None
                }
            })
            .collect();
        Ok((derivative, breaches))
    }
}

/// Colour the spans between consecutive same-colour breaches.
///
/// Later spans overwrite earlier ones where they touch. Days outside any
/// span are ORANGE.
pub fn regime_from_breaches(len: usize, breaches: &[Breach]) -> Vec<SignalState> {
    let mut regime = vec![SignalState::Orange; len];
    for pair in breaches.windows(2) {
        if pair[0].state == pair[1].state {
            let end = pair[1].index.min(len.saturating_sub(1));
            for day in regime.iter_mut().take(end + 1).skip(pair[0].index) {
                *day = pair[0].state;
            }
        }
    }
    regime
}

impl SignalStrategy for R2DerivativeSignal {
    fn name(&self) -> &'static str {
        "r2_derivative"
    }

    fn generate(&self, series: &ReturnSeries) -> PowerLawResult<SignalOutput> {
        let (derivative, breaches) = self.breaches(series)?;
        let states = regime_from_breaches(series.len(), &breaches);
        log_state_summary(self.name(), &states);
        Ok(SignalOutput {
            valid_from: derivative.iter().position(Option::is_some),
            indicator: derivative,
            states,
        })
    }

    fn default_leverage(&self) -> LeverageMap {
        LeverageMap::from_pairs(&[
            (SignalState::Red, -1.0),
            (SignalState::Orange, 1.0),
            (SignalState::Green, 2.0),
        ])
    }
}
