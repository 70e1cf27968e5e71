//! Tail-exponent derivative z-score signal.
//!
//! Measures how restless the tail exponent is. A 42-day rolling alpha is
//! differenced, its absolute change smoothed with an 84-day moving average
//! and normalized against a two-year rolling mean and standard deviation.
//! The z-score maps to GREEN above +1 (more chaotic than usual), RED below
//! -1 (unusually stable) and ORANGE otherwise.
//!
//! Differencing and smoothing run over the days that have an alpha only,
//! so a skipped window never breaks the rolling statistics.

use crate::config::TailFitConfig;
use crate::errors::{validate_parameter, validate_window, PowerLawResult};
use crate::math_utils::{diff, rolling_mean, rolling_std};
use crate::power_law::rolling_fits;
use crate::series::ReturnSeries;
use crate::signal_state::{log_state_summary, SignalOutput, SignalState, SignalStrategy};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of the alpha-derivative signal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlphaDerivativeConfig {
    /// Rolling alpha window
    pub alpha_window: usize,
    /// Moving average of `|d alpha|`
    pub ma_window: usize,
    /// Window of the z-score mean and standard deviation
    pub zscore_window: usize,
    /// `|z|` above this leaves the neutral band
    pub z_threshold: f64,
    /// Tail fit parameters
    pub fit: TailFitConfig,
}

impl Default for AlphaDerivativeConfig {
    fn default() -> Self {
        Self {
            alpha_window: 42,
            ma_window: 84,
            zscore_window: 504,
            z_threshold: 1.0,
            fit: TailFitConfig::strict(),
        }
    }
}

impl AlphaDerivativeConfig {
    /// Check the configuration for usable values.
    pub fn validate(&self) -> PowerLawResult<()> {
        validate_window(self.alpha_window, "alpha_window")?;
        validate_window(self.ma_window, "ma_window")?;
        validate_window(self.zscore_window, "zscore_window")?;
        validate_parameter(self.z_threshold, 0.0, 100.0, "z_threshold")?;
        self.fit.validate()
    }
}

/// Alpha-derivative signal strategy.
#[derive(Debug, Clone, Default)]
pub struct AlphaDerivativeSignal {
    /// Signal parameters
    pub config: AlphaDerivativeConfig,
}

impl AlphaDerivativeSignal {
    /// Strategy with the given parameters.
    pub fn new(config: AlphaDerivativeConfig) -> Self {
        Self { config }
    }

    /// State for a z-score.
    pub fn classify(&self, z: Option<f64>) -> SignalState {
        match z {
            Some(z) if z > self.config.z_threshold => SignalState::Green,
            Some(z) if z < -self.config.z_threshold => SignalState::Red,
            _ => SignalState::Orange,
        }
    }

    /// Per-day z-score of the smoothed absolute alpha change.
    pub fn zscores(&self, series: &ReturnSeries) -> PowerLawResult<Vec<Option<f64>>> {
        self.config.validate()?;
        let cfg = &self.config;
        let fits = rolling_fits(series.returns(), cfg.alpha_window, &cfg.fit);

        let defined_days: Vec<usize> = fits
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.map(|_| i))
            .collect();
        let alphas: Vec<Option<f64>> = fits.iter().flatten().map(|f| Some(f.alpha)).collect();

        let abs_change: Vec<Option<f64>> = diff(&alphas).into_iter().map(|d| d.map(f64::abs)).collect();
        let smoothed = rolling_mean(&abs_change, cfg.ma_window);
        let mean = rolling_mean(&smoothed, cfg.zscore_window);
        let std = rolling_std(&smoothed, cfg.zscore_window);

        let mut z = vec![None; series.len()];
        for (k, day) in defined_days.iter().enumerate() {
            z[*day] = match (smoothed[k], mean[k], std[k]) {
                (Some(v), Some(m), Some(s)) if s > 0.0 => Some((v - m) / s),
                _ => None,
            };
        }
        Ok(z)
    }
}

impl SignalStrategy for AlphaDerivativeSignal {
    fn name(&self) -> &'static str {
        "alpha_derivative"
    }

    fn generate(&self, series: &ReturnSeries) -> PowerLawResult<SignalOutput> {
        let z = self.zscores(series)?;
        let states: Vec<SignalState> = z.iter().map(|v| self.classify(*v)).collect();
        log_state_summary(self.name(), &states);
        Ok(SignalOutput {
            valid_from: z.iter().position(Option::is_some),
            indicator: z,
            states,
        })
    }
}
