//! # Tail Fit Configuration
//!
//! Parameters shared by every component that fits a power law to the tail
//! of a return window: the tail threshold, the minimum tail size below which
//! a fit is undefined, and the "moderate volatility zone" over which mean
//! deviations are averaged.

use crate::errors::{validate_parameter, PowerLawError, PowerLawResult};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for power-law tail fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TailFitConfig {
    /// Only absolute returns strictly above this value (percent) are fitted
    pub min_return: f64,
    /// Fewer tail points than this leaves the fit undefined
    pub min_points: usize,
    /// Inclusive `[low, high]` magnitude band for mean deviations (percent)
    pub moderate_zone: (f64, f64),
}

impl Default for TailFitConfig {
    fn default() -> Self {
        Self::strict()
    }
}

impl TailFitConfig {
    /// Ten tail points required, as used by the signal generators.
    pub fn strict() -> Self {
        Self {
            min_return: 0.5,
            min_points: 10,
            moderate_zone: (0.5, 3.0),
        }
    }

    /// Five tail points required, for short exploratory windows.
    pub fn lenient() -> Self {
        Self {
            min_points: 5,
            ..Self::strict()
        }
    }

    /// Same configuration with a different tail threshold.
    pub fn with_min_return(mut self, min_return: f64) -> Self {
        self.min_return = min_return;
        self
    }

    /// Check the configuration for usable values.
    pub fn validate(&self) -> PowerLawResult<()> {
        validate_parameter(self.min_return, 0.0, 100.0, "min_return")?;
        if self.min_points < 2 {
            return Err(PowerLawError::InvalidParameter {
                parameter: "min_points".to_string(),
                value: self.min_points as f64,
                constraint: "at least 2 points are needed for a line fit".to_string(),
            });
        }
        let (low, high) = self.moderate_zone;
        validate_parameter(low, 0.0, 100.0, "moderate_zone.low")?;
        validate_parameter(high, low, 100.0, "moderate_zone.high")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(TailFitConfig::default().min_points, 10);
        assert_eq!(TailFitConfig::lenient().min_points, 5);
        assert_eq!(TailFitConfig::lenient().moderate_zone, (0.5, 3.0));
        assert_eq!(TailFitConfig::strict().with_min_return(0.0).min_return, 0.0);
    }

    #[test]
    fn test_validation() {
        assert!(TailFitConfig::strict().validate().is_ok());
        let bad = TailFitConfig {
            min_points: 1,
            ..TailFitConfig::strict()
        };
        assert!(bad.validate().is_err());
        let inverted = TailFitConfig {
            moderate_zone: (3.0, 0.5),
            ..TailFitConfig::strict()
        };
        assert!(inverted.validate().is_err());
    }
}
