//! Error types and validation functions for power-law regime analysis.
//!
//! Only structural problems are errors here. A rolling window that holds too
//! few tail observations to fit is an expected outcome and surfaces as
//! `Option::None` for that day, never as a [`PowerLawError`].

use thiserror::Error;

/// Error types for power-law fitting, signal generation and backtesting.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PowerLawError {
    /// Insufficient data for an operation that cannot be skipped.
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData {
        /// Minimum required data points
        required: usize,
        /// Actual number of data points provided
        actual: usize,
    },

    /// A required input column is absent.
    #[error("Missing input: required field '{field}' was not supplied")]
    MissingInput {
        /// Name of the missing field
        field: String,
    },

    /// The caller supplied an unusable combination of inputs.
    #[error("Configuration error: {reason}")]
    ConfigurationError {
        /// What is wrong with the configuration
        reason: String,
    },

    /// Invalid parameter value.
    #[error("Invalid parameter: {parameter} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value provided
        value: f64,
        /// Valid range or constraint description
        constraint: String,
    },

    /// Two columns that must be aligned have different lengths.
    #[error("Length mismatch for {field}: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Column that is misaligned
        field: String,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Dates are duplicated after sorting.
    #[error("Series is not strictly increasing by date at index {index}")]
    UnorderedSeries {
        /// First offending row (after sorting)
        index: usize,
    },

    /// Numerical computation error.
    #[error("Numerical computation failed: {reason}")]
    NumericalError {
        /// Detailed reason for numerical failure
        reason: String,
        /// Operation that failed
        operation: Option<String>,
    },
}

/// Result type for power-law analysis operations.
pub type PowerLawResult<T> = Result<T, PowerLawError>;

/// Validates that data has sufficient length for analysis.
///
/// # Example
/// ```rust
/// use powerlaw_finance::errors::validate_data_length;
///
/// let data = vec![1.0, 2.0, 3.0];
/// assert!(validate_data_length(&data, 2, "test").is_ok());
/// assert!(validate_data_length(&data, 5, "test").is_err());
/// ```
pub fn validate_data_length(data: &[f64], min_required: usize, operation: &str) -> PowerLawResult<()> {
    if data.len() < min_required {
        log::debug!(
            "{}: {} points supplied, {} required",
            operation,
            data.len(),
            min_required
        );
        Err(PowerLawError::InsufficientData {
            required: min_required,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}

/// Validates that a parameter is within inclusive bounds.
///
/// # Example
/// ```rust
/// use powerlaw_finance::errors::validate_parameter;
///
/// assert!(validate_parameter(1.10, 0.0, 10.0, "baseline_multiplier").is_ok());
/// assert!(validate_parameter(-1.0, 0.0, 10.0, "baseline_multiplier").is_err());
/// ```
pub fn validate_parameter(value: f64, min: f64, max: f64, name: &str) -> PowerLawResult<()> {
    if value.is_nan() {
        return Err(PowerLawError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: "must not be NaN".to_string(),
        });
    }

    if min.is_nan() || max.is_nan() || min > max {
        return Err(PowerLawError::NumericalError {
            reason: format!(
                "Invalid bounds for parameter {}: min={}, max={}",
                name, min, max
            ),
            operation: None,
        });
    }

    if value < min || value > max {
        Err(PowerLawError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: format!("[{}, {}]", min, max),
        })
    } else {
        Ok(())
    }
}

/// Validates that a rolling window length is usable (non-zero).
pub fn validate_window(window: usize, name: &str) -> PowerLawResult<()> {
    if window == 0 {
        Err(PowerLawError::InvalidParameter {
            parameter: name.to_string(),
            value: 0.0,
            constraint: "window must be at least 1".to_string(),
        })
    } else {
        Ok(())
    }
}

/// Validates that all values in a slice are finite.
///
/// Returns on the first non-finite value, reporting its index.
pub fn validate_all_finite(data: &[f64], name: &str) -> PowerLawResult<()> {
    if let Some((i, &value)) = data.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(PowerLawError::NumericalError {
            reason: format!("{} contains non-finite value at index {}: {}", name, i, value),
            operation: None,
        });
    }
    Ok(())
}

/// Validates that an aligned column has the expected length.
pub fn validate_same_length(expected: usize, actual: usize, field: &str) -> PowerLawResult<()> {
    if expected != actual {
        Err(PowerLawError::LengthMismatch {
            field: field.to_string(),
            expected,
            actual,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_data_length_insufficient() {
        let data = vec![1.0, 2.0];
        match validate_data_length(&data, 5, "rolling fit") {
            Err(PowerLawError::InsufficientData { required, actual }) => {
                assert_eq!(required, 5);
                assert_eq!(actual, 2);
            }
            other => panic!("Expected InsufficientData error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_data_length_exact_minimum() {
        let data = vec![1.0, 2.0, 3.0];
        assert!(validate_data_length(&data, 3, "rolling fit").is_ok());
        assert!(validate_data_length(&[], 0, "rolling fit").is_ok());
    }

    #[test]
    fn test_validate_parameter_out_of_range() {
        match validate_parameter(1.5, 0.0, 1.0, "tolerance_fraction") {
            Err(PowerLawError::InvalidParameter {
                parameter,
                value,
                constraint,
            }) => {
                assert_eq!(parameter, "tolerance_fraction");
                assert_eq!(value, 1.5);
                assert_eq!(constraint, "[0, 1]");
            }
            other => panic!("Expected InvalidParameter error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_parameter_boundaries_and_nan() {
        assert!(validate_parameter(0.0, 0.0, 1.0, "p").is_ok());
        assert!(validate_parameter(1.0, 0.0, 1.0, "p").is_ok());
        assert!(matches!(
            validate_parameter(f64::NAN, 0.0, 1.0, "p"),
            Err(PowerLawError::InvalidParameter { .. })
        ));
        assert!(matches!(
            validate_parameter(0.5, 1.0, 0.0, "p"),
            Err(PowerLawError::NumericalError { .. })
        ));
    }

    #[test]
    fn test_validate_window_zero() {
        assert!(validate_window(60, "window").is_ok());
        assert!(matches!(
            validate_window(0, "window"),
            Err(PowerLawError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_validate_all_finite_reports_index() {
        assert!(validate_all_finite(&[], "returns").is_ok());
        match validate_all_finite(&[1.0, 2.0, f64::NAN], "returns") {
            Err(PowerLawError::NumericalError { reason, .. }) => {
                assert!(reason.contains("returns"));
                assert!(reason.contains("index 2"));
            }
            other => panic!("Expected NumericalError, got {:?}", other),
        }
    }

    #[test]
    fn test_error_display_formatting() {
        let err = PowerLawError::MissingInput {
            field: "close".to_string(),
        };
        assert!(err.to_string().contains("close"));

        let err = PowerLawError::ConfigurationError {
            reason: "no signal supplied".to_string(),
        };
        assert!(err.to_string().starts_with("Configuration error"));

        let err = PowerLawError::LengthMismatch {
            field: "states".to_string(),
            expected: 10,
            actual: 9,
        };
        let text = err.to_string();
        assert!(text.contains("states") && text.contains("10") && text.contains('9'));
    }
}
