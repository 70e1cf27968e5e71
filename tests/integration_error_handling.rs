//! Integration tests for error handling and invalid input scenarios
//!
//! Structural problems (missing columns, no signal, misaligned inputs, bad
//! parameters) must fail before any computation; thin tail data must only
//! leave days undefined.

use chrono::NaiveDate;
use powerlaw_finance::*;

fn dates(n: usize) -> Vec<NaiveDate> {
    business_dates(NaiveDate::from_ymd_opt(2018, 3, 1).unwrap(), n)
}

/// Test scenario: a price frame without closes
#[test]
fn test_missing_close_column() {
    let frame = PriceFrame {
        date: Some(dates(5)),
        ..Default::default()
    };
    match ReturnSeries::from_frame(&frame, &LoaderConfig::default()) {
        Err(PowerLawError::MissingInput { field }) => assert_eq!(field, "close"),
        other => panic!("Expected MissingInput error, got {:?}", other),
    }
}

/// Test scenario: duplicated dates are rejected
#[test]
fn test_duplicate_dates() {
    let mut d = dates(4);
    d[2] = d[1];
    let frame = PriceFrame {
        date: Some(d),
        close: Some(vec![100.0, 101.0, 102.0, 103.0]),
        ..Default::default()
    };
    assert!(matches!(
        ReturnSeries::from_frame(&frame, &LoaderConfig::default()),
        Err(PowerLawError::UnorderedSeries { .. })
    ));
}

/// Test scenario: a backtest frame that carries no signal
#[test]
fn test_backtest_without_signal() {
    let frame = BacktestFrame {
        dates: dates(3),
        returns: vec![0.5, -0.2, 0.1],
        states: None,
        binary_signal: None,
    };
    assert!(matches!(
        run_backtest(&frame, 0, &LeverageMap::default()),
        Err(PowerLawError::ConfigurationError { .. })
    ));
}

/// Test scenario: states that do not line up with the returns
#[test]
fn test_misaligned_states() {
    let frame = BacktestFrame {
        dates: dates(3),
        returns: vec![0.5, -0.2, 0.1],
        states: Some(vec![SignalState::Red; 2]),
        binary_signal: None,
    };
    assert!(matches!(
        run_backtest(&frame, 0, &LeverageMap::default()),
        Err(PowerLawError::LengthMismatch { .. })
    ));
}

/// Test scenario: unusable strategy parameters
#[test]
fn test_invalid_parameters() {
    let n = 50;
    let series = ReturnSeries::from_parts(dates(n), vec![100.0; n], vec![1.0; n]).unwrap();

    let alpha = AlphaDerivativeSignal::new(AlphaDerivativeConfig {
        alpha_window: 0,
        ..Default::default()
    });
    assert!(matches!(
        alpha.generate(&series),
        Err(PowerLawError::InvalidParameter { .. })
    ));

    let moderate = ModerateVolSignal::new(ModerateVolConfig {
        threshold_multiplier: f64::NAN,
        ..Default::default()
    });
    assert!(moderate.generate(&series).is_err());
}

/// Test scenario: thin tails leave days undefined instead of failing
#[test]
fn test_thin_tails_are_absorbed() {
    let n = 120;
    let returns: Vec<f64> = (0..n).map(|i| if i % 20 == 0 { 1.5 } else { 0.1 }).collect();
    let series = ReturnSeries::from_parts(dates(n), vec![100.0; n], returns).unwrap();

    let output = PowerLawDeviationSignal::default().generate(&series).unwrap();
    assert_eq!(output.states.len(), n);
    assert!(output.indicator.iter().all(Option::is_none));

    let fits = rolling_fits(series.returns(), 60, &TailFitConfig::strict());
    assert!(fits.iter().all(Option::is_none));
}
