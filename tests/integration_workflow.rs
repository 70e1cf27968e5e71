//! Integration tests for full workflow scenarios
//!
//! These tests run synthetic heavy-tailed returns through loading, tail
//! fitting, deviation measurement, every signal strategy and the backtester.

use assert_approx_eq::assert_approx_eq;
use chrono::NaiveDate;
use powerlaw_finance::math_utils::mean_and_std;
use powerlaw_finance::*;

fn student_t_series(length: usize, seed: u64) -> ReturnSeries {
    let returns = generate_student_t_returns(
        &GeneratorConfig {
            length,
            seed: Some(seed),
        },
        &StudentTConfig::default(),
    )
    .unwrap();
    let closes = prices_from_returns(100.0, &returns);
    let dates = business_dates(NaiveDate::from_ymd_opt(2000, 1, 3).unwrap(), closes.len());
    let frame = PriceFrame {
        date: Some(dates),
        close: Some(closes),
        ..Default::default()
    };
    ReturnSeries::from_frame(&frame, &LoaderConfig::default()).unwrap()
}

/// Test scenario: every 60-day window with enough tail points has a usable fit
#[test]
fn test_sixty_day_windows_have_finite_alpha() {
    let series = student_t_series(1000, 42);
    let returns = series.returns();
    let config = TailFitConfig::strict();
    let mut fitted = 0;

    for end in 60..=returns.len() {
        let window = &returns[end - 60..end];
        let tail_points = window.iter().filter(|r| r.abs() > 0.5).count();
        if tail_points < 10 {
            continue;
        }
        let tail_fit = fit_power_law(window, &config).expect("window with ten tail points must fit");
        assert!(tail_fit.fit.alpha.is_finite() && tail_fit.fit.alpha > 0.0);
        assert!((0.0..=1.0).contains(&tail_fit.fit.r_squared));
        fitted += 1;
    }
    assert!(fitted > 800, "only {} windows fitted", fitted);
}

/// Test scenario: the CCDF does not depend on input order
#[test]
fn test_ccdf_ignores_input_order() {
    let series = student_t_series(300, 7);
    let original = series.returns().to_vec();
    let mut reordered = original.clone();
    reordered.reverse();
    reordered.rotate_left(17);

    let a = empirical_ccdf(&original);
    assert_eq!(a, empirical_ccdf(&original));
    assert_eq!(a, empirical_ccdf(&reordered));
}

/// Test scenario: mean deviations settle down as windows grow
///
/// Windows of the same length share the systematic misfit of a Student-t
/// tail, so the spread across windows isolates the sampling noise.
#[test]
fn test_mean_deviation_spread_shrinks_with_window() {
    let series = student_t_series(5000, 2024);
    let returns = series.returns();
    let config = TailFitConfig::strict();

    let spread = |window: usize| -> f64 {
        let values: Vec<f64> = returns
            .chunks_exact(window)
            .filter_map(|chunk| {
                let tail_fit = fit_power_law(chunk, &config)?;
                mean_deviation(&deviation_profile(&tail_fit), config.moderate_zone)
            })
            .collect();
        assert!(values.len() >= 5);
        mean_and_std(&values).1
    };

    let short = spread(50);
    let long = spread(500);
    assert!(long < short, "spread {} at 500 days vs {} at 50", long, short);
}

/// Test scenario: an undifferentiated leverage map reproduces buy & hold
#[test]
fn test_flat_leverage_matches_buy_and_hold() {
    let series = student_t_series(800, 3);
    let output = ModerateVolSignal::default().generate(&series).unwrap();
    let frame = BacktestFrame::from_states(&series, output.states);

    let run = run_backtest(&frame, 1, &LeverageMap::uniform(1.0)).unwrap();
    assert_eq!(run.strategy_cumulative, run.bh_cumulative);
    assert_approx_eq!(run.summary.ratio, 1.0);

    let compounded = series
        .returns()
        .iter()
        .fold(1.0, |acc, r| acc * (1.0 + r / 100.0));
    assert_approx_eq!(run.summary.final_bh, compounded, 1e-9 * compounded);
}

/// Test scenario: a lag shifts positions forward and pads the end
#[test]
fn test_lag_shifts_positions() {
    let series = student_t_series(400, 11);
    let output = DeviationBaselineSignal::default().generate(&series).unwrap();
    let frame = BacktestFrame::from_states(&series, output.states);
    let leverage = LeverageMap::from_pairs(&[(SignalState::Red, 0.0), (SignalState::Green, 2.0)]);

    let same_day = run_backtest(&frame, 0, &leverage).unwrap();
    let lagged = run_backtest(&frame, 3, &leverage).unwrap();
    let n = frame.len();
    assert_eq!(&lagged.positions[..n - 3], &same_day.positions[3..]);
    assert!(lagged.positions[n - 3..].iter().all(|p| *p == 2.0));
    assert_eq!(lagged.summary.lag, 3);
}

/// Test scenario: every strategy labels every day
#[test]
fn test_all_strategies_align_with_input() {
    let series = student_t_series(1200, 99);
    let strategies: Vec<Box<dyn SignalStrategy>> = vec![
        Box::new(ModerateVolSignal::default()),
        Box::new(PowerLawDeviationSignal::default()),
        Box::new(PowerLawDeviationSignal::unfiltered()),
        Box::new(DeviationBaselineSignal::default()),
        Box::new(AlphaDerivativeSignal::default()),
        Box::new(R2DerivativeSignal::default()),
    ];

    for strategy in &strategies {
        let output = strategy
            .generate(&series)
            .unwrap_or_else(|e| panic!("{} failed: {}", strategy.name(), e));
        assert_eq!(output.states.len(), series.len(), "{}", strategy.name());
        assert_eq!(output.indicator.len(), series.len(), "{}", strategy.name());

        let frame = BacktestFrame::from_signal(&series, &output);
        assert_eq!(frame.len(), output.valid_states().len());
        let run = run_backtest(&frame, 1, &strategy.default_leverage()).unwrap();
        assert!(run.summary.final_strategy.is_finite(), "{}", strategy.name());
    }
}

/// Test scenario: drawdowns and regime fits on the same synthetic history
#[test]
fn test_market_context_statistics() {
    let series = student_t_series(2000, 5);
    for dd in identify_drawdowns(&series, 10.0).unwrap() {
        assert!(dd.peak_index <= dd.trough_index);
        assert!(dd.depth_pct <= -10.0);
        assert!(dd.peak_date <= dd.trough_date);
    }

    let vix = synthetic_vix(series.returns());
    assert_eq!(vix.len(), series.len());
    assert!(vix[..20].iter().all(Option::is_none));
    assert!(vix[20..].iter().all(|v| v.is_some_and(|v| v > 0.0)));

    let regimes = fit_by_volatility_regime(series.returns(), 30, &TailFitConfig::strict()).unwrap();
    assert!(regimes.high_vol.is_some());
}
