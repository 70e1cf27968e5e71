//! # Power-Law Finance
//!
//! Power-law tail analysis of daily financial returns and the trading
//! signals built on it.
//!
//! The crate fits `P(|R| >= x) ~ x^-alpha` to the tail of absolute
//! returns, measures where the empirical CCDF departs from the fitted line,
//! turns those departures into per-day RED / ORANGE / GREEN states, trades
//! the states against buy & hold and checks whether the result beats
//! randomized signals with the same clustering.
//!
//! ## Key Features
//!
//! - **Tail Fitting**: Log-log OLS of the empirical CCDF above a threshold, rolling and fixed-alpha variants
//! - **Deviation Engine**: Actual-minus-predicted survival, mean deviation in the moderate zone, local exponents
//! - **Signals**: Moderate-volatility, power-law deviation, deviation-baseline, alpha-derivative and R²-derivative strategies
//! - **Hysteresis**: Rally exits and drawdown recovery tracking for binary signals
//! - **Backtesting**: Leverage maps, T+lag execution, CAGR, Sharpe and drawdown
//! - **Significance Testing**: Markov cluster resampling with exact state counts, trials in parallel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use powerlaw_finance::{
//!     business_dates, generate_student_t_returns, prices_from_returns, run_backtest,
//!     test_vs_random, BacktestFrame, GeneratorConfig, LoaderConfig, ModerateVolSignal,
//!     PriceFrame, ReturnSeries, SignalState, SignalStrategy, SignificanceConfig,
//!     StudentTConfig,
//! };
//! use chrono::NaiveDate;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let returns = generate_student_t_returns(
//!         &GeneratorConfig { length: 3000, seed: Some(42) },
//!         &StudentTConfig::default(),
//!     )?;
//!     let closes = prices_from_returns(100.0, &returns);
//!     let dates = business_dates(NaiveDate::from_ymd_opt(2010, 1, 4).unwrap(), closes.len());
//!     let frame = PriceFrame {
//!         date: Some(dates),
//!         close: Some(closes),
//!         ..Default::default()
//!     };
//!     let series = ReturnSeries::from_frame(&frame, &LoaderConfig::default())?;
//!
//!     let signal = ModerateVolSignal::default();
//!     let output = signal.generate(&series)?.combined(SignalState::Green, &[SignalState::Orange]);
//!     let backtest = BacktestFrame::from_signal(&series, &output);
//!
//!     let run = run_backtest(&backtest, 1, &signal.default_leverage())?;
//!     println!("{}", run.summary);
//!
//!     let significance = test_vs_random(&backtest, &SignificanceConfig::default())?;
//!     println!(
//!         "{:.0}th percentile: {}",
//!         significance.percentile,
//!         significance.verdict()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Every analysis consumes a [`ReturnSeries`]. Strategies implement
//! [`SignalStrategy`] and return a [`SignalOutput`] aligned day-for-day with
//! the series; [`BacktestFrame`] and [`run_backtest`] trade it, and
//! [`test_vs_random`] ranks it against randomized signals.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod generators;
pub mod math_utils;
pub mod series;
pub mod trial_rng;

// Tail analysis
pub mod deviation;
pub mod fit_quality;
pub mod market_stats;
pub mod power_law;

// Signals and evaluation
pub mod alpha_derivative;
pub mod backtest;
pub mod deviation_baseline;
pub mod deviation_signal;
pub mod hysteresis;
pub mod moderate_vol;
pub mod r2_derivative;
pub mod signal_state;
pub mod significance;

// Re-export main types
pub use config::TailFitConfig;
pub use errors::{PowerLawError, PowerLawResult};
pub use generators::{
    business_dates, generate_student_t_returns, prices_from_returns, GeneratorConfig,
    StudentTConfig,
};
pub use series::{LoaderConfig, PriceFrame, ReturnSeries, StartDate};
pub use trial_rng::TrialRng;

pub use deviation::{
    deviation_profile, local_exponents, mean_deviation, mean_threshold_gap,
    rolling_mean_deviation, DeviationProfile,
};
pub use fit_quality::{
    fit_by_volatility_regime, residuals_by_magnitude, rolling_fit_quality, FitQuality,
    RegimeFits, ResidualBin,
};
pub use market_stats::{identify_drawdowns, realized_volatility, synthetic_vix, Drawdown};
pub use power_law::{
    ccdf_by_state, empirical_ccdf, fit_power_law, fit_with_fixed_alpha, rolling_fits,
    CcdfSample, PowerLawFit, TailFit,
};

pub use alpha_derivative::{AlphaDerivativeConfig, AlphaDerivativeSignal};
pub use backtest::{run_backtest, BacktestFrame, BacktestRun, BacktestSummary, LeverageMap};
pub use deviation_baseline::{
    significant_cross_unders, CrossUnder, CrossUnderConfig, DeviationBaselineConfig,
    DeviationBaselineSignal,
};
pub use deviation_signal::{PowerLawDeviationConfig, PowerLawDeviationSignal};
pub use hysteresis::{HysteresisConfig, RallyFilter, RecoveryPhase, RecoveryTracker};
pub use moderate_vol::{ModerateVolConfig, ModerateVolSignal, ModerateVolTrace};
pub use r2_derivative::{regime_from_breaches, Breach, R2DerivativeConfig, R2DerivativeSignal};
pub use signal_state::{combine_states, SignalOutput, SignalState, SignalStrategy, StateCounts};
pub use significance::{
    generate_random_signal, test_vs_random, MarkovClusterModel, SignificanceConfig,
    SignificanceResult, Verdict,
};
