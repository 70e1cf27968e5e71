//! Significance testing of signal states against randomized signals.
//!
//! A random signal keeps the real signal's clustering: the state sequence is
//! cut into runs, a first-order Markov chain is fitted over the run states,
//! and new sequences are grown by drawing run lengths from the empirical
//! lengths of the current state. Day counts are then nudged back to within
//! a tolerance of the real counts. The real backtest ratio is ranked against
//! the ratios of many such trials.
//!
//! Each trial draws from its own [`TrialRng`] seeded from the base seed and
//! the trial index, so a batch gives the same result whether it runs on one
//! thread or many.

use crate::backtest::{run_backtest, BacktestFrame, LeverageMap};
use crate::errors::{validate_parameter, PowerLawError, PowerLawResult};
use crate::math_utils::{mean_and_std, median};
use crate::signal_state::{SignalState, StateCounts};
use crate::trial_rng::{entropy_seed, TrialRng};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default count tolerance as a fraction of the series length.
pub const DEFAULT_TOLERANCE_FRACTION: f64 = 0.005;

/// Maximal runs of identical states as `(state, length)`.
pub fn extract_clusters(states: &[SignalState]) -> Vec<(SignalState, usize)> {
    let mut clusters: Vec<(SignalState, usize)> = Vec::new();
    for state in states {
        match clusters.last_mut() {
            Some((current, length)) if current == state => *length += 1,
            _ => clusters.push((*state, 1)),
        }
    }
    clusters
}

/// Run-length and transition structure of a state sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkovClusterModel {
    states: Vec<SignalState>,
    lengths: Vec<Vec<usize>>,
    transitions: Vec<Vec<f64>>,
    initial: usize,
}

impl MarkovClusterModel {
    /// Fit the model to a real sequence; `None` when it is empty.
    ///
    /// Transition rows are normalized counts between consecutive runs. A
    /// state that never hands over to another run gets a uniform row.
    pub fn fit(real: &[SignalState]) -> Option<Self> {
        let first = *real.first()?;
        let states = StateCounts::from_states(real).observed();
        let slot = |state: SignalState| states.iter().position(|s| *s == state).unwrap_or(0);
        let n = states.len();

        let clusters = extract_clusters(real);
        let mut lengths = vec![Vec::new(); n];
        for (state, length) in &clusters {
            lengths[slot(*state)].push(*length);
        }

        let mut counts = vec![vec![0.0f64; n]; n];
        for pair in clusters.windows(2) {
            counts[slot(pair[0].0)][slot(pair[1].0)] += 1.0;
        }
        let transitions = counts
            .into_iter()
            .map(|row| {
                let total: f64 = row.iter().sum();
                if total > 0.0 {
                    row.iter().map(|c| c / total).collect()
                } else {
                    vec![1.0 / n as f64; n]
                }
            })
            .collect();

        Some(Self {
            initial: slot(first),
            states,
            lengths,
            transitions,
        })
    }

    /// States of the fitted sequence, in canonical order.
    pub fn states(&self) -> &[SignalState] {
        &self.states
    }

    /// Observed run lengths of `state`.
    pub fn lengths(&self, state: SignalState) -> &[usize] {
        match self.slot(state) {
            Some(i) => &self.lengths[i],
            None => &[],
        }
    }

    /// Probability that a run of `from` is followed by a run of `to`.
    pub fn transition(&self, from: SignalState, to: SignalState) -> f64 {
        match (self.slot(from), self.slot(to)) {
            (Some(i), Some(j)) => self.transitions[i][j],
            _ => 0.0,
        }
    }

    fn slot(&self, state: SignalState) -> Option<usize> {
        self.states.iter().position(|s| *s == state)
    }

    /// Grow a sequence of exactly `len` days, starting in the real first state.
    pub fn sample(&self, len: usize, rng: &mut TrialRng) -> Vec<SignalState> {
        let mut sequence = Vec::with_capacity(len);
        let mut current = self.initial;
        while sequence.len() < len {
            let run = rng.choose(&self.lengths[current]).copied().unwrap_or(1);
            let take = run.min(len - sequence.len());
            sequence.extend(std::iter::repeat(self.states[current]).take(take));
            current = rng.weighted_index(&self.transitions[current]);
        }
        sequence
    }
}

/// Move days between states until every count is within `tolerance` of its target.
///
/// Each pass relabels randomly chosen days of the most over-represented
/// state as the most under-represented one.
pub fn enforce_state_counts(
    sequence: &mut [SignalState],
    targets: &StateCounts,
    tolerance: usize,
    rng: &mut TrialRng,
) {
    let states = targets.observed();
    loop {
        let current = StateCounts::from_states(sequence);
        let gap = |s: SignalState| current.count(s) as i64 - targets.count(s) as i64;

        let (Some(over), Some(under)) = (
            states.iter().copied().max_by_key(|s| gap(*s)),
            states.iter().copied().min_by_key(|s| gap(*s)),
        ) else {
            return;
        };
        let (excess, deficit) = (gap(over), -gap(under));
        if excess.max(deficit) <= tolerance as i64 || excess <= 0 || deficit <= 0 {
            return;
        }

        let positions: Vec<usize> = sequence
            .iter()
            .enumerate()
            .filter_map(|(i, s)| (*s == over).then_some(i))
            .collect();
        let moves = excess.min(deficit) as usize;
        for k in rng.sample_indices(positions.len(), moves) {
            sequence[positions[k]] = under;
        }
        log::debug!("Relabelled {} {} days as {}", moves, over, under);
    }
}

/// Randomized sequence matching the real clustering and day counts.
pub fn generate_random_signal(real: &[SignalState], rng: &mut TrialRng) -> Vec<SignalState> {
    random_signal_with_tolerance(real, DEFAULT_TOLERANCE_FRACTION, rng)
}

fn random_signal_with_tolerance(real: &[SignalState], fraction: f64, rng: &mut TrialRng) -> Vec<SignalState> {
    let Some(model) = MarkovClusterModel::fit(real) else {
        return Vec::new();
    };
    let mut sequence = model.sample(real.len(), rng);
    let tolerance = (real.len() as f64 * fraction).floor() as usize;
    enforce_state_counts(&mut sequence, &StateCounts::from_states(real), tolerance, rng);
    sequence
}

/// Parameters of a significance test.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignificanceConfig {
    /// Number of random trials
    pub n_trials: usize,
    /// Backtest lag in days
    pub lag: usize,
    /// Leverage of both the real and the random signals
    pub leverage: LeverageMap,
    /// Base seed of the batch; drawn from entropy when `None`
    pub base_seed: Option<u64>,
    /// Allowed count deviation as a fraction of the series length
    pub tolerance_fraction: f64,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            n_trials: 50,
            lag: 0,
            leverage: LeverageMap::default(),
            base_seed: None,
            tolerance_fraction: DEFAULT_TOLERANCE_FRACTION,
        }
    }
}

impl SignificanceConfig {
    /// Check the configuration for usable values.
    pub fn validate(&self) -> PowerLawResult<()> {
        if self.n_trials == 0 {
            return Err(PowerLawError::InvalidParameter {
                parameter: "n_trials".to_string(),
                value: 0.0,
                constraint: "at least one trial".to_string(),
            });
        }
        validate_parameter(self.tolerance_fraction, 0.0, 1.0, "tolerance_fraction")
    }
}

/// Conventional reading of a percentile rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Verdict {
    /// Percentile of at least 95 (p < 0.05)
    Significant,
    /// Percentile of at least 90 (p < 0.10)
    Likely,
    /// Anything lower
    NotSignificant,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Significant => "significantly outperforms random (p < 0.05)",
            Verdict::Likely => "likely outperforms random (p < 0.10)",
            Verdict::NotSignificant => "does not significantly outperform random",
        })
    }
}

/// Outcome of a significance test.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignificanceResult {
    /// Strategy / buy-and-hold ratio of the real signal
    pub real_ratio: f64,
    /// Ratios of the random trials, in trial order
    pub random_ratios: Vec<f64>,
    /// Percent of trials strictly below the real ratio
    pub percentile: f64,
    /// Fraction of trials matching or beating the real ratio
    pub p_value: f64,
    /// Mean random ratio
    pub mean_random: f64,
    /// Median random ratio
    pub median_random: f64,
    /// Day counts of the real signal
    pub state_counts: StateCounts,
    /// Base seed the trials were derived from
    pub base_seed: u64,
}

impl SignificanceResult {
    /// Verdict at the 95th and 90th percentile.
    pub fn verdict(&self) -> Verdict {
        if self.percentile >= 95.0 {
            Verdict::Significant
        } else if self.percentile >= 90.0 {
            Verdict::Likely
        } else {
            Verdict::NotSignificant
        }
    }
}

/// Rank the real signal of `frame` against randomized signals.
///
/// The frame must carry states. Fails with the backtest's error if the real
/// signal cannot be traded.
pub fn test_vs_random(frame: &BacktestFrame, config: &SignificanceConfig) -> PowerLawResult<SignificanceResult> {
    config.validate()?;
    let real_states = frame
        .states
        .as_deref()
        .ok_or_else(|| PowerLawError::MissingInput {
            field: "states".to_string(),
        })?;
    if real_states.is_empty() {
        return Err(PowerLawError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    let state_counts = StateCounts::from_states(real_states);
    log::info!("State counts: {}", state_counts);
    let real_ratio = run_backtest(frame, config.lag, &config.leverage)?.summary.ratio;

    let base_seed = config.base_seed.unwrap_or_else(entropy_seed);
    let run_trial = |index: usize| -> PowerLawResult<f64> {
        let mut rng = TrialRng::for_trial(base_seed, index);
        let states = random_signal_with_tolerance(real_states, config.tolerance_fraction, &mut rng);
        let run = run_backtest(&frame.with_states(states), config.lag, &config.leverage)?;
        Ok(run.summary.ratio)
    };

    let random_ratios: Vec<f64> = {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            (0..config.n_trials)
                .into_par_iter()
                .map(run_trial)
                .collect::<PowerLawResult<Vec<f64>>>()?
        }

        #[cfg(not(feature = "parallel"))]
        {
            (0..config.n_trials)
                .map(run_trial)
                .collect::<PowerLawResult<Vec<f64>>>()?
        }
    };

    let n = random_ratios.len() as f64;
    let below = random_ratios.iter().filter(|r| **r < real_ratio).count();
    let percentile = below as f64 / n * 100.0;
    let p_value = (random_ratios.len() - below) as f64 / n;
    let (mean_random, _) = mean_and_std(&random_ratios);
    let median_random = median(&random_ratios);

    let result = SignificanceResult {
        real_ratio,
        random_ratios,
        percentile,
        p_value,
        mean_random,
        median_random,
        state_counts,
        base_seed,
    };
    log::info!(
        "Real {:.2}x vs random median {:.2}x (mean {:.2}x): {:.0}th percentile, p = {:.4}, {}",
        result.real_ratio,
        result.median_random,
        result.mean_random,
        result.percentile,
        result.p_value,
        result.verdict()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use chrono::NaiveDate;
    use SignalState::*;

    fn frame(returns: Vec<f64>, states: Vec<SignalState>) -> BacktestFrame {
        let start = NaiveDate::from_ymd_opt(2015, 6, 1).unwrap();
        BacktestFrame {
            dates: (0..returns.len())
                .map(|i| start + chrono::Duration::days(i as i64))
                .collect(),
            returns,
            states: Some(states),
            binary_signal: None,
        }
    }

    fn clustered_states(len: usize, seed: u64) -> Vec<SignalState> {
        let mut rng = TrialRng::with_seed(seed);
        let mut states = Vec::with_capacity(len);
        while states.len() < len {
            let state = *rng.choose(&SignalState::ALL).unwrap();
            let run = rng.usize(1..15);
            states.extend(std::iter::repeat(state).take(run));
        }
        states.truncate(len);
        states
    }

    #[test]
    fn test_extract_clusters() {
        let states = [Red, Red, Green, Green, Green, Orange, Red];
        assert_eq!(
            extract_clusters(&states),
            vec![(Red, 2), (Green, 3), (Orange, 1), (Red, 1)]
        );
        assert!(extract_clusters(&[]).is_empty());
    }

    #[test]
    fn test_markov_model_rows() {
        let states = [Red, Red, Green, Green, Green, Orange];
        let model = MarkovClusterModel::fit(&states).unwrap();
        assert_eq!(model.states(), &[Red, Orange, Green]);
        assert_eq!(model.lengths(Green), &[3]);
        assert_eq!(model.transition(Red, Green), 1.0);
        assert_eq!(model.transition(Green, Orange), 1.0);
        // the final run never transitions
        for to in SignalState::ALL {
            assert_approx_eq!(model.transition(Orange, to), 1.0 / 3.0);
        }
        assert!(MarkovClusterModel::fit(&[]).is_none());
    }

    #[test]
    fn test_sample_has_exact_length_and_real_start() {
        let real = clustered_states(250, 1);
        let model = MarkovClusterModel::fit(&real).unwrap();
        let mut rng = TrialRng::with_seed(99);
        let sample = model.sample(250, &mut rng);
        assert_eq!(sample.len(), 250);
        assert_eq!(sample[0], real[0]);
        assert!(sample.iter().all(|s| model.states().contains(s)));
        assert!(model.sample(0, &mut rng).is_empty());
    }

    #[test]
    fn test_random_counts_within_tolerance() {
        for seed in 0..20u64 {
            let real = clustered_states(400 + seed as usize * 37, seed);
            let mut rng = TrialRng::with_seed(seed + 1000);
            let random = generate_random_signal(&real, &mut rng);
            assert_eq!(random.len(), real.len());

            let tolerance = (real.len() as f64 * DEFAULT_TOLERANCE_FRACTION).floor() as i64;
            let real_counts = StateCounts::from_states(&real);
            let random_counts = StateCounts::from_states(&random);
            for state in SignalState::ALL {
                let gap = random_counts.count(state) as i64 - real_counts.count(state) as i64;
                assert!(gap.abs() <= tolerance, "seed {seed}: {state} off by {gap}");
            }
        }
    }

    #[test]
    fn test_enforce_reaches_exact_counts_with_zero_tolerance() {
        let real = [vec![Red; 30], vec![Green; 70]].concat();
        let mut sequence = vec![Green; 100];
        let mut rng = TrialRng::with_seed(4);
        enforce_state_counts(&mut sequence, &StateCounts::from_states(&real), 0, &mut rng);
        assert_eq!(StateCounts::from_states(&sequence), StateCounts::from_states(&real));
    }

    #[test]
    fn test_perfect_foresight_beats_every_trial() {
        let mut rng = TrialRng::with_seed(8);
        let returns: Vec<f64> = (0..300).map(|_| rng.f64() * 4.0 - 2.0).collect();
        let states = returns
            .iter()
            .map(|r| if *r > 0.0 { Green } else { Red })
            .collect();
        let config = SignificanceConfig {
            n_trials: 30,
            base_seed: Some(42),
            ..Default::default()
        };
        let result = test_vs_random(&frame(returns, states), &config).unwrap();
        assert_eq!(result.random_ratios.len(), 30);
        assert_eq!(result.percentile, 100.0);
        assert_eq!(result.p_value, 0.0);
        assert_eq!(result.verdict(), Verdict::Significant);
    }

    #[test]
    fn test_undifferentiated_leverage_is_not_significant() {
        let mut rng = TrialRng::with_seed(12);
        let returns: Vec<f64> = (0..200).map(|_| rng.f64() * 2.0 - 1.0).collect();
        let states = clustered_states(200, 12);
        let config = SignificanceConfig {
            n_trials: 20,
            leverage: LeverageMap::uniform(1.0),
            base_seed: Some(3),
            ..Default::default()
        };
        let result = test_vs_random(&frame(returns, states), &config).unwrap();
        assert_eq!(result.p_value, 1.0);
        assert_eq!(result.verdict(), Verdict::NotSignificant);
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let mut rng = TrialRng::with_seed(5);
        let returns: Vec<f64> = (0..150).map(|_| rng.f64() * 2.0 - 1.0).collect();
        let input = frame(returns, clustered_states(150, 5));
        let config = SignificanceConfig {
            n_trials: 10,
            base_seed: Some(77),
            ..Default::default()
        };
        let a = test_vs_random(&input, &config).unwrap();
        let b = test_vs_random(&input, &config).unwrap();
        assert_eq!(a.random_ratios, b.random_ratios);
        assert_eq!(a.base_seed, 77);
    }

    #[test]
    fn test_requires_states() {
        let mut input = frame(vec![1.0; 10], vec![Red; 10]);
        input.states = None;
        input.binary_signal = Some(vec![true; 10]);
        assert!(matches!(
            test_vs_random(&input, &SignificanceConfig::default()),
            Err(PowerLawError::MissingInput { .. })
        ));
        let zero = SignificanceConfig {
            n_trials: 0,
            ..Default::default()
        };
        assert!(test_vs_random(&frame(vec![1.0], vec![Red]), &zero).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_significance_types_are_serializable() {
        fn assert_serde<T: Serialize + for<'de> Deserialize<'de>>() {}
        assert_serde::<SignificanceConfig>();
        assert_serde::<SignificanceResult>();
        assert_serde::<Verdict>();
    }
}
