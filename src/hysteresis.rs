//! Price-relative hysteresis state machines.
//!
//! Two small finite-state machines refine raw threshold signals. Each is
//! advanced one day at a time with `step` and carries its persistent
//! variables (entry price, recovery low, locked target) as fields of its
//! current phase rather than as loose flags.
//!
//! - [`RallyFilter`] holds a raw RED trigger open until the trigger clears
//!   or price rallies past a fixed percentage above the entry price.
//! - [`RecoveryTracker`] watches a filtered RED period and, once it causes
//!   a drawdown beyond a threshold, flags a recovery sub-state that lasts
//!   until price exceeds a target locked after a rally off the low.

use crate::errors::{validate_parameter, PowerLawResult};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Thresholds for the hysteresis machines, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HysteresisConfig {
    /// Rally from the RED entry price that ends a RED period early
    pub rally_exit_pct: f64,
    /// Drawdown from the signal start price that enters recovery (negative)
    pub drawdown_entry_pct: f64,
    /// Rally off the recovery low that locks the recovery target
    pub recovery_rally_pct: f64,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            rally_exit_pct: 1.0,
            drawdown_entry_pct: -1.0,
            recovery_rally_pct: 10.0,
        }
    }
}

impl HysteresisConfig {
    /// Check the configuration for usable values.
    pub fn validate(&self) -> PowerLawResult<()> {
        validate_parameter(self.rally_exit_pct, 0.0, 100.0, "rally_exit_pct")?;
        validate_parameter(self.drawdown_entry_pct, -100.0, 0.0, "drawdown_entry_pct")?;
        validate_parameter(self.recovery_rally_pct, 0.0, 1000.0, "recovery_rally_pct")?;
        Ok(())
    }
}

fn pct_change(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}

/// Rally filter over a raw binary trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct RallyFilter {
    rally_exit_pct: f64,
    entry_price: Option<f64>,
}

impl RallyFilter {
    /// Filter ending RED periods on a rally above `rally_exit_pct`.
    pub fn new(rally_exit_pct: f64) -> Self {
        Self {
            rally_exit_pct,
            entry_price: None,
        }
    }

    /// Whether a RED period is currently open.
    pub fn in_red(&self) -> bool {
        self.entry_price.is_some()
    }

    /// Entry price of the open RED period.
    pub fn entry_price(&self) -> Option<f64> {
        self.entry_price
    }

    /// Advance one day; returns the filtered signal for that day.
    ///
    /// An open period closes on a rally beyond the exit threshold or when
    /// the raw trigger clears. A closed period opens whenever the raw
    /// trigger is on, at today's price.
    pub fn step(&mut self, raw_on: bool, price: f64) -> bool {
        match self.entry_price {
            Some(entry) => {
                if pct_change(entry, price) > self.rally_exit_pct || !raw_on {
                    self.entry_price = None;
                    false
                } else {
                    true
                }
            }
            None => {
                if raw_on {
                    self.entry_price = Some(price);
                }
                raw_on
            }
        }
    }
}

impl Default for RallyFilter {
    fn default() -> Self {
        Self::new(HysteresisConfig::default().rally_exit_pct)
    }
}

/// Phase of a [`RecoveryTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryPhase {
    /// No signal being watched
    Idle,
    /// A signal period is open and has not yet drawn down
    Watching {
        /// Price on the day the signal turned on
        start_price: f64,
    },
    /// Drawdown reached; waiting for the locked target to be exceeded
    Recovering {
        /// Lowest price since recovery began
        low: f64,
        /// Exit level, locked once price rallies far enough off the low
        target: Option<f64>,
    },
}

/// Recovery ("ORANGE") sub-state tracker over a filtered signal.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryTracker {
    drawdown_entry_pct: f64,
    recovery_rally_pct: f64,
    phase: RecoveryPhase,
}

impl RecoveryTracker {
    /// Tracker with the given entry drawdown and target-locking rally.
    pub fn new(drawdown_entry_pct: f64, recovery_rally_pct: f64) -> Self {
        Self {
            drawdown_entry_pct,
            recovery_rally_pct,
            phase: RecoveryPhase::Idle,
        }
    }

    /// Tracker built from a [`HysteresisConfig`].
    pub fn from_config(config: &HysteresisConfig) -> Self {
        Self::new(config.drawdown_entry_pct, config.recovery_rally_pct)
    }

    /// Current phase.
    pub fn phase(&self) -> RecoveryPhase {
        self.phase
    }

    /// Advance one day; returns whether the day is in recovery.
    ///
    /// A signal switching on while not being watched starts a fresh watch
    /// at today's price and abandons any recovery in progress. The day on
    /// which recovery ends still counts as recovering.
    pub fn step(&mut self, signal_on: bool, price: f64) -> bool {
        match self.phase {
            RecoveryPhase::Watching { .. } if !signal_on => {
                self.phase = RecoveryPhase::Idle;
            }
            RecoveryPhase::Watching { .. } => {}
            _ if signal_on => {
                self.phase = RecoveryPhase::Watching { start_price: price };
            }
            _ => {}
        }

        if let RecoveryPhase::Watching { start_price } = self.phase {
            if pct_change(start_price, price) < self.drawdown_entry_pct {
                self.phase = RecoveryPhase::Recovering {
                    low: price,
                    target: None,
                };
            }
        }

        match self.phase {
            RecoveryPhase::Recovering { low, target } => {
                let low = low.min(price);
                let target = match target {
                    None if pct_change(low, price) > self.recovery_rally_pct => {
                        // Locked today; cannot be exceeded until tomorrow
                        self.phase = RecoveryPhase::Recovering {
                            low,
                            target: Some(price),
                        };
                        return true;
                    }
                    other => other,
                };
                self.phase = match target {
                    Some(level) if price > level => RecoveryPhase::Idle,
                    _ => RecoveryPhase::Recovering { low, target },
                };
                true
            }
            _ => false,
        }
    }
}

impl Default for RecoveryTracker {
    fn default() -> Self {
        Self::from_config(&HysteresisConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rally_filter_enters_and_holds() {
        let mut filter = RallyFilter::default();
        assert!(!filter.step(false, 100.0));
        assert!(filter.step(true, 100.0));
        assert_eq!(filter.entry_price(), Some(100.0));
        // +0.5% is not enough to exit
        assert!(filter.step(true, 100.5));
        assert!(filter.in_red());
    }

    #[test]
    fn test_rally_filter_exits_on_rally() {
        let mut filter = RallyFilter::default();
        filter.step(true, 100.0);
        assert!(!filter.step(true, 101.5));
        assert!(!filter.in_red());
        // raw still on: re-enters at the new price next day
        assert!(filter.step(true, 101.6));
        assert_eq!(filter.entry_price(), Some(101.6));
    }

    #[test]
    fn test_rally_filter_exits_when_raw_clears() {
        let mut filter = RallyFilter::default();
        filter.step(true, 100.0);
        assert!(!filter.step(false, 95.0));
        assert!(!filter.in_red());
    }

    #[test]
    fn test_recovery_needs_drawdown() {
        let mut tracker = RecoveryTracker::default();
        assert!(!tracker.step(true, 100.0));
        assert!(!tracker.step(true, 99.5));
        assert!(!tracker.step(false, 99.5));
        assert_eq!(tracker.phase(), RecoveryPhase::Idle);
    }

    #[test]
    fn test_recovery_full_cycle() {
        let mut tracker = RecoveryTracker::default();
        tracker.step(true, 100.0);
        // -2% drawdown enters recovery the same day
        assert!(tracker.step(true, 98.0));
        assert!(tracker.step(false, 90.0));
        assert_eq!(
            tracker.phase(),
            RecoveryPhase::Recovering {
                low: 90.0,
                target: None
            }
        );
        // +11% off the low locks the target
        assert!(tracker.step(false, 99.9));
        assert!(matches!(
            tracker.phase(),
            RecoveryPhase::Recovering {
                target: Some(t),
                ..
            } if t == 99.9
        ));
        assert!(tracker.step(false, 99.0));
        // exceeding the target ends recovery; the exit day still counts
        assert!(tracker.step(false, 100.0));
        assert_eq!(tracker.phase(), RecoveryPhase::Idle);
        assert!(!tracker.step(false, 101.0));
    }

    #[test]
    fn test_new_signal_abandons_recovery() {
        let mut tracker = RecoveryTracker::default();
        tracker.step(true, 100.0);
        assert!(tracker.step(true, 98.0));
        // still on the next day: the watch restarts from today's price
        assert!(!tracker.step(true, 97.0));
        assert_eq!(tracker.phase(), RecoveryPhase::Watching { start_price: 97.0 });
    }

    #[test]
    fn test_signal_clearing_before_drawdown_ends_watch() {
        let mut tracker = RecoveryTracker::default();
        tracker.step(true, 100.0);
        assert!(!tracker.step(false, 95.0));
        assert_eq!(tracker.phase(), RecoveryPhase::Idle);
    }

    #[test]
    fn test_config_validation() {
        assert!(HysteresisConfig::default().validate().is_ok());
        let bad = HysteresisConfig {
            drawdown_entry_pct: 1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
