//! Hysteresis alert state machine
//!
//! High and low alerts latch independently. A latch is set, and a
//! notification requested, the first time a reading crosses its threshold;
//! it is released silently once the temperature has moved back past the
//! threshold by at least the hysteresis margin.
//!
//! ```text
//!              temp >= high                    temp <= high - hysteresis
//!  high idle ───────────────► high latched ──────────────────────────► high idle
//!                (notify)         │  ▲
//!                                 └──┘ temp > high - hysteresis (no notify)
//! ```
//!
//! The low side mirrors this with `temp <= low` and `temp >= low + hysteresis`.

use crate::error::ConfigError;
use crate::events::AlertKind;
use serde::{Deserialize, Serialize};

/// Alert thresholds in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Readings at or above this fire a high alert
    pub high: f64,
    /// Readings at or below this fire a low alert
    pub low: f64,
    /// Dead-band that must be crossed before a latched alert clears
    pub hysteresis: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            high: 25.0,
            low: 19.0,
            hysteresis: 1.0,
        }
    }
}

impl AlertThresholds {
    /// Create validated thresholds
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the values are not finite,
    /// the hysteresis is negative, or the two clear bands overlap.
    pub fn new(high: f64, low: f64, hysteresis: f64) -> Result<Self, ConfigError> {
        let thresholds = Self {
            high,
            low,
            hysteresis,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Temperature at or below which a high alert clears
    pub fn high_clear_level(&self) -> f64 {
        self.high - self.hysteresis
    }

    /// Temperature at or above which a low alert clears
    pub fn low_clear_level(&self) -> f64 {
        self.low + self.hysteresis
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.high.is_finite() && self.low.is_finite() && self.hysteresis.is_finite()) {
            return Err(ConfigError::ValidationError(
                "thresholds and hysteresis must be finite numbers".to_string(),
            ));
        }

        if self.hysteresis < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "hysteresis must not be negative (got {})",
                self.hysteresis
            )));
        }

        if self.high_clear_level() <= self.low_clear_level() {
            return Err(ConfigError::ValidationError(format!(
                "hysteresis bands overlap: high - hysteresis ({}) must be greater than low + hysteresis ({})",
                self.high_clear_level(),
                self.low_clear_level()
            )));
        }

        Ok(())
    }
}

/// Latches for the two alert kinds
///
/// In-memory only; a restart starts with both latches released.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertState {
    pub high_active: bool,
    pub low_active: bool,
}

impl AlertState {
    /// Indicator output: lit while any alert is latched
    pub fn indicator(&self) -> bool {
        self.high_active || self.low_active
    }
}

/// A change of latch state caused by one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    /// Latch set; the caller should notify
    Fired(AlertKind),
    /// Latch released; no notification
    Cleared(AlertKind),
}

/// Result of feeding one reading to [`transition`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AlertOutcome {
    pub transitions: Vec<AlertTransition>,
    /// Indicator level after this reading
    pub indicator: bool,
}

impl AlertOutcome {
    /// Alert kinds that need a notification
    pub fn fired(&self) -> impl Iterator<Item = AlertKind> + '_ {
        self.transitions.iter().filter_map(|t| match t {
            AlertTransition::Fired(kind) => Some(*kind),
            AlertTransition::Cleared(_) => None,
        })
    }
}

/// Apply one temperature reading to the alert latches
///
/// Notification delivery is the caller's job and does not feed back into
/// the state: a latch set here stays set even if the notification fails.
pub fn transition(
    state: &mut AlertState,
    thresholds: &AlertThresholds,
    temperature: f64,
) -> AlertOutcome {
    let mut transitions = Vec::new();

    if temperature >= thresholds.high && !state.high_active {
        state.high_active = true;
        transitions.push(AlertTransition::Fired(AlertKind::HighTemp));
    } else if state.high_active && temperature <= thresholds.high_clear_level() {
        state.high_active = false;
        transitions.push(AlertTransition::Cleared(AlertKind::HighTemp));
    }

    if temperature <= thresholds.low && !state.low_active {
        state.low_active = true;
        transitions.push(AlertTransition::Fired(AlertKind::LowTemp));
    } else if state.low_active && temperature >= thresholds.low_clear_level() {
        state.low_active = false;
        transitions.push(AlertTransition::Cleared(AlertKind::LowTemp));
    }

    AlertOutcome {
        transitions,
        indicator: state.indicator(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> AlertThresholds {
        AlertThresholds::new(25.0, 19.0, 1.0).unwrap()
    }

    fn run(readings: &[f64]) -> (AlertState, Vec<AlertTransition>) {
        let thresholds = thresholds();
        let mut state = AlertState::default();
        let mut all = Vec::new();
        for &temperature in readings {
            all.extend(transition(&mut state, &thresholds, temperature).transitions);
        }
        (state, all)
    }

    #[test]
    fn test_high_alert_fires_once_and_clears_at_band_edge() {
        let (state, transitions) = run(&[25.5, 25.2, 24.5, 24.0]);

        assert_eq!(
            transitions,
            vec![
                AlertTransition::Fired(AlertKind::HighTemp),
                AlertTransition::Cleared(AlertKind::HighTemp),
            ]
        );
        assert!(!state.high_active);
    }

    #[test]
    fn test_high_alert_stays_latched_inside_band() {
        let (state, transitions) = run(&[25.5, 24.5]);

        assert_eq!(transitions, vec![AlertTransition::Fired(AlertKind::HighTemp)]);
        assert!(state.high_active);
        assert!(state.indicator());
    }

    #[test]
    fn test_high_alert_refires_after_clear() {
        let (_, transitions) = run(&[25.0, 23.0, 25.1]);

        let fired = transitions
            .iter()
            .filter(|t| matches!(t, AlertTransition::Fired(AlertKind::HighTemp)))
            .count();
        assert_eq!(fired, 2);
    }

    #[test]
    fn test_low_alert_mirrors_high() {
        let (state, transitions) = run(&[19.0, 18.0, 19.5, 20.0]);

        assert_eq!(
            transitions,
            vec![
                AlertTransition::Fired(AlertKind::LowTemp),
                AlertTransition::Cleared(AlertKind::LowTemp),
            ]
        );
        assert_eq!(state, AlertState::default());
    }

    #[test]
    fn test_swing_from_high_to_low_clears_and_fires() {
        let thresholds = thresholds();
        let mut state = AlertState::default();

        transition(&mut state, &thresholds, 26.0);
        let outcome = transition(&mut state, &thresholds, 18.0);

        assert_eq!(
            outcome.transitions,
            vec![
                AlertTransition::Cleared(AlertKind::HighTemp),
                AlertTransition::Fired(AlertKind::LowTemp),
            ]
        );
        assert_eq!(outcome.fired().collect::<Vec<_>>(), vec![AlertKind::LowTemp]);
        assert!(outcome.indicator);
    }

    #[test]
    fn test_normal_reading_keeps_indicator_off() {
        let thresholds = thresholds();
        let mut state = AlertState::default();

        let outcome = transition(&mut state, &thresholds, 22.0);
        assert!(outcome.transitions.is_empty());
        assert!(!outcome.indicator);
    }

    #[test]
    fn test_nan_reading_changes_nothing() {
        let thresholds = thresholds();
        let mut state = AlertState {
            high_active: true,
            low_active: false,
        };

        let outcome = transition(&mut state, &thresholds, f64::NAN);
        assert!(outcome.transitions.is_empty());
        assert!(state.high_active);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(AlertThresholds::new(25.0, 19.0, 1.0).is_ok());
        assert!(AlertThresholds::new(25.0, 19.0, 0.0).is_ok());
        assert!(AlertThresholds::new(25.0, 19.0, -0.5).is_err());
        // 25 - 3 == 19 + 3
        assert!(AlertThresholds::new(25.0, 19.0, 3.0).is_err());
        assert!(AlertThresholds::new(19.0, 25.0, 0.0).is_err());
        assert!(AlertThresholds::new(f64::NAN, 19.0, 1.0).is_err());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    /// Temperatures in quarter-degree steps around the default thresholds
    #[derive(Debug, Clone)]
    struct TemperatureSeries(Vec<f64>);

    impl Arbitrary for TemperatureSeries {
        fn arbitrary(g: &mut Gen) -> Self {
            let len = usize::arbitrary(g) % 64;
            let series = (0..len)
                .map(|_| 15.0 + (u8::arbitrary(g) % 60) as f64 * 0.25)
                .collect();
            Self(series)
        }
    }

    // A high notification needs a drop to the clear level since the previous one
    #[quickcheck]
    fn prop_high_alert_fires_once_per_episode(series: TemperatureSeries) -> bool {
        let thresholds = AlertThresholds::default();
        let mut state = AlertState::default();
        let mut armed = true;

        for temperature in series.0 {
            let outcome = transition(&mut state, &thresholds, temperature);
            let fired_high = outcome.fired().any(|k| k == AlertKind::HighTemp);

            if fired_high && (!armed || temperature < thresholds.high) {
                return false;
            }
            if fired_high {
                armed = false;
            }
            if temperature <= thresholds.high_clear_level() {
                armed = true;
            }
        }
        true
    }

    #[quickcheck]
    fn prop_indicator_tracks_latches(series: TemperatureSeries) -> bool {
        let thresholds = AlertThresholds::default();
        let mut state = AlertState::default();

        series.0.into_iter().all(|temperature| {
            let outcome = transition(&mut state, &thresholds, temperature);
            outcome.indicator == (state.high_active || state.low_active)
        })
    }

    #[quickcheck]
    fn prop_low_alert_never_refires_while_latched(series: TemperatureSeries) -> bool {
        let thresholds = AlertThresholds::default();
        let mut state = AlertState::default();

        series.0.into_iter().all(|temperature| {
            let was_latched = state.low_active;
            let outcome = transition(&mut state, &thresholds, temperature);
            let fired_low = outcome.fired().any(|k| k == AlertKind::LowTemp);
            !(was_latched && fired_low)
        })
    }
}
