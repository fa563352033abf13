#![forbid(unsafe_code)]

//! Gesture thresholds and timing.
//!
//! Every tunable the classifier, orchestrator and arbitrator read lives in
//! [`GestureConfig`]. `GestureConfig::default()` is the stock tuning; hosts
//! override individual fields or (with the `config-file` feature) load the
//! whole thing from TOML or JSON:
//!
//! ```toml
//! lift_window_ms = 120
//! swipe_speed_threshold = 500.0
//! minority_group_policy = "ignore_minority"
//! ```
//!
//! Lengths are in boundary units (whatever unit the input feed reports
//! positions in). Durations serialize as integer milliseconds.

use std::f32::consts::PI;
use std::time::Duration;

#[cfg(feature = "config-file")]
use std::path::Path;

#[cfg(feature = "config-file")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What to do with same-type groups smaller than the largest group when a
/// multi-gesture aggregation window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "snake_case"))]
pub enum MinorityGroupPolicy {
    /// Drop minority groups.
    IgnoreMinority,
    /// Drop minority groups as separate events, but fold their contacts into
    /// the contact list of every largest group's event.
    IgnoreButMerge,
    /// Every group raises its own event regardless of size.
    #[default]
    RaiseAll,
}

/// Thresholds and timeouts for gesture recognition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct GestureConfig {
    /// Length of the multi-gesture and multi-long-press aggregation windows (default: 150ms).
    #[cfg_attr(feature = "config-file", serde(rename = "lift_window_ms", with = "millis"))]
    pub lift_window: Duration,
    /// Release speed above which a lift is a swipe (units/sec, default: 400).
    pub swipe_speed_threshold: f32,
    /// Max distance from an existing cluster member for a new contact to join (default: 265).
    pub cluster_accept_radius: f32,
    /// A lift is a tap only if the contact lived less than this (default: 400ms).
    #[cfg_attr(feature = "config-file", serde(rename = "tap_time_max_ms", with = "millis"))]
    pub tap_time_max: Duration,
    /// A stationary contact becomes a long press after this (default: 600ms).
    #[cfg_attr(
        feature = "config-file",
        serde(rename = "long_press_time_min_ms", with = "millis")
    )]
    pub long_press_time_min: Duration,
    /// Max direction difference (radians) for two drags to count as one motion (default: π/8).
    pub drag_direction_threshold: f32,
    /// Width (radians) of the band around π treated as opposed motion (default: π/10).
    pub opposite_angle_threshold: f32,
    /// Opposed drags are a pinch when their separation changes by more than
    /// this fraction of their combined speed; otherwise a twist (default: 0.8).
    pub pinch_precision: f32,
    /// Minority handling when aggregation windows close (default: raise all).
    pub minority_group_policy: MinorityGroupPolicy,
    /// Cumulative travel before a moving contact counts as dragging (default: 7.5).
    pub drag_distance_threshold: f32,
    /// Speed above which a contact counts as moving (units/sec, default: 0).
    pub move_speed_threshold: f32,
    /// Cumulative travel below which a contact may still be a tap or long press (default: 19).
    pub tap_wiggle_threshold: f32,
    /// How much recent motion each contact retains for smoothing (default: 300ms).
    #[cfg_attr(feature = "config-file", serde(rename = "history_window_ms", with = "millis"))]
    pub history_window: Duration,
    /// How long claimers stay attached to an ended contact (default: 450ms).
    #[cfg_attr(feature = "config-file", serde(rename = "release_grace_ms", with = "millis"))]
    pub release_grace: Duration,
    /// Dots per inch of the boundary unit, for physical-unit conversions (default: 96).
    pub dpi: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        let lift_window = Duration::from_millis(150);
        Self {
            lift_window,
            swipe_speed_threshold: 400.0,
            cluster_accept_radius: 265.0,
            tap_time_max: Duration::from_millis(400),
            long_press_time_min: Duration::from_millis(600),
            drag_direction_threshold: PI / 8.0,
            opposite_angle_threshold: PI / 10.0,
            pinch_precision: 0.8,
            minority_group_policy: MinorityGroupPolicy::RaiseAll,
            drag_distance_threshold: 7.5,
            move_speed_threshold: 0.0,
            tap_wiggle_threshold: 19.0,
            history_window: Duration::from_millis(300),
            release_grace: lift_window * 3,
            dpi: 96.0,
        }
    }
}

impl GestureConfig {
    /// Check that the configuration can drive a consistent engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tap_time_max >= self.long_press_time_min {
            return Err(ConfigError::TapNotBelowLongPress {
                tap: self.tap_time_max,
                long_press: self.long_press_time_min,
            });
        }

        // Window gestures must still find their claimers.
        if self.release_grace < self.lift_window {
            return Err(ConfigError::GraceBelowLiftWindow {
                grace: self.release_grace,
                lift: self.lift_window,
            });
        }

        for (field, value) in [
            ("swipe_speed_threshold", self.swipe_speed_threshold),
            ("drag_direction_threshold", self.drag_direction_threshold),
            ("opposite_angle_threshold", self.opposite_angle_threshold),
            ("drag_distance_threshold", self.drag_distance_threshold),
            ("move_speed_threshold", self.move_speed_threshold),
            ("tap_wiggle_threshold", self.tap_wiggle_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeOrNonFinite { field, value });
            }
        }

        for (field, value) in [
            ("cluster_accept_radius", self.cluster_accept_radius),
            ("pinch_precision", self.pinch_precision),
            ("dpi", self.dpi),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        for (field, value) in [
            ("lift_window", self.lift_window),
            ("history_window", self.history_window),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration { field });
            }
        }

        Ok(())
    }

    /// The per-contact motion thresholds derived from this config.
    #[must_use]
    pub fn motion(&self) -> MotionThresholds {
        MotionThresholds {
            move_speed: self.move_speed_threshold,
            drag_distance: self.drag_distance_threshold,
            tap_wiggle: self.tap_wiggle_threshold,
            history_window: self.history_window,
        }
    }

    /// The thresholds the two-contact relationship analyzer reads.
    #[must_use]
    pub fn relationship(&self) -> RelationshipThresholds {
        RelationshipThresholds {
            identical: self.drag_direction_threshold,
            opposite: self.opposite_angle_threshold,
            pinch_precision: self.pinch_precision,
        }
    }

    /// Load from a TOML string. The result is validated.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON string. The result is validated.
    #[cfg(feature = "config-file")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; `.json` files are parsed as JSON, anything else as TOML.
    #[cfg(feature = "config-file")]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }
}

/// Thresholds a [`Contact`](crate::contact::Contact) carries for its own
/// derived predicates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionThresholds {
    pub move_speed: f32,
    pub drag_distance: f32,
    pub tap_wiggle: f32,
    pub history_window: Duration,
}

impl Default for MotionThresholds {
    fn default() -> Self {
        GestureConfig::default().motion()
    }
}

/// Thresholds for [`analyze`](crate::relationship::analyze).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelationshipThresholds {
    pub identical: f32,
    pub opposite: f32,
    pub pinch_precision: f32,
}

impl Default for RelationshipThresholds {
    fn default() -> Self {
        GestureConfig::default().relationship()
    }
}

#[cfg(feature = "config-file")]
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GestureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lift_window, Duration::from_millis(150));
        assert_eq!(config.release_grace, Duration::from_millis(450));
        assert_eq!(config.minority_group_policy, MinorityGroupPolicy::RaiseAll);
    }

    #[test]
    fn tap_time_must_be_below_long_press() {
        let config = GestureConfig {
            tap_time_max: Duration::from_millis(600),
            ..GestureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TapNotBelowLongPress { .. })
        ));
    }

    #[test]
    fn grace_shorter_than_lift_window_rejected() {
        let config = GestureConfig {
            release_grace: Duration::from_millis(100),
            ..GestureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GraceBelowLiftWindow { .. })
        ));
    }

    #[test]
    fn negative_threshold_rejected() {
        let config = GestureConfig {
            swipe_speed_threshold: -1.0,
            ..GestureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeOrNonFinite {
                field: "swipe_speed_threshold",
                ..
            })
        ));
    }

    #[test]
    fn zero_radius_and_window_rejected() {
        let config = GestureConfig {
            cluster_accept_radius: 0.0,
            ..GestureConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NotPositive { .. })));

        let config = GestureConfig {
            lift_window: Duration::ZERO,
            ..GestureConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDuration { field: "lift_window" })
        ));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_partial_override_keeps_defaults() {
        let config = GestureConfig::from_toml_str(
            r#"
            lift_window_ms = 120
            swipe_speed_threshold = 500.0
            minority_group_policy = "ignore_minority"
            "#,
        )
        .unwrap();
        assert_eq!(config.lift_window, Duration::from_millis(120));
        assert_eq!(config.swipe_speed_threshold, 500.0);
        assert_eq!(config.minority_group_policy, MinorityGroupPolicy::IgnoreMinority);
        assert_eq!(config.tap_time_max, Duration::from_millis(400));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn json_load_is_validated() {
        let err = GestureConfig::from_json_str(r#"{"tap_time_max_ms": 900}"#).unwrap_err();
        assert!(matches!(err, ConfigError::TapNotBelowLongPress { .. }));

        let ok = GestureConfig::from_json_str(r#"{"pinch_precision": 0.5}"#).unwrap();
        assert_eq!(ok.pinch_precision, 0.5);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn load_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gestures.toml");
        std::fs::write(&path, "dpi = 160.0\n").unwrap();
        let config = GestureConfig::from_file(&path).unwrap();
        assert_eq!(config.dpi, 160.0);

        let path = dir.path().join("gestures.json");
        std::fs::write(&path, r#"{"release_grace_ms": 900}"#).unwrap();
        let config = GestureConfig::from_file(&path).unwrap();
        assert_eq!(config.release_grace, Duration::from_millis(900));

        let missing = GestureConfig::from_file(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
