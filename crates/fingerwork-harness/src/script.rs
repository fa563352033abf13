#![forbid(unsafe_code)]

//! Scripted touch input.
//!
//! A [`TouchScript`] is an ordered list of [`TouchStep`]s, each stamped with
//! milliseconds since the start of the script. Scripts are built in code with
//! the chaining helpers or loaded from a JSON trace:
//!
//! ```json
//! {
//!   "name": "two_finger_tap",
//!   "steps": [
//!     { "at_ms": 0,  "op": "add",    "id": 0, "x": 100.0, "y": 100.0 },
//!     { "at_ms": 10, "op": "add",    "id": 1, "x": 140.0, "y": 100.0 },
//!     { "at_ms": 60, "op": "remove", "id": 0, "x": 100.0, "y": 100.0 },
//!     { "at_ms": 80, "op": "remove", "id": 1, "x": 140.0, "y": 100.0 }
//!   ],
//!   "expect": [ { "kind": "multi_tap", "contacts": [0, 1] } ]
//! }
//! ```
//!
//! # Invariants
//!
//! - Step timestamps never decrease; [`TouchScript::validate`] rejects a
//!   script that goes back in time.

use fingerwork_core::{GestureConfig, GestureKind};
use serde::{Deserialize, Serialize};

use crate::replay::ReplayError;

/// One input operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TouchOp {
    Add {
        id: u32,
        x: f32,
        y: f32,
    },
    Move {
        id: u32,
        x: f32,
        y: f32,
        /// Feed-reported delta, when the source supplies one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delta: Option<(f32, f32)>,
    },
    Remove {
        id: u32,
        x: f32,
        y: f32,
    },
    Frame,
}

/// A timestamped [`TouchOp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub op: TouchOp,
}

/// A gesture a trace expects the engine to return, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedGesture {
    #[serde(with = "kind_name")]
    pub kind: GestureKind,
    pub contacts: Vec<u32>,
}

/// An ordered, timestamped input script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchScript {
    pub name: String,
    /// Overrides the default tuning for this script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<GestureConfig>,
    pub steps: Vec<TouchStep>,
    /// Non-raw gestures the engine must return, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expect: Vec<ExpectedGesture>,
}

impl TouchScript {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: GestureConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn add(mut self, at_ms: u64, id: u32, (x, y): (f32, f32)) -> Self {
        self.push(at_ms, TouchOp::Add { id, x, y });
        self
    }

    #[must_use]
    pub fn moved(mut self, at_ms: u64, id: u32, (x, y): (f32, f32)) -> Self {
        self.push(at_ms, TouchOp::Move { id, x, y, delta: None });
        self
    }

    /// A move whose feed-reported delta is `delta`.
    #[must_use]
    pub fn moved_with_delta(
        mut self,
        at_ms: u64,
        id: u32,
        (x, y): (f32, f32),
        delta: (f32, f32),
    ) -> Self {
        self.push(
            at_ms,
            TouchOp::Move {
                id,
                x,
                y,
                delta: Some(delta),
            },
        );
        self
    }

    #[must_use]
    pub fn remove(mut self, at_ms: u64, id: u32, (x, y): (f32, f32)) -> Self {
        self.push(at_ms, TouchOp::Remove { id, x, y });
        self
    }

    #[must_use]
    pub fn frame(mut self, at_ms: u64) -> Self {
        self.push(at_ms, TouchOp::Frame);
        self
    }

    /// Frames every `step_ms` from `from_ms` through `to_ms` inclusive.
    #[must_use]
    pub fn frames(mut self, from_ms: u64, to_ms: u64, step_ms: u64) -> Self {
        let step = step_ms.max(1);
        let mut at = from_ms;
        while at <= to_ms {
            self.push(at, TouchOp::Frame);
            at += step;
        }
        self
    }

    #[must_use]
    pub fn expect(mut self, kind: GestureKind, contacts: &[u32]) -> Self {
        self.expect.push(ExpectedGesture {
            kind,
            contacts: contacts.to_vec(),
        });
        self
    }

    fn push(&mut self, at_ms: u64, op: TouchOp) {
        self.steps.push(TouchStep { at_ms, op });
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Timestamp of the last step.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.steps.last().map_or(0, |s| s.at_ms)
    }

    /// Reject scripts whose timestamps go backwards.
    pub fn validate(&self) -> Result<(), ReplayError> {
        for (index, pair) in self.steps.windows(2).enumerate() {
            if pair[1].at_ms < pair[0].at_ms {
                return Err(ReplayError::OutOfOrder {
                    index: index + 1,
                    at_ms: pair[1].at_ms,
                    previous_ms: pair[0].at_ms,
                });
            }
        }
        Ok(())
    }

    // ---- JSON ----

    pub fn from_json_str(s: &str) -> Result<Self, ReplayError> {
        let script: Self = serde_json::from_str(s)?;
        script.validate()?;
        Ok(script)
    }

    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Gesture kinds by their display name (`multi_tap`, `pinch`, ...).
mod kind_name {
    use fingerwork_core::GestureKind;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const ALL: [GestureKind; 12] = [
        GestureKind::SingleTap,
        GestureKind::SingleSwipe,
        GestureKind::SingleLongPress,
        GestureKind::SingleDrag,
        GestureKind::MultiTap,
        GestureKind::MultiSwipe,
        GestureKind::MultiLongPress,
        GestureKind::MultiDrag,
        GestureKind::Pinch,
        GestureKind::Twist,
        GestureKind::RawMultiDrag,
        GestureKind::RawTwoContactDrag,
    ];

    pub fn serialize<S: Serializer>(kind: &GestureKind, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(kind)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<GestureKind, D::Error> {
        let name = String::deserialize(d)?;
        ALL.into_iter()
            .find(|k| k.to_string() == name)
            .ok_or_else(|| D::Error::custom(format!("unknown gesture kind `{name}`")))
    }
}
