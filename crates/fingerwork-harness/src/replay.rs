#![forbid(unsafe_code)]

//! Deterministic replay of a [`TouchScript`] through a [`GestureEngine`].
//!
//! Script time is mapped onto a fixed origin captured when the replayer is
//! built, so two replays of the same script drive the engine with identical
//! relative timing. After the last step the replayer settles the engine by
//! ticking a frame at each pending window deadline, so gestures held in an
//! open aggregation window are not lost at the end of a trace.
//!
//! # Failure Modes
//!
//! - Protocol errors from the engine are recorded per step and do not stop
//!   the replay; [`ReplayOutcome::rejected`] lists them.
//! - [`ReplayOutcome::check`] turns an expectation mismatch into
//!   [`ReplayError::Mismatch`].

use std::path::PathBuf;

use fingerwork_core::{
    ConfigError, ConsumerId, ContactId, Diagnostics, Gesture, GestureConfig, GestureConsumer,
    GestureEngine, GestureKind, ProtocolError, Vec2,
};
use thiserror::Error;
use web_time::{Duration, Instant};

use crate::script::{ExpectedGesture, TouchOp, TouchScript};

/// Upper bound on settle ticks; each tick closes at least one window.
const MAX_SETTLE_TICKS: usize = 64;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("step {index} at {at_ms}ms precedes the previous step at {previous_ms}ms")]
    OutOfOrder {
        index: usize,
        at_ms: u64,
        previous_ms: u64,
    },

    #[error("step {index} rejected: {source}")]
    Protocol {
        index: usize,
        #[source]
        source: ProtocolError,
    },

    #[error("expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}

/// A gesture returned by the engine during replay.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    /// Index of the step that produced it; `None` while settling.
    pub step: Option<usize>,
    pub at_ms: u64,
    pub gesture: Gesture,
}

/// Everything a replay produced.
#[derive(Debug, Clone, Default)]
pub struct ReplayOutcome {
    pub emitted: Vec<Emitted>,
    pub rejected: Vec<(usize, ProtocolError)>,
    pub diagnostics: Diagnostics,
}

impl ReplayOutcome {
    /// Returned gestures of `kind`.
    pub fn of_kind(&self, kind: GestureKind) -> impl Iterator<Item = &Gesture> {
        self.emitted
            .iter()
            .map(|e| &e.gesture)
            .filter(move |g| g.kind() == kind)
    }

    /// `(kind, contact ids)` of every non-raw gesture, in order.
    #[must_use]
    pub fn summary(&self) -> Vec<(GestureKind, Vec<u32>)> {
        self.emitted
            .iter()
            .filter(|e| !e.gesture.kind().is_raw())
            .map(|e| {
                let ids = e.gesture.contact_ids().into_iter().map(|c| c.0).collect();
                (e.gesture.kind(), ids)
            })
            .collect()
    }

    /// Compare the non-raw gestures against a script's expectations.
    pub fn check(&self, expect: &[ExpectedGesture]) -> Result<(), ReplayError> {
        let actual = self.summary();
        let expected: Vec<_> = expect.iter().map(|e| (e.kind, e.contacts.clone())).collect();
        if actual == expected {
            Ok(())
        } else {
            Err(ReplayError::Mismatch {
                expected: render(&expected),
                actual: render(&actual),
            })
        }
    }

    /// Fail on the first rejected step.
    pub fn ensure_clean(&self) -> Result<(), ReplayError> {
        match self.rejected.first() {
            Some((index, err)) => Err(ReplayError::Protocol {
                index: *index,
                source: err.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn render(gestures: &[(GestureKind, Vec<u32>)]) -> String {
    let parts: Vec<String> = gestures
        .iter()
        .map(|(kind, ids)| format!("{kind}{ids:?}"))
        .collect();
    format!("[{}]", parts.join(", "))
}

/// Drives a [`GestureEngine`] from scripted input.
#[derive(Debug)]
pub struct Replayer {
    engine: GestureEngine,
    origin: Instant,
}

impl Replayer {
    pub fn new(config: GestureConfig) -> Result<Self, ReplayError> {
        Ok(Self {
            engine: GestureEngine::new(config)?,
            origin: Instant::now(),
        })
    }

    /// A replayer configured by the script's override, or the defaults.
    pub fn for_script(script: &TouchScript) -> Result<Self, ReplayError> {
        Self::new(script.config.clone().unwrap_or_default())
    }

    pub fn register<C: GestureConsumer + 'static>(&mut self, consumer: C) -> ConsumerId {
        self.engine.register(consumer)
    }

    #[inline]
    #[must_use]
    pub fn engine(&self) -> &GestureEngine {
        &self.engine
    }

    #[inline]
    pub fn engine_mut(&mut self) -> &mut GestureEngine {
        &mut self.engine
    }

    /// Engine time for a script timestamp.
    #[inline]
    #[must_use]
    pub fn instant(&self, at_ms: u64) -> Instant {
        self.origin + Duration::from_millis(at_ms)
    }

    /// Replay every step, then settle open windows.
    pub fn run(&mut self, script: &TouchScript) -> Result<ReplayOutcome, ReplayError> {
        script.validate()?;
        let mut outcome = ReplayOutcome::default();

        for (index, step) in script.steps.iter().enumerate() {
            let now = self.instant(step.at_ms);
            let result = match step.op {
                TouchOp::Add { id, x, y } => {
                    self.engine.contact_added(ContactId(id), now, Vec2::new(x, y))
                }
                TouchOp::Move { id, x, y, delta: None } => {
                    self.engine.contact_moved(ContactId(id), now, Vec2::new(x, y))
                }
                TouchOp::Move { id, x, y, delta: Some(d) } => self.engine.contact_moved_with_delta(
                    ContactId(id),
                    now,
                    Vec2::new(x, y),
                    d.into(),
                ),
                TouchOp::Remove { id, x, y } => {
                    self.engine.contact_removed(ContactId(id), now, Vec2::new(x, y))
                }
                TouchOp::Frame => Ok(self.engine.frame(now)),
            };
            match result {
                Ok(gestures) => outcome.emitted.extend(gestures.into_iter().map(|gesture| Emitted {
                    step: Some(index),
                    at_ms: step.at_ms,
                    gesture,
                })),
                Err(err) => {
                    tracing::debug!(script = %script.name, step = index, error = %err, "step rejected");
                    outcome.rejected.push((index, err));
                }
            }
        }

        self.settle(&mut outcome);
        outcome.diagnostics = self.engine.diagnostics();
        Ok(outcome)
    }

    fn settle(&mut self, outcome: &mut ReplayOutcome) {
        for _ in 0..MAX_SETTLE_TICKS {
            let Some(deadline) = self.engine.next_deadline() else {
                return;
            };
            let at_ms = deadline
                .saturating_duration_since(self.origin)
                .as_millis()
                .try_into()
                .unwrap_or(u64::MAX);
            let gestures = self.engine.frame(deadline);
            outcome.emitted.extend(gestures.into_iter().map(|gesture| Emitted {
                step: None,
                at_ms,
                gesture,
            }));
        }
    }
}

/// Replay `script` with its own configuration and no consumers, then check
/// its expectations.
pub fn replay_and_check(script: &TouchScript) -> Result<ReplayOutcome, ReplayError> {
    let mut replayer = Replayer::for_script(script)?;
    let outcome = replayer.run(script)?;
    outcome.check(&script.expect)?;
    Ok(outcome)
}
