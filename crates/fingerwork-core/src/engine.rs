#![forbid(unsafe_code)]

//! The [`GestureEngine`] facade.
//!
//! Wires the orchestrator to the arbitrator and drives both from the host's
//! input feed and frame clock. Every call returns the gestures produced in
//! that turn (raw variants included); the same gestures, minus the raw ones,
//! have already been delivered to the owning consumers when it returns.
//!
//! # Turn order
//!
//! 1. Validate the input. A [`ProtocolError`] returns before anything else
//!    happens, including timers.
//! 2. Fire due aggregation windows and dispatch their gestures.
//! 3. Release claims whose grace period elapsed.
//! 4. Apply the input:
//!    - add: claim arbitration, then cluster assignment;
//!    - move: kinematics and classification, then dispatch;
//!    - remove: classification and dispatch, then end notification and the
//!      start of the grace period.

use web_time::Instant;

use crate::arbitrator::{Arbitrator, ConsumerId, GestureConsumer};
use crate::config::GestureConfig;
use crate::contact::{Contact, ContactId};
use crate::error::{ConfigError, ProtocolError};
use crate::geometry::Vec2;
use crate::gesture::Gesture;
use crate::orchestrator::Orchestrator;

/// Running counters for anomalies the engine absorbed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Invariant violations reported and dropped.
    pub internal_errors: u64,
    /// Inputs rejected for breaking the feed contract.
    pub protocol_errors: u64,
    /// Moves whose reported delta disagreed with their position.
    pub missed_updates: u64,
}

/// Gesture classification plus ownership arbitration behind one API.
#[derive(Debug)]
pub struct GestureEngine {
    orchestrator: Orchestrator,
    arbitrator: Arbitrator,
    protocol_errors: u64,
}

impl GestureEngine {
    /// Build an engine. Rejects inconsistent configuration.
    pub fn new(config: GestureConfig) -> Result<Self, ConfigError> {
        let grace = config.release_grace;
        let orchestrator = Orchestrator::new(config)?;
        Ok(Self {
            orchestrator,
            arbitrator: Arbitrator::new(grace),
            protocol_errors: 0,
        })
    }

    // ---- Consumers ----

    /// Register a consumer; it is polled for claims after every consumer
    /// registered before it.
    pub fn register<C: GestureConsumer + 'static>(&mut self, consumer: C) -> ConsumerId {
        self.arbitrator.register(Box::new(consumer))
    }

    pub fn register_boxed(&mut self, consumer: Box<dyn GestureConsumer>) -> ConsumerId {
        self.arbitrator.register(consumer)
    }

    /// Remove a consumer along with all of its claims.
    pub fn unregister(&mut self, id: ConsumerId) -> Option<Box<dyn GestureConsumer>> {
        self.arbitrator.unregister(id)
    }

    // ---- Input ----

    /// A contact began.
    pub fn contact_added(
        &mut self,
        id: ContactId,
        now: Instant,
        position: Vec2,
    ) -> Result<Vec<Gesture>, ProtocolError> {
        let checked = self.orchestrator.check_added(id, position);
        self.screen(checked)?;
        let mut out = Vec::new();
        self.begin_turn(now, &mut out);

        let config = self.orchestrator.config();
        let snapshot = Contact::new(id, now, position, config.motion(), config.dpi).snapshot();
        self.arbitrator.contact_begin(&snapshot);
        self.orchestrator.apply_added(id, now, position);
        Ok(out)
    }

    /// A contact moved.
    pub fn contact_moved(
        &mut self,
        id: ContactId,
        now: Instant,
        position: Vec2,
    ) -> Result<Vec<Gesture>, ProtocolError> {
        self.moved(id, now, position, None)
    }

    /// A contact moved and the feed reported its own delta.
    pub fn contact_moved_with_delta(
        &mut self,
        id: ContactId,
        now: Instant,
        position: Vec2,
        delta: Vec2,
    ) -> Result<Vec<Gesture>, ProtocolError> {
        self.moved(id, now, position, Some(delta))
    }

    fn moved(
        &mut self,
        id: ContactId,
        now: Instant,
        position: Vec2,
        delta: Option<Vec2>,
    ) -> Result<Vec<Gesture>, ProtocolError> {
        let checked = self.orchestrator.check_live(id, position);
        self.screen(checked)?;
        let mut out = Vec::new();
        self.begin_turn(now, &mut out);

        let start = out.len();
        self.orchestrator
            .apply_moved(id, now, position, delta, &mut out);
        self.deliver(&out[start..]);
        Ok(out)
    }

    /// A contact ended.
    pub fn contact_removed(
        &mut self,
        id: ContactId,
        now: Instant,
        position: Vec2,
    ) -> Result<Vec<Gesture>, ProtocolError> {
        let checked = self.orchestrator.check_live(id, position);
        self.screen(checked)?;
        let mut out = Vec::new();
        self.begin_turn(now, &mut out);

        let start = out.len();
        let snapshot = self
            .orchestrator
            .apply_removed(id, now, position, &mut out)?;
        self.deliver(&out[start..]);
        self.arbitrator.contact_end(&snapshot, now);
        Ok(out)
    }

    /// Per-frame tick: fires due windows and runs the relationship pass.
    pub fn frame(&mut self, now: Instant) -> Vec<Gesture> {
        let mut out = Vec::new();
        self.begin_turn(now, &mut out);
        let start = out.len();
        self.orchestrator.apply_frame(now, &mut out);
        self.deliver(&out[start..]);
        out
    }

    // ---- Introspection ----

    #[inline]
    #[must_use]
    pub fn config(&self) -> &GestureConfig {
        self.orchestrator.config()
    }

    #[inline]
    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    #[inline]
    #[must_use]
    pub fn arbitrator(&self) -> &Arbitrator {
        &self.arbitrator
    }

    /// When the next aggregation window fires, if one is open. Hosts without
    /// a frame clock can call [`frame`](Self::frame) at this instant.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.orchestrator.next_deadline()
    }

    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            internal_errors: self.orchestrator.internal_errors() + self.arbitrator.internal_errors(),
            protocol_errors: self.protocol_errors,
            missed_updates: self.orchestrator.missed_updates(),
        }
    }

    // ---- Internals ----

    fn screen(&mut self, checked: Result<(), ProtocolError>) -> Result<(), ProtocolError> {
        checked.inspect_err(|err| {
            self.protocol_errors += 1;
            tracing::warn!(error = %err, "input rejected");
        })
    }

    fn begin_turn(&mut self, now: Instant, out: &mut Vec<Gesture>) {
        let start = out.len();
        self.orchestrator.advance(now, out);
        self.deliver(&out[start..]);
        self.arbitrator.advance(now);
    }

    fn deliver(&mut self, gestures: &[Gesture]) {
        for gesture in gestures {
            self.arbitrator.dispatch(gesture);
        }
    }
}
