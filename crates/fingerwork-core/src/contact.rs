#![forbid(unsafe_code)]

//! Per-contact motion tracking.
//!
//! A [`Contact`] is one physical touch (or mouse-emulated touch) from begin
//! to end. Every move appends a [`Sample`]; derived kinematics (speed,
//! direction, cumulative distance) are computed from consecutive samples and
//! a short time-windowed history is kept for smoothing.
//!
//! # Invariants
//!
//! 1. `distance_traveled` never decreases.
//! 2. The history is never empty: the current sample is always retained,
//!    older samples are evicted once they fall outside the history window.
//! 3. `is_dragging()` holds iff the contact is moving and its cumulative
//!    travel exceeds the drag threshold. Travel is monotone, so once the
//!    threshold is crossed only motion matters.
//! 4. Speed, direction and delta only ever come from feed samples. A
//!    [`hold`](Contact::hold) advances the contact's clock and marks it
//!    stationary without touching them.

use std::collections::VecDeque;
use std::fmt;

use web_time::{Duration, Instant};

use crate::config::MotionThresholds;
use crate::geometry::{LengthUnit, Vec2};

/// Tolerance when checking a feed-supplied delta against positions.
const DELTA_TOLERANCE: f32 = 1e-3;

/// Stable identity of a live contact, supplied by the input feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactId(pub u32);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One kinematic sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: Instant,
    pub position: Vec2,
    /// Movement since the previous sample.
    pub delta: Vec2,
    /// `|delta|`.
    pub distance: f32,
    /// Units per second over the last step.
    pub speed: f32,
    /// Angle of `delta` in radians; NaN when the sample did not move.
    pub direction: f32,
}

impl Sample {
    fn at_rest(time: Instant, position: Vec2) -> Self {
        Self {
            time,
            position,
            delta: Vec2::ZERO,
            distance: 0.0,
            speed: 0.0,
            direction: f32::NAN,
        }
    }
}

/// A feed-supplied delta disagreed with the reported position: an upstream
/// move event was probably skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissedUpdate {
    /// Previous position plus the supplied delta.
    pub expected: Vec2,
    /// The position the feed reported (used as authoritative).
    pub reported: Vec2,
}

/// A tracked contact.
#[derive(Debug, Clone)]
pub struct Contact {
    id: ContactId,
    start_time: Instant,
    start_position: Vec2,
    current: Sample,
    history: VecDeque<Sample>,
    /// Latest instant the contact was known to be at `current.position`.
    seen: Instant,
    held: bool,
    distance_traveled: f32,
    thresholds: MotionThresholds,
    dpi: f32,
}

impl Contact {
    /// Begin tracking a contact.
    #[must_use]
    pub fn new(
        id: ContactId,
        time: Instant,
        position: Vec2,
        thresholds: MotionThresholds,
        dpi: f32,
    ) -> Self {
        let current = Sample::at_rest(time, position);
        let mut history = VecDeque::with_capacity(16);
        history.push_back(current);
        Self {
            id,
            start_time: time,
            start_position: position,
            current,
            history,
            seen: time,
            held: false,
            distance_traveled: 0.0,
            thresholds,
            dpi,
        }
    }

    /// Record a new position; the delta is derived from the previous sample.
    pub fn update(&mut self, time: Instant, position: Vec2) {
        let delta = position - self.current.position;
        self.push_sample(time, position, delta);
    }

    /// Record a new position with a delta reported by the feed.
    ///
    /// If the delta does not lead from the previous position to `position`,
    /// the position wins and the mismatch is returned.
    pub fn update_with_delta(
        &mut self,
        time: Instant,
        position: Vec2,
        delta: Vec2,
    ) -> Option<MissedUpdate> {
        let expected = self.current.position + delta;
        if expected.approx_eq(position, DELTA_TOLERANCE) {
            self.push_sample(time, position, delta);
            None
        } else {
            self.update(time, position);
            Some(MissedUpdate {
                expected,
                reported: position,
            })
        }
    }

    /// Record the final sample at contact-end.
    ///
    /// An end event that repeats the last position only advances the clock,
    /// keeping the last measured speed and direction.
    pub fn release(&mut self, time: Instant, position: Vec2) {
        if position == self.current.position {
            self.advance_clock(time);
            return;
        }
        self.update(time, position);
    }

    /// The contact is still down at its last position at `time`, with no
    /// feed sample to show for it.
    ///
    /// Time alive advances and the contact stops counting as moving until
    /// the next sample. The measured kinematics are left alone.
    pub fn hold(&mut self, time: Instant) {
        self.advance_clock(time);
        self.held = true;
    }

    fn advance_clock(&mut self, time: Instant) {
        if time > self.seen {
            self.seen = time;
        }
    }

    fn push_sample(&mut self, time: Instant, position: Vec2, delta: Vec2) {
        let distance = delta.length();
        let dt = time
            .saturating_duration_since(self.current.time)
            .as_secs_f32();
        let speed = if dt > 0.0 {
            distance / dt
        } else {
            self.current.speed
        };

        let sample = Sample {
            time,
            position,
            delta,
            distance,
            speed,
            direction: delta.angle(),
        };

        self.distance_traveled += distance;
        self.current = sample;
        self.seen = self.seen.max(time);
        self.held = false;
        self.history.push_back(sample);

        let window = self.thresholds.history_window;
        while self.history.len() > 1
            && self
                .history
                .front()
                .is_some_and(|oldest| time.saturating_duration_since(oldest.time) > window)
        {
            self.history.pop_front();
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ContactId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> &Sample {
        &self.current
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.current.position
    }

    #[inline]
    #[must_use]
    pub fn previous_position(&self) -> Vec2 {
        self.current.position - self.current.delta
    }

    #[inline]
    #[must_use]
    pub fn start_position(&self) -> Vec2 {
        self.start_position
    }

    #[inline]
    #[must_use]
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Time of the last feed sample.
    #[inline]
    #[must_use]
    pub fn last_update(&self) -> Instant {
        self.current.time
    }

    /// Latest instant the contact is known to have been down, counting holds
    /// and a stationary release.
    #[inline]
    #[must_use]
    pub fn last_seen(&self) -> Instant {
        self.seen
    }

    #[inline]
    #[must_use]
    pub fn time_alive(&self) -> Duration {
        self.seen.saturating_duration_since(self.start_time)
    }

    #[inline]
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.current.speed
    }

    #[inline]
    #[must_use]
    pub fn direction(&self) -> f32 {
        self.current.direction
    }

    #[inline]
    #[must_use]
    pub fn distance_traveled(&self) -> f32 {
        self.distance_traveled
    }

    #[inline]
    #[must_use]
    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    /// Samples inside the history window, oldest first.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &Sample> {
        self.history.iter()
    }

    #[must_use]
    pub fn is_moving(&self) -> bool {
        !self.held && self.current.speed > self.thresholds.move_speed
    }

    #[must_use]
    pub fn has_dragged(&self) -> bool {
        self.distance_traveled > self.thresholds.drag_distance
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.is_moving() && self.has_dragged()
    }

    /// Still within the wiggle allowance for a tap or long press.
    #[must_use]
    pub fn can_be_tap(&self) -> bool {
        self.distance_traveled < self.thresholds.tap_wiggle
    }

    fn oldest(&self) -> &Sample {
        self.history.front().unwrap_or(&self.current)
    }

    /// Midpoint of the current and oldest retained position.
    #[must_use]
    pub fn smoothed_position(&self) -> Vec2 {
        (self.current.position + self.oldest().position) / 2.0
    }

    /// Mean of the current and oldest retained delta.
    #[must_use]
    pub fn smoothed_delta(&self) -> Vec2 {
        (self.current.delta + self.oldest().delta) / 2.0
    }

    /// Mean of the current and oldest retained speed.
    #[must_use]
    pub fn smoothed_speed(&self) -> f32 {
        (self.current.speed + self.oldest().speed) / 2.0
    }

    /// Average velocity across the history window (units/sec).
    #[must_use]
    pub fn windowed_velocity(&self) -> Vec2 {
        let oldest = self.oldest();
        let dt = self
            .current
            .time
            .saturating_duration_since(oldest.time)
            .as_secs_f32();
        if dt > 0.0 {
            (self.current.position - oldest.position) / dt
        } else {
            Vec2::ZERO
        }
    }

    /// Current position in a physical unit.
    #[must_use]
    pub fn position_in(&self, unit: LengthUnit) -> Vec2 {
        Vec2::new(
            unit.from_dots(self.current.position.x, self.dpi),
            unit.from_dots(self.current.position.y, self.dpi),
        )
    }

    /// Owned copy of the current kinematic state.
    #[must_use]
    pub fn snapshot(&self) -> ContactSnapshot {
        ContactSnapshot {
            id: self.id,
            start_time: self.start_time,
            start_position: self.start_position,
            time: self.seen,
            position: self.current.position,
            delta: self.current.delta,
            speed: self.current.speed,
            direction: self.current.direction,
            distance_traveled: self.distance_traveled,
            dragging: self.is_dragging(),
            can_be_tap: self.can_be_tap(),
            dpi: self.dpi,
        }
    }
}

/// A contact's identity plus its kinematic state at one instant.
///
/// Gesture events carry snapshots so they stay meaningful after the contact
/// itself has ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSnapshot {
    pub id: ContactId,
    pub start_time: Instant,
    pub start_position: Vec2,
    pub time: Instant,
    pub position: Vec2,
    pub delta: Vec2,
    pub speed: f32,
    pub direction: f32,
    pub distance_traveled: f32,
    pub dragging: bool,
    pub can_be_tap: bool,
    pub dpi: f32,
}

impl ContactSnapshot {
    #[inline]
    #[must_use]
    pub fn previous_position(&self) -> Vec2 {
        self.position - self.delta
    }

    #[inline]
    #[must_use]
    pub fn time_alive(&self) -> Duration {
        self.time.saturating_duration_since(self.start_time)
    }

    #[must_use]
    pub fn direction_degrees(&self) -> f32 {
        self.direction.to_degrees()
    }

    #[must_use]
    pub fn position_in(&self, unit: LengthUnit) -> Vec2 {
        Vec2::new(
            unit.from_dots(self.position.x, self.dpi),
            unit.from_dots(self.position.y, self.dpi),
        )
    }

    #[must_use]
    pub fn speed_in(&self, unit: LengthUnit) -> f32 {
        unit.from_dots(self.speed, self.dpi)
    }
}
