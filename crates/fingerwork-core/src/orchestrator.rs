#![forbid(unsafe_code)]

//! Cluster routing, window timers and the per-frame relationship pass.
//!
//! The [`Orchestrator`] owns every live [`Contact`] and every [`Cluster`].
//! Clusters live in a generational slot arena and refer to contacts by id
//! only, so there are no reference cycles between contacts, clusters and the
//! orchestrator.
//!
//! # Turn structure
//!
//! Every public input call (and [`Orchestrator::frame`]) begins a turn:
//!
//! 1. slots vacated during the previous turn return to the free list;
//! 2. aggregation windows whose deadline has passed fire;
//! 3. the input itself is applied (for a frame: the idle refresh, then the
//!    relationship pass).
//!
//! A cluster vacated in a turn is therefore never handed a new contact in
//! the same turn. The engine runs steps 1 and 2 through [`Orchestrator::advance`]
//! itself, dispatches what fired, and then applies the input with the
//! crate-private `apply_*` variants, so each turn advances exactly once.
//!
//! # Invariants
//!
//! 1. A live contact is owned by exactly one live cluster, or is in the
//!    long-press set, never both.
//! 2. A window timer only reaches the cluster generation that opened it.
//! 3. The relationship pass never emits a `MultiDrag` with fewer than two
//!    contacts, and never reports a contact in two interpreted drag events
//!    of the same pass.
//!
//! # Failure Modes
//!
//! - Feed contract violations are returned as [`ProtocolError`] before any
//!   state (including timers) is touched.
//! - A live contact with no owning cluster is reported as
//!   [`InternalError::UnownedContact`]; its update is ignored.

use ahash::{AHashMap, AHashSet};
use web_time::Instant;

use crate::classifier::{Cluster, ClusterSignal, ContactTable, WindowKind};
use crate::config::{GestureConfig, RelationshipThresholds};
use crate::contact::{Contact, ContactId, ContactSnapshot};
use crate::error::{ConfigError, InternalError, ProtocolError, report_internal};
use crate::geometry::Vec2;
use crate::gesture::{DragRelationship, Gesture, MultiContact};
use crate::relationship;
use crate::scheduler::DeferredQueue;

/// Generational handle to a cluster slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterId {
    index: u32,
    generation: u32,
}

impl ClusterId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    #[must_use]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Default)]
struct Slot {
    cluster: Cluster,
    generation: u32,
    live: bool,
}

#[derive(Debug, Clone, Copy)]
struct WindowTimer {
    cluster: ClusterId,
    kind: WindowKind,
}

fn live_slot(slots: &mut [Slot], id: ClusterId) -> Option<&mut Slot> {
    slots
        .get_mut(id.index())
        .filter(|s| s.live && s.generation == id.generation)
}

/// Owner of contacts and clusters.
#[derive(Debug)]
pub struct Orchestrator {
    config: GestureConfig,
    relationship: RelationshipThresholds,
    contacts: ContactTable,
    owner: AHashMap<ContactId, ClusterId>,
    long_pressed: AHashSet<ContactId>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    vacated: Vec<u32>,
    windows: DeferredQueue<WindowTimer>,
    last_frame: Option<Instant>,
    signals: Vec<ClusterSignal>,
    internal_errors: u64,
    missed_updates: u64,
}

impl Orchestrator {
    /// Create an orchestrator with a validated configuration.
    pub fn new(config: GestureConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            relationship: config.relationship(),
            config,
            contacts: ContactTable::default(),
            owner: AHashMap::new(),
            long_pressed: AHashSet::new(),
            slots: Vec::new(),
            free: Vec::new(),
            vacated: Vec::new(),
            windows: DeferredQueue::new(),
            last_frame: None,
            signals: Vec::new(),
            internal_errors: 0,
            missed_updates: 0,
        })
    }

    // ---- Accessors ----

    #[inline]
    #[must_use]
    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    #[must_use]
    pub fn contact(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.get(&id)
    }

    /// Live contacts, in no particular order.
    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    #[inline]
    #[must_use]
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    #[must_use]
    pub fn cluster_of(&self, id: ContactId) -> Option<ClusterId> {
        self.owner.get(&id).copied()
    }

    #[must_use]
    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.slots
            .get(id.index())
            .filter(|s| s.live && s.generation == id.generation)
            .map(|s| &s.cluster)
    }

    /// Live clusters in slot order.
    pub fn clusters(&self) -> impl Iterator<Item = (ClusterId, &Cluster)> {
        self.slots.iter().enumerate().filter(|(_, s)| s.live).map(|(i, s)| {
            (
                ClusterId {
                    index: i as u32,
                    generation: s.generation,
                },
                &s.cluster,
            )
        })
    }

    /// Held past the long-press threshold; awaiting removal.
    #[must_use]
    pub fn is_long_pressed(&self, id: ContactId) -> bool {
        self.long_pressed.contains(&id)
    }

    /// Deadline of the next aggregation window.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.windows.next_deadline()
    }

    #[inline]
    #[must_use]
    pub fn internal_errors(&self) -> u64 {
        self.internal_errors
    }

    #[inline]
    #[must_use]
    pub fn missed_updates(&self) -> u64 {
        self.missed_updates
    }

    // ---- Validation ----

    /// Check a contact-begin against the feed contract without touching state.
    pub fn check_added(&self, id: ContactId, position: Vec2) -> Result<(), ProtocolError> {
        check_finite(id, position)?;
        if self.contacts.contains_key(&id) {
            return Err(ProtocolError::DuplicateContact(id));
        }
        Ok(())
    }

    /// Check a move or end against the feed contract without touching state.
    pub fn check_live(&self, id: ContactId, position: Vec2) -> Result<(), ProtocolError> {
        check_finite(id, position)?;
        if !self.contacts.contains_key(&id) {
            return Err(ProtocolError::UnknownContact(id));
        }
        Ok(())
    }

    // ---- Turns ----

    /// Start a turn: recycle slots vacated earlier and fire due windows.
    pub fn advance(&mut self, now: Instant, out: &mut Vec<Gesture>) {
        for index in self.vacated.drain(..) {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.cluster.reset();
                self.free.push(index);
                tracing::debug!(slot = index, "cluster returned to pool");
            }
        }

        while let Some((_, timer)) = self.windows.pop_due(now) {
            let Some(slot) = live_slot(&mut self.slots, timer.cluster) else {
                tracing::debug!(slot = timer.cluster.index, kind = ?timer.kind, "stale window timer dropped");
                continue;
            };
            slot.cluster.on_window(timer.kind, &self.config, &mut self.signals);
            self.drain_signals(timer.cluster, now, out);
        }
    }

    /// A contact began.
    pub fn contact_added(
        &mut self,
        id: ContactId,
        now: Instant,
        position: Vec2,
        out: &mut Vec<Gesture>,
    ) -> Result<(), ProtocolError> {
        self.check_added(id, position)?;
        self.advance(now, out);
        self.apply_added(id, now, position);
        Ok(())
    }

    /// Assign a checked new contact to a cluster, without advancing.
    pub(crate) fn apply_added(&mut self, id: ContactId, now: Instant, position: Vec2) {
        let contact = Contact::new(id, now, position, self.config.motion(), self.config.dpi);
        let radius = self.config.cluster_accept_radius;
        let nearest = self
            .clusters()
            .filter_map(|(cid, cluster)| {
                cluster
                    .accepts(position, &self.contacts, radius)
                    .map(|d| (cid, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        let cluster = match nearest {
            Some((cid, distance)) => {
                tracing::debug!(contact = %id, slot = cid.index, distance, "contact joined cluster");
                cid
            }
            None => {
                let cid = self.allocate();
                tracing::debug!(contact = %id, slot = cid.index, "contact started cluster");
                cid
            }
        };

        if let Some(slot) = live_slot(&mut self.slots, cluster) {
            slot.cluster.insert(id);
        }
        self.owner.insert(id, cluster);
        self.contacts.insert(id, contact);
    }

    /// A contact moved. `delta` is the feed's own movement report, if any.
    pub fn contact_moved(
        &mut self,
        id: ContactId,
        now: Instant,
        position: Vec2,
        delta: Option<Vec2>,
        out: &mut Vec<Gesture>,
    ) -> Result<(), ProtocolError> {
        self.check_live(id, position)?;
        self.advance(now, out);
        self.apply_moved(id, now, position, delta, out);
        Ok(())
    }

    /// Apply a checked move, without advancing.
    pub(crate) fn apply_moved(
        &mut self,
        id: ContactId,
        now: Instant,
        position: Vec2,
        delta: Option<Vec2>,
        out: &mut Vec<Gesture>,
    ) {
        if let Some(contact) = self.contacts.get_mut(&id) {
            match delta {
                Some(delta) => {
                    if let Some(missed) = contact.update_with_delta(now, position, delta) {
                        self.missed_updates += 1;
                        tracing::warn!(
                            contact = %id,
                            expected = %missed.expected,
                            reported = %missed.reported,
                            "move delta disagrees with position; an update was probably skipped"
                        );
                    }
                }
                None => contact.update(now, position),
            }
        }
        self.classify_update(id, now, out);
    }

    /// A contact ended. Returns its final snapshot.
    pub fn contact_removed(
        &mut self,
        id: ContactId,
        now: Instant,
        position: Vec2,
        out: &mut Vec<Gesture>,
    ) -> Result<ContactSnapshot, ProtocolError> {
        self.check_live(id, position)?;
        self.advance(now, out);
        self.apply_removed(id, now, position, out)
    }

    /// Apply a checked removal, without advancing.
    pub(crate) fn apply_removed(
        &mut self,
        id: ContactId,
        now: Instant,
        position: Vec2,
        out: &mut Vec<Gesture>,
    ) -> Result<ContactSnapshot, ProtocolError> {
        let Some(mut contact) = self.contacts.remove(&id) else {
            return Err(ProtocolError::UnknownContact(id));
        };
        contact.release(now, position);
        let snapshot = contact.snapshot();

        if self.long_pressed.remove(&id) {
            tracing::debug!(contact = %id, "long-pressed contact lifted");
            return Ok(snapshot);
        }

        let Some(cid) = self.owner.remove(&id) else {
            self.fault(InternalError::UnownedContact(id));
            return Ok(snapshot);
        };
        match live_slot(&mut self.slots, cid) {
            Some(slot) => {
                slot.cluster.on_remove(&contact, &self.config, &mut self.signals);
                self.drain_signals(cid, now, out);
            }
            None => self.fault(InternalError::UnknownCluster(cid.index())),
        }
        Ok(snapshot)
    }

    /// Per-frame work: due windows, a stationary refresh of contacts that
    /// have not moved since the previous frame, then the relationship pass.
    ///
    /// The refresh lets held contacts reach the long-press threshold and
    /// drops stopped contacts from the dragging sets, so the pass only sees
    /// contacts that actually moved during the last frame. It holds contacts
    /// rather than sampling them, so the speed a later lift is judged on does
    /// not depend on how often the host calls this.
    pub fn frame(&mut self, now: Instant, out: &mut Vec<Gesture>) {
        self.advance(now, out);
        self.apply_frame(now, out);
    }

    /// Idle refresh and relationship pass, without advancing.
    pub(crate) fn apply_frame(&mut self, now: Instant, out: &mut Vec<Gesture>) {
        if let Some(previous) = self.last_frame {
            let mut idle: Vec<ContactId> = self
                .contacts
                .values()
                .filter(|c| c.last_update() <= previous && now > c.last_seen())
                .map(Contact::id)
                .collect();
            idle.sort_unstable();
            for id in idle {
                if let Some(contact) = self.contacts.get_mut(&id) {
                    contact.hold(now);
                }
                self.classify_update(id, now, out);
            }
        }

        self.relationship_pass(out);
        self.last_frame = Some(now);
    }

    // ---- Internals ----

    fn classify_update(&mut self, id: ContactId, now: Instant, out: &mut Vec<Gesture>) {
        if self.long_pressed.contains(&id) {
            return;
        }
        let Some(cid) = self.owner.get(&id).copied() else {
            self.fault(InternalError::UnownedContact(id));
            return;
        };
        match live_slot(&mut self.slots, cid) {
            Some(slot) => {
                slot.cluster
                    .on_update(id, &self.contacts, &self.config, &mut self.signals);
                self.drain_signals(cid, now, out);
            }
            None => self.fault(InternalError::UnknownCluster(cid.index())),
        }
    }

    fn drain_signals(&mut self, cid: ClusterId, now: Instant, out: &mut Vec<Gesture>) {
        let mut signals = std::mem::take(&mut self.signals);
        for signal in signals.drain(..) {
            match signal {
                ClusterSignal::Gesture(gesture) => {
                    tracing::trace!(kind = %gesture.kind(), contacts = ?gesture.contact_ids(), "gesture");
                    out.push(gesture);
                }
                ClusterSignal::OpenWindow(kind) => {
                    self.windows.schedule(
                        now,
                        self.config.lift_window,
                        WindowTimer { cluster: cid, kind },
                    );
                }
                ClusterSignal::LongPressCandidate(id) => {
                    self.owner.remove(&id);
                    self.long_pressed.insert(id);
                    tracing::debug!(contact = %id, "contact entered long press");
                }
                ClusterSignal::Ended => self.vacate(cid),
                ClusterSignal::Fault(err) => self.fault(err),
            }
        }
        self.signals = signals;
    }

    fn allocate(&mut self) -> ClusterId {
        if let Some(index) = self.free.pop()
            && let Some(slot) = self.slots.get_mut(index as usize)
        {
            slot.live = true;
            return ClusterId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            cluster: Cluster::new(),
            generation: 0,
            live: true,
        });
        ClusterId {
            index,
            generation: 0,
        }
    }

    fn vacate(&mut self, cid: ClusterId) {
        if let Some(slot) = live_slot(&mut self.slots, cid) {
            slot.live = false;
            slot.generation = slot.generation.wrapping_add(1);
            self.vacated.push(cid.index);
            tracing::debug!(slot = cid.index, "cluster ended");
        }
    }

    fn fault(&mut self, err: InternalError) {
        self.internal_errors += 1;
        report_internal(&err);
    }

    // ---- Relationship pass ----

    fn relationship_pass(&mut self, out: &mut Vec<Gesture>) {
        let mut ids: Vec<ContactId> = Vec::new();
        let mut faults = Vec::new();
        for slot in self.slots.iter().filter(|s| s.live && s.cluster.dragging().len() >= 2) {
            ids.clear();
            ids.extend_from_slice(slot.cluster.dragging());
            ids.sort_unstable();
            let snapshots: Vec<ContactSnapshot> = ids
                .iter()
                .filter_map(|id| self.contacts.get(id))
                .map(Contact::snapshot)
                .collect();
            interpret_drags(&snapshots, &self.relationship, out, &mut faults);
        }
        for err in faults {
            self.fault(err);
        }
    }
}

fn check_finite(id: ContactId, position: Vec2) -> Result<(), ProtocolError> {
    if position.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::NonFinitePosition {
            id,
            x: position.x,
            y: position.y,
        })
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Interpret one cluster's simultaneously dragging contacts.
///
/// Identical relationships chain into `MultiDrag` groups. A pinch or twist
/// consumes both contacts of the pair (neither may be in an identical group)
/// and is preceded by its `RawTwoContactDrag`. Anything left over is a
/// `SingleDrag`.
pub fn interpret_drags(
    snapshots: &[ContactSnapshot],
    thresholds: &RelationshipThresholds,
    out: &mut Vec<Gesture>,
    faults: &mut Vec<InternalError>,
) {
    let n = snapshots.len();
    let mut parent: Vec<usize> = (0..n).collect();
    let mut grouped = vec![false; n];
    let mut paired = vec![false; n];

    for i in 0..n {
        if paired[i] {
            continue;
        }
        for j in (i + 1)..n {
            if paired[j] {
                continue;
            }
            match relationship::classify(&snapshots[i], &snapshots[j], thresholds) {
                DragRelationship::Identical => {
                    let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                    parent[rj] = ri;
                    grouped[i] = true;
                    grouped[j] = true;
                }
                rel @ (DragRelationship::Pinch | DragRelationship::Twist)
                    if !grouped[i] && !grouped[j] =>
                {
                    let pair = relationship::analyze(&snapshots[i], &snapshots[j], thresholds);
                    out.push(Gesture::RawTwoContactDrag(pair.clone()));
                    out.push(if rel == DragRelationship::Pinch {
                        Gesture::Pinch(pair)
                    } else {
                        Gesture::Twist(pair)
                    });
                    paired[i] = true;
                    paired[j] = true;
                    break;
                }
                _ => {}
            }
        }
    }

    let mut groups: Vec<(usize, Vec<ContactSnapshot>)> = Vec::new();
    for i in (0..n).filter(|&i| grouped[i]) {
        let root = find(&mut parent, i);
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(snapshots[i]),
            None => groups.push((root, vec![snapshots[i]])),
        }
    }
    for (_, members) in groups {
        if members.len() < 2 {
            faults.push(InternalError::SingletonMultiDrag(members[0].id));
            continue;
        }
        out.push(Gesture::MultiDrag(MultiContact::new(members)));
    }

    for i in (0..n).filter(|&i| !grouped[i] && !paired[i]) {
        out.push(Gesture::SingleDrag(snapshots[i]));
    }
}
