#![forbid(unsafe_code)]

//! Per-cluster gesture classification.
//!
//! A [`Cluster`] is a spatially co-located group of contacts resolved
//! together. It does not own contacts: it holds [`ContactId`]s and reads the
//! orchestrator's contact table. Deferred work is requested through
//! [`ClusterSignal::OpenWindow`]; the orchestrator schedules it and calls
//! [`Cluster::on_window`] when it fires.
//!
//! # State Machine
//!
//! Each member is *Active* until it either crosses the long-press threshold
//! (it leaves the active set and waits in the long-press window) or is
//! removed (it becomes a one-shot candidate: tap, swipe, or nothing).
//!
//! - **Drag tracking**: every update of a dragging member puts it in the
//!   dragging set. A lone dragger yields `SingleDrag`; two or more yield
//!   `RawMultiDrag` of the whole set for the orchestrator's relationship pass.
//! - **Multi-gesture window**: a removal while other members remain defers
//!   its candidate into a window of `lift_window`. The window closes when it
//!   fires or when the last member leaves.
//! - **Long-press window**: opened by the first long-press candidate, it
//!   collects every candidate that crosses before it fires. It only closes
//!   by firing. A cluster whose last member leaves while it is open stays
//!   live, with no members, until then.
//!
//! # Invariants
//!
//! 1. A contact id appears at most once in the active set.
//! 2. The dragging set is a subset of the active set.
//! 3. At most one window of each kind is open.
//! 4. Finalization never emits a gesture with zero contacts, and never a
//!    multi variant with exactly one contact.
//!
//! # Failure Modes
//!
//! - Finalizing a window with no candidates yields
//!   [`ClusterSignal::Fault`] with [`InternalError::EmptyFinalize`] and emits
//!   nothing.
//! - Updates or removals for contacts this cluster does not hold yield
//!   [`InternalError::NotAMember`] and are ignored.

use ahash::AHashMap;

use crate::config::{GestureConfig, MinorityGroupPolicy};
use crate::contact::{Contact, ContactId, ContactSnapshot};
use crate::error::InternalError;
use crate::geometry::Vec2;
use crate::gesture::{Gesture, GestureKind, MultiContact};

/// Contact table the cluster reads from.
pub type ContactTable = AHashMap<ContactId, Contact>;

/// Outcome of a contact's removal, before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OneShot {
    Tap,
    Swipe,
    None,
}

impl OneShot {
    /// Classify a finishing contact.
    #[must_use]
    pub fn classify(contact: &Contact, config: &GestureConfig) -> Self {
        if contact.speed() > config.swipe_speed_threshold {
            Self::Swipe
        } else if contact.can_be_tap() && contact.time_alive() < config.tap_time_max {
            Self::Tap
        } else {
            Self::None
        }
    }

    fn single_kind(self) -> Option<GestureKind> {
        match self {
            Self::Tap => Some(GestureKind::SingleTap),
            Self::Swipe => Some(GestureKind::SingleSwipe),
            Self::None => None,
        }
    }
}

/// Which aggregation window a timer addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    MultiGesture,
    LongPress,
}

/// Requests and results a cluster hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterSignal {
    Gesture(Gesture),
    /// Schedule [`Cluster::on_window`] after the lift window.
    OpenWindow(WindowKind),
    /// The contact left the active set for the long-press path.
    LongPressCandidate(ContactId),
    /// No active members and no open window remain; the cluster can be
    /// recycled.
    Ended,
    /// An invariant did not hold; nothing was emitted for it.
    Fault(InternalError),
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    kind: OneShot,
    contact: ContactSnapshot,
}

/// One spatial cluster.
#[derive(Debug, Default)]
pub struct Cluster {
    members: Vec<ContactId>,
    dragging: Vec<ContactId>,
    pending: Vec<Candidate>,
    long_press: Vec<ContactSnapshot>,
    multi_window_open: bool,
    long_press_window_open: bool,
}

impl Cluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all state, keeping allocations for reuse.
    pub fn reset(&mut self) {
        self.members.clear();
        self.dragging.clear();
        self.pending.clear();
        self.long_press.clear();
        self.multi_window_open = false;
        self.long_press_window_open = false;
    }

    /// Active members in arrival order.
    #[inline]
    #[must_use]
    pub fn members(&self) -> &[ContactId] {
        &self.members
    }

    /// Members currently dragging, in the order they started.
    #[inline]
    #[must_use]
    pub fn dragging(&self) -> &[ContactId] {
        &self.dragging
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: ContactId) -> bool {
        self.members.contains(&id)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn window_open(&self, kind: WindowKind) -> bool {
        match kind {
            WindowKind::MultiGesture => self.multi_window_open,
            WindowKind::LongPress => self.long_press_window_open,
        }
    }

    /// Add a member. Returns `false` if it was already present.
    pub fn insert(&mut self, id: ContactId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.members.push(id);
        true
    }

    /// Distance from `position` to the nearest active member, if within `radius`.
    #[must_use]
    pub fn accepts(&self, position: Vec2, contacts: &ContactTable, radius: f32) -> Option<f32> {
        self.members
            .iter()
            .filter_map(|id| contacts.get(id))
            .map(|c| c.position().distance(position))
            .filter(|d| *d <= radius)
            .reduce(f32::min)
    }

    // ---- Updates ----

    /// Process a position update for member `id`.
    pub fn on_update(
        &mut self,
        id: ContactId,
        contacts: &ContactTable,
        config: &GestureConfig,
        out: &mut Vec<ClusterSignal>,
    ) {
        let Some(contact) = contacts.get(&id).filter(|_| self.contains(id)) else {
            out.push(ClusterSignal::Fault(InternalError::NotAMember(id)));
            return;
        };

        if contact.time_alive() >= config.long_press_time_min && contact.can_be_tap() {
            self.begin_long_press(contact, out);
            if self.members.is_empty() {
                self.end(config, out);
            }
            return;
        }

        if contact.is_dragging() {
            if !self.dragging.contains(&id) {
                self.dragging.push(id);
            }
            match self.dragging.as_slice() {
                [_] => {
                    out.push(ClusterSignal::Gesture(Gesture::SingleDrag(contact.snapshot())));
                }
                set => {
                    let snapshots = set
                        .iter()
                        .filter_map(|d| contacts.get(d))
                        .map(Contact::snapshot)
                        .collect();
                    out.push(ClusterSignal::Gesture(Gesture::RawMultiDrag(
                        MultiContact::new(snapshots),
                    )));
                }
            }
        } else {
            self.dragging.retain(|d| *d != id);
        }
    }

    fn begin_long_press(&mut self, contact: &Contact, out: &mut Vec<ClusterSignal>) {
        let id = contact.id();
        self.members.retain(|m| *m != id);
        self.dragging.retain(|d| *d != id);
        self.long_press.push(contact.snapshot());
        out.push(ClusterSignal::LongPressCandidate(id));

        if !self.long_press_window_open {
            self.long_press_window_open = true;
            tracing::debug!(contact = %id, "long-press window opened");
            out.push(ClusterSignal::OpenWindow(WindowKind::LongPress));
        }
    }

    // ---- Removal ----

    /// Process the removal of member `contact`.
    pub fn on_remove(
        &mut self,
        contact: &Contact,
        config: &GestureConfig,
        out: &mut Vec<ClusterSignal>,
    ) {
        let id = contact.id();
        if !self.contains(id) {
            out.push(ClusterSignal::Fault(InternalError::NotAMember(id)));
            return;
        }
        self.members.retain(|m| *m != id);
        self.dragging.retain(|d| *d != id);

        let candidate = Candidate {
            kind: OneShot::classify(contact, config),
            contact: contact.snapshot(),
        };

        // A reused id replaces its earlier candidate.
        self.pending.retain(|c| c.contact.id != id);

        if !self.members.is_empty() {
            self.pending.push(candidate);
            if !self.multi_window_open {
                self.multi_window_open = true;
                tracing::debug!(contact = %id, kind = ?candidate.kind, "multi-gesture window opened");
                out.push(ClusterSignal::OpenWindow(WindowKind::MultiGesture));
            }
            return;
        }

        if self.multi_window_open {
            self.pending.push(candidate);
            self.finalize_multi(config.minority_group_policy, out);
        } else if let Some(kind) = candidate.kind.single_kind() {
            out.push(ClusterSignal::Gesture(Gesture::single(kind, candidate.contact)));
        }
        self.end(config, out);
    }

    /// A scheduled window fired.
    pub fn on_window(&mut self, kind: WindowKind, config: &GestureConfig, out: &mut Vec<ClusterSignal>) {
        match kind {
            WindowKind::MultiGesture if self.multi_window_open => {
                self.finalize_multi(config.minority_group_policy, out);
            }
            WindowKind::LongPress if self.long_press_window_open => {
                self.finalize_long_press(out);
                if self.members.is_empty() {
                    out.push(ClusterSignal::Ended);
                }
            }
            _ => {}
        }
    }

    /// The last active member left. The multi-gesture window closes early;
    /// an open long-press window defers the end until it fires.
    fn end(&mut self, config: &GestureConfig, out: &mut Vec<ClusterSignal>) {
        if self.multi_window_open {
            self.finalize_multi(config.minority_group_policy, out);
        }
        if !self.long_press_window_open {
            out.push(ClusterSignal::Ended);
        }
    }

    // ---- Finalization ----

    fn finalize_long_press(&mut self, out: &mut Vec<ClusterSignal>) {
        self.long_press_window_open = false;
        let gesture = match self.long_press.len() {
            0 => {
                out.push(ClusterSignal::Fault(InternalError::EmptyFinalize));
                return;
            }
            1 => Gesture::SingleLongPress(self.long_press[0]),
            _ => Gesture::MultiLongPress(MultiContact::new(self.long_press.clone())),
        };
        self.long_press.clear();
        out.push(ClusterSignal::Gesture(gesture));
    }

    fn finalize_multi(&mut self, policy: MinorityGroupPolicy, out: &mut Vec<ClusterSignal>) {
        self.multi_window_open = false;
        if self.pending.is_empty() {
            out.push(ClusterSignal::Fault(InternalError::EmptyFinalize));
            return;
        }

        // Group by one-shot type in order of first appearance; None is dropped.
        let mut groups: Vec<(OneShot, Vec<ContactSnapshot>)> = Vec::new();
        for candidate in self.pending.drain(..) {
            if candidate.kind == OneShot::None {
                continue;
            }
            match groups.iter_mut().find(|(kind, _)| *kind == candidate.kind) {
                Some((_, contacts)) => contacts.push(candidate.contact),
                None => groups.push((candidate.kind, vec![candidate.contact])),
            }
        }

        let largest = groups.iter().map(|(_, c)| c.len()).max().unwrap_or(0);
        let minority_contacts: Vec<ContactSnapshot> = if policy == MinorityGroupPolicy::IgnoreButMerge {
            groups
                .iter()
                .filter(|(_, c)| c.len() < largest)
                .flat_map(|(_, c)| c.iter().copied())
                .collect()
        } else {
            Vec::new()
        };

        for (kind, mut contacts) in groups {
            let minority = contacts.len() < largest;
            match (policy, minority) {
                (MinorityGroupPolicy::IgnoreMinority | MinorityGroupPolicy::IgnoreButMerge, true) => {
                    tracing::debug!(kind = ?kind, count = contacts.len(), "minority group dropped");
                    continue;
                }
                (MinorityGroupPolicy::IgnoreButMerge, false) => {
                    contacts.extend_from_slice(&minority_contacts);
                }
                _ => {}
            }
            if let Some(gesture) = aggregate(kind, contacts) {
                out.push(ClusterSignal::Gesture(gesture));
            }
        }
    }
}

/// Build the tap/swipe gesture for a same-type group, demoting a group of
/// one to its single-contact variant.
fn aggregate(kind: OneShot, mut contacts: Vec<ContactSnapshot>) -> Option<Gesture> {
    let single = kind.single_kind()?;
    match contacts.len() {
        0 => None,
        1 => contacts.pop().map(|c| Gesture::single(single, c)),
        _ => {
            let multi = MultiContact::new(contacts);
            Some(match kind {
                OneShot::Swipe => Gesture::MultiSwipe(multi),
                _ => Gesture::MultiTap(multi),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use web_time::{Duration, Instant};

    struct Fixture {
        t0: Instant,
        config: GestureConfig,
        contacts: ContactTable,
        cluster: Cluster,
        out: Vec<ClusterSignal>,
    }

    impl Fixture {
        fn new(config: GestureConfig) -> Self {
            Self {
                t0: Instant::now(),
                config,
                contacts: ContactTable::default(),
                cluster: Cluster::new(),
                out: Vec::new(),
            }
        }

        fn at(&self, ms: u64) -> Instant {
            self.t0 + Duration::from_millis(ms)
        }

        fn add(&mut self, id: u32, ms: u64, x: f32, y: f32) {
            let c = Contact::new(ContactId(id), self.at(ms), Vec2::new(x, y), self.config.motion(), 96.0);
            self.contacts.insert(ContactId(id), c);
            assert!(self.cluster.insert(ContactId(id)));
        }

        fn mv(&mut self, id: u32, ms: u64, x: f32, y: f32) {
            let at = self.at(ms);
            if let Some(c) = self.contacts.get_mut(&ContactId(id)) {
                c.update(at, Vec2::new(x, y));
            }
            self.cluster
                .on_update(ContactId(id), &self.contacts, &self.config, &mut self.out);
        }

        fn remove(&mut self, id: u32, ms: u64) {
            let at = self.at(ms);
            let Some(mut c) = self.contacts.remove(&ContactId(id)) else {
                panic!("unknown contact {id}");
            };
            let pos = c.position();
            c.release(at, pos);
            self.cluster.on_remove(&c, &self.config, &mut self.out);
        }

        fn gestures(&mut self) -> Vec<Gesture> {
            self.out
                .drain(..)
                .filter_map(|s| match s {
                    ClusterSignal::Gesture(g) => Some(g),
                    _ => None,
                })
                .collect()
        }

        fn kinds(&mut self) -> Vec<GestureKind> {
            self.gestures().iter().map(Gesture::kind).collect()
        }
    }

    #[test]
    fn quick_release_is_a_single_tap() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 100.0, 100.0);
        f.remove(0, 80);
        assert!(f.out.contains(&ClusterSignal::Ended));
        assert_eq!(f.kinds(), vec![GestureKind::SingleTap]);
    }

    #[test]
    fn slow_release_emits_nothing() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 100.0, 100.0);
        // Moved beyond the wiggle allowance, then held still before release.
        f.mv(0, 100, 150.0, 100.0);
        f.mv(0, 500, 150.0, 100.0);
        f.out.clear();
        f.remove(0, 520);
        assert!(f.kinds().is_empty());
    }

    #[test]
    fn fast_release_is_a_swipe() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 0.0, 0.0);
        f.mv(0, 10, 40.0, 0.0);
        f.out.clear();
        f.remove(0, 20);
        assert_eq!(f.kinds(), vec![GestureKind::SingleSwipe]);
    }

    #[test]
    fn lone_dragger_emits_single_drag_and_pair_emits_raw() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 0.0, 0.0);
        f.add(1, 0, 50.0, 0.0);
        f.mv(0, 10, 10.0, 0.0);
        assert_eq!(f.kinds(), vec![GestureKind::SingleDrag]);

        f.mv(1, 10, 60.0, 0.0);
        let g = f.gestures();
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].kind(), GestureKind::RawMultiDrag);
        assert_eq!(g[0].contact_ids(), vec![ContactId(0), ContactId(1)]);

        // Stopping leaves the dragging set.
        f.mv(0, 20, 10.0, 0.0);
        assert_eq!(f.cluster.dragging(), &[ContactId(1)]);
    }

    #[test]
    fn two_taps_in_one_window_make_a_multi_tap() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 100.0, 100.0);
        f.add(1, 10, 140.0, 100.0);
        f.remove(0, 60);
        assert_eq!(
            f.out,
            vec![ClusterSignal::OpenWindow(WindowKind::MultiGesture)]
        );
        f.out.clear();
        f.remove(1, 70);
        let g = f.gestures();
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].kind(), GestureKind::MultiTap);
        assert_eq!(g[0].contact_count(), 2);
        assert!(!f.cluster.window_open(WindowKind::MultiGesture));
    }

    #[test]
    fn window_expiry_finalizes_with_members_still_down() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 100.0, 100.0);
        f.add(1, 0, 140.0, 100.0);
        f.add(2, 0, 180.0, 100.0);
        f.remove(0, 50);
        f.remove(1, 60);
        f.out.clear();
        f.cluster
            .on_window(WindowKind::MultiGesture, &f.config, &mut f.out);
        let g = f.gestures();
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].kind(), GestureKind::MultiTap);
        assert_eq!(f.cluster.members(), &[ContactId(2)]);
    }

    #[test]
    fn swipe_and_tap_split_into_singles() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 0.0, 0.0);
        f.add(1, 0, 60.0, 0.0);
        f.mv(0, 10, 40.0, 0.0);
        f.out.clear();
        f.remove(0, 20);
        f.remove(1, 40);
        assert_eq!(
            f.kinds(),
            vec![GestureKind::SingleSwipe, GestureKind::SingleTap]
        );
    }

    fn mixed_window(policy: MinorityGroupPolicy) -> Vec<Gesture> {
        let config = GestureConfig {
            minority_group_policy: policy,
            ..GestureConfig::default()
        };
        let mut f = Fixture::new(config);
        for id in 0..3 {
            f.add(id, 0, id as f32 * 30.0, 0.0);
        }
        // Contact 0 swipes, contacts 1 and 2 tap.
        f.mv(0, 10, 40.0, 0.0);
        f.out.clear();
        f.remove(0, 20);
        f.remove(1, 30);
        f.remove(2, 40);
        f.gestures()
    }

    #[test]
    fn raise_all_keeps_minority() {
        let g = mixed_window(MinorityGroupPolicy::RaiseAll);
        let kinds: Vec<_> = g.iter().map(Gesture::kind).collect();
        assert_eq!(kinds, vec![GestureKind::SingleSwipe, GestureKind::MultiTap]);
    }

    #[test]
    fn ignore_minority_drops_it() {
        let g = mixed_window(MinorityGroupPolicy::IgnoreMinority);
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].kind(), GestureKind::MultiTap);
        assert_eq!(g[0].contact_ids(), vec![ContactId(1), ContactId(2)]);
    }

    #[test]
    fn ignore_but_merge_folds_minority_contacts() {
        let g = mixed_window(MinorityGroupPolicy::IgnoreButMerge);
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].kind(), GestureKind::MultiTap);
        assert_eq!(
            g[0].contact_ids(),
            vec![ContactId(1), ContactId(2), ContactId(0)]
        );
    }

    #[test]
    fn held_contact_becomes_long_press() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 100.0, 100.0);
        f.mv(0, 300, 100.0, 100.0);
        assert!(f.kinds().is_empty());

        f.mv(0, 600, 101.0, 100.0);
        assert_eq!(
            f.out,
            vec![
                ClusterSignal::LongPressCandidate(ContactId(0)),
                ClusterSignal::OpenWindow(WindowKind::LongPress),
            ]
        );
        f.out.clear();
        assert!(f.cluster.is_empty());
        assert!(f.cluster.window_open(WindowKind::LongPress));

        f.cluster.on_window(WindowKind::LongPress, &f.config, &mut f.out);
        assert_eq!(f.out.last(), Some(&ClusterSignal::Ended));
        assert_eq!(f.kinds(), vec![GestureKind::SingleLongPress]);
        assert!(!f.cluster.window_open(WindowKind::LongPress));
    }

    #[test]
    fn tap_beside_a_long_press_waits_for_its_window() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 100.0, 100.0);
        f.add(1, 500, 140.0, 100.0);
        f.mv(0, 600, 100.0, 100.0);
        f.out.clear();

        // The last member taps out; the tap fires now, the cluster stays.
        f.remove(1, 620);
        assert!(!f.out.contains(&ClusterSignal::Ended));
        assert_eq!(f.kinds(), vec![GestureKind::SingleTap]);

        f.cluster.on_window(WindowKind::LongPress, &f.config, &mut f.out);
        assert!(f.out.contains(&ClusterSignal::Ended));
        let g = f.gestures();
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].kind(), GestureKind::SingleLongPress);
        assert_eq!(g[0].contact_ids(), vec![ContactId(0)]);
    }

    #[test]
    fn memberless_cluster_accepts_no_one() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 100.0, 100.0);
        f.mv(0, 600, 100.0, 100.0);
        assert!(f.cluster.window_open(WindowKind::LongPress));
        assert_eq!(f.cluster.accepts(Vec2::new(100.0, 100.0), &f.contacts, 265.0), None);
    }

    #[test]
    fn long_press_window_collects_candidates() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 100.0, 100.0);
        f.add(1, 0, 140.0, 100.0);
        f.add(2, 0, 180.0, 100.0);
        f.mv(0, 600, 100.0, 100.0);
        assert!(f.out.contains(&ClusterSignal::OpenWindow(WindowKind::LongPress)));
        f.out.clear();
        f.mv(1, 610, 140.0, 100.0);
        assert!(!f.out.contains(&ClusterSignal::OpenWindow(WindowKind::LongPress)));
        f.out.clear();

        f.cluster.on_window(WindowKind::LongPress, &f.config, &mut f.out);
        assert!(!f.out.contains(&ClusterSignal::Ended), "contact 2 is still active");
        let g = f.gestures();
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].kind(), GestureKind::MultiLongPress);
        assert_eq!(g[0].contact_ids(), vec![ContactId(0), ContactId(1)]);

        // The window can reopen for a later candidate.
        f.mv(2, 900, 180.0, 100.0);
        assert!(f.out.contains(&ClusterSignal::OpenWindow(WindowKind::LongPress)));
        assert!(f.kinds().is_empty());
        f.cluster.on_window(WindowKind::LongPress, &f.config, &mut f.out);
        assert!(f.out.contains(&ClusterSignal::Ended));
        assert_eq!(f.kinds(), vec![GestureKind::SingleLongPress]);
    }

    #[test]
    fn fast_lifts_in_one_window_make_a_multi_swipe() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 0.0, 0.0);
        f.add(1, 0, 60.0, 0.0);
        f.mv(0, 10, 0.0, 20.0);
        f.mv(1, 12, 60.0, 20.0);
        f.out.clear();

        f.remove(0, 20);
        assert_eq!(
            f.out,
            vec![ClusterSignal::OpenWindow(WindowKind::MultiGesture)]
        );
        f.out.clear();
        f.remove(1, 30);
        assert!(f.out.contains(&ClusterSignal::Ended));
        let g = f.gestures();
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].kind(), GestureKind::MultiSwipe);
        assert_eq!(g[0].contact_ids(), vec![ContactId(0), ContactId(1)]);
    }

    #[test]
    fn accepts_reports_nearest_member() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 0.0, 0.0);
        f.add(1, 0, 100.0, 0.0);
        let d = f.cluster.accepts(Vec2::new(90.0, 0.0), &f.contacts, 265.0);
        assert_eq!(d, Some(10.0));
        assert_eq!(f.cluster.accepts(Vec2::new(1000.0, 0.0), &f.contacts, 265.0), None);
    }

    #[test]
    fn duplicate_insert_is_refused() {
        let mut cluster = Cluster::new();
        assert!(cluster.insert(ContactId(4)));
        assert!(!cluster.insert(ContactId(4)));
        assert_eq!(cluster.members().len(), 1);
    }

    #[test]
    fn update_for_foreign_contact_is_a_fault() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 0.0, 0.0);
        let stranger = Contact::new(ContactId(9), f.t0, Vec2::ZERO, f.config.motion(), 96.0);
        f.contacts.insert(ContactId(9), stranger.clone());
        f.cluster
            .on_update(ContactId(9), &f.contacts, &f.config, &mut f.out);
        f.cluster.on_remove(&stranger, &f.config, &mut f.out);
        assert_eq!(
            f.out,
            vec![
                ClusterSignal::Fault(InternalError::NotAMember(ContactId(9))),
                ClusterSignal::Fault(InternalError::NotAMember(ContactId(9))),
            ]
        );
        assert_eq!(f.cluster.members(), &[ContactId(0)]);
    }

    #[test]
    fn stale_window_is_ignored() {
        let mut f = Fixture::new(GestureConfig::default());
        f.add(0, 0, 0.0, 0.0);
        f.cluster
            .on_window(WindowKind::MultiGesture, &f.config, &mut f.out);
        assert!(f.out.is_empty());
    }
}
