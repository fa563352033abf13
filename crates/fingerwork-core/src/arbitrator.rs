#![forbid(unsafe_code)]

//! Contact ownership and per-consumer gesture delivery.
//!
//! Consumers (typically UI elements) claim contacts when they begin. The
//! [`Arbitrator`] keeps a two-sided claim ledger and, for every gesture,
//! splits delivery across the consumers that own some of its contacts:
//!
//! - a **full receiver** owns every contact and gets the gesture verbatim;
//! - a **partial receiver** owns a strict subset and gets the gesture
//!   re-synthesized over just its contacts (see [`Gesture::restrict_to`]);
//! - contacts nobody owns are dropped silently.
//!
//! Claimers stay attached to an ended contact for a grace period so that
//! gestures finalized after the lift still reach them.
//!
//! # Invariants
//!
//! 1. A contact is in a consumer's claim set iff the consumer is in the
//!    contact's claimer list.
//! 2. A partial receiver owns at least one and fewer than all of the
//!    gesture's contacts.
//! 3. Raw drag variants are never delivered to consumers.
//!
//! # Failure Modes
//!
//! - A gesture or contact-end for a contact with no ledger entry is reported
//!   as [`InternalError::UnledgeredContact`]; delivery continues for the
//!   gesture's other contacts.

use ahash::{AHashMap, AHashSet};
use web_time::{Duration, Instant};

use crate::contact::{ContactId, ContactSnapshot};
use crate::error::{InternalError, report_internal};
use crate::gesture::{Gesture, MultiContact, TwoContactDrag};
use crate::scheduler::DeferredQueue;

/// Handle to a registered consumer. Ordered by registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u32);

impl ConsumerId {
    #[inline]
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

/// A consumer's answer to a contact-begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Claim {
    #[default]
    Pass,
    Claim,
    /// Claim and stop consumers registered later from claiming.
    ClaimExclusive,
}

/// Receives contact lifecycle and gesture notifications.
///
/// Only [`on_contact_begin`](Self::on_contact_begin) is required; the
/// per-kind methods default to doing nothing and are routed by
/// [`on_gesture`](Self::on_gesture).
pub trait GestureConsumer {
    /// A contact began. Return a claim to receive its gestures.
    fn on_contact_begin(&mut self, contact: &ContactSnapshot) -> Claim;

    /// A claimed contact ended.
    fn on_contact_end(&mut self, _contact: &ContactSnapshot) {}

    fn on_single_tap(&mut self, _contact: &ContactSnapshot) {}
    fn on_single_swipe(&mut self, _contact: &ContactSnapshot) {}
    fn on_single_long_press(&mut self, _contact: &ContactSnapshot) {}
    fn on_single_drag(&mut self, _contact: &ContactSnapshot) {}
    fn on_multi_tap(&mut self, _gesture: &MultiContact) {}
    fn on_multi_swipe(&mut self, _gesture: &MultiContact) {}
    fn on_multi_long_press(&mut self, _gesture: &MultiContact) {}
    fn on_multi_drag(&mut self, _gesture: &MultiContact) {}
    fn on_pinch(&mut self, _gesture: &TwoContactDrag) {}
    fn on_twist(&mut self, _gesture: &TwoContactDrag) {}

    /// Route a gesture to its per-kind method.
    fn on_gesture(&mut self, gesture: &Gesture) {
        match gesture {
            Gesture::SingleTap(c) => self.on_single_tap(c),
            Gesture::SingleSwipe(c) => self.on_single_swipe(c),
            Gesture::SingleLongPress(c) => self.on_single_long_press(c),
            Gesture::SingleDrag(c) => self.on_single_drag(c),
            Gesture::MultiTap(m) => self.on_multi_tap(m),
            Gesture::MultiSwipe(m) => self.on_multi_swipe(m),
            Gesture::MultiLongPress(m) => self.on_multi_long_press(m),
            Gesture::MultiDrag(m) => self.on_multi_drag(m),
            Gesture::Pinch(p) => self.on_pinch(p),
            Gesture::Twist(p) => self.on_twist(p),
            Gesture::RawMultiDrag(_) | Gesture::RawTwoContactDrag(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Receiver split
// ---------------------------------------------------------------------------

/// One consumer's share of a gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub consumer: ConsumerId,
    /// Owned contacts, in gesture order.
    pub owned: Vec<ContactId>,
}

/// Partition a gesture's contacts by owner.
///
/// Receivers come back in registration order. A receiver whose `owned` has
/// the same length as `contacts` is a full receiver; any other is partial.
pub fn split_receivers<'a, F>(contacts: &[ContactId], claimers_of: F) -> Vec<Receiver>
where
    F: Fn(ContactId) -> &'a [ConsumerId],
{
    let mut receivers: Vec<Receiver> = Vec::new();
    for &contact in contacts {
        for &consumer in claimers_of(contact) {
            match receivers.iter_mut().find(|r| r.consumer == consumer) {
                Some(r) => r.owned.push(contact),
                None => receivers.push(Receiver {
                    consumer,
                    owned: vec![contact],
                }),
            }
        }
    }
    receivers.sort_by_key(|r| r.consumer);
    receivers
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ContactClaims {
    claimers: Vec<ConsumerId>,
    /// Set once the contact ended; the grace timer must carry the same token.
    release_token: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct GraceTimer {
    contact: ContactId,
    token: u64,
}

/// Claim ledger plus the registered consumers.
pub struct Arbitrator {
    consumers: Vec<(ConsumerId, Box<dyn GestureConsumer>)>,
    next_consumer: u32,
    by_contact: AHashMap<ContactId, ContactClaims>,
    by_consumer: AHashMap<ConsumerId, AHashSet<ContactId>>,
    pool: Vec<Vec<ConsumerId>>,
    grace: DeferredQueue<GraceTimer>,
    release_grace: Duration,
    next_token: u64,
    internal_errors: u64,
}

impl std::fmt::Debug for Arbitrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arbitrator")
            .field("consumers", &self.consumers.len())
            .field("ledgered_contacts", &self.by_contact.len())
            .field("pending_releases", &self.grace.len())
            .finish()
    }
}

impl Arbitrator {
    #[must_use]
    pub fn new(release_grace: Duration) -> Self {
        Self {
            consumers: Vec::new(),
            next_consumer: 0,
            by_contact: AHashMap::new(),
            by_consumer: AHashMap::new(),
            pool: Vec::new(),
            grace: DeferredQueue::new(),
            release_grace,
            next_token: 0,
            internal_errors: 0,
        }
    }

    // ---- Consumers ----

    /// Register a consumer. Later registrations are polled later.
    pub fn register(&mut self, consumer: Box<dyn GestureConsumer>) -> ConsumerId {
        let id = ConsumerId(self.next_consumer);
        self.next_consumer += 1;
        self.consumers.push((id, consumer));
        self.by_consumer.insert(id, AHashSet::new());
        tracing::debug!(consumer = id.0, "consumer registered");
        id
    }

    /// Remove a consumer and every claim it holds.
    pub fn unregister(&mut self, id: ConsumerId) -> Option<Box<dyn GestureConsumer>> {
        let index = self.consumers.iter().position(|(c, _)| *c == id)?;
        let (_, consumer) = self.consumers.remove(index);
        if let Some(contacts) = self.by_consumer.remove(&id) {
            for contact in contacts {
                if let Some(entry) = self.by_contact.get_mut(&contact) {
                    entry.claimers.retain(|c| *c != id);
                }
            }
        }
        tracing::debug!(consumer = id.0, "consumer unregistered");
        Some(consumer)
    }

    #[inline]
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    // ---- Ledger queries ----

    /// Consumers holding a claim on `contact`, in claim order.
    #[must_use]
    pub fn claimers_of(&self, contact: ContactId) -> &[ConsumerId] {
        self.by_contact
            .get(&contact)
            .map_or(&[][..], |e| e.claimers.as_slice())
    }

    /// Contacts `consumer` holds claims on, sorted.
    #[must_use]
    pub fn claims_of(&self, consumer: ConsumerId) -> Vec<ContactId> {
        let mut claims: Vec<ContactId> = self
            .by_consumer
            .get(&consumer)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        claims.sort_unstable();
        claims
    }

    #[must_use]
    pub fn is_ledgered(&self, contact: ContactId) -> bool {
        self.by_contact.contains_key(&contact)
    }

    /// Ended contacts still inside their grace period.
    #[must_use]
    pub fn pending_releases(&self) -> usize {
        self.by_contact
            .values()
            .filter(|e| e.release_token.is_some())
            .count()
    }

    #[inline]
    #[must_use]
    pub fn internal_errors(&self) -> u64 {
        self.internal_errors
    }

    /// Both sides of the ledger agree.
    #[must_use]
    pub fn ledger_is_consistent(&self) -> bool {
        let forward = self.by_contact.iter().all(|(contact, entry)| {
            entry.claimers.iter().all(|consumer| {
                self.by_consumer
                    .get(consumer)
                    .is_some_and(|set| set.contains(contact))
            })
        });
        let backward = self.by_consumer.iter().all(|(consumer, set)| {
            set.iter().all(|contact| {
                self.by_contact
                    .get(contact)
                    .is_some_and(|e| e.claimers.contains(consumer))
            })
        });
        forward && backward
    }

    // ---- Lifecycle ----

    /// Release contacts whose grace period has elapsed.
    pub fn advance(&mut self, now: Instant) {
        while let Some((_, timer)) = self.grace.pop_due(now) {
            let current = self
                .by_contact
                .get(&timer.contact)
                .and_then(|e| e.release_token);
            if current == Some(timer.token) {
                self.purge(timer.contact);
                tracing::debug!(contact = %timer.contact, "claims released");
            }
        }
    }

    /// Poll consumers for claims on a new contact.
    pub fn contact_begin(&mut self, contact: &ContactSnapshot) {
        let id = contact.id;
        if self.by_contact.contains_key(&id) {
            tracing::debug!(contact = %id, "contact id reused during grace; stale claims purged");
            self.purge(id);
        }

        let mut claimers = self.pool.pop().unwrap_or_default();
        for (consumer_id, consumer) in &mut self.consumers {
            let claim = consumer.on_contact_begin(contact);
            if claim == Claim::Pass {
                continue;
            }
            claimers.push(*consumer_id);
            if let Some(set) = self.by_consumer.get_mut(consumer_id) {
                set.insert(id);
            }
            tracing::debug!(contact = %id, consumer = consumer_id.0, ?claim, "contact claimed");
            if claim == Claim::ClaimExclusive {
                break;
            }
        }
        self.by_contact.insert(
            id,
            ContactClaims {
                claimers,
                release_token: None,
            },
        );
    }

    /// Notify claimers that a contact ended and start its grace period.
    pub fn contact_end(&mut self, contact: &ContactSnapshot, now: Instant) {
        let id = contact.id;
        let token = self.next_token;
        let Some(entry) = self.by_contact.get_mut(&id) else {
            self.fault(InternalError::UnledgeredContact(id));
            return;
        };
        self.next_token += 1;
        entry.release_token = Some(token);

        for (consumer_id, consumer) in &mut self.consumers {
            if entry.claimers.contains(consumer_id) {
                consumer.on_contact_end(contact);
            }
        }
        self.grace.schedule(
            now,
            self.release_grace,
            GraceTimer { contact: id, token },
        );
    }

    /// Deliver a gesture to its full and partial receivers.
    pub fn dispatch(&mut self, gesture: &Gesture) {
        if gesture.kind().is_raw() {
            return;
        }
        let ids = gesture.contact_ids();
        let mut missing = Vec::new();
        for id in &ids {
            if !self.by_contact.contains_key(id) {
                missing.push(*id);
            }
        }
        for id in missing {
            self.fault(InternalError::UnledgeredContact(id));
        }

        let ledger: &Self = self;
        let receivers = split_receivers(&ids, move |c| ledger.claimers_of(c));
        for receiver in receivers {
            let Some((_, consumer)) = self
                .consumers
                .iter_mut()
                .find(|(c, _)| *c == receiver.consumer)
            else {
                continue;
            };
            if receiver.owned.len() == ids.len() {
                consumer.on_gesture(gesture);
            } else if let Some(share) = gesture.restrict_to(&receiver.owned) {
                tracing::trace!(
                    consumer = receiver.consumer.0,
                    from = %gesture.kind(),
                    to = %share.kind(),
                    owned = receiver.owned.len(),
                    "partial delivery"
                );
                consumer.on_gesture(&share);
            }
        }
    }

    fn purge(&mut self, contact: ContactId) {
        let Some(mut entry) = self.by_contact.remove(&contact) else {
            return;
        };
        for consumer in &entry.claimers {
            if let Some(set) = self.by_consumer.get_mut(consumer) {
                set.remove(&contact);
            }
        }
        entry.claimers.clear();
        self.pool.push(entry.claimers);
    }

    fn fault(&mut self, err: InternalError) {
        self.internal_errors += 1;
        report_internal(&err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionThresholds;
    use crate::contact::Contact;
    use crate::geometry::Vec2;
    use crate::gesture::{DragRelationship, GestureKind};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(GestureKind, Vec<ContactId>)>>>;

    struct Owner {
        owns: Vec<ContactId>,
        exclusive: bool,
        log: Log,
        ended: Rc<RefCell<Vec<ContactId>>>,
    }

    impl GestureConsumer for Owner {
        fn on_contact_begin(&mut self, contact: &ContactSnapshot) -> Claim {
            match (self.owns.contains(&contact.id), self.exclusive) {
                (false, _) => Claim::Pass,
                (true, false) => Claim::Claim,
                (true, true) => Claim::ClaimExclusive,
            }
        }

        fn on_contact_end(&mut self, contact: &ContactSnapshot) {
            self.ended.borrow_mut().push(contact.id);
        }

        fn on_gesture(&mut self, gesture: &Gesture) {
            self.log
                .borrow_mut()
                .push((gesture.kind(), gesture.contact_ids()));
        }
    }

    fn owner(arb: &mut Arbitrator, owns: &[u32], exclusive: bool) -> (ConsumerId, Log) {
        let log = Log::default();
        let id = arb.register(Box::new(Owner {
            owns: owns.iter().map(|&i| ContactId(i)).collect(),
            exclusive,
            log: Rc::clone(&log),
            ended: Rc::default(),
        }));
        (id, log)
    }

    fn snap(id: u32, x: f32) -> ContactSnapshot {
        Contact::new(ContactId(id), Instant::now(), Vec2::new(x, 0.0), MotionThresholds::default(), 96.0)
            .snapshot()
    }

    fn ids(raw: &[u32]) -> Vec<ContactId> {
        raw.iter().map(|&i| ContactId(i)).collect()
    }

    #[test]
    fn split_is_ordered_by_registration() {
        let a = [ConsumerId(1)];
        let b = [ConsumerId(0), ConsumerId(1)];
        let contacts = ids(&[5, 6]);
        let receivers = split_receivers(&contacts, |c| if c == ContactId(5) { &a } else { &b });
        assert_eq!(
            receivers,
            vec![
                Receiver {
                    consumer: ConsumerId(0),
                    owned: ids(&[6])
                },
                Receiver {
                    consumer: ConsumerId(1),
                    owned: ids(&[5, 6])
                },
            ]
        );
    }

    #[test]
    fn four_finger_drag_splits_between_two_owners() {
        let mut arb = Arbitrator::new(Duration::from_millis(450));
        let (_, x) = owner(&mut arb, &[0, 1], false);
        let (_, y) = owner(&mut arb, &[2, 3], false);
        let (_, bystander) = owner(&mut arb, &[], false);

        let snaps: Vec<_> = (0..4).map(|i| snap(i, i as f32 * 10.0)).collect();
        for s in &snaps {
            arb.contact_begin(s);
        }
        arb.dispatch(&Gesture::MultiDrag(MultiContact::new(snaps)));

        assert_eq!(*x.borrow(), vec![(GestureKind::MultiDrag, ids(&[0, 1]))]);
        assert_eq!(*y.borrow(), vec![(GestureKind::MultiDrag, ids(&[2, 3]))]);
        assert!(bystander.borrow().is_empty());
        assert!(arb.ledger_is_consistent());
    }

    #[test]
    fn full_receiver_gets_verbatim_and_partial_gets_single() {
        let mut arb = Arbitrator::new(Duration::from_millis(450));
        let (_, full) = owner(&mut arb, &[0, 1], false);
        let (_, partial) = owner(&mut arb, &[1], false);
        let (a, b) = (snap(0, 0.0), snap(1, 30.0));
        arb.contact_begin(&a);
        arb.contact_begin(&b);

        arb.dispatch(&Gesture::Pinch(TwoContactDrag::new(a, b, DragRelationship::Pinch)));
        assert_eq!(*full.borrow(), vec![(GestureKind::Pinch, ids(&[0, 1]))]);
        assert_eq!(*partial.borrow(), vec![(GestureKind::SingleDrag, ids(&[1]))]);
    }

    #[test]
    fn exclusive_claim_stops_later_consumers() {
        let mut arb = Arbitrator::new(Duration::from_millis(450));
        let (first, _) = owner(&mut arb, &[0], true);
        let (second, _) = owner(&mut arb, &[0], false);
        arb.contact_begin(&snap(0, 0.0));
        assert_eq!(arb.claimers_of(ContactId(0)), &[first]);
        assert!(arb.claims_of(second).is_empty());
    }

    #[test]
    fn raw_variants_are_not_delivered() {
        let mut arb = Arbitrator::new(Duration::from_millis(450));
        let (_, log) = owner(&mut arb, &[0, 1], false);
        let (a, b) = (snap(0, 0.0), snap(1, 30.0));
        arb.contact_begin(&a);
        arb.contact_begin(&b);
        arb.dispatch(&Gesture::RawMultiDrag(MultiContact::new(vec![a, b])));
        arb.dispatch(&Gesture::RawTwoContactDrag(TwoContactDrag::new(a, b, DragRelationship::None)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn claims_survive_the_grace_period_then_release() {
        let t = Instant::now();
        let mut arb = Arbitrator::new(Duration::from_millis(450));
        let ended = Rc::new(RefCell::new(Vec::new()));
        let log = Log::default();
        let id = arb.register(Box::new(Owner {
            owns: ids(&[0]),
            exclusive: false,
            log: Rc::clone(&log),
            ended: Rc::clone(&ended),
        }));
        let s = snap(0, 0.0);
        arb.contact_begin(&s);
        arb.contact_end(&s, t);
        assert_eq!(*ended.borrow(), ids(&[0]));
        assert_eq!(arb.pending_releases(), 1);

        arb.advance(t + Duration::from_millis(200));
        arb.dispatch(&Gesture::SingleTap(s));
        assert_eq!(log.borrow().len(), 1);

        arb.advance(t + Duration::from_millis(450));
        assert!(!arb.is_ledgered(ContactId(0)));
        assert!(arb.claims_of(id).is_empty());
        assert!(arb.ledger_is_consistent());
    }

    #[test]
    fn reused_id_during_grace_starts_a_fresh_entry() {
        let t = Instant::now();
        let mut arb = Arbitrator::new(Duration::from_millis(450));
        let (old_owner, _) = owner(&mut arb, &[0], true);
        let s = snap(0, 0.0);
        arb.contact_begin(&s);
        arb.contact_end(&s, t);

        // The old owner unregisters; the id comes back with no claimers.
        arb.unregister(old_owner);
        arb.contact_begin(&s);
        assert!(arb.claimers_of(ContactId(0)).is_empty());

        // The stale grace timer must not purge the new entry.
        arb.advance(t + Duration::from_millis(500));
        assert!(arb.is_ledgered(ContactId(0)));
        assert_eq!(arb.pending_releases(), 0);
    }

    #[test]
    fn unregister_clears_both_ledger_sides() {
        let mut arb = Arbitrator::new(Duration::from_millis(450));
        let (a, _) = owner(&mut arb, &[0, 1], false);
        let (b, _) = owner(&mut arb, &[1], false);
        arb.contact_begin(&snap(0, 0.0));
        arb.contact_begin(&snap(1, 10.0));
        assert!(arb.unregister(a).is_some());
        assert_eq!(arb.claimers_of(ContactId(0)), &[] as &[ConsumerId]);
        assert_eq!(arb.claimers_of(ContactId(1)), &[b]);
        assert!(arb.ledger_is_consistent());
        assert!(arb.unregister(a).is_none());
        assert_eq!(arb.consumer_count(), 1);
    }

    #[test]
    fn unledgered_contact_is_counted() {
        let mut arb = Arbitrator::new(Duration::from_millis(450));
        arb.dispatch(&Gesture::SingleTap(snap(7, 0.0)));
        arb.contact_end(&snap(8, 0.0), Instant::now());
        assert_eq!(arb.internal_errors(), 2);
    }
}
