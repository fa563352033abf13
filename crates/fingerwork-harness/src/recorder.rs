#![forbid(unsafe_code)]

//! Recording consumers.
//!
//! A [`Recorder`] is a [`GestureConsumer`] that claims contacts according
//! to a [`ClaimRule`] and appends everything it hears to a shared
//! [`RecordLog`]. The engine owns the boxed consumer; the test keeps the log
//! handle.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use fingerwork_core::{Claim, ContactId, ContactSnapshot, Gesture, GestureConsumer, GestureKind};

/// Which contacts a [`Recorder`] claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimRule {
    All,
    None,
    Only(BTreeSet<u32>),
}

impl ClaimRule {
    #[must_use]
    pub fn only(ids: &[u32]) -> Self {
        Self::Only(ids.iter().copied().collect())
    }

    fn wants(&self, id: ContactId) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Only(ids) => ids.contains(&id.0),
        }
    }
}

/// One notification a recorder received.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Begin(ContactId),
    End(ContactId),
    Gesture(Gesture),
}

/// Shared, append-only notification log.
#[derive(Debug, Clone, Default)]
pub struct RecordLog(Rc<RefCell<Vec<Record>>>);

impl RecordLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, record: Record) {
        self.0.borrow_mut().push(record);
    }

    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.0.borrow().clone()
    }

    /// Received gestures, in order.
    #[must_use]
    pub fn gestures(&self) -> Vec<Gesture> {
        self.0
            .borrow()
            .iter()
            .filter_map(|r| match r {
                Record::Gesture(g) => Some(g.clone()),
                _ => None,
            })
            .collect()
    }

    /// `(kind, contact ids)` of every received gesture.
    #[must_use]
    pub fn summary(&self) -> Vec<(GestureKind, Vec<u32>)> {
        self.gestures()
            .iter()
            .map(|g| (g.kind(), g.contact_ids().into_iter().map(|c| c.0).collect()))
            .collect()
    }

    #[must_use]
    pub fn ended(&self) -> Vec<ContactId> {
        self.0
            .borrow()
            .iter()
            .filter_map(|r| match r {
                Record::End(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// A consumer that records every notification it receives.
#[derive(Debug)]
pub struct Recorder {
    rule: ClaimRule,
    exclusive: bool,
    log: RecordLog,
}

impl Recorder {
    /// A recorder and the handle to its log.
    #[must_use]
    pub fn new(rule: ClaimRule) -> (Self, RecordLog) {
        let log = RecordLog::new();
        (
            Self {
                rule,
                exclusive: false,
                log: log.clone(),
            },
            log,
        )
    }

    /// Claims exclusively, shutting out consumers registered later.
    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }
}

impl GestureConsumer for Recorder {
    fn on_contact_begin(&mut self, contact: &ContactSnapshot) -> Claim {
        self.log.push(Record::Begin(contact.id));
        match (self.rule.wants(contact.id), self.exclusive) {
            (false, _) => Claim::Pass,
            (true, false) => Claim::Claim,
            (true, true) => Claim::ClaimExclusive,
        }
    }

    fn on_contact_end(&mut self, contact: &ContactSnapshot) {
        self.log.push(Record::End(contact.id));
    }

    fn on_gesture(&mut self, gesture: &Gesture) {
        self.log.push(Record::Gesture(gesture.clone()));
    }
}
