#![forbid(unsafe_code)]

//! Gesture events produced by the engine.
//!
//! [`Gesture`] is a closed set of variants. Single-contact variants carry one
//! [`ContactSnapshot`]; multi-contact variants carry an ordered set of
//! snapshots. Geometry (center, center delta, separation, twist, shared
//! direction) is never stored: it is recomputed from the snapshots on demand,
//! so a gesture restricted to a subset of its contacts stays consistent.
//!
//! # Invariants
//!
//! 1. A multi variant produced by the engine holds at least two contacts.
//! 2. `Pinch`, `Twist` and `RawTwoContactDrag` hold exactly two contacts.
//! 3. [`Gesture::restrict_to`] never returns a gesture with zero contacts.

use std::fmt;
use std::slice;

use crate::contact::{ContactId, ContactSnapshot};
use crate::geometry::{self, Vec2};

/// Discriminant of a [`Gesture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GestureKind {
    SingleTap,
    SingleSwipe,
    SingleLongPress,
    SingleDrag,
    MultiTap,
    MultiSwipe,
    MultiLongPress,
    MultiDrag,
    Pinch,
    Twist,
    RawMultiDrag,
    RawTwoContactDrag,
}

impl GestureKind {
    /// The single-contact kind a one-contact slice of this gesture becomes.
    #[must_use]
    pub const fn single_counterpart(self) -> Self {
        match self {
            Self::SingleTap | Self::MultiTap => Self::SingleTap,
            Self::SingleSwipe | Self::MultiSwipe => Self::SingleSwipe,
            Self::SingleLongPress | Self::MultiLongPress => Self::SingleLongPress,
            Self::SingleDrag
            | Self::MultiDrag
            | Self::Pinch
            | Self::Twist
            | Self::RawMultiDrag
            | Self::RawTwoContactDrag => Self::SingleDrag,
        }
    }

    #[must_use]
    pub const fn is_single(self) -> bool {
        matches!(
            self,
            Self::SingleTap | Self::SingleSwipe | Self::SingleLongPress | Self::SingleDrag
        )
    }

    /// Uninterpreted drag data, not forwarded to consumers.
    #[must_use]
    pub const fn is_raw(self) -> bool {
        matches!(self, Self::RawMultiDrag | Self::RawTwoContactDrag)
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SingleTap => "single_tap",
            Self::SingleSwipe => "single_swipe",
            Self::SingleLongPress => "single_long_press",
            Self::SingleDrag => "single_drag",
            Self::MultiTap => "multi_tap",
            Self::MultiSwipe => "multi_swipe",
            Self::MultiLongPress => "multi_long_press",
            Self::MultiDrag => "multi_drag",
            Self::Pinch => "pinch",
            Self::Twist => "twist",
            Self::RawMultiDrag => "raw_multi_drag",
            Self::RawTwoContactDrag => "raw_two_contact_drag",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// An ordered set of contacts taking part in one multi-contact gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiContact {
    contacts: Vec<ContactSnapshot>,
}

impl MultiContact {
    #[must_use]
    pub fn new(contacts: Vec<ContactSnapshot>) -> Self {
        Self { contacts }
    }

    #[inline]
    #[must_use]
    pub fn contacts(&self) -> &[ContactSnapshot] {
        &self.contacts
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Centroid of current positions.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        geometry::centroid(self.contacts.iter().map(|c| c.position)).unwrap_or(Vec2::ZERO)
    }

    /// Centroid motion since the previous samples.
    #[must_use]
    pub fn center_delta(&self) -> Vec2 {
        let previous = geometry::centroid(self.contacts.iter().map(|c| c.previous_position()))
            .unwrap_or(Vec2::ZERO);
        self.center() - previous
    }

    /// Mean motion direction in radians (NaN if none of the contacts moved).
    #[must_use]
    pub fn direction(&self) -> f32 {
        geometry::mean_direction(self.contacts.iter().map(|c| c.direction))
    }

    #[must_use]
    pub fn average_speed(&self) -> f32 {
        if self.contacts.is_empty() {
            return 0.0;
        }
        self.contacts.iter().map(|c| c.speed).sum::<f32>() / self.contacts.len() as f32
    }

    #[must_use]
    pub fn max_speed(&self) -> f32 {
        self.contacts.iter().map(|c| c.speed).fold(0.0, f32::max)
    }

    #[must_use]
    pub fn min_speed(&self) -> f32 {
        self.contacts
            .iter()
            .map(|c| c.speed)
            .reduce(f32::min)
            .unwrap_or(0.0)
    }
}

/// How two simultaneously dragging contacts relate on one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragRelationship {
    None,
    /// Moving the same way.
    Identical,
    /// Moving toward or away from each other.
    Pinch,
    /// Moving in opposite directions around their midpoint.
    Twist,
}

/// Two contacts analysed as a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoContactDrag {
    contacts: [ContactSnapshot; 2],
    relationship: DragRelationship,
}

impl TwoContactDrag {
    #[must_use]
    pub fn new(first: ContactSnapshot, second: ContactSnapshot, relationship: DragRelationship) -> Self {
        Self {
            contacts: [first, second],
            relationship,
        }
    }

    #[inline]
    #[must_use]
    pub fn first(&self) -> &ContactSnapshot {
        &self.contacts[0]
    }

    #[inline]
    #[must_use]
    pub fn second(&self) -> &ContactSnapshot {
        &self.contacts[1]
    }

    #[inline]
    #[must_use]
    pub fn contacts(&self) -> &[ContactSnapshot] {
        &self.contacts
    }

    #[inline]
    #[must_use]
    pub fn relationship(&self) -> DragRelationship {
        self.relationship
    }

    #[must_use]
    pub fn centroid(&self) -> Vec2 {
        (self.contacts[0].position + self.contacts[1].position) / 2.0
    }

    #[must_use]
    pub fn previous_centroid(&self) -> Vec2 {
        (self.contacts[0].previous_position() + self.contacts[1].previous_position()) / 2.0
    }

    #[must_use]
    pub fn centroid_delta(&self) -> Vec2 {
        self.centroid() - self.previous_centroid()
    }

    /// Change in distance between the two contacts over the last sample.
    /// Positive when separating.
    #[must_use]
    pub fn separation_delta(&self) -> f32 {
        let [a, b] = &self.contacts;
        a.position.distance(b.position) - a.previous_position().distance(b.previous_position())
    }

    /// Rotation of the pair about its centroid over the last sample, in
    /// radians within `(-π, π]`. Both contacts turn by the same angle about
    /// the centroid, so the first one is measured.
    #[must_use]
    pub fn twist(&self) -> f32 {
        let a = &self.contacts[0];
        let now = (a.position - self.centroid()).angle();
        let before = (a.previous_position() - self.previous_centroid()).angle();
        if now.is_nan() || before.is_nan() {
            return 0.0;
        }
        geometry::wrap_angle(now - before)
    }

    #[must_use]
    pub fn twist_degrees(&self) -> f32 {
        self.twist().to_degrees()
    }
}

// ---------------------------------------------------------------------------
// Gesture
// ---------------------------------------------------------------------------

/// A recognized gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    SingleTap(ContactSnapshot),
    SingleSwipe(ContactSnapshot),
    SingleLongPress(ContactSnapshot),
    SingleDrag(ContactSnapshot),
    MultiTap(MultiContact),
    MultiSwipe(MultiContact),
    MultiLongPress(MultiContact),
    MultiDrag(MultiContact),
    Pinch(TwoContactDrag),
    Twist(TwoContactDrag),
    /// Every dragging contact of a cluster, before relationship analysis.
    RawMultiDrag(MultiContact),
    /// A pair analysed by the relationship pass, before it became a pinch or twist.
    RawTwoContactDrag(TwoContactDrag),
}

impl Gesture {
    #[must_use]
    pub fn kind(&self) -> GestureKind {
        match self {
            Self::SingleTap(_) => GestureKind::SingleTap,
            Self::SingleSwipe(_) => GestureKind::SingleSwipe,
            Self::SingleLongPress(_) => GestureKind::SingleLongPress,
            Self::SingleDrag(_) => GestureKind::SingleDrag,
            Self::MultiTap(_) => GestureKind::MultiTap,
            Self::MultiSwipe(_) => GestureKind::MultiSwipe,
            Self::MultiLongPress(_) => GestureKind::MultiLongPress,
            Self::MultiDrag(_) => GestureKind::MultiDrag,
            Self::Pinch(_) => GestureKind::Pinch,
            Self::Twist(_) => GestureKind::Twist,
            Self::RawMultiDrag(_) => GestureKind::RawMultiDrag,
            Self::RawTwoContactDrag(_) => GestureKind::RawTwoContactDrag,
        }
    }

    /// The contributing contacts, in gesture order.
    #[must_use]
    pub fn contacts(&self) -> &[ContactSnapshot] {
        match self {
            Self::SingleTap(c) | Self::SingleSwipe(c) | Self::SingleLongPress(c) | Self::SingleDrag(c) => {
                slice::from_ref(c)
            }
            Self::MultiTap(m)
            | Self::MultiSwipe(m)
            | Self::MultiLongPress(m)
            | Self::MultiDrag(m)
            | Self::RawMultiDrag(m) => m.contacts(),
            Self::Pinch(p) | Self::Twist(p) | Self::RawTwoContactDrag(p) => p.contacts(),
        }
    }

    #[must_use]
    pub fn contact_ids(&self) -> Vec<ContactId> {
        self.contacts().iter().map(|c| c.id).collect()
    }

    #[must_use]
    pub fn contact_count(&self) -> usize {
        self.contacts().len()
    }

    #[must_use]
    pub fn is_multi(&self) -> bool {
        !self.kind().is_single()
    }

    /// Centroid of the contributing contacts.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        geometry::centroid(self.contacts().iter().map(|c| c.position)).unwrap_or(Vec2::ZERO)
    }

    /// Build the single-contact gesture of `kind` for one contact.
    #[must_use]
    pub fn single(kind: GestureKind, contact: ContactSnapshot) -> Self {
        match kind.single_counterpart() {
            GestureKind::SingleTap => Self::SingleTap(contact),
            GestureKind::SingleSwipe => Self::SingleSwipe(contact),
            GestureKind::SingleLongPress => Self::SingleLongPress(contact),
            _ => Self::SingleDrag(contact),
        }
    }

    /// Re-synthesize this gesture scoped to the contacts in `owned`.
    ///
    /// - no overlap: `None`;
    /// - every contact owned: an identical copy;
    /// - one contact owned: the single-contact counterpart
    ///   (a pinch or twist slice becomes a single drag);
    /// - several owned: the same multi kind over just those contacts.
    #[must_use]
    pub fn restrict_to(&self, owned: &[ContactId]) -> Option<Self> {
        let kept: Vec<ContactSnapshot> = self
            .contacts()
            .iter()
            .filter(|c| owned.contains(&c.id))
            .copied()
            .collect();

        match kept.len() {
            0 => None,
            n if n == self.contact_count() => Some(self.clone()),
            1 => Some(Self::single(self.kind(), kept[0])),
            _ => {
                let subset = MultiContact::new(kept);
                Some(match self {
                    Self::MultiTap(_) => Self::MultiTap(subset),
                    Self::MultiSwipe(_) => Self::MultiSwipe(subset),
                    Self::MultiLongPress(_) => Self::MultiLongPress(subset),
                    Self::RawMultiDrag(_) => Self::RawMultiDrag(subset),
                    // Two-contact and single variants cannot have a strict
                    // subset with more than one contact.
                    _ => Self::MultiDrag(subset),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotionThresholds;
    use crate::contact::Contact;
    use std::f32::consts::PI;
    use web_time::{Duration, Instant};

    fn moved(id: u32, from: Vec2, to: Vec2) -> ContactSnapshot {
        let t = Instant::now();
        let mut c = Contact::new(ContactId(id), t, from, MotionThresholds::default(), 96.0);
        c.update(t + Duration::from_millis(10), to);
        c.snapshot()
    }

    #[test]
    fn multi_contact_geometry() {
        let m = MultiContact::new(vec![
            moved(0, Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)),
            moved(1, Vec2::new(0.0, 10.0), Vec2::new(10.0, 10.0)),
        ]);
        assert_eq!(m.center(), Vec2::new(10.0, 5.0));
        assert_eq!(m.center_delta(), Vec2::new(10.0, 0.0));
        assert!(m.direction().abs() < 1e-6);
        assert!((m.average_speed() - 1000.0).abs() < 1.0);
        assert_eq!(m.max_speed(), m.min_speed());
    }

    #[test]
    fn separation_and_twist() {
        // Two contacts spreading apart horizontally.
        let pinch = TwoContactDrag::new(
            moved(0, Vec2::new(-10.0, 0.0), Vec2::new(-20.0, 0.0)),
            moved(1, Vec2::new(10.0, 0.0), Vec2::new(20.0, 0.0)),
            DragRelationship::Pinch,
        );
        assert_eq!(pinch.separation_delta(), 20.0);
        assert!(pinch.twist().abs() < 1e-6);
        assert_eq!(pinch.centroid_delta(), Vec2::ZERO);

        // Quarter turn counter-clockwise about the origin.
        let twist = TwoContactDrag::new(
            moved(0, Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0)),
            moved(1, Vec2::new(-10.0, 0.0), Vec2::new(0.0, -10.0)),
            DragRelationship::Twist,
        );
        assert!(twist.separation_delta().abs() < 1e-4);
        assert!((twist.twist() - PI / 2.0).abs() < 1e-5);
        assert!((twist.twist_degrees() - 90.0).abs() < 1e-3);
    }

    #[test]
    fn restrict_multi_drag_to_subset() {
        let contacts: Vec<_> = (0..4)
            .map(|i| moved(i, Vec2::new(i as f32 * 10.0, 0.0), Vec2::new(i as f32 * 10.0, 10.0)))
            .collect();
        let g = Gesture::MultiDrag(MultiContact::new(contacts));

        let sub = g.restrict_to(&[ContactId(1), ContactId(3)]).unwrap();
        assert_eq!(sub.kind(), GestureKind::MultiDrag);
        assert_eq!(sub.contact_ids(), vec![ContactId(1), ContactId(3)]);

        let one = g.restrict_to(&[ContactId(2)]).unwrap();
        assert_eq!(one.kind(), GestureKind::SingleDrag);

        assert!(g.restrict_to(&[ContactId(9)]).is_none());
        let all: Vec<_> = (0..4).map(ContactId).collect();
        assert_eq!(g.restrict_to(&all), Some(g.clone()));
    }

    #[test]
    fn restrict_pinch_demotes_to_single_drag() {
        let g = Gesture::Pinch(TwoContactDrag::new(
            moved(0, Vec2::ZERO, Vec2::new(-5.0, 0.0)),
            moved(1, Vec2::new(10.0, 0.0), Vec2::new(15.0, 0.0)),
            DragRelationship::Pinch,
        ));
        let sub = g.restrict_to(&[ContactId(1)]).unwrap();
        assert_eq!(sub.kind(), GestureKind::SingleDrag);
        assert_eq!(sub.contact_ids(), vec![ContactId(1)]);
    }

    #[test]
    fn restrict_multi_long_press_and_tap() {
        let contacts: Vec<_> = (0..3).map(|i| moved(i, Vec2::ZERO, Vec2::ZERO)).collect();
        let lp = Gesture::MultiLongPress(MultiContact::new(contacts.clone()));
        assert_eq!(
            lp.restrict_to(&[ContactId(0)]).unwrap().kind(),
            GestureKind::SingleLongPress
        );
        let tap = Gesture::MultiTap(MultiContact::new(contacts));
        assert_eq!(
            tap.restrict_to(&[ContactId(0), ContactId(2)]).unwrap().kind(),
            GestureKind::MultiTap
        );
    }

    #[test]
    fn kind_helpers() {
        assert!(GestureKind::SingleTap.is_single());
        assert!(!GestureKind::Pinch.is_single());
        assert!(GestureKind::RawMultiDrag.is_raw());
        assert_eq!(GestureKind::Twist.single_counterpart(), GestureKind::SingleDrag);
        assert_eq!(GestureKind::MultiSwipe.to_string(), "multi_swipe");
    }
}
