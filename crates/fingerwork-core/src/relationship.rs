#![forbid(unsafe_code)]

//! Two-contact drag relationship analysis.
//!
//! A stateless, per-sample classification of how two dragging contacts move
//! relative to each other:
//!
//! | direction difference `Δ`        | separation test                              | result      |
//! |---------------------------------|----------------------------------------------|-------------|
//! | `Δ < identical`                 |                                              | `Identical` |
//! | `Δ > π - opposite / 2`          | `|sep| > (vA + vB) * pinch_precision`        | `Pinch`     |
//! | `Δ > π - opposite / 2`          | otherwise                                    | `Twist`     |
//! | anything else, or undefined     |                                              | `None`      |
//!
//! `Δ` is folded into `[0, π]`, so two directions either side of the ±π seam
//! compare as close. `sep` is the change in separation over the latest
//! sample and `vA`/`vB` are the contacts' current speeds in units per second.
//! The comparison therefore depends on the sample rate: the same spread is a
//! pinch when performed slowly and a twist when flicked.
//!
//! The result is symmetric: swapping the contacts never changes the tag.

use std::f32::consts::PI;

use crate::config::RelationshipThresholds;
use crate::contact::ContactSnapshot;
use crate::geometry;
use crate::gesture::{DragRelationship, TwoContactDrag};

/// Classify the relationship between two contacts on their latest sample.
#[must_use]
pub fn classify(
    a: &ContactSnapshot,
    b: &ContactSnapshot,
    thresholds: &RelationshipThresholds,
) -> DragRelationship {
    let diff = geometry::direction_difference(a.direction, b.direction);
    if diff.is_nan() {
        return DragRelationship::None;
    }
    if diff < thresholds.identical {
        return DragRelationship::Identical;
    }
    if diff > PI - thresholds.opposite / 2.0 {
        let separation = separation_delta(a, b);
        let combined = a.speed + b.speed;
        return if separation.abs() > combined * thresholds.pinch_precision {
            DragRelationship::Pinch
        } else {
            DragRelationship::Twist
        };
    }
    DragRelationship::None
}

/// Classify and package the pair with its derived geometry.
#[must_use]
pub fn analyze(
    a: &ContactSnapshot,
    b: &ContactSnapshot,
    thresholds: &RelationshipThresholds,
) -> TwoContactDrag {
    TwoContactDrag::new(*a, *b, classify(a, b, thresholds))
}

fn separation_delta(a: &ContactSnapshot, b: &ContactSnapshot) -> f32 {
    a.position.distance(b.position) - a.previous_position().distance(b.previous_position())
}
