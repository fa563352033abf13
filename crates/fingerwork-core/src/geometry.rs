#![forbid(unsafe_code)]

//! Planar geometry for contact positions.
//!
//! All positions handed to the engine share one length unit (the "boundary
//! unit", typically logical pixels). Physical units are a derived
//! convenience computed from a DPI value and never feed classification.

use std::f32::consts::PI;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// A 2D vector in boundary units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    #[inline]
    #[must_use]
    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Euclidean distance to another point.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Angle of the vector in radians, in `(-π, π]`.
    ///
    /// Returns NaN for the zero vector: a stationary sample has no direction.
    #[inline]
    #[must_use]
    pub fn angle(self) -> f32 {
        if self == Self::ZERO {
            f32::NAN
        } else {
            self.y.atan2(self.x)
        }
    }

    /// Both components are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Component-wise approximate equality.
    #[inline]
    #[must_use]
    pub fn approx_eq(self, other: Self, tolerance: f32) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

impl From<(f32, f32)> for Vec2 {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vec2 {
    type Output = Self;
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Mean of a set of points. `None` for an empty set.
#[must_use]
pub fn centroid<I>(points: I) -> Option<Vec2>
where
    I: IntoIterator<Item = Vec2>,
{
    let mut sum = Vec2::ZERO;
    let mut count = 0u32;
    for p in points {
        sum += p;
        count += 1;
    }
    (count > 0).then(|| sum / count as f32)
}

/// Circular mean of a set of angles (radians). NaN entries are skipped.
///
/// Returns NaN when no finite angle is present or the unit vectors cancel.
#[must_use]
pub fn mean_direction<I>(angles: I) -> f32
where
    I: IntoIterator<Item = f32>,
{
    let sum = angles
        .into_iter()
        .filter(|a| a.is_finite())
        .fold(Vec2::ZERO, |acc, a| acc + Vec2::new(a.cos(), a.sin()));
    if sum.length() <= f32::EPSILON {
        f32::NAN
    } else {
        sum.angle()
    }
}

/// Wrap an angle into `(-π, π]`.
#[must_use]
pub fn wrap_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return angle;
    }
    let mut a = angle % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

/// Absolute difference between two directions, folded into `[0, π]`.
///
/// NaN if either direction is undefined.
#[must_use]
pub fn direction_difference(a: f32, b: f32) -> f32 {
    let d = (a - b).abs() % (2.0 * PI);
    if d > PI { 2.0 * PI - d } else { d }
}

// ---------------------------------------------------------------------------
// Physical units
// ---------------------------------------------------------------------------

const CM_PER_INCH: f32 = 2.54;

/// Physical length units derivable from boundary units and a DPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthUnit {
    Inches,
    Centimeters,
    Millimeters,
}

impl LengthUnit {
    /// Convert a length in boundary units (dots) to this unit.
    #[must_use]
    pub fn from_dots(self, dots: f32, dpi: f32) -> f32 {
        let inches = dots / dpi;
        match self {
            Self::Inches => inches,
            Self::Centimeters => inches * CM_PER_INCH,
            Self::Millimeters => inches * CM_PER_INCH * 10.0,
        }
    }

    /// Convert a length in this unit back to boundary units.
    #[must_use]
    pub fn to_dots(self, length: f32, dpi: f32) -> f32 {
        let inches = match self {
            Self::Inches => length,
            Self::Centimeters => length / CM_PER_INCH,
            Self::Millimeters => length / (CM_PER_INCH * 10.0),
        };
        inches * dpi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_vector_has_no_direction() {
        assert!(Vec2::ZERO.angle().is_nan());
        assert!((Vec2::new(1.0, 0.0).angle()).abs() < 1e-6);
    }

    #[test]
    fn centroid_of_empty_is_none() {
        assert_eq!(centroid(std::iter::empty()), None);
        let c = centroid([Vec2::new(0.0, 0.0), Vec2::new(4.0, 2.0)]).unwrap();
        assert_eq!(c, Vec2::new(2.0, 1.0));
    }

    #[test]
    fn direction_difference_folds_across_the_seam() {
        let d = direction_difference(PI - 0.05, -PI + 0.05);
        assert!((d - 0.1).abs() < 1e-4, "got {d}");
        let opposite = direction_difference(0.0, PI);
        assert!((opposite - PI).abs() < 1e-6);
        assert!(direction_difference(f32::NAN, 0.0).is_nan());
    }

    #[test]
    fn mean_direction_handles_wraparound() {
        let m = mean_direction([PI - 0.1, -PI + 0.1]);
        assert!((m.abs() - PI).abs() < 1e-4, "got {m}");
        assert!((mean_direction([0.0, PI / 2.0]) - PI / 4.0).abs() < 1e-5);
        assert!(mean_direction([f32::NAN]).is_nan());
    }

    #[test]
    fn wrap_angle_range() {
        assert!((wrap_angle(2.5 * PI) - 0.5 * PI).abs() < 1e-5);
        assert!((wrap_angle(-1.5 * PI) - 0.5 * PI).abs() < 1e-5);
        assert_eq!(wrap_angle(0.25), 0.25);
    }

    #[test]
    fn unit_round_trip_at_96_dpi() {
        let mm = LengthUnit::Millimeters.from_dots(96.0, 96.0);
        assert!((mm - 25.4).abs() < 1e-4);
        let dots = LengthUnit::Centimeters.to_dots(2.54, 96.0);
        assert!((dots - 96.0).abs() < 1e-3);
    }
}
