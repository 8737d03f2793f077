//! Fixed-point math utilities for deterministic simulation.
//!
//! All game simulation uses fixed-point arithmetic to ensure
//! deterministic behavior across platforms. Floating-point
//! values only appear at data-loading boundaries, where they are
//! converted once into [`Fixed`].

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Fixed-point 2D vector on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate (the ground plane's depth axis).
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for hand-written data files.
///
/// Reads and writes fixed-point numbers as decimals (`1.5`) so that RON
/// templates and scenarios stay readable. The conversion happens once at
/// load time, which keeps the simulation itself free of floats.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(serde::de::Error::custom("expected a finite number"));
        }
        Ok(Fixed::saturating_from_num(value))
    }
}

/// Serde support for vectors in hand-written data files, as `(x, y)`.
pub mod vec2_decimal {
    use super::{Fixed, Vec2Fixed};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a vector as a decimal tuple.
    pub fn serialize<S>(value: &Vec2Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (value.x.to_num::<f64>(), value.y.to_num::<f64>()).serialize(serializer)
    }

    /// Deserialize a vector from a decimal tuple.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec2Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (x, y) = <(f64, f64)>::deserialize(deserializer)?;
        if !x.is_finite() || !y.is_finite() {
            return Err(serde::de::Error::custom("expected finite coordinates"));
        }
        Ok(Vec2Fixed::new(
            Fixed::saturating_from_num(x),
            Fixed::saturating_from_num(y),
        ))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Unit vector along +X.
    pub const UNIT_X: Self = Self {
        x: Fixed::ONE,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    ///
    /// Saturates at `Fixed::MAX` for points more than about 46 000 units
    /// apart.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        Self {
            x: self.x.saturating_sub(other.x),
            y: self.y.saturating_sub(other.y),
        }
        .length_squared()
    }

    /// Squared length, saturating like [`Self::distance_squared`].
    #[must_use]
    pub fn length_squared(self) -> Fixed {
        self.x
            .saturating_mul(self.x)
            .saturating_add(self.y.saturating_mul(self.y))
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Length of the vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.length_squared())
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Normalize vector using fixed-point math.
    ///
    /// Returns the zero vector for zero-length input.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.length_squared();

        if len_sq == Fixed::ZERO {
            return Self::ZERO;
        }

        let len = fixed_sqrt(len_sq);
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// Normalize, substituting `fallback` when the vector has no direction.
    #[must_use]
    pub fn normalize_or(self, fallback: Self) -> Self {
        let normalized = self.normalize();
        if normalized == Self::ZERO {
            fallback
        } else {
            normalized
        }
    }

    /// Check whether both components are zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == Fixed::ZERO && self.y == Fixed::ZERO
    }

    /// Turn a unit heading toward `target` by interpolation factor `t`.
    ///
    /// Normalised interpolation between two unit vectors; `t` is clamped to
    /// `[0, 1]`. Opposite headings have no interpolated direction, so the
    /// result snaps to `target` once `t` reaches one half.
    #[must_use]
    pub fn turn_toward(self, target: Self, t: Fixed) -> Self {
        let t = t.clamp(Fixed::ZERO, Fixed::ONE);
        let blended = self.lerp(target, t).normalize();
        if blended == Self::ZERO {
            if t >= Fixed::ONE / Fixed::from_num(2) {
                target
            } else {
                self
            }
        } else {
            blended
        }
    }
}

/// Computes the square root of a fixed-point number using binary search.
///
/// Deterministic on every platform and never overflows.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    // 64 halvings reach the last fractional bit for the whole I32F32 range
    for _ in 0..64 {
        let mid = low + (high - low) / Fixed::from_num(2);
        if mid == low {
            break;
        }
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Neg for Vec2Fixed {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl std::ops::AddAssign for Vec2Fixed {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::SubAssign for Vec2Fixed {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    #[test]
    fn test_vec2_distance_squared() {
        let a = v(3, 0);
        let b = v(0, 4);
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
    }

    #[test]
    fn test_distance_squared_saturates_far_apart() {
        let a = v(-40_000, -40_000);
        let b = v(40_000, 40_000);
        assert_eq!(a.distance_squared(b), Fixed::MAX);
        assert!(a.distance(b) > Fixed::from_num(46_000));
    }

    #[test]
    fn test_vec2_distance() {
        let epsilon = Fixed::ONE / Fixed::from_num(100_000);
        let dist = v(3, 0).distance(v(0, 4));
        assert!((dist - Fixed::from_num(5)).abs() < epsilon);
    }

    #[test]
    fn test_fixed_determinism() {
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);

        let result1 = a * Fixed::from_num(7);
        let result2 = b * Fixed::from_num(7);
        assert_eq!(result1, result2);
    }

    #[test]
    fn test_vec2_dot() {
        let dot = v(2, 3).dot(v(4, -1));
        assert_eq!(dot, Fixed::from_num(5));
    }

    #[test]
    fn test_vec2_lerp() {
        let mid = v(0, 0).lerp(v(10, 20), Fixed::from_num(0.5));
        assert_eq!(mid, v(5, 10));
    }

    #[test]
    fn test_vec2_normalize() {
        let norm = v(3, 4).normalize();

        let len_sq = norm.dot(norm);
        let one = Fixed::from_num(1);
        let epsilon = one / Fixed::from_num(10000);
        assert!(
            (len_sq - one).abs() < epsilon,
            "normalized vector length² should be ~1, got {:?}",
            len_sq
        );

        // Direction preserved: x/y ratio matches 3/4
        let ratio_diff = (norm.x * Fixed::from_num(4)) - (norm.y * Fixed::from_num(3));
        assert!(ratio_diff.abs() < epsilon);
    }

    #[test]
    fn test_normalize_or_uses_fallback_for_zero() {
        assert_eq!(Vec2Fixed::ZERO.normalize_or(Vec2Fixed::UNIT_X), Vec2Fixed::UNIT_X);
    }

    #[test]
    fn test_sqrt_of_large_values() {
        let root = fixed_sqrt(Fixed::from_num(1_000_000));
        let epsilon = Fixed::ONE / Fixed::from_num(10_000);
        assert!((root - Fixed::from_num(1000)).abs() < epsilon);
        assert_eq!(fixed_sqrt(Fixed::ZERO), Fixed::ZERO);
        assert_eq!(fixed_sqrt(Fixed::from_num(-4)), Fixed::ZERO);
    }

    #[test]
    fn test_turn_toward_full_factor_reaches_target() {
        let facing = Vec2Fixed::UNIT_X;
        let target = v(0, 1);
        let turned = facing.turn_toward(target, Fixed::from_num(5));
        let epsilon = Fixed::ONE / Fixed::from_num(10_000);
        assert!((turned.x - target.x).abs() < epsilon);
        assert!((turned.y - target.y).abs() < epsilon);
    }

    #[test]
    fn test_turn_toward_partial_factor_stays_between() {
        let turned = Vec2Fixed::UNIT_X.turn_toward(v(0, 1), Fixed::from_num(0.5));
        assert!(turned.x > Fixed::ZERO && turned.y > Fixed::ZERO);
        let len_sq = turned.dot(turned);
        let epsilon = Fixed::ONE / Fixed::from_num(10_000);
        assert!((len_sq - Fixed::ONE).abs() < epsilon);
    }

    #[test]
    fn test_decimal_serde_roundtrip_through_ron() {
        #[derive(Serialize, Deserialize)]
        struct Sample {
            #[serde(with = "fixed_decimal")]
            speed: Fixed,
            #[serde(with = "vec2_decimal")]
            at: Vec2Fixed,
        }

        let parsed: Sample = ron::from_str("(speed: 2.5, at: (1.0, -3.0))").unwrap();
        assert_eq!(parsed.speed, Fixed::from_num(2.5));
        assert_eq!(parsed.at, v(1, -3));
    }
}
