//! Fixed-point scalars, 2D vectors and the seeded generator
//!
//! Every quantity that crosses the wire is held as thousandths in an `i32`,
//! the same representation the binary codec writes. Simulation results are
//! rounded back into this grid after every step so independent copies stay
//! bit-identical.

use std::f64::consts::FRAC_PI_2;
use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Scale factor between a real value and its fixed-point representation
pub const FIXED_SCALE: i32 = 1000;

/// Real number stored as an integer count of thousandths
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Self = Self(0);

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn from_int(value: i32) -> Self {
        Self(value * FIXED_SCALE)
    }

    /// Truncating conversion, identical to what the codec does on encode
    pub fn from_f64(value: f64) -> Self {
        Self((value * FIXED_SCALE as f64) as i32)
    }

    /// Round to the nearest thousandth, halves away from zero
    pub fn round_f64(value: f64) -> Self {
        Self((value * FIXED_SCALE as f64).round() as i32)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / FIXED_SCALE as f64
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn clamp(self, min: Fixed, max: Fixed) -> Self {
        Self(self.0.clamp(min.0, max.0))
    }

    /// `self * dt * speed` where `speed` is an integer rate per second
    pub fn scaled_by(self, dt: Fixed, speed: i32) -> Self {
        let product = self.0 as i128 * dt.0 as i128 * speed as i128;
        Self(saturate(div_round(product, FIXED_SCALE as i128)))
    }
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Fixed {
    type Output = Fixed;

    fn neg(self) -> Fixed {
        Fixed(self.0.saturating_neg())
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.to_f64())
    }
}

fn div_round(numerator: i128, denominator: i128) -> i128 {
    if numerator >= 0 {
        (numerator + denominator / 2) / denominator
    } else {
        (numerator - denominator / 2) / denominator
    }
}

fn saturate(value: i128) -> i32 {
    value.clamp(i32::MIN as i128, i32::MAX as i128) as i32
}

/// `(sin, cos)` built from IEEE add, multiply, divide and round only.
///
/// Platform `sin`/`cos` may differ in the last bit between targets, which
/// is enough to flip a rounded thousandth. The argument is reduced to
/// `[-π/4, π/4]` and fed to Taylor polynomials of degree 15/14.
pub fn sin_cos(angle: f64) -> (f64, f64) {
    let quadrant = (angle / FRAC_PI_2).round();
    let r = angle - quadrant * FRAC_PI_2;
    let r2 = r * r;

    let sin = r
        * (1.0
            - r2 / 6.0
                * (1.0
                    - r2 / 20.0
                        * (1.0
                            - r2 / 42.0
                                * (1.0
                                    - r2 / 72.0
                                        * (1.0
                                            - r2 / 110.0
                                                * (1.0 - r2 / 156.0 * (1.0 - r2 / 210.0)))))));
    let cos = 1.0
        - r2 / 2.0
            * (1.0
                - r2 / 12.0
                    * (1.0
                        - r2 / 30.0
                            * (1.0
                                - r2 / 56.0
                                    * (1.0
                                        - r2 / 90.0
                                            * (1.0 - r2 / 132.0 * (1.0 - r2 / 182.0))))));

    match (quadrant as i64).rem_euclid(4) {
        0 => (sin, cos),
        1 => (cos, -sin),
        2 => (-sin, -cos),
        _ => (-cos, sin),
    }
}

/// Point or direction on the stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: Fixed,
    pub y: Fixed,
}

impl Vec2 {
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Truncating conversion from real coordinates
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self::new(Fixed::from_f64(x), Fixed::from_f64(y))
    }

    /// Rounding conversion from real coordinates
    pub fn round_f64(x: f64, y: f64) -> Self {
        Self::new(Fixed::round_f64(x), Fixed::round_f64(y))
    }

    pub fn to_f64(self) -> (f64, f64) {
        (self.x.to_f64(), self.y.to_f64())
    }

    /// Advance by `direction * dt * speed`, rounded per axis
    pub fn advanced(self, direction: Vec2, dt: Fixed, speed: i32) -> Self {
        Self::new(
            self.x + direction.x.scaled_by(dt, speed),
            self.y + direction.y.scaled_by(dt, speed),
        )
    }

    /// Squared distance in raw thousandths, exact
    pub fn distance_sq_raw(self, other: Vec2) -> i128 {
        let dx = self.x.raw() as i128 - other.x.raw() as i128;
        let dy = self.y.raw() as i128 - other.y.raw() as i128;
        dx * dx + dy * dy
    }

    pub fn within(self, other: Vec2, radius: Fixed) -> bool {
        let r = radius.raw() as i128;
        self.distance_sq_raw(other) < r * r
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Modulus of the linear congruential generator
const LCG_MODULUS: u64 = 233_280;
const LCG_MULTIPLIER: u64 = 9_301;
const LCG_INCREMENT: u64 = 49_297;

/// Linear congruential generator whose whole state is one integer seed.
///
/// The seed travels inside the world snapshot, so any saved state resumes
/// the same sequence of draws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeededRng(u32);

impl SeededRng {
    pub const fn new(seed: u32) -> Self {
        Self(seed)
    }

    pub const fn seed(self) -> u32 {
        self.0
    }

    /// Advance once and return a draw in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        let next = (self.0 as u64 * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
        self.0 = next as u32;
        next as f64 / LCG_MODULUS as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_f64_truncates_like_the_codec() {
        assert_eq!(Fixed::from_f64(1.2346).raw(), 1234);
        assert_eq!(Fixed::from_f64(-1.2346).raw(), -1234);
        assert_eq!(Fixed::from_f64(0.0009).raw(), 0);
    }

    #[test]
    fn round_f64_rounds_half_away_from_zero() {
        assert_eq!(Fixed::round_f64(1.2346).raw(), 1235);
        assert_eq!(Fixed::round_f64(-1.2346).raw(), -1235);
        assert_eq!(Fixed::round_f64(2.0004).raw(), 2000);
    }

    #[test]
    fn scaled_by_matches_real_product() {
        let direction = Fixed::from_raw(707);
        let dt = Fixed::from_raw(16);
        // 0.707 * 0.016 * 100 = 1.1312
        assert_eq!(direction.scaled_by(dt, 100).raw(), 1131);
        assert_eq!((-direction).scaled_by(dt, 100).raw(), -1131);
    }

    #[test]
    fn scaled_by_saturates_extreme_wire_values() {
        let max = Fixed::from_raw(i32::MAX);
        let min = Fixed::from_raw(i32::MIN);
        assert_eq!(min.scaled_by(max, 100).raw(), i32::MIN);
        assert_eq!(max.scaled_by(max, 600).raw(), i32::MAX);
        assert_eq!(min.scaled_by(min, 100).raw(), i32::MAX);
    }

    #[test]
    fn sin_cos_tracks_the_platform_functions() {
        for step in 0..=1000 {
            let angle = step as f64 / 1000.0 * std::f64::consts::TAU;
            let (sin, cos) = sin_cos(angle);
            assert!((sin - angle.sin()).abs() < 1e-12, "sin {angle}");
            assert!((cos - angle.cos()).abs() < 1e-12, "cos {angle}");
        }
    }

    #[test]
    fn sin_cos_quadrant_points() {
        let (sin, cos) = sin_cos(0.0);
        assert_eq!((sin, cos), (0.0, 1.0));
        let (sin, cos) = sin_cos(std::f64::consts::PI);
        assert!(sin.abs() < 1e-15);
        assert_eq!(cos, -1.0);
        let (sin, cos) = sin_cos(3.0 * FRAC_PI_2);
        assert_eq!(sin, -1.0);
        assert!(cos.abs() < 1e-15);
    }

    #[test]
    fn within_is_strict() {
        let a = Vec2::ZERO;
        let b = Vec2::new(Fixed::from_int(35), Fixed::ZERO);
        assert!(!a.within(b, Fixed::from_int(35)));
        assert!(a.within(b, Fixed::from_raw(35_001)));
    }

    #[test]
    fn rng_sequence_is_reproducible() {
        let mut a = SeededRng::new(42);
        let mut b = SeededRng::new(42);
        for _ in 0..100 {
            let draw = a.next_f64();
            assert!((0.0..1.0).contains(&draw));
            assert_eq!(draw.to_bits(), b.next_f64().to_bits());
        }
        assert_eq!(a, b);
    }

    #[test]
    fn rng_first_draw_from_known_seed() {
        let mut rng = SeededRng::new(1);
        // (1 * 9301 + 49297) % 233280 = 58598
        let draw = rng.next_f64();
        assert_eq!(rng.seed(), 58_598);
        assert!((draw - 58_598.0 / 233_280.0).abs() < f64::EPSILON);
    }
}
