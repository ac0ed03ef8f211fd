//! Q15.16 signed fixed-point scalar.
//!
//! Temperatures and diffusivity coefficients travel through the fabric as
//! raw 32-bit words, so the solver works on those words directly rather
//! than converting to floating point every tick.
//!
//! # Overflow
//!
//! All arithmetic saturates at [`Fix16::MIN`] / [`Fix16::MAX`]. A wrapped
//! temperature would flip sign and poison every neighbour downstream with
//! no observable fault, whereas a clamped one stays physically ordered.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A signed Q15.16 fixed-point number: 1 sign bit, 15 integer bits,
/// 16 fractional bits, stored in an `i32`.
///
/// # Examples
///
/// ```
/// use heatmesh_core::Fix16;
///
/// let one = Fix16::ONE;
/// let half = Fix16::from_bits(0x0000_8000);
/// assert_eq!((one + half).to_bits(), 0x0001_8000);
/// assert_eq!((one * half), half);
/// assert_eq!(Fix16::from_f64(2.25).to_f64(), 2.25);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fix16(i32);

impl Fix16 {
    /// Number of fractional bits.
    pub const FRAC_BITS: u32 = 16;
    /// `0.0`.
    pub const ZERO: Self = Self(0);
    /// `1.0`.
    pub const ONE: Self = Self(1 << Self::FRAC_BITS);
    /// Smallest representable value (≈ −32768.0).
    pub const MIN: Self = Self(i32::MIN);
    /// Largest representable value (≈ 32767.99998).
    pub const MAX: Self = Self(i32::MAX);

    /// Wrap a raw Q15.16 bit pattern.
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    /// The raw Q15.16 bit pattern.
    pub const fn to_bits(self) -> i32 {
        self.0
    }

    /// Reinterpret a 32-bit packet payload as a Q15.16 value.
    pub const fn from_payload(payload: u32) -> Self {
        Self(payload as i32)
    }

    /// The value as a 32-bit packet payload.
    pub const fn to_payload(self) -> u32 {
        self.0 as u32
    }

    /// Convert an integer, saturating outside `[-32768, 32767]`.
    pub fn from_int(v: i32) -> Self {
        Self::saturate(i64::from(v) << Self::FRAC_BITS)
    }

    /// Convert from floating point, truncating toward zero.
    ///
    /// Out-of-range values saturate and NaN maps to zero (Rust's
    /// float-to-int `as` semantics).
    pub fn from_f64(v: f64) -> Self {
        Self((v * f64::from(1u32 << Self::FRAC_BITS)) as i32)
    }

    /// Convert to floating point. Exact for every representable value.
    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / f64::from(1u32 << Self::FRAC_BITS)
    }

    /// Clamp a widened Q15.16 intermediate back into range.
    pub fn saturate(wide: i64) -> Self {
        Self(wide.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
    }

    /// Multiply through a 64-bit intermediate and shift right by 16.
    ///
    /// The shift is arithmetic, so negative products round toward −∞.
    pub fn saturating_mul(self, rhs: Self) -> Self {
        let wide = i64::from(self.0) * i64::from(rhs.0);
        Self::saturate(wide >> Self::FRAC_BITS)
    }
}

impl Add for Fix16 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Fix16 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Fix16 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Fix16 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul for Fix16 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.saturating_mul(rhs)
    }
}

impl Neg for Fix16 {
    type Output = Self;

    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl fmt::Display for Fix16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

impl fmt::LowerHex for Fix16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
