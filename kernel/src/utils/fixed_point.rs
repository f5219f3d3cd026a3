/*
 * Signed Fixed-Point Arithmetic
 *
 * This module implements the 17.14 signed fixed-point real numbers used by
 * the MLFQS scheduler for `load_avg` and `recent_cpu`. The kernel has no
 * floating point available, so every fractional quantity in the scheduler
 * recurrences goes through this type.
 *
 * Why this is important:
 * - The MLFQS recurrences must match a bit-exact numeric contract
 * - Multiplication and division widen to 64 bits so intermediate products
 *   never overflow for the value ranges the scheduler produces
 * - Conversion back to integers rounds to nearest, which is what the
 *   reporting accessors (`100 * load_avg`, `100 * recent_cpu`) expect
 *
 * Format: 1 sign bit, 17 integer bits, 14 fraction bits.
 */

use core::fmt;
use core::ops::{Add, Div, Mul, Sub};

/// Number of fraction bits
const FRACTION_BITS: u32 = 14;

/// The fixed-point representation of 1
const F: i32 = 1 << FRACTION_BITS;

/// A signed 17.14 fixed-point real number
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedPoint(i32);

impl FixedPoint {
    /// Zero
    pub const ZERO: FixedPoint = FixedPoint(0);

    /// One
    pub const ONE: FixedPoint = FixedPoint(F);

    /// Convert an integer to fixed point
    pub const fn from_int(n: i32) -> Self {
        FixedPoint(n * F)
    }

    /// Build a value from its raw representation
    pub const fn from_raw(raw: i32) -> Self {
        FixedPoint(raw)
    }

    /// Get the raw representation
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Convert to integer, rounding to nearest (halves away from zero)
    pub const fn to_int_round(self) -> i32 {
        if self.0 >= 0 {
            (self.0 + F / 2) / F
        } else {
            (self.0 - F / 2) / F
        }
    }

    /// Add an integer
    pub const fn add_int(self, n: i32) -> Self {
        FixedPoint(self.0 + n * F)
    }

    /// Multiply by an integer
    pub const fn mul_int(self, n: i32) -> Self {
        FixedPoint(self.0 * n)
    }

    /// Divide by an integer
    pub const fn div_int(self, n: i32) -> Self {
        FixedPoint(self.0 / n)
    }

    /// `n` times this value, rounded to the nearest integer
    ///
    /// The product is formed in 64 bits, so large values scaled for
    /// reporting cannot overflow the 17.14 range.
    pub const fn mul_int_round(self, n: i32) -> i32 {
        let scaled = self.0 as i64 * n as i64;
        let half = (F / 2) as i64;
        let rounded = if scaled >= 0 {
            (scaled + half) / F as i64
        } else {
            (scaled - half) / F as i64
        };
        rounded as i32
    }
}

impl Add for FixedPoint {
    type Output = FixedPoint;

    fn add(self, rhs: FixedPoint) -> FixedPoint {
        FixedPoint(self.0 + rhs.0)
    }
}

impl Sub for FixedPoint {
    type Output = FixedPoint;

    fn sub(self, rhs: FixedPoint) -> FixedPoint {
        FixedPoint(self.0 - rhs.0)
    }
}

impl Mul for FixedPoint {
    type Output = FixedPoint;

    fn mul(self, rhs: FixedPoint) -> FixedPoint {
        FixedPoint(((self.0 as i64) * (rhs.0 as i64) / F as i64) as i32)
    }
}

impl Div for FixedPoint {
    type Output = FixedPoint;

    fn div(self, rhs: FixedPoint) -> FixedPoint {
        FixedPoint(((self.0 as i64) * F as i64 / rhs.0 as i64) as i32)
    }
}

impl fmt::Debug for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedPoint({}/{})", self.0, F)
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Two decimal places, rounded
        let hundredths = self.mul_int_round(100);
        let sign = if hundredths < 0 { "-" } else { "" };
        let abs = hundredths.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}
