//! Arithmetic on [`BitInteger`] values.
//!
//! Binary operations first bring both operands to the wider of the two
//! widths by zero-filling the narrower bit pattern, the way a narrow bus
//! merged into a wide one has no high lines. The result is signed only when
//! both operands are. Every result wraps modulo `2^width`.

use crate::bits::{BitInteger, BitsError};

/// Ripple-carry addition of two equal-length bit slices, dropping the carry out.
pub fn ripple_add(a: &[bool], b: &[bool], carry_in: bool) -> Vec<bool> {
    let mut carry = carry_in;
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let sum = x ^ y ^ carry;
            carry = (x & y) | (carry & (x ^ y));
            sum
        })
        .collect()
}

/// Two's-complement negation of a bit slice at its own width.
pub fn negate_bits(a: &[bool]) -> Vec<bool> {
    let inverted: Vec<bool> = a.iter().map(|b| !b).collect();
    let zero = vec![false; a.len()];
    ripple_add(&inverted, &zero, true)
}

/// Shift-and-add product truncated to the operand width.
pub fn multiply_bits(a: &[bool], b: &[bool]) -> Vec<bool> {
    let width = a.len();
    let mut product = vec![false; width];
    for (shift, &bit) in b.iter().enumerate().take(width) {
        if !bit {
            continue;
        }
        let mut partial = vec![false; width];
        partial[shift..].copy_from_slice(&a[..width - shift]);
        product = ripple_add(&product, &partial, false);
    }
    product
}

/// Unsigned long division of equal-length slices, returning (quotient, remainder).
/// The divisor must be non-zero.
fn divide_unsigned(a: &[bool], b: &[bool]) -> (Vec<bool>, Vec<bool>) {
    let width = a.len();
    // One spare bit so the partial remainder never overflows while shifting.
    let divisor: Vec<bool> = b.iter().copied().chain(std::iter::once(false)).collect();
    let neg_divisor = negate_bits(&divisor);
    let mut remainder = vec![false; width + 1];
    let mut quotient = vec![false; width];

    for i in (0..width).rev() {
        remainder.rotate_right(1);
        remainder[0] = a[i];
        if !less_than_unsigned(&remainder, &divisor) {
            remainder = ripple_add(&remainder, &neg_divisor, false);
            quotient[i] = true;
        }
    }
    remainder.truncate(width);
    (quotient, remainder)
}

fn less_than_unsigned(a: &[bool], b: &[bool]) -> bool {
    for i in (0..a.len()).rev() {
        if a[i] != b[i] {
            return b[i];
        }
    }
    false
}

impl BitInteger {
    /// Both operands zero-filled to the wider width, plus the result signedness.
    fn merged(&self, other: &Self) -> (Vec<bool>, Vec<bool>, usize, bool) {
        let width = self.width().max(other.width());
        let signed = self.is_signed() && other.is_signed();
        let a = self.resize(width, false).to_bits().to_vec();
        let b = other.resize(width, false).to_bits().to_vec();
        (a, b, width, signed)
    }

    fn with_bits(bits: Vec<bool>, signed: bool) -> Self {
        // Callers always pass at least one bit.
        Self::from_bits(&bits, signed).unwrap_or_else(|_| Self::zero(1, signed))
    }

    /// The operand's sign and its magnitude as an unsigned pattern at `width`.
    fn sign_and_magnitude(&self, width: usize) -> (bool, Vec<bool>) {
        let negative = self.is_negative();
        let magnitude = if negative {
            negate_bits(self.to_bits())
        } else {
            self.to_bits().to_vec()
        };
        let mut magnitude = magnitude;
        magnitude.resize(width, false);
        (negative, magnitude)
    }

    pub fn add(&self, other: &Self) -> Self {
        let (a, b, _, signed) = self.merged(other);
        Self::with_bits(ripple_add(&a, &b, false), signed)
    }

    /// Add a native integer encoded at this value's width.
    pub fn add_int(&self, n: i128) -> Self {
        self.add(&BitInteger::int(n, self.width()))
    }

    pub fn sub(&self, other: &Self) -> Self {
        let (a, b, _, signed) = self.merged(other);
        let inverted: Vec<bool> = b.iter().map(|x| !x).collect();
        Self::with_bits(ripple_add(&a, &inverted, true), signed)
    }

    /// Subtract a native integer encoded at this value's width.
    pub fn sub_int(&self, n: i128) -> Self {
        self.sub(&BitInteger::int(n, self.width()))
    }

    /// Two's-complement negation at the same width and signedness.
    pub fn opposite(&self) -> Self {
        Self::with_bits(negate_bits(self.to_bits()), self.is_signed())
    }

    pub fn mult(&self, other: &Self) -> Self {
        let (a, b, _, signed) = self.merged(other);
        Self::with_bits(multiply_bits(&a, &b), signed)
    }

    /// Quotient and remainder truncated toward zero, each operand read with
    /// its own signedness.
    pub fn div_rem(&self, other: &Self) -> Result<(Self, Self), BitsError> {
        if other.is_zero() {
            return Err(BitsError::DivisionByZero);
        }
        let width = self.width().max(other.width());
        let signed = self.is_signed() && other.is_signed();
        let (a_neg, a_mag) = self.sign_and_magnitude(width);
        let (b_neg, b_mag) = other.sign_and_magnitude(width);

        let (q, r) = divide_unsigned(&a_mag, &b_mag);
        let q = if a_neg != b_neg { negate_bits(&q) } else { q };
        let r = if a_neg { negate_bits(&r) } else { r };
        Ok((Self::with_bits(q, signed), Self::with_bits(r, signed)))
    }

    pub fn div(&self, other: &Self) -> Result<Self, BitsError> {
        self.div_rem(other).map(|(q, _)| q)
    }

    /// Remainder with the sign of the dividend.
    pub fn rem(&self, other: &Self) -> Result<Self, BitsError> {
        self.div_rem(other).map(|(_, r)| r)
    }

    /// Square-and-multiply power, wrapping at the merged width.
    pub fn pow(&self, exponent: &Self) -> Result<Self, BitsError> {
        if exponent.is_negative() {
            return Err(BitsError::NegativeExponent(exponent.to_string()));
        }
        let width = self.width().max(exponent.width());
        let signed = self.is_signed() && exponent.is_signed();

        let mut base = self.resize(width, false).to_bits().to_vec();
        let mut result = vec![false; width];
        result[0] = true;
        for &bit in exponent.to_bits() {
            if bit {
                result = multiply_bits(&result, &base);
            }
            base = multiply_bits(&base, &base);
        }
        Ok(Self::with_bits(result, signed))
    }

    /// Logical left shift; `n >= width` gives zero.
    pub fn shl(&self, n: usize) -> Self {
        let width = self.width();
        let bits = (0..width)
            .map(|i| i >= n && self.bit(i - n))
            .collect();
        Self::with_bits(bits, self.is_signed())
    }

    /// Logical right shift, filling with zeros; `n >= width` gives zero.
    pub fn shr(&self, n: usize) -> Self {
        let width = self.width();
        let bits = (0..width)
            .map(|i| i.checked_add(n).is_some_and(|j| self.bit(j)))
            .collect();
        Self::with_bits(bits, self.is_signed())
    }
}
