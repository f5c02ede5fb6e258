//! Arbitrary-width two's-complement integers.
//!
//! [`BitInteger`] is the value carried by every wire, register and memory cell:
//! - bits are stored least significant first
//! - any width from 1 bit upwards
//! - signed (two's complement) or unsigned interpretation
//!
//! Arithmetic lives in [`crate::bits::arith`], bitwise logic and the std
//! operator traits in [`crate::bits::ops`].

use std::cmp::Ordering;
use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A fixed-width binary integer.
///
/// The width is the number of stored bits and never changes once built,
/// except through the explicit conversions [`BitInteger::convert`] and
/// [`BitInteger::cast`] used by containers that store new samples.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBits")]
pub struct BitInteger {
    /// Bits stored from least significant (index 0) to most significant.
    bits: Vec<bool>,
    /// Whether the top bit is a two's-complement sign bit.
    signed: bool,
}

/// Serialized form, checked through [`BitInteger::from_bits`] on the way in.
#[derive(Deserialize)]
struct RawBits {
    bits: Vec<bool>,
    signed: bool,
}

impl TryFrom<RawBits> for BitInteger {
    type Error = BitsError;

    fn try_from(raw: RawBits) -> Result<Self, BitsError> {
        Self::from_bits(&raw.bits, raw.signed)
    }
}

// ============================================================================
// Construction
// ============================================================================

impl BitInteger {
    /// All-zero value. A width of 0 is promoted to 1.
    pub fn zero(width: usize, signed: bool) -> Self {
        Self { bits: vec![false; width.max(1)], signed }
    }

    /// Signed value of the given width, truncating `value` to its low bits.
    #[inline]
    pub fn int(value: i128, width: usize) -> Self {
        Self::from_i128(value, width, true)
    }

    /// Unsigned value of the given width, truncating `value` to its low bits.
    #[inline]
    pub fn uint(value: u128, width: usize) -> Self {
        Self::from_u128(value, width, false)
    }

    /// Encode a native integer in two's complement at `width` bits.
    ///
    /// Bits above the width of `value` repeat its sign, so negative numbers
    /// stored in an unsigned container keep their two's-complement pattern.
    pub fn from_i128(value: i128, width: usize, signed: bool) -> Self {
        let width = width.max(1);
        let bits = (0..width)
            .map(|i| if i < 128 { (value >> i) & 1 == 1 } else { value < 0 })
            .collect();
        Self { bits, signed }
    }

    /// Encode an unsigned native integer at `width` bits.
    pub fn from_u128(value: u128, width: usize, signed: bool) -> Self {
        let width = width.max(1);
        let bits = (0..width)
            .map(|i| i < 128 && (value >> i) & 1 == 1)
            .collect();
        Self { bits, signed }
    }

    /// Build from a bit sequence, least significant bit first.
    pub fn from_bits(bits: &[bool], signed: bool) -> Result<Self, BitsError> {
        if bits.is_empty() {
            return Err(BitsError::ZeroWidth);
        }
        Ok(Self { bits: bits.to_vec(), signed })
    }

    /// Parse a binary string written most significant bit first.
    ///
    /// Accepts an optional `0b` prefix and `_` separators. The width is the
    /// number of digits.
    pub fn from_binary(s: &str, signed: bool) -> Result<Self, BitsError> {
        let s = s.trim();
        let s = s.strip_prefix("0b").unwrap_or(s);

        let mut bits = Vec::with_capacity(s.len());
        for c in s.chars().rev() {
            match c {
                '0' => bits.push(false),
                '1' => bits.push(true),
                '_' => {}
                _ => return Err(BitsError::InvalidChar(c)),
            }
        }
        Self::from_bits(&bits, signed)
    }

    /// Reinterpret the raw bits at a new width and signedness.
    ///
    /// Narrowing keeps the low bits, widening fills with zeros. The numeric
    /// value is not preserved in general.
    pub fn resize(&self, width: usize, signed: bool) -> Self {
        let width = width.max(1);
        let bits = (0..width).map(|i| self.bit(i)).collect();
        Self { bits, signed }
    }

    /// Re-encode at a new width and signedness, preserving the value where the
    /// target can represent it.
    ///
    /// Widening a signed value repeats its sign bit; narrowing keeps the low
    /// bits. Use [`BitInteger::fits`] to check whether the value survived.
    pub fn cast(&self, width: usize, signed: bool) -> Self {
        let width = width.max(1);
        let fill = self.is_negative();
        let bits = (0..width)
            .map(|i| if i < self.width() { self.bits[i] } else { fill })
            .collect();
        Self { bits, signed }
    }

    /// In-place [`BitInteger::cast`], used when a container stores a sample.
    pub fn convert(&mut self, width: usize, signed: bool) {
        *self = self.cast(width, signed);
    }

    /// Whether re-encoding at `width`/`signed` keeps the numeric value.
    pub fn fits(&self, width: usize, signed: bool) -> bool {
        self.cast(width, signed).compare(self) == Ordering::Equal
    }
}

// ============================================================================
// Inspection and conversion to native integers
// ============================================================================

impl BitInteger {
    /// Number of bits.
    #[inline]
    pub fn width(&self) -> usize {
        self.bits.len()
    }

    /// Whether the value is interpreted as two's complement.
    #[inline]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// The stored bits, least significant first.
    #[inline]
    pub fn to_bits(&self) -> &[bool] {
        &self.bits
    }

    /// Bit `index` counted from the least significant bit. Out of range reads 0.
    #[inline]
    pub fn bit(&self, index: usize) -> bool {
        self.bits.get(index).copied().unwrap_or(false)
    }

    #[inline]
    pub fn msb(&self) -> bool {
        self.bits[self.bits.len() - 1]
    }

    /// Signed and the sign bit is set.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.signed && self.msb()
    }

    pub fn is_zero(&self) -> bool {
        self.bits.iter().all(|b| !b)
    }

    /// Numeric value. Widths above 128 bits keep only the low 128 bits.
    pub fn to_i128(&self) -> i128 {
        let start: i128 = if self.is_negative() { -1 } else { 0 };
        self.bits
            .iter()
            .rev()
            .fold(start, |acc, &b| acc.wrapping_shl(1) | b as i128)
    }

    /// The low 128 bits read as an unsigned number.
    pub fn to_u128(&self) -> u128 {
        self.bits
            .iter()
            .rev()
            .fold(0u128, |acc, &b| acc.wrapping_shl(1) | b as u128)
    }

    /// The low 64 bits read as an unsigned number.
    #[inline]
    pub fn to_u64(&self) -> u64 {
        self.to_u128() as u64
    }

    /// Numeric value truncated to 64 bits.
    #[inline]
    pub fn to_i64(&self) -> i64 {
        self.to_i128() as i64
    }

    /// The value as a memory or selector index, if it is non-negative and
    /// fits in a `usize`.
    pub fn to_index(&self) -> Option<usize> {
        if self.is_negative() {
            return None;
        }
        if self.bits.iter().skip(usize::BITS as usize).any(|&b| b) {
            return None;
        }
        Some(self.to_u128() as usize)
    }

    /// Binary digits, most significant first.
    pub fn to_binary(&self) -> String {
        self.bits.iter().rev().map(|&b| if b { '1' } else { '0' }).collect()
    }
}

// ============================================================================
// Width manipulation
// ============================================================================

impl BitInteger {
    /// `len` bits starting at `offset`, keeping the signedness. Bits past the
    /// end read as 0.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        let bits = (0..len.max(1)).map(|i| self.bit(offset + i)).collect();
        Self { bits, signed: self.signed }
    }

    /// Drop the `n` most significant bits. The width never falls below 1.
    pub fn truncate(&self, n: usize) -> Self {
        let width = self.width().saturating_sub(n).max(1);
        Self { bits: self.bits[..width].to_vec(), signed: self.signed }
    }

    /// Add `n` high bits, repeating the sign bit when signed.
    pub fn extend(&self, n: usize) -> Self {
        self.cast(self.width() + n, self.signed)
    }
}

// ============================================================================
// Comparison
// ============================================================================

impl BitInteger {
    /// Numeric ordering across widths and signedness.
    pub fn compare(&self, other: &Self) -> Ordering {
        // One spare bit makes every unsigned operand positive once signed.
        let width = self.width().max(other.width()) + 1;
        let a = self.cast(width, true);
        let b = other.cast(width, true);

        match (a.msb(), b.msb()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        for i in (0..width - 1).rev() {
            match (a.bits[i], b.bits[i]) {
                (true, false) => return Ordering::Greater,
                (false, true) => return Ordering::Less,
                _ => {}
            }
        }
        Ordering::Equal
    }

    /// Numeric equality, ignoring width and signedness.
    #[inline]
    pub fn value_eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }

    #[inline]
    pub fn lt(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Less
    }

    #[inline]
    pub fn gt(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Greater
    }

    #[inline]
    pub fn le(&self, other: &Self) -> bool {
        self.compare(other) != Ordering::Greater
    }

    #[inline]
    pub fn ge(&self, other: &Self) -> bool {
        self.compare(other) != Ordering::Less
    }
}

// ============================================================================
// Formatting
// ============================================================================

impl BitInteger {
    /// Decimal digits of the raw bits read as unsigned.
    fn unsigned_decimal(&self) -> String {
        // Little-endian decimal digits, doubled once per bit.
        let mut digits: Vec<u8> = vec![0];
        for &bit in self.bits.iter().rev() {
            let mut carry = bit as u8;
            for d in digits.iter_mut() {
                let v = *d * 2 + carry;
                *d = v % 10;
                carry = v / 10;
            }
            if carry > 0 {
                digits.push(carry);
            }
        }
        digits.iter().rev().map(|d| char::from(b'0' + d)).collect()
    }
}

impl fmt::Display for BitInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The opposite of the most negative value wraps to itself; its
        // unsigned reading is the magnitude.
        if self.is_negative() {
            let magnitude = self.resize(self.width(), false).opposite();
            write!(f, "-{}", magnitude.unsigned_decimal())
        } else {
            write!(f, "{}", self.unsigned_decimal())
        }
    }
}

impl fmt::Debug for BitInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.signed { 'i' } else { 'u' };
        write!(f, "BitInteger(0b{} = {}, {}{})", self.to_binary(), self, kind, self.width())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors produced by [`BitInteger`] construction and arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitsError {
    #[error("a bit integer needs at least one bit")]
    ZeroWidth,

    #[error("invalid binary digit: '{0}' (expected 0 or 1)")]
    InvalidChar(char),

    #[error("division by zero")]
    DivisionByZero,

    #[error("negative exponent: {0}")]
    NegativeExponent(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_deserialize_rejects_empty_bits() {
        let empty: Result<BitInteger, _> = serde_json::from_str(r#"{"bits":[],"signed":true}"#);
        assert!(empty.is_err());

        let x = BitInteger::int(-3, 4);
        let back: BitInteger = serde_json::from_str(&serde_json::to_string(&x).unwrap()).unwrap();
        assert_eq!(back, x);
        assert!(back.msb());
    }

    #[test]
    fn test_negative_encoding() {
        assert_eq!(BitInteger::int(-5, 4).to_binary(), "1011");
        assert_eq!(BitInteger::int(-44, 8).to_binary(), "11010100");
        assert_eq!(BitInteger::int(-5, 4).to_i128(), -5);
    }

    #[test]
    fn test_bit_is_lsb_indexed() {
        let x = BitInteger::int(-5, 4);
        assert!(x.bit(0));
        assert!(x.bit(1));
        assert!(!x.bit(2));
        assert!(x.bit(3));
        assert!(!x.bit(4));
        assert!(!x.bit(100));
    }

    #[test]
    fn test_slice() {
        let x = BitInteger::int(-44, 8);
        let low = x.slice(0, 5);
        assert_eq!(low.to_binary(), "10100");
        assert_eq!(low.to_i128(), -12);

        let high = x.slice(7, 12);
        assert_eq!(high.to_binary(), "000000000001");
        assert_eq!(high.to_i128(), 1);
    }

    #[test]
    fn test_truncate_sequence() {
        let x = BitInteger::int(3, 4);
        let t1 = x.truncate(1);
        assert_eq!(t1.to_i128(), 3);
        let t2 = t1.truncate(1);
        assert_eq!(t2.to_binary(), "11");
        assert_eq!(t2.to_i128(), -1);
        let t3 = t2.truncate(1);
        assert_eq!(t3.to_i128(), -1);
        assert_eq!(t3.truncate(5).width(), 1);

        let u = BitInteger::uint(3, 4);
        assert_eq!(u.truncate(1).to_i128(), 3);
        assert_eq!(u.truncate(2).to_i128(), 3);
        assert_eq!(u.truncate(3).to_i128(), 1);
    }

    #[test]
    fn test_extend_keeps_value() {
        let x = BitInteger::int(-3, 4);
        let wide = x.extend(4);
        assert_eq!(wide.width(), 8);
        assert_eq!(wide.to_i128(), -3);
        assert_eq!(BitInteger::uint(9, 4).extend(2).to_i128(), 9);
    }

    #[test]
    fn test_signed_all_ones() {
        assert_eq!(BitInteger::int((1 << 16) - 1, 16).to_i128(), -1);
        assert_eq!(BitInteger::int(1, 1).to_i128(), -1);
        assert_eq!(BitInteger::uint(1, 1).to_i128(), 1);
    }

    #[test]
    fn test_zero_width_promoted() {
        assert_eq!(BitInteger::zero(0, true).width(), 1);
        assert_eq!(BitInteger::from_bits(&[], true), Err(BitsError::ZeroWidth));
    }

    #[test]
    fn test_from_binary() {
        let x = BitInteger::from_binary("0b1011", true).unwrap();
        assert_eq!(x.to_i128(), -5);
        let y = BitInteger::from_binary("1111_0000", false).unwrap();
        assert_eq!(y.to_i128(), 240);
        assert_eq!(BitInteger::from_binary("10x1", false), Err(BitsError::InvalidChar('x')));
    }

    #[test]
    fn test_cast_and_fits() {
        let x = BitInteger::int(-5, 24);
        assert!(x.fits(32, true));
        assert_eq!(x.cast(32, true).to_i128(), -5);
        assert!(!x.fits(32, false));
        assert!(!BitInteger::uint(1050, 16).fits(10, false));
        assert!(BitInteger::uint(1023, 16).fits(10, false));
        assert!(!BitInteger::uint(128, 16).fits(8, true));
    }

    #[test]
    fn test_compare_across_widths() {
        let neg_wide = BitInteger::int(-1, 64);
        let pos_narrow = BitInteger::uint(1, 2);
        assert!(neg_wide.lt(&pos_narrow));
        assert!(pos_narrow.gt(&neg_wide));

        let big_unsigned = BitInteger::uint(255, 8);
        let small_signed = BitInteger::int(-1, 8);
        assert!(big_unsigned.gt(&small_signed));
        assert!(!big_unsigned.value_eq(&small_signed));

        assert!(BitInteger::int(7, 4).value_eq(&BitInteger::uint(7, 32)));
        assert!(BitInteger::int(-8, 4).le(&BitInteger::int(-8, 12)));
        assert!(BitInteger::int(-8, 4).ge(&BitInteger::int(-9, 12)));
    }

    #[test]
    fn test_to_index() {
        assert_eq!(BitInteger::uint(42, 10).to_index(), Some(42));
        assert_eq!(BitInteger::int(-1, 10).to_index(), None);
        assert_eq!(BitInteger::uint(u128::MAX, 128).to_index(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(BitInteger::int(-44, 8).to_string(), "-44");
        assert_eq!(BitInteger::int(-128, 8).to_string(), "-128");
        assert_eq!(BitInteger::uint(65533, 16).to_string(), "65533");
        assert_eq!(BitInteger::zero(3, true).to_string(), "0");
        let huge = BitInteger::uint(1, 200).shl(130);
        assert_eq!(huge.to_string(), "1361129467683753853853498429727072845824");
    }

    proptest! {
        #[test]
        fn prop_signed_roundtrip(width in 1usize..=64, raw in any::<i64>()) {
            let shift = 64 - width as u32;
            let n = (raw << shift) >> shift;
            prop_assert_eq!(BitInteger::int(n as i128, width).to_i128(), n as i128);
        }

        #[test]
        fn prop_unsigned_roundtrip(width in 1usize..=64, raw in any::<u64>()) {
            let n = if width == 64 { raw } else { raw & ((1u64 << width) - 1) };
            prop_assert_eq!(BitInteger::uint(n as u128, width).to_u64(), n);
        }

        #[test]
        fn prop_bits_roundtrip(bits in prop::collection::vec(any::<bool>(), 1..80), signed in any::<bool>()) {
            let x = BitInteger::from_bits(&bits, signed).unwrap();
            let y = BitInteger::from_bits(x.to_bits(), signed).unwrap();
            prop_assert_eq!(x, y);
        }

        #[test]
        fn prop_display_matches_native(n in any::<i64>()) {
            prop_assert_eq!(BitInteger::int(n as i128, 64).to_string(), n.to_string());
        }
    }
}
