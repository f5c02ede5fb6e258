//! Bitwise logic and std operator traits for [`BitInteger`].
//!
//! The named methods are the primary API; the operator traits are thin
//! aliases so expressions like `&a + &b` or `!x` read naturally in tests and
//! ALU closures. Division has no operator because it can fail.

use crate::bits::BitInteger;

impl BitInteger {
    fn zip_bits(&self, other: &Self, f: impl Fn(bool, bool) -> bool) -> Self {
        let width = self.width().max(other.width());
        let signed = self.is_signed() && other.is_signed();
        let bits: Vec<bool> = (0..width).map(|i| f(self.bit(i), other.bit(i))).collect();
        BitInteger::from_bits(&bits, signed).unwrap_or_else(|_| BitInteger::zero(width, signed))
    }

    /// Bitwise complement at the same width and signedness.
    pub fn not(&self) -> Self {
        let bits: Vec<bool> = self.to_bits().iter().map(|b| !b).collect();
        BitInteger::from_bits(&bits, self.is_signed())
            .unwrap_or_else(|_| BitInteger::zero(1, self.is_signed()))
    }

    pub fn and(&self, other: &Self) -> Self {
        self.zip_bits(other, |a, b| a & b)
    }

    pub fn or(&self, other: &Self) -> Self {
        self.zip_bits(other, |a, b| a | b)
    }

    pub fn xor(&self, other: &Self) -> Self {
        self.zip_bits(other, |a, b| a ^ b)
    }
}

macro_rules! impl_binary_op {
    ($op:ident, $method:ident, $inherent:ident) => {
        impl std::ops::$op<&BitInteger> for &BitInteger {
            type Output = BitInteger;

            fn $method(self, rhs: &BitInteger) -> BitInteger {
                BitInteger::$inherent(self, rhs)
            }
        }

        impl std::ops::$op for BitInteger {
            type Output = BitInteger;

            fn $method(self, rhs: BitInteger) -> BitInteger {
                BitInteger::$inherent(&self, &rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, add);
impl_binary_op!(Sub, sub, sub);
impl_binary_op!(Mul, mul, mult);
impl_binary_op!(BitAnd, bitand, and);
impl_binary_op!(BitOr, bitor, or);
impl_binary_op!(BitXor, bitxor, xor);

impl std::ops::Neg for BitInteger {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.opposite()
    }
}

impl std::ops::Neg for &BitInteger {
    type Output = BitInteger;

    fn neg(self) -> Self::Output {
        self.opposite()
    }
}

impl std::ops::Not for BitInteger {
    type Output = Self;

    fn not(self) -> Self::Output {
        BitInteger::not(&self)
    }
}

impl std::ops::Shl<usize> for BitInteger {
    type Output = Self;

    fn shl(self, n: usize) -> Self::Output {
        BitInteger::shl(&self, n)
    }
}

impl std::ops::Shr<usize> for BitInteger {
    type Output = Self;

    fn shr(self, n: usize) -> Self::Output {
        BitInteger::shr(&self, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logic_mixed_widths() {
        let x = BitInteger::int(5, 8);
        let y = BitInteger::int(-431, 12);
        let z = BitInteger::int(-13, 8);
        assert_eq!(y.to_binary(), "111001010001");
        assert_eq!(z.to_binary(), "11110011");

        assert_eq!(x.or(&y).to_binary(), "111001010101");
        assert_eq!(y.and(&z).to_binary(), "000001010001");
        assert_eq!(y.xor(&z).to_binary(), "111010100010");
        assert_eq!(x.or(&y).width(), 12);
    }

    #[test]
    fn test_not() {
        assert_eq!(BitInteger::int(5, 4).not().to_binary(), "1010");
        assert_eq!((!BitInteger::int(0, 8)).to_i128(), -1);
    }

    #[test]
    fn test_operators_alias_methods() {
        let a = BitInteger::int(12, 16);
        let b = BitInteger::int(5, 16);
        assert_eq!((&a + &b).to_i128(), 17);
        assert_eq!((&a - &b).to_i128(), 7);
        assert_eq!((&a * &b).to_i128(), 60);
        assert_eq!((&a & &b).to_i128(), 4);
        assert_eq!((&a | &b).to_i128(), 13);
        assert_eq!((&a ^ &b).to_i128(), 9);
        assert_eq!((-a.clone()).to_i128(), -12);
        assert_eq!((a.clone() << 2).to_i128(), 48);
        assert_eq!((a >> 2).to_i128(), 3);
    }
}
