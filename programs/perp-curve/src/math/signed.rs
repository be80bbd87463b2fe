use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    error::PerpError,
    math::fixed_point::{checked_add, mul_wad},
};

/// Signed WAD quantity stored as a magnitude plus an explicit sign flag.
///
/// Zero is always stored as non-negative so that equal values compare equal.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignedWad {
    pub negative: bool,
    pub magnitude: u128,
}

impl SignedWad {
    pub const ZERO: SignedWad = SignedWad {
        negative: false,
        magnitude: 0,
    };

    pub fn positive(magnitude: u128) -> Self {
        Self {
            negative: false,
            magnitude,
        }
    }

    pub fn negative(magnitude: u128) -> Self {
        Self {
            negative: magnitude != 0,
            magnitude,
        }
    }

    /// `a - b` as a signed value
    pub fn difference(a: u128, b: u128) -> Self {
        if a >= b {
            Self::positive(a - b)
        } else {
            Self::negative(b - a)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude == 0
    }

    pub fn is_negative(&self) -> bool {
        self.negative && self.magnitude != 0
    }

    pub fn neg(self) -> Self {
        if self.is_negative() {
            Self::positive(self.magnitude)
        } else {
            Self::negative(self.magnitude)
        }
    }

    pub fn checked_add(self, other: Self) -> Result<Self, PerpError> {
        if self.is_negative() == other.is_negative() {
            let magnitude = checked_add(self.magnitude, other.magnitude)?;
            return Ok(if self.is_negative() {
                Self::negative(magnitude)
            } else {
                Self::positive(magnitude)
            });
        }

        let (pos, neg) = if self.is_negative() {
            (other.magnitude, self.magnitude)
        } else {
            (self.magnitude, other.magnitude)
        };
        Ok(Self::difference(pos, neg))
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, PerpError> {
        self.checked_add(other.neg())
    }

    /// Moves the value toward zero by at most `amount` without crossing it.
    /// Returns the new value and the magnitude actually resolved.
    pub fn toward_zero(self, amount: u128) -> (Self, u128) {
        let resolved = self.magnitude.min(amount);
        let magnitude = self.magnitude - resolved;
        let value = if self.is_negative() {
            Self::negative(magnitude)
        } else {
            Self::positive(magnitude)
        };
        (value, resolved)
    }

    /// `self * factor / WAD`, keeping the sign
    pub fn mul_wad(self, factor: u128) -> Result<Self, PerpError> {
        let magnitude = mul_wad(self.magnitude, factor)?;
        Ok(if self.is_negative() {
            Self::negative(magnitude)
        } else {
            Self::positive(magnitude)
        })
    }

    /// `base + self`, floored at zero
    pub fn offset_floor(self, base: u128) -> Result<u128, PerpError> {
        if self.is_negative() {
            Ok(base.saturating_sub(self.magnitude))
        } else {
            checked_add(base, self.magnitude)
        }
    }
}
