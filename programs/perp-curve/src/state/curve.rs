use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::msg;

use crate::{
    error::PerpError,
    math::{checked_add, checked_div_u256, checked_mul_u256, narrow, wad_u256, SignedWad, U256},
};

/// Virtual constant-product curve.
///
/// `coeff` is double scaled (1e36) so that `coeff * WAD / reserve^2` is the
/// spot price in WAD.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct CurveState {
    /// Little-endian limbs of the 256-bit coefficient
    coeff: [u64; 4],

    /// Virtual quote reserve, WAD
    pub reserve: u128,

    /// Reserve with no outstanding positions, WAD
    pub reserve0: u128,

    /// `coeff / reserve` at initialization, WAD, informational
    pub base_reserve: u128,
}

impl CurveState {
    pub fn new(coeff: U256, reserve: u128) -> Result<Self, PerpError> {
        if coeff.is_zero() || reserve == 0 {
            return Err(PerpError::InvalidParameter);
        }

        let base_reserve = narrow(checked_div_u256(coeff, U256::from(reserve))?)?;

        let curve = Self {
            coeff: coeff.0,
            reserve,
            reserve0: reserve,
            base_reserve,
        };
        // Fails early if the curve cannot price at all.
        curve.spot_price()?;
        Ok(curve)
    }

    pub fn coeff(&self) -> U256 {
        U256(self.coeff)
    }

    /// `coeff * WAD / reserve^2`
    pub fn spot_price(&self) -> Result<u128, PerpError> {
        let reserve = U256::from(self.reserve);
        let numerator = checked_mul_u256(self.coeff(), wad_u256())?;
        narrow(checked_div_u256(numerator, reserve * reserve)?)
    }

    /// `coeff / reserve`, the base-asset value of the curve at a reserve level
    pub fn base_value(&self, reserve: u128) -> Result<u128, PerpError> {
        narrow(checked_div_u256(self.coeff(), U256::from(reserve))?)
    }

    /// Quote amount for moving the reserve by `size`.
    ///
    /// Returns the reserve after the move and `|coeff/r_before - coeff/r_after|`.
    pub fn cost_to_mint(&self, size: u128, increasing: bool) -> Result<(u128, u128), PerpError> {
        let after = self.reserve_after(size, increasing)?;
        let before_value = self.base_value(self.reserve)?;
        let after_value = self.base_value(after)?;

        let amount = if increasing {
            before_value - after_value
        } else {
            after_value - before_value
        };
        Ok((after, amount))
    }

    pub fn apply_reserve_delta(&mut self, delta: u128, increasing: bool) -> Result<(), PerpError> {
        self.reserve = self.reserve_after(delta, increasing)?;
        Ok(())
    }

    /// Reserve that keeps the spot price unchanged under `new_coeff`
    pub fn rebased_reserve(&self, new_coeff: U256) -> Result<u128, PerpError> {
        let spot = self.spot_price()?;
        let scaled = checked_mul_u256(new_coeff, wad_u256())?;
        let reserve = narrow(checked_div_u256(scaled, U256::from(spot))?.integer_sqrt())?;
        if reserve == 0 {
            return Err(PerpError::CurveExhausted);
        }
        Ok(reserve)
    }

    /// Changes the curve depth at constant spot price.
    ///
    /// Returns `(new_coeff/new_reserve - new_coeff/new_reserve0) -
    /// (coeff/reserve - coeff/reserve0)`; the caller subtracts it from
    /// insurance.
    pub fn rebase(&mut self, new_coeff: U256, new_reserve0: u128) -> Result<SignedWad, PerpError> {
        if new_coeff.is_zero() || new_reserve0 == 0 {
            return Err(PerpError::InvalidParameter);
        }

        let new_reserve = self.rebased_reserve(new_coeff)?;
        let previous = SignedWad::difference(
            self.base_value(self.reserve)?,
            self.base_value(self.reserve0)?,
        );

        let mut next = self.clone();
        next.coeff = new_coeff.0;
        next.reserve = new_reserve;
        next.reserve0 = new_reserve0;
        let current = SignedWad::difference(
            next.base_value(next.reserve)?,
            next.base_value(next.reserve0)?,
        );
        let insurance_delta = current.checked_sub(previous)?;

        msg!(
            "Curve rebased: reserve {} -> {}, reserve0 {} -> {}",
            self.reserve,
            next.reserve,
            self.reserve0,
            next.reserve0
        );
        *self = next;
        Ok(insurance_delta)
    }

    fn reserve_after(&self, size: u128, increasing: bool) -> Result<u128, PerpError> {
        if increasing {
            checked_add(self.reserve, size)
        } else if size >= self.reserve {
            Err(PerpError::CurveExhausted)
        } else {
            Ok(self.reserve - size)
        }
    }
}
