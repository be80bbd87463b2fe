use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    error::PerpError,
    math::{checked_mul_u256, decay_toward, div_wad, mul_wad, SignedWad, SECONDS_PER_DAY, U256, WAD},
    state::config::PoolParams,
};

/// Smoothed mark price and the funding-like shift applied to trade prices
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct MarkState {
    pub mark: u128,
    pub shift: SignedWad,
    pub last_poke: u64,
}

impl MarkState {
    pub fn new(mark: u128, now: u64) -> Self {
        Self {
            mark,
            shift: SignedWad::ZERO,
            last_poke: now,
        }
    }

    /// Seconds a poke at `now` accounts for, capped by `max_poke_elapsed`
    pub fn elapsed(&self, now: u64, max_poke_elapsed: u64) -> u64 {
        now.saturating_sub(self.last_poke).min(max_poke_elapsed)
    }

    /// Curve spot adjusted by the shift, never below one unit
    pub fn effective_spot(&self, curve_spot: u128) -> Result<u128, PerpError> {
        Ok(self.shift.offset_floor(curve_spot)?.max(1))
    }

    /// Shift after `elapsed` seconds with the oracle at `oracle_price`.
    ///
    /// Moves only while oracle and mark diverge by more than
    /// `spot_mark_threshold`; there is no decay back toward zero.
    pub fn next_shift(
        &self,
        params: &PoolParams,
        oracle_price: u128,
        elapsed: u64,
    ) -> Result<SignedWad, PerpError> {
        if oracle_price == 0 || elapsed == 0 {
            return Ok(self.shift);
        }

        let oracle_scaled = checked_mul_u256(U256::from(oracle_price), U256::from(WAD))?;
        let mark_scaled = checked_mul_u256(U256::from(self.mark), U256::from(WAD))?;
        let mark_band = checked_mul_u256(U256::from(self.mark), U256::from(params.spot_mark_threshold))?;
        let oracle_band =
            checked_mul_u256(U256::from(oracle_price), U256::from(params.spot_mark_threshold))?;

        let oracle_above = oracle_scaled > mark_band;
        let oracle_below = oracle_band < mark_scaled;
        if !oracle_above && !oracle_below {
            return Ok(self.shift);
        }

        let divergence = if oracle_price > self.mark {
            oracle_price - self.mark
        } else {
            self.mark - oracle_price
        };
        let rate = (div_wad(divergence, oracle_price)? / SECONDS_PER_DAY as u128)
            .min(params.max_shift_change_per_second);
        let step = mul_wad(rate, self.mark)?
            .checked_mul(elapsed as u128)
            .ok_or(PerpError::ArithmeticOverflow)?;

        let step = if oracle_above {
            SignedWad::positive(step)
        } else {
            SignedWad::negative(step)
        };
        self.shift.checked_add(step)
    }

    /// State after `elapsed` seconds: shift first, then the mark decays
    /// toward `curve_spot + shift`. `last_poke` is left to the caller.
    pub fn advance(
        &self,
        params: &PoolParams,
        elapsed: u64,
        curve_spot: u128,
        oracle_price: u128,
    ) -> Result<MarkState, PerpError> {
        if elapsed == 0 {
            return Ok(self.clone());
        }

        let mut next = self.clone();
        next.shift = self.next_shift(params, oracle_price, elapsed)?;
        let target = next.effective_spot(curve_spot)?;
        next.mark = decay_toward(self.mark, target, params.decay_per_second, elapsed)?.max(1);
        Ok(next)
    }
}
