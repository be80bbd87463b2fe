use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    error::PerpError,
    math::{checked_add, checked_mul_u256, decay_toward, U256, SECONDS_PER_DAY, WAD},
    state::config::PoolParams,
};

/// Direction in which the curve depth should move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidityTrend {
    Increase,
    Decrease,
    Hold,
}

/// Open-interest and volume trackers driving dynamic liquidity
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct LiquidityState {
    pub total_oi: u128,
    pub small_decay_twap_oi: u128,
    pub large_decay_twap_oi: u128,
    pub daily_volume: u128,
    pub prev_daily_volume: u128,
    pub last_daily_volume_update: u64,
}

impl LiquidityState {
    pub fn new(now: u64) -> Self {
        Self {
            total_oi: 0,
            small_decay_twap_oi: 0,
            large_decay_twap_oi: 0,
            daily_volume: 0,
            prev_daily_volume: 0,
            last_daily_volume_update: now,
        }
    }

    /// Moves both OI TWAPs toward the current total open interest
    pub fn update_twaps(&mut self, params: &PoolParams, elapsed: u64) -> Result<(), PerpError> {
        self.small_decay_twap_oi = decay_toward(
            self.small_decay_twap_oi,
            self.total_oi,
            params.small_oi_decay_per_second,
            elapsed,
        )?;
        self.large_decay_twap_oi = decay_toward(
            self.large_decay_twap_oi,
            self.total_oi,
            params.large_oi_decay_per_second,
            elapsed,
        )?;
        Ok(())
    }

    pub fn oi_trend(&self, params: &PoolParams) -> Result<LiquidityTrend, PerpError> {
        compare(
            self.small_decay_twap_oi,
            self.large_decay_twap_oi,
            params.oi_change_threshold,
        )
    }

    /// Volume signal, only once both epochs have traded
    pub fn volume_trend(&self, params: &PoolParams) -> Result<LiquidityTrend, PerpError> {
        if self.daily_volume == 0 || self.prev_daily_volume == 0 {
            return Ok(LiquidityTrend::Hold);
        }
        compare(
            self.daily_volume,
            self.prev_daily_volume,
            params.volume_change_threshold,
        )
    }

    /// Combined signal of the enabled trackers; disagreement holds.
    pub fn trend(&self, params: &PoolParams) -> Result<LiquidityTrend, PerpError> {
        let oi = if params.dynamic_by_oi {
            self.oi_trend(params)?
        } else {
            LiquidityTrend::Hold
        };
        let volume = if params.dynamic_by_volume {
            self.volume_trend(params)?
        } else {
            LiquidityTrend::Hold
        };

        Ok(match (oi, volume) {
            (LiquidityTrend::Hold, other) | (other, LiquidityTrend::Hold) => other,
            (a, b) if a == b => a,
            _ => LiquidityTrend::Hold,
        })
    }

    /// Starts a new volume epoch once a full day has passed
    pub fn roll_volume(&mut self, now: u64) -> bool {
        if now < self.last_daily_volume_update.saturating_add(SECONDS_PER_DAY) {
            return false;
        }
        self.prev_daily_volume = self.daily_volume;
        self.daily_volume = 0;
        self.last_daily_volume_update = now;
        true
    }

    pub fn record_volume(&mut self, size: u128) -> Result<(), PerpError> {
        self.daily_volume = checked_add(self.daily_volume, size)?;
        Ok(())
    }
}

/// `rate * coeff * elapsed / WAD`
pub fn coeff_delta(coeff: U256, rate: u128, elapsed: u64) -> Result<U256, PerpError> {
    let scaled = checked_mul_u256(coeff, U256::from(rate))?;
    let scaled = checked_mul_u256(scaled, U256::from(elapsed))?;
    Ok(scaled / U256::from(WAD))
}

fn compare(recent: u128, baseline: u128, threshold: u128) -> Result<LiquidityTrend, PerpError> {
    let recent_scaled = checked_mul_u256(U256::from(recent), U256::from(WAD))?;
    let baseline_band = checked_mul_u256(U256::from(baseline), U256::from(threshold))?;
    if recent_scaled > baseline_band {
        return Ok(LiquidityTrend::Increase);
    }

    let recent_band = checked_mul_u256(U256::from(recent), U256::from(threshold))?;
    let baseline_scaled = checked_mul_u256(U256::from(baseline), U256::from(WAD))?;
    if recent_band < baseline_scaled {
        return Ok(LiquidityTrend::Decrease);
    }

    Ok(LiquidityTrend::Hold)
}
