use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    error::PerpError,
    math::{SECONDS_PER_DAY, WAD},
};

/// Share of the trading fee kept as insurance, percent
pub const INSURANCE_SHARE_PERCENT: u128 = 70;

/// Share of the trading fee owed to the referrer, percent
pub const COMMISSION_SHARE_PERCENT: u128 = 10;

/// Minimum spacing between reward pushes, seconds
pub const REWARD_INTERVAL: u64 = 3_600;

/// Trading state of the market
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    Normal,
    /// Closing only, opens are rejected
    NoMint,
    /// Every trade is rejected
    NoAction,
}

/// Governance-controlled parameters. Every rate and threshold is WAD scaled.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct PoolParams {
    /// Fee on the curve value of every trade (default: 0.25%)
    pub trading_fee: u128,

    /// Liquidation threshold relative to strike (default: 0.93)
    pub safe_threshold: u128,

    /// Per-second weight kept by the mark on each poke (default: 0.998)
    pub decay_per_second: u128,

    /// Oracle/mark ratio that triggers a shift move (default: 1.05)
    pub spot_mark_threshold: u128,

    /// Upper bound of the per-second shift rate (default: 100% a day)
    pub max_shift_change_per_second: u128,

    /// Burden resolved per second, in quote units (set at initialization)
    pub liquidation_per_sec: u128,

    /// Fast/slow OI TWAP ratio that triggers a depth change (default: 1.05)
    pub oi_change_threshold: u128,

    /// Daily volume ratio that triggers a depth change (default: 1.2)
    pub volume_change_threshold: u128,

    /// Relative coefficient change per second (default: 1% a day)
    pub liquidity_change_per_sec: u128,

    /// Per-second decay of the fast OI TWAP (default: 0.9998)
    pub small_oi_decay_per_second: u128,

    /// Per-second decay of the slow OI TWAP (default: 0.99999)
    pub large_oi_decay_per_second: u128,

    /// Cap on the elapsed time a single poke accounts for, seconds
    pub max_poke_elapsed: u64,

    /// Largest relative move of the curve spot in one trade (default: 5%)
    pub max_slippage: u128,

    pub dynamic_by_oi: bool,
    pub dynamic_by_volume: bool,
}

impl PoolParams {
    pub fn new(liquidation_per_sec: u128) -> Self {
        Self {
            trading_fee: 2_500_000_000_000_000,
            safe_threshold: 930_000_000_000_000_000,
            decay_per_second: 998_000_000_000_000_000,
            spot_mark_threshold: 1_050_000_000_000_000_000,
            max_shift_change_per_second: WAD / SECONDS_PER_DAY as u128,
            liquidation_per_sec,
            oi_change_threshold: 1_050_000_000_000_000_000,
            volume_change_threshold: 1_200_000_000_000_000_000,
            liquidity_change_per_sec: 10_000_000_000_000_000 / SECONDS_PER_DAY as u128,
            small_oi_decay_per_second: 999_800_000_000_000_000,
            large_oi_decay_per_second: 999_990_000_000_000_000,
            max_poke_elapsed: 7 * SECONDS_PER_DAY,
            max_slippage: 50_000_000_000_000_000,
            dynamic_by_oi: false,
            dynamic_by_volume: false,
        }
    }

    pub fn validate(&self) -> Result<(), PerpError> {
        if self.trading_fee >= WAD {
            return Err(PerpError::InvalidParameter);
        }
        if self.safe_threshold == 0 || self.safe_threshold > WAD {
            return Err(PerpError::InvalidParameter);
        }
        if self.decay_per_second > WAD
            || self.small_oi_decay_per_second > WAD
            || self.large_oi_decay_per_second > WAD
        {
            return Err(PerpError::InvalidParameter);
        }
        if self.spot_mark_threshold == 0
            || self.oi_change_threshold == 0
            || self.volume_change_threshold == 0
        {
            return Err(PerpError::InvalidParameter);
        }
        if self.liquidity_change_per_sec >= WAD {
            return Err(PerpError::InvalidParameter);
        }
        if self.max_slippage == 0 || self.max_poke_elapsed == 0 {
            return Err(PerpError::InvalidParameter);
        }
        Ok(())
    }

    /// Applies every field present in `update`, then validates the result.
    pub fn apply(&mut self, update: &ParameterUpdate) -> Result<(), PerpError> {
        let mut next = self.clone();

        if let Some(value) = update.trading_fee {
            next.trading_fee = value;
        }
        if let Some(value) = update.safe_threshold {
            next.safe_threshold = value;
        }
        if let Some(value) = update.decay_per_second {
            next.decay_per_second = value;
        }
        if let Some(value) = update.spot_mark_threshold {
            next.spot_mark_threshold = value;
        }
        if let Some(value) = update.max_shift_change_per_second {
            next.max_shift_change_per_second = value;
        }
        if let Some(value) = update.liquidation_per_sec {
            next.liquidation_per_sec = value;
        }
        if let Some(value) = update.oi_change_threshold {
            next.oi_change_threshold = value;
        }
        if let Some(value) = update.volume_change_threshold {
            next.volume_change_threshold = value;
        }
        if let Some(value) = update.liquidity_change_per_sec {
            next.liquidity_change_per_sec = value;
        }
        if let Some(value) = update.max_poke_elapsed {
            next.max_poke_elapsed = value;
        }
        if let Some(value) = update.max_slippage {
            next.max_slippage = value;
        }
        if let Some(value) = update.dynamic_by_oi {
            next.dynamic_by_oi = value;
        }
        if let Some(value) = update.dynamic_by_volume {
            next.dynamic_by_volume = value;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Partial update of `PoolParams`; `None` leaves a field unchanged.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterUpdate {
    pub trading_fee: Option<u128>,
    pub safe_threshold: Option<u128>,
    pub decay_per_second: Option<u128>,
    pub spot_mark_threshold: Option<u128>,
    pub max_shift_change_per_second: Option<u128>,
    pub liquidation_per_sec: Option<u128>,
    pub oi_change_threshold: Option<u128>,
    pub volume_change_threshold: Option<u128>,
    pub liquidity_change_per_sec: Option<u128>,
    pub max_poke_elapsed: Option<u64>,
    pub max_slippage: Option<u128>,
    pub dynamic_by_oi: Option<bool>,
    pub dynamic_by_volume: Option<bool>,
}
