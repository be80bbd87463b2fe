use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::{
    error::PerpError,
    math::{div_wad, mul_wad, SignedWad, U256},
    slot::{ident_of, slot_of, TokenClass, MAX_STRIKE},
    state::{
        config::{MarketStatus, PoolParams},
        curve::CurveState,
        liquidity::LiquidityState,
        mark::MarkState,
    },
};

/// Complete state of one perpetual pool.
///
/// Operations live in `crate::engine`; this module only holds the data and
/// read-only accessors.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct PerpPool {
    pub governor: Pubkey,
    pub reward_distributor: Pubkey,
    pub status: MarketStatus,
    pub params: PoolParams,
    pub curve: CurveState,
    pub mark: MarkState,
    pub liquidity: LiquidityState,

    /// Protocol buffer, floored at zero
    pub insurance: u128,

    /// Accrued protocol reward waiting for distribution
    pub reward: u128,

    /// Unresolved liquidated exposure; negative after long liquidations
    pub burden: SignedWad,

    pub last_reward_distribution: u64,

    /// Highest long-token slot that is still safe at the current mark
    pub max_safe_long_slot: u16,

    /// Lowest short-token slot that is still safe at the current mark
    pub min_safe_short_slot: u16,

    pub commission_of: BTreeMap<Pubkey, u128>,
    pub long_offset_of: BTreeMap<u16, u64>,
    pub short_offset_of: BTreeMap<u16, u64>,

    /// Open interest of the live long-token generation per slot
    pub long_token_oi: BTreeMap<u16, u128>,

    /// Open interest of the live short-token generation per slot
    pub short_token_oi: BTreeMap<u16, u128>,
}

impl PerpPool {
    pub fn new(
        governor: Pubkey,
        coeff: U256,
        reserve: u128,
        liquidation_per_sec: u128,
        now: u64,
    ) -> Result<Self, PerpError> {
        let params = PoolParams::new(liquidation_per_sec);
        params.validate()?;

        let curve = CurveState::new(coeff, reserve)?;
        let mark = curve.spot_price()?;
        let (max_safe_long_slot, min_safe_short_slot) = safe_boundaries(mark, params.safe_threshold)?;

        Ok(Self {
            governor,
            reward_distributor: governor,
            status: MarketStatus::Normal,
            params,
            curve,
            mark: MarkState::new(mark, now),
            liquidity: LiquidityState::new(now),
            insurance: 0,
            reward: 0,
            burden: SignedWad::ZERO,
            last_reward_distribution: 0,
            max_safe_long_slot,
            min_safe_short_slot,
            commission_of: BTreeMap::new(),
            long_offset_of: BTreeMap::new(),
            short_offset_of: BTreeMap::new(),
            long_token_oi: BTreeMap::new(),
            short_token_oi: BTreeMap::new(),
        })
    }

    pub fn coeff(&self) -> U256 {
        self.curve.coeff()
    }

    pub fn reserve(&self) -> u128 {
        self.curve.reserve
    }

    pub fn reserve0(&self) -> u128 {
        self.curve.reserve0
    }

    pub fn mark_price(&self) -> u128 {
        self.mark.mark
    }

    pub fn shift(&self) -> SignedWad {
        self.mark.shift
    }

    pub fn total_oi(&self) -> u128 {
        self.liquidity.total_oi
    }

    /// Curve spot including the shift, the price trades are quoted at
    pub fn spot_price(&self) -> Result<u128, PerpError> {
        self.mark.effective_spot(self.curve.spot_price()?)
    }

    pub fn commission(&self, referrer: &Pubkey) -> u128 {
        self.commission_of.get(referrer).copied().unwrap_or(0)
    }

    pub fn offset_of(&self, slot: u16, class: TokenClass) -> u64 {
        self.offsets(class).get(&slot).copied().unwrap_or(0)
    }

    /// Ident of the live generation of a bucket
    pub fn ident(&self, slot: u16, class: TokenClass) -> u128 {
        ident_of(slot, class, self.offset_of(slot, class))
    }

    pub fn long_ident(&self, slot: u16) -> u128 {
        self.ident(slot, TokenClass::LongToken)
    }

    pub fn short_ident(&self, slot: u16) -> u128 {
        self.ident(slot, TokenClass::ShortToken)
    }

    pub fn open_interest(&self, slot: u16, class: TokenClass) -> u128 {
        self.open_interest_map(class).get(&slot).copied().unwrap_or(0)
    }

    pub(crate) fn offsets(&self, class: TokenClass) -> &BTreeMap<u16, u64> {
        match class {
            TokenClass::LongToken => &self.long_offset_of,
            TokenClass::ShortToken => &self.short_offset_of,
        }
    }

    pub(crate) fn offsets_mut(&mut self, class: TokenClass) -> &mut BTreeMap<u16, u64> {
        match class {
            TokenClass::LongToken => &mut self.long_offset_of,
            TokenClass::ShortToken => &mut self.short_offset_of,
        }
    }

    pub(crate) fn open_interest_map(&self, class: TokenClass) -> &BTreeMap<u16, u128> {
        match class {
            TokenClass::LongToken => &self.long_token_oi,
            TokenClass::ShortToken => &self.short_token_oi,
        }
    }

    pub(crate) fn open_interest_map_mut(&mut self, class: TokenClass) -> &mut BTreeMap<u16, u128> {
        match class {
            TokenClass::LongToken => &mut self.long_token_oi,
            TokenClass::ShortToken => &mut self.short_token_oi,
        }
    }

    /// Adds `delta` to the floored insurance balance
    pub(crate) fn absorb_insurance(&mut self, delta: SignedWad) {
        self.insurance = if delta.is_negative() {
            self.insurance.saturating_sub(delta.magnitude)
        } else {
            self.insurance.saturating_add(delta.magnitude)
        };
    }
}

/// `(max_safe_long_slot, min_safe_short_slot)` for a mark price
pub fn safe_boundaries(mark: u128, safe_threshold: u128) -> Result<(u16, u16), PerpError> {
    let long_edge = mul_wad(mark, safe_threshold)?.clamp(1, MAX_STRIKE);
    let short_edge = div_wad(mark, safe_threshold)?.clamp(1, MAX_STRIKE);
    let max_safe_long_slot = slot_of(long_edge)?;
    let min_safe_short_slot = slot_of(short_edge)?
        .checked_add(1)
        .ok_or(PerpError::ArithmeticOverflow)?;
    Ok((max_safe_long_slot, min_safe_short_slot))
}
