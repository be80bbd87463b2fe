//! Strike bucketing and position-token identifiers
//!
//! Strikes are WAD prices. Each decade is split into 900 slots, which keeps
//! the slot index below 2^15 for every strike up to `MAX_STRIKE`.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::PerpError;

/// Largest strike that still maps below `MAX_SLOT`
pub const MAX_STRIKE: u128 = 10u128.pow(37) - 1;

/// Slot reserved for the 1x short path (strike 0, base token instead of ident)
pub const BASE_TOKEN_SLOT: u16 = 800;

/// Slots below this value are never produced by `slot_of`
pub const MIN_SLOT: u16 = 800;

pub const MAX_SLOT: u16 = 32_767;

const SLOTS_PER_DECADE: u128 = 900;
const LINEAR_REGION_END: u128 = 100;

/// Trader-facing direction of a position
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

/// Token class recorded on the position ledger.
///
/// Opening a long mints the short token (what the pool would need to unwind
/// the exposure) and opening a short mints the long token.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TokenClass {
    LongToken = 0,
    ShortToken = 1,
}

impl Side {
    pub fn token_class(self) -> TokenClass {
        match self {
            Side::Long => TokenClass::ShortToken,
            Side::Short => TokenClass::LongToken,
        }
    }
}

impl TokenClass {
    pub fn bit(self) -> u128 {
        self as u128
    }
}

/// Maps a strike to its slot.
pub fn slot_of(strike: u128) -> Result<u16, PerpError> {
    if strike == 0 || strike > MAX_STRIKE {
        return Err(PerpError::InvalidStrike);
    }

    if strike < LINEAR_REGION_END {
        return Ok((strike + 800) as u16);
    }

    let mut remaining = strike;
    let mut magnitude: u128 = 1;
    while remaining >= 1000 {
        magnitude += 1;
        remaining /= 10;
    }

    let slot = SLOTS_PER_DECADE * magnitude + remaining - LINEAR_REGION_END;
    u16::try_from(slot).map_err(|_| PerpError::InvalidStrike)
}

/// Representative strike of a slot, the smallest strike mapping to it.
pub fn strike_of(slot: u16) -> Result<u128, PerpError> {
    if slot < MIN_SLOT || slot > MAX_SLOT {
        return Err(PerpError::InvalidStrike);
    }

    let slot = slot as u128;
    if slot < SLOTS_PER_DECADE {
        return Ok(slot - 800);
    }

    let magnitude = (slot / SLOTS_PER_DECADE) as u32;
    let mantissa = slot % SLOTS_PER_DECADE + LINEAR_REGION_END;
    10u128
        .checked_pow(magnitude - 1)
        .and_then(|scale| mantissa.checked_mul(scale))
        .filter(|strike| *strike <= MAX_STRIKE)
        .ok_or(PerpError::InvalidStrike)
}

/// Packs `(offset << 16) | (slot << 1) | class` into a ledger ident.
pub fn ident_of(slot: u16, class: TokenClass, offset: u64) -> u128 {
    ((offset as u128) << 16) | ((slot as u128) << 1) | class.bit()
}

/// Ident of the same bucket one generation later
pub fn next_generation(ident: u128) -> u128 {
    ident + (1 << 16)
}

/// Inverse of `ident_of`: `(slot, class, offset)`
pub fn split_ident(ident: u128) -> (u16, TokenClass, u64) {
    let slot = ((ident >> 1) & 0x7fff) as u16;
    let class = if ident & 1 == 1 {
        TokenClass::ShortToken
    } else {
        TokenClass::LongToken
    };
    (slot, class, (ident >> 16) as u64)
}
