use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    error::PerpError,
    interfaces::PositionLedger,
    math::{mul_wad, SignedWad},
    slot::{ident_of, next_generation, split_ident, strike_of, TokenClass},
    state::{safe_boundaries, PerpPool},
};

/// One bucket invalidated during a poke
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationEvent {
    pub slot: u16,
    pub class: TokenClass,
    /// Open interest of the invalidated generation
    pub size: u128,
    pub old_ident: u128,
    pub new_ident: u128,
    /// Residual position value credited to insurance
    pub forfeited: u128,
}

impl PerpPool {
    /// Refreshes the safe boundaries from the current mark and liquidates
    /// every bucket with open interest that the move pushed out of them.
    ///
    /// Only the slots between the previous and the new boundary are visited.
    pub(crate) fn sweep_liquidations(&mut self) -> Result<Vec<LiquidationEvent>, PerpError> {
        let (max_safe_long_slot, min_safe_short_slot) =
            safe_boundaries(self.mark.mark, self.params.safe_threshold)?;
        let mut events = Vec::new();

        if max_safe_long_slot < self.max_safe_long_slot {
            let crossed: Vec<u16> = self
                .long_token_oi
                .range(max_safe_long_slot + 1..=self.max_safe_long_slot)
                .map(|(slot, _)| *slot)
                .collect();
            for slot in crossed {
                events.push(self.liquidate_bucket(slot, TokenClass::LongToken)?);
            }
        }

        if min_safe_short_slot > self.min_safe_short_slot {
            let crossed: Vec<u16> = self
                .short_token_oi
                .range(self.min_safe_short_slot..min_safe_short_slot)
                .map(|(slot, _)| *slot)
                .collect();
            for slot in crossed {
                events.push(self.liquidate_bucket(slot, TokenClass::ShortToken)?);
            }
        }

        self.max_safe_long_slot = max_safe_long_slot;
        self.min_safe_short_slot = min_safe_short_slot;
        Ok(events)
    }

    /// Whether a new position may still be opened in this bucket
    pub fn is_safe_slot(&self, slot: u16, class: TokenClass) -> bool {
        match class {
            TokenClass::LongToken => slot <= self.max_safe_long_slot,
            TokenClass::ShortToken => slot >= self.min_safe_short_slot,
        }
    }

    /// Invalidates the live generation of a bucket and books its exposure
    /// as burden.
    fn liquidate_bucket(&mut self, slot: u16, class: TokenClass) -> Result<LiquidationEvent, PerpError> {
        let size = self.open_interest_map_mut(class).remove(&slot).unwrap_or(0);
        let strike = strike_of(slot)?;
        let mark = self.mark.mark;

        let offset = self.offsets_mut(class).entry(slot).or_insert(0);
        let old_offset = *offset;
        *offset = old_offset.checked_add(1).ok_or(PerpError::ArithmeticOverflow)?;
        let new_offset = *offset;
        let old_ident = ident_of(slot, class, old_offset);

        self.liquidity.total_oi = self.liquidity.total_oi.saturating_sub(size);

        let (burden_move, residual_price) = match class {
            TokenClass::ShortToken => (SignedWad::negative(size), strike.saturating_sub(mark)),
            TokenClass::LongToken => (SignedWad::positive(size), mark.saturating_sub(strike)),
        };
        self.burden = self.burden.checked_add(burden_move)?;

        let forfeited = mul_wad(size, residual_price)?;
        self.insurance = self.insurance.saturating_add(forfeited);

        msg!(
            "Liquidated slot {} {:?}: size {}, generation {} -> {}",
            slot,
            class,
            size,
            old_offset,
            new_offset
        );

        Ok(LiquidationEvent {
            slot,
            class,
            size,
            old_ident,
            new_ident: next_generation(old_ident),
            forfeited,
        })
    }

    /// Drops `holder`'s balances in liquidated generations.
    ///
    /// Those balances report as no position and cannot be burned; their
    /// residual value already went to insurance. Returns the number of
    /// entries removed.
    pub fn clear_stale_positions(
        &self,
        holder: &Pubkey,
        ledger: &mut dyn PositionLedger,
    ) -> Result<usize, ProgramError> {
        let mut cleared = 0;
        for ident in ledger.idents_of(holder) {
            let (slot, class, offset) = split_ident(ident);
            if offset < self.offset_of(slot, class) {
                let amount = ledger.forfeit(holder, ident)?;
                msg!("Cleared stale balance {} of {}: {}", ident, holder, amount);
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    /// Moves burden toward zero by at most `liquidation_per_sec * elapsed`
    /// and unwinds the resolved exposure on the curve.
    pub(crate) fn resolve_burden(&mut self, elapsed: u64) -> Result<u128, PerpError> {
        if self.burden.is_zero() || elapsed == 0 {
            return Ok(0);
        }

        let budget = self.params.liquidation_per_sec.saturating_mul(elapsed as u128);
        let lowers_reserve = self.burden.is_negative();
        let (remaining, resolved) = self.burden.toward_zero(budget);
        if resolved == 0 {
            return Ok(0);
        }

        self.curve.apply_reserve_delta(resolved, !lowers_reserve)?;
        self.burden = remaining;
        Ok(resolved)
    }
}
