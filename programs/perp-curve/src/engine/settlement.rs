use std::collections::BTreeMap;

use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    engine::action::{check_mixing, Action, ActionKind},
    error::PerpError,
    interfaces::{BaseToken, Collaborators, PositionLedger},
    math::{checked_add, checked_mul_u256, div_wad, mul_div, mul_wad, SignedWad, U256, WAD},
    slot::{slot_of, strike_of, Side, BASE_TOKEN_SLOT},
    state::{MarketStatus, PerpPool, COMMISSION_SHARE_PERCENT, INSURANCE_SHARE_PERCENT},
};

/// Caller-supplied context of a trade
#[derive(Debug, Clone, Copy)]
pub struct TradeContext<'a> {
    pub trader: &'a Pubkey,
    pub referrer: Option<&'a Pubkey>,
    pub now: u64,
}

/// Gross value moved by a trade; only `pay - get` or `get - pay` is transferred.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TradeReceipt {
    pub pay: u128,
    pub get: u128,
    pub fee: u128,
}

impl TradeReceipt {
    /// Positive when the trader sends value to the pool
    pub fn net(&self) -> SignedWad {
        SignedWad::difference(self.pay, self.get)
    }
}

/// Everything a batch will do once its checks pass
#[derive(Debug, Default)]
struct PendingSettlement {
    pay: u128,
    get: u128,
    raise: u128,
    lower: u128,
    burns: BTreeMap<u128, u128>,
    mints: BTreeMap<u128, u128>,
    base_burn: u128,
    base_mint: u128,
}

impl PerpPool {
    /// Runs a batch of packed actions as one trade.
    ///
    /// The pool is poked and every action validated on a staged copy. Curve
    /// moves are netted so a single integral prices the whole batch; ledger
    /// and value transfers only run after every bound held.
    pub fn execute(
        &mut self,
        ctx: &TradeContext,
        actions: &[Action],
        max_pay: u128,
        min_get: u128,
        collaborators: &mut Collaborators,
    ) -> Result<TradeReceipt, ProgramError> {
        if actions.is_empty() {
            return Err(PerpError::InvalidAction.into());
        }
        self.check_status(actions)?;
        check_mixing(actions)?;

        let oracle_price = collaborators.oracle.latest_price()?;
        let mut staged = self.clone();
        staged.refresh(ctx.now, oracle_price)?;
        let spot_before = staged.curve.spot_price()?;

        let mut pending = PendingSettlement::default();
        for action in actions {
            staged.stage_action(
                ctx.trader,
                action,
                &mut pending,
                &*collaborators.ledger,
                &*collaborators.base_token,
            )?;
        }

        let receipt = staged.settle_curve(&pending)?;
        staged.check_slippage(spot_before)?;
        if receipt.pay > max_pay {
            return Err(PerpError::MaxPayViolation.into());
        }
        if receipt.get < min_get {
            return Err(PerpError::MinGetViolation.into());
        }
        staged.split_fee(receipt.fee, ctx.referrer)?;

        staged.clear_stale_positions(ctx.trader, &mut *collaborators.ledger)?;
        for (ident, amount) in &pending.burns {
            collaborators.ledger.burn(ctx.trader, *ident, *amount)?;
        }
        if pending.base_burn > 0 {
            collaborators.base_token.burn(ctx.trader, pending.base_burn)?;
        }
        for (ident, amount) in &pending.mints {
            collaborators.ledger.mint(ctx.trader, *ident, *amount)?;
        }
        if pending.base_mint > 0 {
            collaborators.base_token.mint(ctx.trader, pending.base_mint)?;
        }

        if receipt.pay > receipt.get {
            collaborators.value.collect(ctx.trader, receipt.pay - receipt.get)?;
        } else if receipt.get > receipt.pay {
            collaborators.value.pay_out(ctx.trader, receipt.get - receipt.pay)?;
        }

        msg!(
            "Executed {} action(s): pay {}, get {}, fee {}",
            actions.len(),
            receipt.pay,
            receipt.get,
            receipt.fee
        );
        *self = staged;
        Ok(receipt)
    }

    pub fn open_long(
        &mut self,
        ctx: &TradeContext,
        size: u128,
        strike: u128,
        min_get: u128,
        collaborators: &mut Collaborators,
    ) -> Result<TradeReceipt, ProgramError> {
        let action = Action::new(ActionKind::MintLong, position_slot(strike, Side::Long)?, size)?;
        self.execute(ctx, &[action], u128::MAX, min_get, collaborators)
    }

    /// Strike 0 opens a 1x short backed by the base token.
    pub fn open_short(
        &mut self,
        ctx: &TradeContext,
        size: u128,
        strike: u128,
        max_pay: u128,
        collaborators: &mut Collaborators,
    ) -> Result<TradeReceipt, ProgramError> {
        let action = Action::new(ActionKind::MintShort, position_slot(strike, Side::Short)?, size)?;
        self.execute(ctx, &[action], max_pay, 0, collaborators)
    }

    pub fn close_long(
        &mut self,
        ctx: &TradeContext,
        size: u128,
        strike: u128,
        max_pay: u128,
        collaborators: &mut Collaborators,
    ) -> Result<TradeReceipt, ProgramError> {
        let action = Action::new(ActionKind::BurnLong, position_slot(strike, Side::Long)?, size)?;
        self.execute(ctx, &[action], max_pay, 0, collaborators)
    }

    pub fn close_short(
        &mut self,
        ctx: &TradeContext,
        size: u128,
        strike: u128,
        min_get: u128,
        collaborators: &mut Collaborators,
    ) -> Result<TradeReceipt, ProgramError> {
        let action = Action::new(ActionKind::BurnShort, position_slot(strike, Side::Short)?, size)?;
        self.execute(ctx, &[action], u128::MAX, min_get, collaborators)
    }

    /// Live size held at `strike` on `side`
    pub fn get_position(
        &self,
        holder: &Pubkey,
        strike: u128,
        side: Side,
        ledger: &dyn PositionLedger,
        base_token: &dyn BaseToken,
    ) -> Result<u128, PerpError> {
        let slot = position_slot(strike, side)?;
        if slot == BASE_TOKEN_SLOT {
            return Ok(base_token.balance_of(holder));
        }
        Ok(ledger.balance_of(holder, self.ident(slot, side.token_class())))
    }

    /// Strike at which a position of WAD `leverage` is opened at the current mark.
    ///
    /// A 1x short maps to strike 0, the base-token path.
    pub fn get_strike_from_leverage(&self, leverage: u128, side: Side) -> Result<u128, PerpError> {
        if leverage == 0 {
            return Err(PerpError::InvalidParameter);
        }
        let mark = self.mark.mark;
        let offset = div_wad(mark, leverage)?;
        match side {
            Side::Long => checked_add(mark, offset),
            Side::Short => mark.checked_sub(offset).ok_or(PerpError::InvalidParameter),
        }
    }

    fn check_status(&self, actions: &[Action]) -> Result<(), PerpError> {
        match self.status {
            MarketStatus::NoAction => Err(PerpError::TradingHalted),
            MarketStatus::NoMint if actions.iter().any(|action| action.kind.is_mint()) => {
                Err(PerpError::MintDisabled)
            }
            _ => Ok(()),
        }
    }

    fn stage_action(
        &mut self,
        trader: &Pubkey,
        action: &Action,
        pending: &mut PendingSettlement,
        ledger: &dyn PositionLedger,
        base_token: &dyn BaseToken,
    ) -> Result<(), PerpError> {
        let size = action.size;

        if action.slot == BASE_TOKEN_SLOT {
            match action.kind {
                ActionKind::MintShort => {
                    pending.base_mint = checked_add(pending.base_mint, size)?;
                    self.liquidity.total_oi = checked_add(self.liquidity.total_oi, size)?;
                }
                ActionKind::BurnShort => {
                    let burned = checked_add(pending.base_burn, size)?;
                    if base_token.balance_of(trader) < burned {
                        return Err(PerpError::InsufficientBalance);
                    }
                    pending.base_burn = burned;
                    self.liquidity.total_oi = self.liquidity.total_oi.saturating_sub(size);
                }
                _ => return Err(PerpError::InvalidStrike),
            }
        } else {
            let strike = strike_of(action.slot)?;
            let class = action.kind.token_class();
            let ident = self.ident(action.slot, class);

            if action.kind.is_mint() {
                if !self.is_safe_slot(action.slot, class) {
                    return Err(PerpError::UnsafeStrike);
                }
                let minted = pending.mints.entry(ident).or_insert(0);
                *minted = checked_add(*minted, size)?;

                let open_interest = self.open_interest_map_mut(class).entry(action.slot).or_insert(0);
                *open_interest = checked_add(*open_interest, size)?;
                self.liquidity.total_oi = checked_add(self.liquidity.total_oi, size)?;
            } else {
                let burned = checked_add(pending.burns.get(&ident).copied().unwrap_or(0), size)?;
                if ledger.balance_of(trader, ident) < burned {
                    return Err(PerpError::InsufficientBalance);
                }
                pending.burns.insert(ident, burned);

                let open_interest = self.open_interest(action.slot, class).saturating_sub(size);
                if open_interest == 0 {
                    self.open_interest_map_mut(class).remove(&action.slot);
                } else {
                    self.open_interest_map_mut(class).insert(action.slot, open_interest);
                }
                self.liquidity.total_oi = self.liquidity.total_oi.saturating_sub(size);
            }

            let notional = mul_wad(size, strike)?;
            match action.kind {
                ActionKind::MintLong | ActionKind::BurnShort => {
                    pending.pay = checked_add(pending.pay, notional)?
                }
                ActionKind::MintShort | ActionKind::BurnLong => {
                    pending.get = checked_add(pending.get, notional)?
                }
            }
        }

        self.liquidity.record_volume(size)?;
        if action.kind.raises_reserve() {
            pending.raise = checked_add(pending.raise, size)?;
        } else {
            pending.lower = checked_add(pending.lower, size)?;
        }
        Ok(())
    }

    /// Prices the net reserve move of a batch and applies it to the curve.
    fn settle_curve(&mut self, pending: &PendingSettlement) -> Result<TradeReceipt, PerpError> {
        let mut receipt = TradeReceipt {
            pay: pending.pay,
            get: pending.get,
            fee: 0,
        };

        let increasing = pending.raise >= pending.lower;
        let net = pending.raise.abs_diff(pending.lower);
        if net == 0 {
            return Ok(receipt);
        }

        let (_, amount) = self.curve.cost_to_mint(net, increasing)?;
        let value = self.mark.shift.mul_wad(net)?.offset_floor(amount)?;
        self.curve.apply_reserve_delta(net, increasing)?;

        let fee_rate = self.params.trading_fee;
        if increasing {
            let received = mul_div(value, WAD - fee_rate, WAD)?;
            receipt.fee = value - received;
            receipt.get = checked_add(receipt.get, received)?;
        } else {
            let paid = mul_div(value, WAD + fee_rate, WAD)?;
            receipt.fee = paid - value;
            receipt.pay = checked_add(receipt.pay, paid)?;
        }
        Ok(receipt)
    }

    /// Rejects trades that moved the curve spot by more than `max_slippage`
    fn check_slippage(&self, spot_before: u128) -> Result<(), PerpError> {
        let moved = self.curve.spot_price()?.abs_diff(spot_before);
        let moved_scaled = checked_mul_u256(U256::from(moved), U256::from(WAD))?;
        let ceiling = checked_mul_u256(U256::from(self.params.max_slippage), U256::from(spot_before))?;
        if moved_scaled > ceiling {
            return Err(PerpError::ExcessiveSlippage);
        }
        Ok(())
    }

    fn split_fee(&mut self, fee: u128, referrer: Option<&Pubkey>) -> Result<(), PerpError> {
        let insurance = mul_div(fee, INSURANCE_SHARE_PERCENT, 100)?;
        let commission = mul_div(fee, COMMISSION_SHARE_PERCENT, 100)?;
        let reward = fee - insurance - commission;

        self.insurance = checked_add(self.insurance, insurance)?;
        match referrer {
            Some(referrer) if commission > 0 => {
                let owed = self.commission_of.entry(*referrer).or_insert(0);
                *owed = checked_add(*owed, commission)?;
            }
            Some(_) => {}
            None => self.insurance = checked_add(self.insurance, commission)?,
        }
        self.reward = checked_add(self.reward, reward)?;
        Ok(())
    }
}

/// Slot a trader-facing strike resolves to; strike 0 is only valid on a short.
pub fn position_slot(strike: u128, side: Side) -> Result<u16, PerpError> {
    match (strike, side) {
        (0, Side::Short) => Ok(BASE_TOKEN_SLOT),
        _ => slot_of(strike),
    }
}
