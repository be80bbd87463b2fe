#![allow(dead_code)]

use std::collections::BTreeMap;

use perp_curve::{
    engine::{Action, PokeReport, TradeContext, TradeReceipt},
    interfaces::{BaseToken, Collaborators, PriceOracle, RewardSink, ValueTransfer},
    ledger::BalanceTable,
    math::{U256, WAD},
    slot::Side,
    state::PerpPool,
};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

pub const SPOT: u128 = 500_000_000_000_000;
pub const LONG_5X_STRIKE: u128 = 600_000_000_000_000;
pub const SHORT_5X_STRIKE: u128 = 400_000_000_000_000;
pub const LONG_13X_STRIKE: u128 = 538_461_538_461_538;
pub const SHORT_13X_STRIKE: u128 = 461_538_461_538_461;

pub fn reference_coeff() -> U256 {
    U256::from(5u128) * U256::from(10u128).pow(U256::from(46u8))
}

pub struct FixedOracle(pub u128);

impl PriceOracle for FixedOracle {
    fn latest_price(&self) -> Result<u128, ProgramError> {
        Ok(self.0)
    }
}

/// Records every value movement instead of moving anything
#[derive(Default)]
pub struct Wallet {
    pub collected: BTreeMap<Pubkey, u128>,
    pub paid: BTreeMap<Pubkey, u128>,
}

impl Wallet {
    pub fn collected_from(&self, trader: &Pubkey) -> u128 {
        self.collected.get(trader).copied().unwrap_or(0)
    }

    pub fn paid_to(&self, trader: &Pubkey) -> u128 {
        self.paid.get(trader).copied().unwrap_or(0)
    }
}

impl ValueTransfer for Wallet {
    fn collect(&mut self, from: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        *self.collected.entry(*from).or_insert(0) += amount;
        Ok(())
    }

    fn pay_out(&mut self, to: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        *self.paid.entry(*to).or_insert(0) += amount;
        Ok(())
    }
}

impl RewardSink for Wallet {
    fn receive_reward(&mut self, amount: u128) -> Result<(), ProgramError> {
        *self.paid.entry(Pubkey::default()).or_insert(0) += amount;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBaseToken {
    pub balances: BTreeMap<Pubkey, u128>,
}

impl BaseToken for MemoryBaseToken {
    fn mint(&mut self, holder: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        *self.balances.entry(*holder).or_insert(0) += amount;
        Ok(())
    }

    fn burn(&mut self, holder: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        let balance = self.balances.entry(*holder).or_insert(0);
        *balance = balance
            .checked_sub(amount)
            .ok_or(ProgramError::InsufficientFunds)?;
        Ok(())
    }

    fn balance_of(&self, holder: &Pubkey) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }
}

/// A pool wired to in-memory collaborators
pub struct Market {
    pub pool: PerpPool,
    pub ledger: BalanceTable,
    pub oracle: FixedOracle,
    pub wallet: Wallet,
    pub base: MemoryBaseToken,
}

impl Market {
    /// Reference curve: spot 0.0005, reserve 1e7, burden resolved at 0.1 per second
    pub fn new() -> Self {
        let governor = Pubkey::new_unique();
        Self {
            pool: PerpPool::new(governor, reference_coeff(), 10_000_000 * WAD, WAD / 10, 0).unwrap(),
            ledger: BalanceTable::new(),
            oracle: FixedOracle(SPOT),
            wallet: Wallet::default(),
            base: MemoryBaseToken::default(),
        }
    }

    pub fn trade<F>(
        &mut self,
        trader: &Pubkey,
        referrer: Option<&Pubkey>,
        now: u64,
        trade: F,
    ) -> Result<TradeReceipt, ProgramError>
    where
        F: FnOnce(&mut PerpPool, &TradeContext, &mut Collaborators) -> Result<TradeReceipt, ProgramError>,
    {
        let ctx = TradeContext {
            trader,
            referrer,
            now,
        };
        let mut collaborators = Collaborators {
            ledger: &mut self.ledger,
            oracle: &self.oracle,
            value: &mut self.wallet,
            base_token: &mut self.base,
        };
        trade(&mut self.pool, &ctx, &mut collaborators)
    }

    pub fn execute(
        &mut self,
        trader: &Pubkey,
        now: u64,
        actions: &[Action],
        max_pay: u128,
        min_get: u128,
    ) -> Result<TradeReceipt, ProgramError> {
        self.trade(trader, None, now, |pool, ctx, collaborators| {
            pool.execute(ctx, actions, max_pay, min_get, collaborators)
        })
    }

    pub fn open_long(&mut self, trader: &Pubkey, now: u64, size: u128, strike: u128) -> Result<TradeReceipt, ProgramError> {
        self.trade(trader, None, now, |pool, ctx, collaborators| {
            pool.open_long(ctx, size, strike, 0, collaborators)
        })
    }

    pub fn open_short(&mut self, trader: &Pubkey, now: u64, size: u128, strike: u128) -> Result<TradeReceipt, ProgramError> {
        self.trade(trader, None, now, |pool, ctx, collaborators| {
            pool.open_short(ctx, size, strike, u128::MAX, collaborators)
        })
    }

    pub fn close_long(&mut self, trader: &Pubkey, now: u64, size: u128, strike: u128) -> Result<TradeReceipt, ProgramError> {
        self.trade(trader, None, now, |pool, ctx, collaborators| {
            pool.close_long(ctx, size, strike, u128::MAX, collaborators)
        })
    }

    pub fn close_short(&mut self, trader: &Pubkey, now: u64, size: u128, strike: u128) -> Result<TradeReceipt, ProgramError> {
        self.trade(trader, None, now, |pool, ctx, collaborators| {
            pool.close_short(ctx, size, strike, 0, collaborators)
        })
    }

    pub fn poke(&mut self, now: u64) -> Result<PokeReport, ProgramError> {
        self.pool.poke(now, &self.oracle)
    }

    pub fn position(&self, holder: &Pubkey, strike: u128, side: Side) -> u128 {
        self.pool
            .get_position(holder, strike, side, &self.ledger, &self.base)
            .unwrap()
    }
}
