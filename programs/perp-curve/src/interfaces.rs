//! Collaborators the pool drives during a trade.
//!
//! The engine never moves value or balances itself; it validates, then calls
//! through these traits. The program supplies account-backed implementations
//! and tests supply in-memory ones.

use solana_program::{program_error::ProgramError, pubkey::Pubkey};

/// Sparse multi-asset balance table keyed by `(holder, ident)`
pub trait PositionLedger {
    fn mint(&mut self, holder: &Pubkey, ident: u128, amount: u128) -> Result<(), ProgramError>;

    fn burn(&mut self, holder: &Pubkey, ident: u128, amount: u128) -> Result<(), ProgramError>;

    fn balance_of(&self, holder: &Pubkey, ident: u128) -> u128;

    fn transfer(
        &mut self,
        from: &Pubkey,
        to: &Pubkey,
        ident: u128,
        amount: u128,
    ) -> Result<(), ProgramError>;

    /// Every ident `holder` has a nonzero balance of
    fn idents_of(&self, holder: &Pubkey) -> Vec<u128>;

    /// Drops the whole balance of `holder` in `ident`, returning it
    fn forfeit(&mut self, holder: &Pubkey, ident: u128) -> Result<u128, ProgramError>;
}

/// External spot price in WAD
pub trait PriceOracle {
    fn latest_price(&self) -> Result<u128, ProgramError>;
}

/// Moves collateral between traders and the pool vault.
///
/// Native and token collateral are two implementations of this trait.
pub trait ValueTransfer {
    /// Pulls `amount` from `from` into the pool
    fn collect(&mut self, from: &Pubkey, amount: u128) -> Result<(), ProgramError>;

    /// Sends `amount` from the pool to `to`
    fn pay_out(&mut self, to: &Pubkey, amount: u128) -> Result<(), ProgramError>;
}

/// Receiver of accrued protocol rewards
pub trait RewardSink {
    fn receive_reward(&mut self, amount: u128) -> Result<(), ProgramError>;
}

/// Base token minted for 1x shorts
pub trait BaseToken {
    fn mint(&mut self, holder: &Pubkey, amount: u128) -> Result<(), ProgramError>;

    fn burn(&mut self, holder: &Pubkey, amount: u128) -> Result<(), ProgramError>;

    fn balance_of(&self, holder: &Pubkey) -> u128;
}

/// Everything a trade touches outside the pool state
pub struct Collaborators<'a> {
    pub ledger: &'a mut dyn PositionLedger,
    pub oracle: &'a dyn PriceOracle,
    pub value: &'a mut dyn ValueTransfer,
    pub base_token: &'a mut dyn BaseToken,
}
