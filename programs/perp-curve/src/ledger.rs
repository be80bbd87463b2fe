use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::{error::PerpError, interfaces::PositionLedger};

/// Position-token balances, stored in the ledger account of a pool.
///
/// Zero balances are removed so the table only grows with live positions.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceTable {
    pub balances: BTreeMap<(Pubkey, u128), u128>,
    pub supply: BTreeMap<u128, u128>,
}

impl BalanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(&self, ident: u128) -> u128 {
        self.supply.get(&ident).copied().unwrap_or(0)
    }

    fn credit(&mut self, holder: &Pubkey, ident: u128, amount: u128) -> Result<(), PerpError> {
        let balance = self.balances.entry((*holder, ident)).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(PerpError::ArithmeticOverflow)?;
        Ok(())
    }

    fn debit(&mut self, holder: &Pubkey, ident: u128, amount: u128) -> Result<(), PerpError> {
        let key = (*holder, ident);
        let balance = self.balances.get(&key).copied().unwrap_or(0);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(PerpError::InsufficientBalance)?;
        if remaining == 0 {
            self.balances.remove(&key);
        } else {
            self.balances.insert(key, remaining);
        }
        Ok(())
    }
}

impl PositionLedger for BalanceTable {
    fn mint(&mut self, holder: &Pubkey, ident: u128, amount: u128) -> Result<(), ProgramError> {
        if amount == 0 {
            return Ok(());
        }
        let supply = self.total_supply(ident)
            .checked_add(amount)
            .ok_or(PerpError::ArithmeticOverflow)?;
        self.credit(holder, ident, amount)?;
        self.supply.insert(ident, supply);
        Ok(())
    }

    fn burn(&mut self, holder: &Pubkey, ident: u128, amount: u128) -> Result<(), ProgramError> {
        if amount == 0 {
            return Ok(());
        }
        self.debit(holder, ident, amount)?;
        let supply = self.total_supply(ident).saturating_sub(amount);
        if supply == 0 {
            self.supply.remove(&ident);
        } else {
            self.supply.insert(ident, supply);
        }
        Ok(())
    }

    fn balance_of(&self, holder: &Pubkey, ident: u128) -> u128 {
        self.balances.get(&(*holder, ident)).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        from: &Pubkey,
        to: &Pubkey,
        ident: u128,
        amount: u128,
    ) -> Result<(), ProgramError> {
        if amount == 0 || from == to {
            return Ok(());
        }
        self.debit(from, ident, amount)?;
        self.credit(to, ident, amount)?;
        Ok(())
    }

    fn idents_of(&self, holder: &Pubkey) -> Vec<u128> {
        self.balances
            .range((*holder, 0)..=(*holder, u128::MAX))
            .map(|((_, ident), _)| *ident)
            .collect()
    }

    fn forfeit(&mut self, holder: &Pubkey, ident: u128) -> Result<u128, ProgramError> {
        let amount = self.balance_of(holder, ident);
        self.burn(holder, ident, amount)?;
        Ok(amount)
    }
}
