use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{error::PerpError, interfaces::PriceOracle, ledger::BalanceTable, state::pool::PerpPool};

pub const POOL_SEED: &[u8] = b"perp_pool";
pub const LEDGER_SEED: &[u8] = b"position_ledger";

/// Decimals the engine's WAD amounts are expressed in
pub const WAD_DECIMALS: u8 = 18;

/// Lamports carry 9 decimals
pub const NATIVE_DECIMALS: u8 = 9;

/// Free space kept after the serialized state of a pool or ledger account
pub const ACCOUNT_HEADROOM: usize = 1_024;

/// How trade value moves between traders and the pool
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollateralKind {
    /// Lamports held by the pool account itself
    Native,
    /// SPL token held in `vault`, a token account owned by the pool PDA
    Token { mint: Pubkey, vault: Pubkey, decimals: u8 },
}

impl CollateralKind {
    pub fn decimals(&self) -> u8 {
        match self {
            CollateralKind::Native => NATIVE_DECIMALS,
            CollateralKind::Token { decimals, .. } => *decimals,
        }
    }
}

/// SPL mint used for the 1x short path; the pool PDA is its mint authority
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseMint {
    pub mint: Pubkey,
    pub decimals: u8,
}

/// Pool PDA payload: `[POOL_SEED, creator]`
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct PoolAccount {
    pub is_initialized: bool,
    pub bump: u8,
    pub creator: Pubkey,
    pub ledger: Pubkey,
    pub oracle: Pubkey,
    pub collateral: CollateralKind,
    pub base_mint: Option<BaseMint>,
    pub pool: PerpPool,
}

impl PoolAccount {
    pub fn load(data: &[u8]) -> Result<Self, ProgramError> {
        if data.first() != Some(&1) {
            return Err(PerpError::NotInitialized.into());
        }
        Self::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)
    }

    pub fn store(&self, data: &mut [u8]) -> Result<(), ProgramError> {
        store_borsh(self, data)
    }
}

/// Ledger PDA payload: `[LEDGER_SEED, pool]`
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerAccount {
    pub is_initialized: bool,
    pub pool: Pubkey,
    pub table: BalanceTable,
}

impl LedgerAccount {
    pub fn new(pool: Pubkey) -> Self {
        Self {
            is_initialized: true,
            pool,
            table: BalanceTable::new(),
        }
    }

    pub fn load(data: &[u8]) -> Result<Self, ProgramError> {
        if data.first() != Some(&1) {
            return Err(PerpError::NotInitialized.into());
        }
        Self::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)
    }

    pub fn store(&self, data: &mut [u8]) -> Result<(), ProgramError> {
        store_borsh(self, data)
    }
}

/// Price account read by the pool; written by an external feed
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OracleFeed {
    /// WAD price
    pub price: u128,
}

impl OracleFeed {
    pub const LEN: usize = 16;

    pub fn load(data: &[u8]) -> Result<Self, ProgramError> {
        Self::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)
    }
}

impl PriceOracle for OracleFeed {
    fn latest_price(&self) -> Result<u128, ProgramError> {
        if self.price == 0 {
            msg!("Oracle price is zero");
            return Err(PerpError::InvalidAccount.into());
        }
        Ok(self.price)
    }
}

/// Serialized size of an account payload
pub fn packed_len<T: BorshSerialize>(value: &T) -> Result<usize, ProgramError> {
    borsh::to_vec(value)
        .map(|bytes| bytes.len())
        .map_err(|_| ProgramError::InvalidAccountData)
}

/// Account size that fits `value` with `ACCOUNT_HEADROOM` to spare
pub fn allocation_for<T: BorshSerialize>(value: &T) -> Result<usize, ProgramError> {
    packed_len(value)?
        .checked_add(ACCOUNT_HEADROOM)
        .ok_or_else(|| PerpError::ArithmeticOverflow.into())
}

/// Writes `value` at the start of `data`
pub fn store_borsh<T: BorshSerialize>(value: &T, data: &mut [u8]) -> Result<(), ProgramError> {
    let bytes = borsh::to_vec(value).map_err(|_| ProgramError::InvalidAccountData)?;
    if bytes.len() > data.len() {
        msg!("State needs {} bytes, account holds {}", bytes.len(), data.len());
        return Err(PerpError::AccountTooSmall.into());
    }
    data[..bytes.len()].copy_from_slice(&bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        interfaces::PositionLedger,
        math::{U256, WAD},
    };

    fn reference_account() -> PoolAccount {
        let coeff = U256::from(5u128) * U256::from(10u128).pow(U256::from(46u8));
        let creator = Pubkey::new_unique();
        PoolAccount {
            is_initialized: true,
            bump: 254,
            creator,
            ledger: Pubkey::new_unique(),
            oracle: Pubkey::new_unique(),
            collateral: CollateralKind::Native,
            base_mint: None,
            pool: PerpPool::new(creator, coeff, 10_000_000 * WAD, WAD, 0).unwrap(),
        }
    }

    #[test]
    fn test_pool_account_fits_and_reloads() {
        let account = reference_account();
        let mut data = vec![0u8; allocation_for(&account).unwrap()];

        account.store(&mut data).unwrap();
        assert_eq!(PoolAccount::load(&data).unwrap(), account);
    }

    #[test]
    fn test_uninitialized_accounts_are_rejected() {
        let data = vec![0u8; 64];
        assert_eq!(
            PoolAccount::load(&data),
            Err(PerpError::NotInitialized.into())
        );
        assert_eq!(
            LedgerAccount::load(&data),
            Err(PerpError::NotInitialized.into())
        );
    }

    #[test]
    fn test_ledger_overflow_is_reported() {
        let mut ledger = LedgerAccount::new(Pubkey::new_unique());
        for ident in 0..200u128 {
            ledger.table.mint(&Pubkey::new_unique(), ident, WAD).unwrap();
        }
        let mut data = vec![0u8; 1_024];
        assert_eq!(
            ledger.store(&mut data),
            Err(PerpError::AccountTooSmall.into())
        );
    }

    #[test]
    fn test_allocation_grows_with_the_table() {
        let mut ledger = LedgerAccount::new(Pubkey::new_unique());
        let empty = allocation_for(&ledger).unwrap();
        assert_eq!(empty, packed_len(&ledger).unwrap() + ACCOUNT_HEADROOM);

        // Well past what a fixed 10 KiB account used to hold
        for _ in 0..500 {
            ledger.table.mint(&Pubkey::new_unique(), 24_401, WAD).unwrap();
        }
        let needed = allocation_for(&ledger).unwrap();
        assert!(needed > 10_240 + ACCOUNT_HEADROOM);

        let mut data = vec![0u8; needed];
        ledger.store(&mut data).unwrap();
        assert_eq!(LedgerAccount::load(&data).unwrap(), ledger);
    }

    #[test]
    fn test_oracle_rejects_zero_price() {
        let feed = OracleFeed::default();
        assert!(feed.latest_price().is_err());

        let feed = OracleFeed {
            price: 500_000_000_000_000,
        };
        let data = borsh::to_vec(&feed).unwrap();
        assert_eq!(data.len(), OracleFeed::LEN);
        assert_eq!(OracleFeed::load(&data).unwrap().latest_price().unwrap(), feed.price);
    }
}
