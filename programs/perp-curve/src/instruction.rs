use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::state::{MarketStatus, ParameterUpdate, LEDGER_SEED, POOL_SEED};

/// Instructions of the perpetual pool program.
///
/// Every trade instruction takes the same accounts:
/// 0. `[signer, writable]` Trader, pays rent when pool or ledger grow
/// 1. `[writable]` Pool PDA
/// 2. `[writable]` Ledger PDA
/// 3. `[]` Oracle feed
/// 4. `[]` System program
/// 5. Collateral accounts, native: none; token: `[writable]` trader token
///    account, `[writable]` vault, `[]` token program
/// 6. Optional base token accounts: `[writable]` base mint,
///    `[writable]` trader base token account, `[]` token program
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum PerpInstruction {
    /// Creates the pool and ledger PDAs
    /// Accounts:
    /// 0. `[signer, writable]` Creator, becomes governor and pays rent
    /// 1. `[writable]` Pool PDA `[POOL_SEED, creator]`
    /// 2. `[writable]` Ledger PDA `[LEDGER_SEED, pool]`
    /// 3. `[]` Oracle feed
    /// 4. `[]` System program
    /// 5. `[]` Collateral mint (token collateral only)
    /// 6. `[]` Vault token account owned by the pool PDA (token collateral only)
    /// 7. `[]` Base mint with the pool PDA as mint authority (optional)
    InitializePool {
        coeff: [u64; 4],
        reserve: u128,
        liquidation_per_sec: u128,
        token_collateral: bool,
        base_token: bool,
    },

    /// Packed batch, see `engine::Action`
    Execute {
        actions: Vec<u128>,
        max_pay: u128,
        min_get: u128,
        referrer: Option<Pubkey>,
    },

    OpenLong {
        size: u128,
        strike: u128,
        min_get: u128,
        referrer: Option<Pubkey>,
    },

    /// Strike 0 opens a 1x short against the base token
    OpenShort {
        size: u128,
        strike: u128,
        max_pay: u128,
        referrer: Option<Pubkey>,
    },

    CloseLong {
        size: u128,
        strike: u128,
        max_pay: u128,
        referrer: Option<Pubkey>,
    },

    CloseShort {
        size: u128,
        strike: u128,
        min_get: u128,
        referrer: Option<Pubkey>,
    },

    /// Refreshes mark, liquidations and liquidity
    /// Accounts:
    /// 0. `[writable]` Pool PDA
    /// 1. `[]` Oracle feed
    /// 2. `[writable]` Reward distributor (optional, pushes a due reward)
    /// 3. Collateral accounts for the distributor, as for trades
    Poke,

    /// Accounts:
    /// 0. `[writable]` Reward distributor
    /// 1. `[writable]` Pool PDA
    /// 2. Collateral accounts for the distributor, as for trades
    DistributeReward,

    /// Accounts:
    /// 0. `[signer, writable]` Referrer
    /// 1. `[writable]` Pool PDA
    /// 2. Collateral accounts for the referrer, as for trades
    ClaimCommission,

    /// Governance instructions take:
    /// 0. `[signer]` Governor
    /// 1. `[writable]` Pool PDA
    UpdatePoolParameters { update: ParameterUpdate },

    SetLiquidity { coeff: [u64; 4], reserve0: u128 },

    SetGovernor { governor: Pubkey },

    SetRewardDistributor { distributor: Pubkey },

    SetMarketStatus { status: MarketStatus },

    /// Drops balances of liquidated generations; anyone may call it
    /// Accounts:
    /// 0. `[]` Pool PDA
    /// 1. `[writable]` Ledger PDA
    ClearStalePositions { holders: Vec<Pubkey> },
}

impl PerpInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| ProgramError::InvalidInstructionData)
    }

    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        borsh::to_vec(self).map_err(|_| ProgramError::InvalidInstructionData)
    }
}

pub fn find_pool_address(program_id: &Pubkey, creator: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POOL_SEED, creator.as_ref()], program_id)
}

pub fn find_ledger_address(program_id: &Pubkey, pool: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[LEDGER_SEED, pool.as_ref()], program_id)
}

/// Collateral accounts appended after the fixed accounts of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollateralAccounts {
    Native,
    Token { holder_token: Pubkey, vault: Pubkey },
}

impl CollateralAccounts {
    fn append_to(&self, metas: &mut Vec<AccountMeta>) {
        match self {
            CollateralAccounts::Native => {}
            CollateralAccounts::Token { holder_token, vault } => {
                metas.push(AccountMeta::new(*holder_token, false));
                metas.push(AccountMeta::new(*vault, false));
                metas.push(AccountMeta::new_readonly(spl_token::id(), false));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseTokenAccounts {
    pub mint: Pubkey,
    pub holder_token: Pubkey,
}

/// Accounts shared by every trade instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeAccounts {
    pub trader: Pubkey,
    pub pool: Pubkey,
    pub ledger: Pubkey,
    pub oracle: Pubkey,
    pub collateral: CollateralAccounts,
    pub base_token: Option<BaseTokenAccounts>,
}

impl TradeAccounts {
    fn to_metas(self) -> Vec<AccountMeta> {
        let mut metas = vec![
            AccountMeta::new(self.trader, true),
            AccountMeta::new(self.pool, false),
            AccountMeta::new(self.ledger, false),
            AccountMeta::new_readonly(self.oracle, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ];
        self.collateral.append_to(&mut metas);
        if let Some(base) = self.base_token {
            metas.push(AccountMeta::new(base.mint, false));
            metas.push(AccountMeta::new(base.holder_token, false));
            metas.push(AccountMeta::new_readonly(spl_token::id(), false));
        }
        metas
    }
}

#[allow(clippy::too_many_arguments)]
pub fn initialize_pool(
    program_id: &Pubkey,
    creator: &Pubkey,
    oracle: &Pubkey,
    coeff: [u64; 4],
    reserve: u128,
    liquidation_per_sec: u128,
    token_collateral: Option<(Pubkey, Pubkey)>,
    base_mint: Option<Pubkey>,
) -> Result<Instruction, ProgramError> {
    let (pool, _) = find_pool_address(program_id, creator);
    let (ledger, _) = find_ledger_address(program_id, &pool);

    let mut accounts = vec![
        AccountMeta::new(*creator, true),
        AccountMeta::new(pool, false),
        AccountMeta::new(ledger, false),
        AccountMeta::new_readonly(*oracle, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    if let Some((mint, vault)) = token_collateral {
        accounts.push(AccountMeta::new_readonly(mint, false));
        accounts.push(AccountMeta::new_readonly(vault, false));
    }
    if let Some(mint) = base_mint {
        accounts.push(AccountMeta::new_readonly(mint, false));
    }

    let data = PerpInstruction::InitializePool {
        coeff,
        reserve,
        liquidation_per_sec,
        token_collateral: token_collateral.is_some(),
        base_token: base_mint.is_some(),
    }
    .pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

pub fn execute(
    program_id: &Pubkey,
    accounts: &TradeAccounts,
    actions: Vec<u128>,
    max_pay: u128,
    min_get: u128,
    referrer: Option<Pubkey>,
) -> Result<Instruction, ProgramError> {
    trade_instruction(
        program_id,
        accounts,
        PerpInstruction::Execute {
            actions,
            max_pay,
            min_get,
            referrer,
        },
    )
}

pub fn open_long(
    program_id: &Pubkey,
    accounts: &TradeAccounts,
    size: u128,
    strike: u128,
    min_get: u128,
    referrer: Option<Pubkey>,
) -> Result<Instruction, ProgramError> {
    trade_instruction(
        program_id,
        accounts,
        PerpInstruction::OpenLong {
            size,
            strike,
            min_get,
            referrer,
        },
    )
}

pub fn open_short(
    program_id: &Pubkey,
    accounts: &TradeAccounts,
    size: u128,
    strike: u128,
    max_pay: u128,
    referrer: Option<Pubkey>,
) -> Result<Instruction, ProgramError> {
    trade_instruction(
        program_id,
        accounts,
        PerpInstruction::OpenShort {
            size,
            strike,
            max_pay,
            referrer,
        },
    )
}

pub fn close_long(
    program_id: &Pubkey,
    accounts: &TradeAccounts,
    size: u128,
    strike: u128,
    max_pay: u128,
    referrer: Option<Pubkey>,
) -> Result<Instruction, ProgramError> {
    trade_instruction(
        program_id,
        accounts,
        PerpInstruction::CloseLong {
            size,
            strike,
            max_pay,
            referrer,
        },
    )
}

pub fn close_short(
    program_id: &Pubkey,
    accounts: &TradeAccounts,
    size: u128,
    strike: u128,
    min_get: u128,
    referrer: Option<Pubkey>,
) -> Result<Instruction, ProgramError> {
    trade_instruction(
        program_id,
        accounts,
        PerpInstruction::CloseShort {
            size,
            strike,
            min_get,
            referrer,
        },
    )
}

pub fn poke(
    program_id: &Pubkey,
    pool: &Pubkey,
    oracle: &Pubkey,
    reward_push: Option<(Pubkey, CollateralAccounts)>,
) -> Result<Instruction, ProgramError> {
    let mut accounts = vec![
        AccountMeta::new(*pool, false),
        AccountMeta::new_readonly(*oracle, false),
    ];
    if let Some((distributor, collateral)) = reward_push {
        accounts.push(AccountMeta::new(distributor, false));
        collateral.append_to(&mut accounts);
    }
    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: PerpInstruction::Poke.pack()?,
    })
}

pub fn distribute_reward(
    program_id: &Pubkey,
    distributor: &Pubkey,
    pool: &Pubkey,
    collateral: CollateralAccounts,
) -> Result<Instruction, ProgramError> {
    let mut accounts = vec![
        AccountMeta::new(*distributor, false),
        AccountMeta::new(*pool, false),
    ];
    collateral.append_to(&mut accounts);
    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: PerpInstruction::DistributeReward.pack()?,
    })
}

pub fn claim_commission(
    program_id: &Pubkey,
    referrer: &Pubkey,
    pool: &Pubkey,
    collateral: CollateralAccounts,
) -> Result<Instruction, ProgramError> {
    let mut accounts = vec![
        AccountMeta::new(*referrer, true),
        AccountMeta::new(*pool, false),
    ];
    collateral.append_to(&mut accounts);
    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: PerpInstruction::ClaimCommission.pack()?,
    })
}

/// Any governance instruction: `UpdatePoolParameters`, `SetLiquidity`,
/// `SetGovernor`, `SetRewardDistributor` or `SetMarketStatus`
pub fn govern(
    program_id: &Pubkey,
    governor: &Pubkey,
    pool: &Pubkey,
    instruction: PerpInstruction,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*governor, true),
            AccountMeta::new(*pool, false),
        ],
        data: instruction.pack()?,
    })
}

pub fn clear_stale_positions(
    program_id: &Pubkey,
    pool: &Pubkey,
    ledger: &Pubkey,
    holders: Vec<Pubkey>,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*pool, false),
            AccountMeta::new(*ledger, false),
        ],
        data: PerpInstruction::ClearStalePositions { holders }.pack()?,
    })
}

fn trade_instruction(
    program_id: &Pubkey,
    accounts: &TradeAccounts,
    instruction: PerpInstruction,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: accounts.to_metas(),
        data: instruction.pack()?,
    })
}
