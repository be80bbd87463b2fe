use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::{ProgramResult, MAX_PERMITTED_DATA_INCREASE},
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_option::COption,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, system_program,
    sysvar::Sysvar,
};
use spl_token::{
    instruction as token_instruction,
    state::{Account as TokenAccount, Mint},
};

use crate::{
    engine::{Action, GovernanceAction, TradeContext, TradeReceipt},
    error::PerpError,
    instruction::{find_ledger_address, find_pool_address, PerpInstruction},
    interfaces::{BaseToken, Collaborators, PriceOracle, RewardSink, ValueTransfer},
    math::U256,
    state::{
        allocation_for, packed_len, store_borsh, BaseMint, CollateralKind, LedgerAccount,
        OracleFeed, PerpPool, PoolAccount, ACCOUNT_HEADROOM, LEDGER_SEED, POOL_SEED,
        WAD_DECIMALS,
    },
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = PerpInstruction::unpack(instruction_data)?;

        match instruction {
            PerpInstruction::InitializePool {
                coeff,
                reserve,
                liquidation_per_sec,
                token_collateral,
                base_token,
            } => {
                msg!("Instruction: InitializePool");
                Self::process_initialize_pool(
                    accounts,
                    program_id,
                    U256(coeff),
                    reserve,
                    liquidation_per_sec,
                    token_collateral,
                    base_token,
                )
            }
            PerpInstruction::Execute {
                actions,
                max_pay,
                min_get,
                referrer,
            } => {
                msg!("Instruction: Execute");
                let actions = actions
                    .into_iter()
                    .map(Action::unpack)
                    .collect::<Result<Vec<_>, _>>()?;
                Self::process_trade(accounts, program_id, referrer, |pool, ctx, collaborators| {
                    pool.execute(ctx, &actions, max_pay, min_get, collaborators)
                })
            }
            PerpInstruction::OpenLong {
                size,
                strike,
                min_get,
                referrer,
            } => {
                msg!("Instruction: OpenLong");
                Self::process_trade(accounts, program_id, referrer, |pool, ctx, collaborators| {
                    pool.open_long(ctx, size, strike, min_get, collaborators)
                })
            }
            PerpInstruction::OpenShort {
                size,
                strike,
                max_pay,
                referrer,
            } => {
                msg!("Instruction: OpenShort");
                Self::process_trade(accounts, program_id, referrer, |pool, ctx, collaborators| {
                    pool.open_short(ctx, size, strike, max_pay, collaborators)
                })
            }
            PerpInstruction::CloseLong {
                size,
                strike,
                max_pay,
                referrer,
            } => {
                msg!("Instruction: CloseLong");
                Self::process_trade(accounts, program_id, referrer, |pool, ctx, collaborators| {
                    pool.close_long(ctx, size, strike, max_pay, collaborators)
                })
            }
            PerpInstruction::CloseShort {
                size,
                strike,
                min_get,
                referrer,
            } => {
                msg!("Instruction: CloseShort");
                Self::process_trade(accounts, program_id, referrer, |pool, ctx, collaborators| {
                    pool.close_short(ctx, size, strike, min_get, collaborators)
                })
            }
            PerpInstruction::Poke => {
                msg!("Instruction: Poke");
                Self::process_poke(accounts, program_id)
            }
            PerpInstruction::DistributeReward => {
                msg!("Instruction: DistributeReward");
                Self::process_distribute_reward(accounts, program_id)
            }
            PerpInstruction::ClaimCommission => {
                msg!("Instruction: ClaimCommission");
                Self::process_claim_commission(accounts, program_id)
            }
            PerpInstruction::UpdatePoolParameters { update } => {
                msg!("Instruction: UpdatePoolParameters");
                Self::process_govern(accounts, program_id, GovernanceAction::UpdateParameters(update))
            }
            PerpInstruction::SetLiquidity { coeff, reserve0 } => {
                msg!("Instruction: SetLiquidity");
                Self::process_govern(
                    accounts,
                    program_id,
                    GovernanceAction::SetLiquidity { coeff, reserve0 },
                )
            }
            PerpInstruction::SetGovernor { governor } => {
                msg!("Instruction: SetGovernor");
                Self::process_govern(accounts, program_id, GovernanceAction::SetGovernor(governor))
            }
            PerpInstruction::SetRewardDistributor { distributor } => {
                msg!("Instruction: SetRewardDistributor");
                Self::process_govern(
                    accounts,
                    program_id,
                    GovernanceAction::SetRewardDistributor(distributor),
                )
            }
            PerpInstruction::SetMarketStatus { status } => {
                msg!("Instruction: SetMarketStatus");
                Self::process_govern(accounts, program_id, GovernanceAction::SetMarketStatus(status))
            }
            PerpInstruction::ClearStalePositions { holders } => {
                msg!("Instruction: ClearStalePositions");
                Self::process_clear_stale_positions(accounts, program_id, &holders)
            }
        }
    }

    fn process_initialize_pool(
        accounts: &[AccountInfo],
        program_id: &Pubkey,
        coeff: U256,
        reserve: u128,
        liquidation_per_sec: u128,
        token_collateral: bool,
        base_token: bool,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let creator_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;
        let ledger_info = next_account_info(account_info_iter)?;
        let oracle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !creator_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        if *system_program_info.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }

        let (pool_key, pool_bump) = find_pool_address(program_id, creator_info.key);
        if pool_key != *pool_info.key {
            return Err(PerpError::InvalidPda.into());
        }
        let (ledger_key, ledger_bump) = find_ledger_address(program_id, &pool_key);
        if ledger_key != *ledger_info.key {
            return Err(PerpError::InvalidPda.into());
        }
        if !pool_info.data_is_empty() {
            return Err(PerpError::AlreadyInitialized.into());
        }

        // Oracle must already carry a price
        OracleFeed::load(&oracle_info.try_borrow_data()?)?.latest_price()?;

        let collateral = if token_collateral {
            let mint_info = next_account_info(account_info_iter)?;
            let vault_info = next_account_info(account_info_iter)?;
            let mint = Mint::unpack(&mint_info.try_borrow_data()?)?;
            let vault = TokenAccount::unpack(&vault_info.try_borrow_data()?)?;
            if vault.mint != *mint_info.key || vault.owner != pool_key {
                msg!("Vault must hold the collateral mint and belong to the pool");
                return Err(PerpError::InvalidAccount.into());
            }
            value_scale(mint.decimals)?;
            CollateralKind::Token {
                mint: *mint_info.key,
                vault: *vault_info.key,
                decimals: mint.decimals,
            }
        } else {
            CollateralKind::Native
        };

        let base_mint = if base_token {
            let mint_info = next_account_info(account_info_iter)?;
            let mint = Mint::unpack(&mint_info.try_borrow_data()?)?;
            if mint.mint_authority != COption::Some(pool_key) {
                msg!("Base mint authority must be the pool");
                return Err(PerpError::InvalidAccount.into());
            }
            value_scale(mint.decimals)?;
            Some(BaseMint {
                mint: *mint_info.key,
                decimals: mint.decimals,
            })
        } else {
            None
        };

        let now = current_time()?;
        let pool = PerpPool::new(*creator_info.key, coeff, reserve, liquidation_per_sec, now)?;
        let spot = pool.spot_price()?;
        let account = PoolAccount {
            is_initialized: true,
            bump: pool_bump,
            creator: *creator_info.key,
            ledger: ledger_key,
            oracle: *oracle_info.key,
            collateral,
            base_mint,
            pool,
        };
        let ledger = LedgerAccount::new(pool_key);

        create_pda(
            creator_info,
            pool_info,
            system_program_info,
            program_id,
            allocation_for(&account)?,
            &[POOL_SEED, creator_info.key.as_ref(), &[pool_bump]],
        )?;
        create_pda(
            creator_info,
            ledger_info,
            system_program_info,
            program_id,
            allocation_for(&ledger)?,
            &[LEDGER_SEED, pool_key.as_ref(), &[ledger_bump]],
        )?;

        account.store(&mut pool_info.try_borrow_mut_data()?)?;
        ledger.store(&mut ledger_info.try_borrow_mut_data()?)?;

        msg!("Pool initialized: reserve {}, spot {}", reserve, spot);
        Ok(())
    }

    fn process_trade<F>(
        accounts: &[AccountInfo],
        program_id: &Pubkey,
        referrer: Option<Pubkey>,
        trade: F,
    ) -> ProgramResult
    where
        F: FnOnce(&mut PerpPool, &TradeContext, &mut Collaborators) -> Result<TradeReceipt, ProgramError>,
    {
        let account_info_iter = &mut accounts.iter();
        let trader_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;
        let ledger_info = next_account_info(account_info_iter)?;
        let oracle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !trader_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        if *system_program_info.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }

        let mut pool_account = load_pool(pool_info, program_id)?;
        let mut ledger = load_ledger(&pool_account, pool_info, ledger_info, program_id)?;
        let oracle = load_oracle(&pool_account, oracle_info)?;

        let signer = PoolSigner::new(&pool_account);
        let mut value = CollateralVault::from_accounts(
            &pool_account.collateral,
            pool_info,
            trader_info,
            Some(system_program_info),
            account_info_iter,
            &signer,
        )?;
        let mut base_token = match next_account_info(account_info_iter) {
            Ok(mint_info) => BaseTokenAccounts::Spl(SplBaseToken::from_accounts(
                pool_account.base_mint,
                pool_info,
                trader_info,
                mint_info,
                account_info_iter,
                &signer,
            )?),
            Err(_) => BaseTokenAccounts::Missing,
        };

        let now = current_time()?;
        let ctx = TradeContext {
            trader: trader_info.key,
            referrer: referrer.as_ref(),
            now,
        };
        let mut collaborators = Collaborators {
            ledger: &mut ledger.table,
            oracle: &oracle,
            value: &mut value,
            base_token: &mut base_token,
        };
        trade(&mut pool_account.pool, &ctx, &mut collaborators)?;

        store_growing(&pool_account, pool_info, trader_info, system_program_info)?;
        store_growing(&ledger, ledger_info, trader_info, system_program_info)?;
        Ok(())
    }

    fn process_poke(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let pool_info = next_account_info(account_info_iter)?;
        let oracle_info = next_account_info(account_info_iter)?;

        let mut pool_account = load_pool(pool_info, program_id)?;
        let oracle = load_oracle(&pool_account, oracle_info)?;
        let now = current_time()?;

        let report = pool_account.pool.poke(now, &oracle)?;
        msg!(
            "Poked after {}s: mark {}, {} liquidation(s)",
            report.elapsed,
            report.mark,
            report.liquidations.len()
        );

        if let Ok(distributor_info) = next_account_info(account_info_iter) {
            Self::push_reward(&mut pool_account, pool_info, distributor_info, account_info_iter, now)?;
        }

        pool_account.store(&mut pool_info.try_borrow_mut_data()?)?;
        Ok(())
    }

    fn process_distribute_reward(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let distributor_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;

        let mut pool_account = load_pool(pool_info, program_id)?;
        let now = current_time()?;
        Self::push_reward(&mut pool_account, pool_info, distributor_info, account_info_iter, now)?;

        pool_account.store(&mut pool_info.try_borrow_mut_data()?)?;
        Ok(())
    }

    fn push_reward<'a, 'b>(
        pool_account: &mut PoolAccount,
        pool_info: &'b AccountInfo<'a>,
        distributor_info: &'b AccountInfo<'a>,
        account_info_iter: &mut std::slice::Iter<'b, AccountInfo<'a>>,
        now: u64,
    ) -> ProgramResult {
        if *distributor_info.key != pool_account.pool.reward_distributor {
            msg!("Reward distributor mismatch");
            return Err(PerpError::InvalidAccount.into());
        }

        let signer = PoolSigner::new(pool_account);
        let mut value = CollateralVault::from_accounts(
            &pool_account.collateral,
            pool_info,
            distributor_info,
            None,
            account_info_iter,
            &signer,
        )?;
        let mut sink = DistributorPayout {
            value: &mut value,
            distributor: *distributor_info.key,
        };
        pool_account.pool.distribute_reward(now, &mut sink)?;
        Ok(())
    }

    fn process_claim_commission(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let referrer_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;

        if !referrer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut pool_account = load_pool(pool_info, program_id)?;
        let signer = PoolSigner::new(&pool_account);
        let mut value = CollateralVault::from_accounts(
            &pool_account.collateral,
            pool_info,
            referrer_info,
            None,
            account_info_iter,
            &signer,
        )?;
        pool_account.pool.claim_commission(referrer_info.key, &mut value)?;

        pool_account.store(&mut pool_info.try_borrow_mut_data()?)?;
        Ok(())
    }

    fn process_clear_stale_positions(
        accounts: &[AccountInfo],
        program_id: &Pubkey,
        holders: &[Pubkey],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let pool_info = next_account_info(account_info_iter)?;
        let ledger_info = next_account_info(account_info_iter)?;

        let pool_account = load_pool(pool_info, program_id)?;
        let mut ledger = load_ledger(&pool_account, pool_info, ledger_info, program_id)?;

        let mut cleared = 0;
        for holder in holders {
            cleared += pool_account.pool.clear_stale_positions(holder, &mut ledger.table)?;
        }
        msg!("Cleared {} stale balance(s) of {} holder(s)", cleared, holders.len());

        ledger.store(&mut ledger_info.try_borrow_mut_data()?)?;
        Ok(())
    }

    fn process_govern(
        accounts: &[AccountInfo],
        program_id: &Pubkey,
        action: GovernanceAction,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let governor_info = next_account_info(account_info_iter)?;
        let pool_info = next_account_info(account_info_iter)?;

        if !governor_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut pool_account = load_pool(pool_info, program_id)?;
        pool_account.pool.govern(governor_info.key, &action)?;

        pool_account.store(&mut pool_info.try_borrow_mut_data()?)?;
        Ok(())
    }
}

fn load_pool(pool_info: &AccountInfo, program_id: &Pubkey) -> Result<PoolAccount, ProgramError> {
    if pool_info.owner != program_id {
        return Err(ProgramError::IncorrectProgramId);
    }
    PoolAccount::load(&pool_info.try_borrow_data()?)
}

fn load_ledger(
    pool_account: &PoolAccount,
    pool_info: &AccountInfo,
    ledger_info: &AccountInfo,
    program_id: &Pubkey,
) -> Result<LedgerAccount, ProgramError> {
    if *ledger_info.key != pool_account.ledger || ledger_info.owner != program_id {
        return Err(PerpError::InvalidAccount.into());
    }
    let ledger = LedgerAccount::load(&ledger_info.try_borrow_data()?)?;
    if ledger.pool != *pool_info.key {
        return Err(PerpError::InvalidAccount.into());
    }
    Ok(ledger)
}

fn load_oracle(pool_account: &PoolAccount, oracle_info: &AccountInfo) -> Result<OracleFeed, ProgramError> {
    if *oracle_info.key != pool_account.oracle {
        msg!("Oracle does not belong to this pool");
        return Err(PerpError::InvalidAccount.into());
    }
    OracleFeed::load(&oracle_info.try_borrow_data()?)
}

fn current_time() -> Result<u64, ProgramError> {
    let clock = Clock::get()?;
    u64::try_from(clock.unix_timestamp).map_err(|_| ProgramError::InvalidArgument)
}

fn create_pda<'a>(
    payer: &AccountInfo<'a>,
    target: &AccountInfo<'a>,
    system_program_info: &AccountInfo<'a>,
    program_id: &Pubkey,
    space: usize,
    seeds: &[&[u8]],
) -> ProgramResult {
    let lamports = Rent::get()?.minimum_balance(space);
    invoke_signed(
        &system_instruction::create_account(payer.key, target.key, lamports, space as u64, program_id),
        &[payer.clone(), target.clone(), system_program_info.clone()],
        &[seeds],
    )
}

/// New account size once less than half of `ACCOUNT_HEADROOM` would stay free
fn grown_len(needed: usize, current: usize) -> Option<usize> {
    (needed + ACCOUNT_HEADROOM / 2 > current).then_some(needed + ACCOUNT_HEADROOM)
}

/// Stores `value` in `target`, growing the account first when `grown_len`
/// asks for it. `payer` covers the added rent.
fn store_growing<'a, T: BorshSerialize>(
    value: &T,
    target: &AccountInfo<'a>,
    payer: &AccountInfo<'a>,
    system_program_info: &AccountInfo<'a>,
) -> ProgramResult {
    let current = target.data_len();
    if let Some(grown) = grown_len(packed_len(value)?, current) {
        if grown - current > MAX_PERMITTED_DATA_INCREASE {
            msg!("Account {} cannot grow by {} bytes at once", target.key, grown - current);
            return Err(PerpError::AccountTooSmall.into());
        }

        let rent = Rent::get()?;
        let top_up = rent
            .minimum_balance(grown)
            .saturating_sub(rent.minimum_balance(current));
        if top_up > 0 {
            invoke(
                &system_instruction::transfer(payer.key, target.key, top_up),
                &[payer.clone(), target.clone(), system_program_info.clone()],
            )?;
        }
        target.realloc(grown, false)?;
        msg!("Account {} resized: {} -> {} bytes", target.key, current, grown);
    }

    store_borsh(value, &mut target.try_borrow_mut_data()?)
}

/// WAD units per smallest collateral unit
fn value_scale(decimals: u8) -> Result<u128, PerpError> {
    if decimals > WAD_DECIMALS {
        msg!("Mints with more than {} decimals are not supported", WAD_DECIMALS);
        return Err(PerpError::InvalidParameter);
    }
    Ok(10u128.pow(u32::from(WAD_DECIMALS - decimals)))
}

/// Converts a WAD amount into token units; value owed to the pool rounds up.
fn to_units(amount: u128, scale: u128, round_up: bool) -> Result<u64, ProgramError> {
    let mut units = amount / scale;
    if round_up && amount % scale != 0 {
        units += 1;
    }
    u64::try_from(units).map_err(|_| PerpError::ArithmeticOverflow.into())
}

/// Seeds the pool PDA signs with
struct PoolSigner {
    creator: Pubkey,
    bump: [u8; 1],
}

impl PoolSigner {
    fn new(pool_account: &PoolAccount) -> Self {
        Self {
            creator: pool_account.creator,
            bump: [pool_account.bump],
        }
    }

    fn seeds(&self) -> [&[u8]; 3] {
        [POOL_SEED, self.creator.as_ref(), &self.bump]
    }
}

/// Lamports held directly by the pool account
struct NativeVault<'a, 'b> {
    pool: &'b AccountInfo<'a>,
    counterparty: &'b AccountInfo<'a>,
    /// Only needed to collect
    system_program: Option<&'b AccountInfo<'a>>,
    scale: u128,
    rent_floor: u64,
}

impl ValueTransfer for NativeVault<'_, '_> {
    fn collect(&mut self, from: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        if from != self.counterparty.key {
            return Err(PerpError::InvalidAccount.into());
        }
        let system_program_info = self.system_program.ok_or(ProgramError::NotEnoughAccountKeys)?;
        let lamports = to_units(amount, self.scale, true)?;
        if lamports == 0 {
            return Ok(());
        }
        invoke(
            &system_instruction::transfer(self.counterparty.key, self.pool.key, lamports),
            &[
                self.counterparty.clone(),
                self.pool.clone(),
                system_program_info.clone(),
            ],
        )
    }

    fn pay_out(&mut self, to: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        if to != self.counterparty.key {
            return Err(PerpError::InvalidAccount.into());
        }
        let lamports = to_units(amount, self.scale, false)?;
        let remaining = self
            .pool
            .lamports()
            .checked_sub(lamports)
            .filter(|remaining| *remaining >= self.rent_floor)
            .ok_or(PerpError::InsufficientValue)?;
        let credited = self
            .counterparty
            .lamports()
            .checked_add(lamports)
            .ok_or(PerpError::ArithmeticOverflow)?;

        **self.pool.try_borrow_mut_lamports()? = remaining;
        **self.counterparty.try_borrow_mut_lamports()? = credited;
        Ok(())
    }
}

/// SPL collateral held in a vault owned by the pool PDA
struct TokenVault<'a, 'b, 's> {
    pool: &'b AccountInfo<'a>,
    counterparty: &'b AccountInfo<'a>,
    holder_token: &'b AccountInfo<'a>,
    vault: &'b AccountInfo<'a>,
    token_program: &'b AccountInfo<'a>,
    signer: &'s PoolSigner,
    scale: u128,
}

impl ValueTransfer for TokenVault<'_, '_, '_> {
    fn collect(&mut self, from: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        if from != self.counterparty.key {
            return Err(PerpError::InvalidAccount.into());
        }
        let units = to_units(amount, self.scale, true)?;
        if units == 0 {
            return Ok(());
        }
        invoke(
            &token_instruction::transfer(
                &spl_token::id(),
                self.holder_token.key,
                self.vault.key,
                self.counterparty.key,
                &[],
                units,
            )?,
            &[
                self.holder_token.clone(),
                self.vault.clone(),
                self.counterparty.clone(),
                self.token_program.clone(),
            ],
        )
    }

    fn pay_out(&mut self, to: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        if to != self.counterparty.key {
            return Err(PerpError::InvalidAccount.into());
        }
        let units = to_units(amount, self.scale, false)?;
        if units == 0 {
            return Ok(());
        }
        invoke_signed(
            &token_instruction::transfer(
                &spl_token::id(),
                self.vault.key,
                self.holder_token.key,
                self.pool.key,
                &[],
                units,
            )?,
            &[
                self.vault.clone(),
                self.holder_token.clone(),
                self.pool.clone(),
                self.token_program.clone(),
            ],
            &[&self.signer.seeds()],
        )
    }
}

enum CollateralVault<'a, 'b, 's> {
    Native(NativeVault<'a, 'b>),
    Token(TokenVault<'a, 'b, 's>),
}

impl<'a, 'b, 's> CollateralVault<'a, 'b, 's> {
    /// Reads the collateral accounts that follow the fixed accounts of an instruction
    fn from_accounts(
        collateral: &CollateralKind,
        pool_info: &'b AccountInfo<'a>,
        counterparty: &'b AccountInfo<'a>,
        system_program_info: Option<&'b AccountInfo<'a>>,
        account_info_iter: &mut std::slice::Iter<'b, AccountInfo<'a>>,
        signer: &'s PoolSigner,
    ) -> Result<Self, ProgramError> {
        let scale = value_scale(collateral.decimals())?;
        match collateral {
            CollateralKind::Native => Ok(CollateralVault::Native(NativeVault {
                pool: pool_info,
                counterparty,
                system_program: system_program_info,
                scale,
                rent_floor: Rent::get()?.minimum_balance(pool_info.data_len()),
            })),
            CollateralKind::Token { mint, vault, .. } => {
                let holder_token_info = next_account_info(account_info_iter)?;
                let vault_info = next_account_info(account_info_iter)?;
                let token_program_info = next_account_info(account_info_iter)?;
                if *token_program_info.key != spl_token::id() {
                    return Err(ProgramError::IncorrectProgramId);
                }
                if vault_info.key != vault {
                    msg!("Vault does not belong to this pool");
                    return Err(PerpError::InvalidAccount.into());
                }
                let holder_token = TokenAccount::unpack(&holder_token_info.try_borrow_data()?)?;
                if holder_token.mint != *mint || holder_token.owner != *counterparty.key {
                    msg!("Token account must hold the collateral mint and belong to the signer");
                    return Err(PerpError::InvalidAccount.into());
                }
                Ok(CollateralVault::Token(TokenVault {
                    pool: pool_info,
                    counterparty,
                    holder_token: holder_token_info,
                    vault: vault_info,
                    token_program: token_program_info,
                    signer,
                    scale,
                }))
            }
        }
    }
}

impl ValueTransfer for CollateralVault<'_, '_, '_> {
    fn collect(&mut self, from: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        match self {
            CollateralVault::Native(vault) => vault.collect(from, amount),
            CollateralVault::Token(vault) => vault.collect(from, amount),
        }
    }

    fn pay_out(&mut self, to: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        match self {
            CollateralVault::Native(vault) => vault.pay_out(to, amount),
            CollateralVault::Token(vault) => vault.pay_out(to, amount),
        }
    }
}

/// Base mint whose authority is the pool PDA
struct SplBaseToken<'a, 'b, 's> {
    pool: &'b AccountInfo<'a>,
    holder: &'b AccountInfo<'a>,
    mint: &'b AccountInfo<'a>,
    holder_token: &'b AccountInfo<'a>,
    token_program: &'b AccountInfo<'a>,
    signer: &'s PoolSigner,
    scale: u128,
}

impl<'a, 'b, 's> SplBaseToken<'a, 'b, 's> {
    fn from_accounts(
        base_mint: Option<BaseMint>,
        pool_info: &'b AccountInfo<'a>,
        holder: &'b AccountInfo<'a>,
        mint_info: &'b AccountInfo<'a>,
        account_info_iter: &mut std::slice::Iter<'b, AccountInfo<'a>>,
        signer: &'s PoolSigner,
    ) -> Result<Self, ProgramError> {
        let holder_token_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;

        let base_mint = base_mint.ok_or_else(|| {
            msg!("Pool has no base token");
            PerpError::InvalidAccount
        })?;
        if *mint_info.key != base_mint.mint {
            return Err(PerpError::InvalidAccount.into());
        }
        if *token_program_info.key != spl_token::id() {
            return Err(ProgramError::IncorrectProgramId);
        }
        let holder_token = TokenAccount::unpack(&holder_token_info.try_borrow_data()?)?;
        if holder_token.mint != base_mint.mint || holder_token.owner != *holder.key {
            msg!("Base token account must hold the base mint and belong to the trader");
            return Err(PerpError::InvalidAccount.into());
        }

        Ok(Self {
            pool: pool_info,
            holder,
            mint: mint_info,
            holder_token: holder_token_info,
            token_program: token_program_info,
            signer,
            scale: value_scale(base_mint.decimals)?,
        })
    }
}

impl BaseToken for SplBaseToken<'_, '_, '_> {
    fn mint(&mut self, holder: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        if holder != self.holder.key {
            return Err(PerpError::InvalidAccount.into());
        }
        let units = to_units(amount, self.scale, false)?;
        invoke_signed(
            &token_instruction::mint_to(
                &spl_token::id(),
                self.mint.key,
                self.holder_token.key,
                self.pool.key,
                &[],
                units,
            )?,
            &[
                self.mint.clone(),
                self.holder_token.clone(),
                self.pool.clone(),
                self.token_program.clone(),
            ],
            &[&self.signer.seeds()],
        )
    }

    fn burn(&mut self, holder: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        if holder != self.holder.key {
            return Err(PerpError::InvalidAccount.into());
        }
        let units = to_units(amount, self.scale, true)?;
        invoke(
            &token_instruction::burn(
                &spl_token::id(),
                self.holder_token.key,
                self.mint.key,
                self.holder.key,
                &[],
                units,
            )?,
            &[
                self.holder_token.clone(),
                self.mint.clone(),
                self.holder.clone(),
                self.token_program.clone(),
            ],
        )
    }

    fn balance_of(&self, holder: &Pubkey) -> u128 {
        if holder != self.holder.key {
            return 0;
        }
        self.holder_token
            .try_borrow_data()
            .ok()
            .and_then(|data| TokenAccount::unpack(&data).ok())
            .map(|account| u128::from(account.amount).saturating_mul(self.scale))
            .unwrap_or(0)
    }
}

enum BaseTokenAccounts<'a, 'b, 's> {
    Spl(SplBaseToken<'a, 'b, 's>),
    /// No base accounts were passed; 1x shorts fail
    Missing,
}

impl BaseToken for BaseTokenAccounts<'_, '_, '_> {
    fn mint(&mut self, holder: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        match self {
            BaseTokenAccounts::Spl(token) => token.mint(holder, amount),
            BaseTokenAccounts::Missing => Err(PerpError::InvalidAccount.into()),
        }
    }

    fn burn(&mut self, holder: &Pubkey, amount: u128) -> Result<(), ProgramError> {
        match self {
            BaseTokenAccounts::Spl(token) => token.burn(holder, amount),
            BaseTokenAccounts::Missing => Err(PerpError::InvalidAccount.into()),
        }
    }

    fn balance_of(&self, holder: &Pubkey) -> u128 {
        match self {
            BaseTokenAccounts::Spl(token) => token.balance_of(holder),
            BaseTokenAccounts::Missing => 0,
        }
    }
}

/// Routes a reward push to the configured distributor
struct DistributorPayout<'v> {
    value: &'v mut dyn ValueTransfer,
    distributor: Pubkey,
}

impl RewardSink for DistributorPayout<'_> {
    fn receive_reward(&mut self, amount: u128) -> Result<(), ProgramError> {
        self.value.pay_out(&self.distributor, amount)
    }
}
