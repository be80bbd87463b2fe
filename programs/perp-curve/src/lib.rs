//! Perpetual futures pool on a single bonding curve.
//!
//! Positions are fungible tokens keyed by strike slot; leverage comes from
//! the strike distance to the mark. Native Solana program, no Anchor.

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, msg, pubkey::Pubkey};

pub mod engine;
pub mod error;
pub mod instruction;
pub mod interfaces;
pub mod ledger;
pub mod math;
pub mod processor;
pub mod slot;
pub mod state;

use crate::processor::Processor;

solana_program::declare_id!("PerpCurve1111111111111111111111111111111111");

#[cfg(not(feature = "no-entrypoint"))]
solana_program::entrypoint!(process);

pub fn process(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    if let Err(error) = Processor::process(program_id, accounts, instruction_data) {
        msg!("Perp curve instruction failed: {}", error);
        return Err(error);
    }
    Ok(())
}
