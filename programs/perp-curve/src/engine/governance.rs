use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{msg, pubkey::Pubkey};

use crate::{
    error::PerpError,
    math::U256,
    state::{MarketStatus, ParameterUpdate, PerpPool},
};

/// Governor-only changes to a pool
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceAction {
    UpdateParameters(ParameterUpdate),
    /// Rebases the curve at constant spot; `coeff` holds little-endian limbs
    SetLiquidity { coeff: [u64; 4], reserve0: u128 },
    SetGovernor(Pubkey),
    SetRewardDistributor(Pubkey),
    SetMarketStatus(MarketStatus),
}

impl PerpPool {
    pub fn govern(&mut self, caller: &Pubkey, action: &GovernanceAction) -> Result<(), PerpError> {
        if *caller != self.governor {
            return Err(PerpError::Unauthorized);
        }

        match action {
            GovernanceAction::UpdateParameters(update) => {
                self.params.apply(update)?;
                msg!("Pool parameters updated");
            }
            GovernanceAction::SetLiquidity { coeff, reserve0 } => {
                let mut curve = self.curve.clone();
                let insurance_delta = curve.rebase(U256(*coeff), *reserve0)?;
                self.curve = curve;
                self.absorb_insurance(insurance_delta.neg());
            }
            GovernanceAction::SetGovernor(governor) => {
                msg!("Governor changed to {}", governor);
                self.governor = *governor;
            }
            GovernanceAction::SetRewardDistributor(distributor) => {
                msg!("Reward distributor changed to {}", distributor);
                self.reward_distributor = *distributor;
            }
            GovernanceAction::SetMarketStatus(status) => {
                msg!("Market status changed to {:?}", status);
                self.status = *status;
            }
        }
        Ok(())
    }
}
