use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    interfaces::{RewardSink, ValueTransfer},
    state::{PerpPool, REWARD_INTERVAL},
};

impl PerpPool {
    /// Whether `distribute_reward` at `now` would push anything
    pub fn reward_due(&self, now: u64) -> bool {
        now >= self.last_reward_distribution.saturating_add(REWARD_INTERVAL)
    }

    /// Pushes the accrued reward to `sink`, at most once per interval.
    ///
    /// Returns the amount pushed; calls inside the interval are no-ops.
    pub fn distribute_reward(&mut self, now: u64, sink: &mut dyn RewardSink) -> Result<u128, ProgramError> {
        if !self.reward_due(now) {
            return Ok(0);
        }

        let amount = self.reward;
        if amount > 0 {
            sink.receive_reward(amount)?;
        }
        self.reward = 0;
        self.last_reward_distribution = now;

        msg!("Reward distributed: {}", amount);
        Ok(amount)
    }

    /// Pays out everything owed to `referrer`
    pub fn claim_commission(
        &mut self,
        referrer: &Pubkey,
        value: &mut dyn ValueTransfer,
    ) -> Result<u128, ProgramError> {
        let amount = self.commission(referrer);
        if amount == 0 {
            return Ok(0);
        }

        value.pay_out(referrer, amount)?;
        self.commission_of.remove(referrer);

        msg!("Commission claimed by {}: {}", referrer, amount);
        Ok(amount)
    }
}
