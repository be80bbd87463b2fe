use solana_program::{msg, program_error::ProgramError};

use crate::{
    engine::liquidation::LiquidationEvent,
    error::PerpError,
    interfaces::PriceOracle,
    math::checked_add,
    state::{liquidity::coeff_delta, LiquidityTrend, PerpPool},
};

/// What a poke changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PokeReport {
    /// Seconds accounted for, zero when the poke was a no-op
    pub elapsed: u64,
    pub mark: u128,
    pub liquidations: Vec<LiquidationEvent>,
    pub burden_resolved: u128,
    pub liquidity: LiquidityTrend,
    pub volume_rolled: bool,
}

impl PokeReport {
    fn idle(mark: u128) -> Self {
        Self {
            elapsed: 0,
            mark,
            liquidations: Vec::new(),
            burden_resolved: 0,
            liquidity: LiquidityTrend::Hold,
            volume_rolled: false,
        }
    }
}

impl PerpPool {
    /// Brings mark, shift, liquidations, burden and liquidity up to `now`.
    ///
    /// All-or-nothing: the pool is only touched when every step succeeded.
    pub fn poke(&mut self, now: u64, oracle: &dyn PriceOracle) -> Result<PokeReport, ProgramError> {
        let oracle_price = oracle.latest_price()?;
        let mut staged = self.clone();
        let report = staged.refresh(now, oracle_price)?;
        *self = staged;
        Ok(report)
    }

    /// Mark a poke at `now` would produce, without touching the pool
    pub fn latest_mark(&self, now: u64, oracle: &dyn PriceOracle) -> Result<u128, ProgramError> {
        let elapsed = self.mark.elapsed(now, self.params.max_poke_elapsed);
        if elapsed == 0 {
            return Ok(self.mark.mark);
        }
        let next = self.mark.advance(
            &self.params,
            elapsed,
            self.curve.spot_price()?,
            oracle.latest_price()?,
        )?;
        Ok(next.mark)
    }

    pub(crate) fn refresh(&mut self, now: u64, oracle_price: u128) -> Result<PokeReport, PerpError> {
        let elapsed = self.mark.elapsed(now, self.params.max_poke_elapsed);
        if elapsed == 0 {
            return Ok(PokeReport::idle(self.mark.mark));
        }

        let next = self
            .mark
            .advance(&self.params, elapsed, self.curve.spot_price()?, oracle_price)?;
        self.mark.mark = next.mark;
        self.mark.shift = next.shift;

        let liquidations = self.sweep_liquidations()?;
        let burden_resolved = self.resolve_burden(elapsed)?;

        self.liquidity.update_twaps(&self.params, elapsed)?;
        let liquidity = self.adjust_liquidity(elapsed);
        let volume_rolled = self.liquidity.roll_volume(now);

        self.mark.last_poke = now;

        Ok(PokeReport {
            elapsed,
            mark: self.mark.mark,
            liquidations,
            burden_resolved,
            liquidity,
            volume_rolled,
        })
    }

    /// Best effort: a failed rebase leaves the curve as it was.
    fn adjust_liquidity(&mut self, elapsed: u64) -> LiquidityTrend {
        match self.try_adjust_liquidity(elapsed) {
            Ok(trend) => trend,
            Err(err) => {
                msg!("Liquidity adjustment skipped: {}", err);
                LiquidityTrend::Hold
            }
        }
    }

    fn try_adjust_liquidity(&mut self, elapsed: u64) -> Result<LiquidityTrend, PerpError> {
        let trend = self.liquidity.trend(&self.params)?;
        if trend == LiquidityTrend::Hold {
            return Ok(trend);
        }

        let coeff = self.curve.coeff();
        let delta = coeff_delta(coeff, self.params.liquidity_change_per_sec, elapsed)?;
        if delta.is_zero() {
            return Ok(LiquidityTrend::Hold);
        }

        let new_coeff = match trend {
            LiquidityTrend::Increase => coeff.checked_add(delta).ok_or(PerpError::ArithmeticOverflow)?,
            _ if delta >= coeff => return Err(PerpError::CurveExhausted),
            _ => coeff - delta,
        };

        let mut curve = self.curve.clone();
        let new_reserve = curve.rebased_reserve(new_coeff)?;
        let new_reserve0 = checked_add(new_reserve, curve.reserve0)?
            .checked_sub(curve.reserve)
            .filter(|reserve0| *reserve0 > 0)
            .ok_or(PerpError::CurveExhausted)?;

        let insurance_delta = curve.rebase(new_coeff, new_reserve0)?;
        self.curve = curve;
        self.absorb_insurance(insurance_delta.neg());
        Ok(trend)
    }
}
