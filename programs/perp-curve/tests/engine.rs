mod common;

use common::*;
use perp_curve::{
    engine::{Action, ActionKind, GovernanceAction, TradeReceipt},
    error::PerpError,
    interfaces::PositionLedger,
    math::{SignedWad, WAD},
    slot::{slot_of, strike_of, Side, TokenClass, BASE_TOKEN_SLOT},
    state::{LiquidityTrend, MarketStatus, ParameterUpdate},
};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

fn err(error: PerpError) -> ProgramError {
    error.into()
}

#[test]
fn test_open_5x_long() {
    let mut market = Market::new();
    let trader = Pubkey::new_unique();

    let strike = market.pool.get_strike_from_leverage(5 * WAD, Side::Long).unwrap();
    assert_eq!(strike, LONG_5X_STRIKE);
    assert_eq!(slot_of(strike).unwrap(), 12_200);

    let receipt = market.open_long(&trader, 0, 1_000 * WAD, strike).unwrap();
    assert_eq!(
        receipt,
        TradeReceipt {
            pay: 600_000_000_000_000_000,
            get: 498_700_129_987_001_299,
            fee: 1_249_875_012_498_751,
        }
    );
    assert_eq!(market.wallet.collected_from(&trader), 101_299_870_012_998_701);
    assert_eq!(market.position(&trader, strike, Side::Long), 1_000 * WAD);
    assert_eq!(market.pool.reserve(), 10_001_000 * WAD);
    assert_eq!(market.pool.total_oi(), 1_000 * WAD);
    assert_eq!(market.pool.open_interest(12_200, TokenClass::ShortToken), 1_000 * WAD);

    // No referrer: the commission share stays with insurance
    assert_eq!(market.pool.insurance, 999_900_009_999_000);
    assert_eq!(market.pool.reward, 249_975_002_499_751);
}

#[test]
fn test_full_close_restores_curve() {
    let mut market = Market::new();
    let trader = Pubkey::new_unique();
    market.open_long(&trader, 0, 1_000 * WAD, LONG_5X_STRIKE).unwrap();

    let receipt = market.close_long(&trader, 0, 1_000 * WAD, LONG_5X_STRIKE).unwrap();
    assert_eq!(receipt.pay, 501_199_880_011_998_800);
    assert_eq!(receipt.get, 600_000_000_000_000_000);
    assert_eq!(receipt.fee, 1_249_875_012_498_750);
    assert_eq!(market.wallet.paid_to(&trader), 98_800_119_988_001_200);

    assert_eq!(market.pool.reserve(), 10_000_000 * WAD);
    assert_eq!(market.pool.total_oi(), 0);
    assert_eq!(market.position(&trader, LONG_5X_STRIKE, Side::Long), 0);
    assert!(market.pool.short_token_oi.is_empty());

    assert_eq!(
        market.close_long(&trader, 0, 1_000 * WAD, LONG_5X_STRIKE),
        Err(err(PerpError::InsufficientBalance))
    );
}

#[test]
fn test_mixed_batches_are_rejected() {
    let mut market = Market::new();
    let trader = Pubkey::new_unique();
    let before = market.pool.clone();

    let actions = [
        Action::new(ActionKind::MintLong, 12_200, WAD).unwrap(),
        Action::new(ActionKind::MintShort, 12_061, WAD).unwrap(),
    ];
    assert_eq!(
        market.execute(&trader, 0, &actions, u128::MAX, 0),
        Err(err(PerpError::MixedMintNotAllowed))
    );

    let actions = [
        Action::new(ActionKind::BurnLong, 12_200, WAD).unwrap(),
        Action::new(ActionKind::BurnShort, 12_061, WAD).unwrap(),
    ];
    assert_eq!(
        market.execute(&trader, 0, &actions, u128::MAX, 0),
        Err(err(PerpError::MixedBurnNotAllowed))
    );

    assert_eq!(
        market.execute(&trader, 0, &[], u128::MAX, 0),
        Err(err(PerpError::InvalidAction))
    );
    assert_eq!(market.pool, before);
    assert!(market.wallet.collected.is_empty());
}

#[test]
fn test_rolling_a_long_nets_the_curve() {
    let mut market = Market::new();
    let trader = Pubkey::new_unique();
    market.open_long(&trader, 0, 1_000 * WAD, LONG_5X_STRIKE).unwrap();
    let reserve = market.pool.reserve();
    let insurance = market.pool.insurance;

    let actions = [
        Action::new(ActionKind::BurnLong, 12_200, 1_000 * WAD).unwrap(),
        Action::new(ActionKind::MintLong, 12_300, 1_000 * WAD).unwrap(),
    ];
    let receipt = market.execute(&trader, 0, &actions, u128::MAX, 0).unwrap();

    assert_eq!(strike_of(12_300).unwrap(), 700_000_000_000_000);
    assert_eq!(
        receipt,
        TradeReceipt {
            pay: 700_000_000_000_000_000,
            get: 600_000_000_000_000_000,
            fee: 0,
        }
    );
    assert_eq!(market.pool.reserve(), reserve);
    assert_eq!(market.pool.insurance, insurance);
    assert_eq!(market.position(&trader, LONG_5X_STRIKE, Side::Long), 0);
    assert_eq!(market.position(&trader, 700_000_000_000_000, Side::Long), 1_000 * WAD);
    assert_eq!(market.pool.total_oi(), 1_000 * WAD);
}

#[test]
fn test_bounds_on_pay_and_get() {
    let mut market = Market::new();
    let trader = Pubkey::new_unique();

    let result = market.trade(&trader, None, 0, |pool, ctx, collaborators| {
        pool.open_long(ctx, 1_000 * WAD, LONG_5X_STRIKE, 498_700_129_987_001_300, collaborators)
    });
    assert_eq!(result, Err(err(PerpError::MinGetViolation)));

    let open = Action::new(ActionKind::MintLong, 12_200, 1_000 * WAD).unwrap();
    assert_eq!(
        market.execute(&trader, 0, &[open], 599_999_999_999_999_999, 0),
        Err(err(PerpError::MaxPayViolation))
    );

    let receipt = market
        .execute(&trader, 0, &[open], 600_000_000_000_000_000, 498_700_129_987_001_299)
        .unwrap();
    assert_eq!(receipt.get, 498_700_129_987_001_299);
}

#[test]
fn test_excessive_slippage() {
    let mut market = Market::new();
    let trader = Pubkey::new_unique();

    assert_eq!(
        market.open_long(&trader, 0, 300_000 * WAD, LONG_5X_STRIKE),
        Err(err(PerpError::ExcessiveSlippage))
    );
    assert_eq!(market.pool.reserve(), 10_000_000 * WAD);

    market.open_long(&trader, 0, 200_000 * WAD, LONG_5X_STRIKE).unwrap();
    assert_eq!(market.pool.reserve(), 10_200_000 * WAD);
}

#[test]
fn test_opening_inside_the_liquidation_zone() {
    let mut market = Market::new();
    let trader = Pubkey::new_unique();

    assert_eq!(market.pool.min_safe_short_slot, 12_138);
    assert_eq!(market.pool.max_safe_long_slot, 12_065);

    assert_eq!(
        market.open_long(&trader, 0, WAD, 520_000_000_000_000),
        Err(err(PerpError::UnsafeStrike))
    );
    assert_eq!(
        market.open_short(&trader, 0, WAD, 490_000_000_000_000),
        Err(err(PerpError::UnsafeStrike))
    );
    market.open_long(&trader, 0, WAD, LONG_13X_STRIKE).unwrap();
    market.open_short(&trader, 0, WAD, SHORT_13X_STRIKE).unwrap();
}

#[test]
fn test_rising_mark_liquidates_13x_long() {
    let mut market = Market::new();
    let long_trader = Pubkey::new_unique();
    let short_trader = Pubkey::new_unique();

    let strike = market.pool.get_strike_from_leverage(13 * WAD, Side::Long).unwrap();
    assert_eq!(strike, LONG_13X_STRIKE);
    market.open_long(&long_trader, 0, 1_000 * WAD, strike).unwrap();
    let old_ident = market.pool.short_ident(12_138);

    market.open_short(&short_trader, 0, 10_000 * WAD, SHORT_13X_STRIKE).unwrap();
    assert!(market.pool.curve.spot_price().unwrap() > 500_900_000_000_000);

    let report = market.poke(3_600).unwrap();
    assert_eq!(report.elapsed, 3_600);
    assert_eq!(report.liquidations.len(), 1);
    let event = &report.liquidations[0];
    assert_eq!(event.slot, 12_138);
    assert_eq!(event.class, TokenClass::ShortToken);
    assert_eq!(event.size, 1_000 * WAD);
    assert_eq!(event.old_ident, old_ident);

    assert_eq!(market.pool.offset_of(12_138, TokenClass::ShortToken), 1);
    assert_eq!(market.position(&long_trader, strike, Side::Long), 0);
    assert_eq!(market.ledger.balance_of(&long_trader, old_ident), 1_000 * WAD);
    assert_eq!(market.position(&short_trader, SHORT_13X_STRIKE, Side::Short), 10_000 * WAD);

    assert_eq!(report.burden_resolved, 360 * WAD);
    assert_eq!(market.pool.burden, SignedWad::negative(640 * WAD));
    assert_eq!(market.pool.total_oi(), 10_000 * WAD);

    assert_eq!(
        market.close_long(&long_trader, 3_600, 1_000 * WAD, strike),
        Err(err(PerpError::InsufficientBalance))
    );
}

#[test]
fn test_falling_mark_liquidates_13x_short() {
    let mut market = Market::new();
    let short_trader = Pubkey::new_unique();
    let long_trader = Pubkey::new_unique();

    let strike = market.pool.get_strike_from_leverage(13 * WAD, Side::Short).unwrap();
    assert_eq!(strike, SHORT_13X_STRIKE);
    market.open_short(&short_trader, 0, 1_000 * WAD, strike).unwrap();
    market.open_long(&long_trader, 0, 60_000 * WAD, LONG_13X_STRIKE).unwrap();

    let report = market.poke(3_600).unwrap();
    assert_eq!(report.liquidations.len(), 1);
    assert_eq!(report.liquidations[0].slot, 12_061);
    assert_eq!(report.liquidations[0].class, TokenClass::LongToken);

    assert_eq!(market.position(&short_trader, strike, Side::Short), 0);
    assert_eq!(market.position(&long_trader, LONG_13X_STRIKE, Side::Long), 60_000 * WAD);
    assert_eq!(market.pool.burden, SignedWad::positive(640 * WAD));

    // The next hour resolves the rest at 0.1 per second
    let report = market.poke(7_200).unwrap();
    assert_eq!(report.burden_resolved, 360 * WAD);
    let report = market.poke(10_800).unwrap();
    assert_eq!(report.burden_resolved, 280 * WAD);
    assert_eq!(market.pool.burden, SignedWad::ZERO);
}

#[test]
fn test_liquidated_bucket_reopens_as_new_generation() {
    let mut market = Market::new();
    let long_trader = Pubkey::new_unique();
    let short_trader = Pubkey::new_unique();

    market.open_long(&long_trader, 0, 1_000 * WAD, LONG_13X_STRIKE).unwrap();
    let stale = market.pool.short_ident(12_138);
    market.open_short(&short_trader, 0, 10_000 * WAD, SHORT_13X_STRIKE).unwrap();
    market.poke(3_600).unwrap();
    assert_eq!(market.ledger.balance_of(&long_trader, stale), 1_000 * WAD);

    let fresh = market.pool.short_ident(12_138);
    assert_eq!(fresh, (1 << 16) | (12_138 << 1) | 1);

    // Slot 12_138 is now inside the zone; a wider strike still opens
    assert_eq!(
        market.open_long(&long_trader, 3_600, WAD, LONG_13X_STRIKE),
        Err(err(PerpError::UnsafeStrike))
    );
    market.open_long(&long_trader, 3_600, WAD, LONG_5X_STRIKE).unwrap();
    assert_eq!(market.ledger.balance_of(&long_trader, fresh), 0);

    // Trading again drops the liquidated generation from the ledger
    assert_eq!(market.ledger.balance_of(&long_trader, stale), 0);
    assert_eq!(market.ledger.total_supply(stale), 0);
    assert_eq!(
        market.ledger.idents_of(&long_trader),
        vec![market.pool.short_ident(12_200)]
    );
}

#[test]
fn test_1x_short_uses_base_token() {
    let mut market = Market::new();
    let trader = Pubkey::new_unique();

    let strike = market.pool.get_strike_from_leverage(WAD, Side::Short).unwrap();
    assert_eq!(strike, 0);

    let receipt = market.open_short(&trader, 0, 1_000 * WAD, strike).unwrap();
    assert_eq!(
        receipt,
        TradeReceipt {
            pay: 501_300_130_013_001_300,
            get: 0,
            fee: 1_250_125_012_501_250,
        }
    );
    assert_eq!(market.base.balances[&trader], 1_000 * WAD);
    assert_eq!(market.position(&trader, 0, Side::Short), 1_000 * WAD);
    assert_eq!(market.pool.total_oi(), 1_000 * WAD);
    assert_eq!(market.pool.reserve(), 9_999_000 * WAD);

    market.close_short(&trader, 0, 1_000 * WAD, 0).unwrap();
    assert_eq!(market.position(&trader, 0, Side::Short), 0);
    assert_eq!(market.pool.total_oi(), 0);
    assert_eq!(
        market.close_short(&trader, 0, WAD, 0),
        Err(err(PerpError::InsufficientBalance))
    );

    assert_eq!(
        market.open_long(&trader, 0, WAD, 0),
        Err(err(PerpError::InvalidStrike))
    );
    let base_long = Action::new(ActionKind::MintLong, BASE_TOKEN_SLOT, WAD).unwrap();
    assert_eq!(
        market.execute(&trader, 0, &[base_long], u128::MAX, 0),
        Err(err(PerpError::InvalidStrike))
    );
}

/// Opens 1000 at 5x one hour after the oracle moved to `oracle`
fn open_after_oracle_move(oracle: u128, side: Side) -> (Market, TradeReceipt) {
    let mut market = Market::new();
    market.oracle = FixedOracle(oracle);
    let trader = Pubkey::new_unique();
    let receipt = match side {
        Side::Long => market.open_long(&trader, 3_600, 1_000 * WAD, LONG_5X_STRIKE),
        Side::Short => market.open_short(&trader, 3_600, 1_000 * WAD, SHORT_5X_STRIKE),
    }
    .unwrap();
    (market, receipt)
}

#[test]
fn test_long_with_positive_shift() {
    let (market, receipt) = open_after_oracle_move(600_000_000_000_000, Side::Long);

    // 1/1667 oracle against a 1/2000 mark for an hour
    assert_eq!(market.pool.shift(), SignedWad::positive(3_472_222_219_200));
    assert_eq!(
        receipt,
        TradeReceipt {
            pay: 600_000_000_000_000_000,
            get: 502_163_671_650_653_299,
            fee: 1_258_555_568_046_751,
        }
    );
    assert_eq!(market.pool.spot_price().unwrap(), 503_372_237_217_200);
    assert_eq!(market.pool.mark_price(), 503_469_648_529_725);
}

#[test]
fn test_long_with_negative_shift() {
    let (market, receipt) = open_after_oracle_move(400_000_000_000_000, Side::Long);

    assert_eq!(market.pool.shift(), SignedWad::negative(5_208_333_332_400));
    assert_eq!(
        receipt,
        TradeReceipt {
            pay: 600_000_000_000_000_000,
            get: 493_504_817_487_932_299,
            fee: 1_236_854_179_167_751,
        }
    );
    assert_eq!(market.pool.spot_price().unwrap(), 494_691_681_665_600);
    assert_eq!(market.pool.mark_price(), 494_795_527_201_813);
}

#[test]
fn test_short_with_positive_shift() {
    let (market, receipt) = open_after_oracle_move(600_000_000_000_000, Side::Short);

    assert_eq!(market.pool.shift(), SignedWad::positive(3_472_222_219_200));
    assert_eq!(
        receipt,
        TradeReceipt {
            pay: 504_781_032_787_749_300,
            get: 400_000_000_000_000_000,
            fee: 1_258_805_568_049_250,
        }
    );
    assert_eq!(market.pool.spot_price().unwrap(), 503_572_237_221_200);
}

#[test]
fn test_short_with_negative_shift() {
    let (market, receipt) = open_after_oracle_move(400_000_000_000_000, Side::Short);

    assert_eq!(market.pool.shift(), SignedWad::negative(5_208_333_332_400));
    assert_eq!(
        receipt,
        TradeReceipt {
            pay: 496_078_775_847_270_300,
            get: 400_000_000_000_000_000,
            fee: 1_237_104_179_170_250,
        }
    );
    assert_eq!(market.pool.spot_price().unwrap(), 494_891_681_669_600);
}

#[test]
fn test_poke_is_idempotent_within_a_second() {
    let mut market = Market::new();
    let trader = Pubkey::new_unique();
    market.open_long(&trader, 0, 1_000 * WAD, LONG_5X_STRIKE).unwrap();

    let report = market.poke(60).unwrap();
    assert_eq!(report.elapsed, 60);
    assert_eq!(report.mark, 499_988_683_084_620);
    let after_first = market.pool.clone();

    let report = market.poke(60).unwrap();
    assert_eq!(report.elapsed, 0);
    assert!(report.liquidations.is_empty());
    assert_eq!(market.pool, after_first);

    assert_eq!(
        market.pool.latest_mark(60, &market.oracle).unwrap(),
        market.pool.mark_price()
    );
}

#[test]
fn test_liquidity_follows_open_interest() {
    let mut market = Market::new();
    let governor = market.pool.governor;
    let trader = Pubkey::new_unique();
    let coeff = market.pool.coeff();

    let update = ParameterUpdate {
        dynamic_by_oi: Some(true),
        ..Default::default()
    };
    market
        .pool
        .govern(&governor, &GovernanceAction::UpdateParameters(update))
        .unwrap();

    market.open_long(&trader, 0, 1_000 * WAD, LONG_5X_STRIKE).unwrap();
    let spot = market.pool.curve.spot_price().unwrap();

    let report = market.poke(3_600).unwrap();
    assert_eq!(report.liquidity, LiquidityTrend::Increase);
    assert!(market.pool.coeff() > coeff);
    assert!(market.pool.reserve() > 10_001_000 * WAD);
    let drift = market.pool.curve.spot_price().unwrap().abs_diff(spot);
    assert!(drift * 1_000_000 < spot);
}

#[test]
fn test_liquidity_follows_volume() {
    let mut market = Market::new();
    let governor = market.pool.governor;
    let trader = Pubkey::new_unique();
    let coeff = market.pool.coeff();

    let update = ParameterUpdate {
        dynamic_by_volume: Some(true),
        ..Default::default()
    };
    market
        .pool
        .govern(&governor, &GovernanceAction::UpdateParameters(update))
        .unwrap();

    market.open_long(&trader, 0, 10_000 * WAD, LONG_5X_STRIKE).unwrap();
    let report = market.poke(86_400).unwrap();
    assert!(report.volume_rolled);
    assert_eq!(report.liquidity, LiquidityTrend::Hold);
    assert_eq!(market.pool.liquidity.prev_daily_volume, 10_000 * WAD);

    market.close_long(&trader, 86_410, 1_000 * WAD, LONG_5X_STRIKE).unwrap();
    let report = market.poke(90_000).unwrap();
    assert_eq!(report.liquidity, LiquidityTrend::Decrease);
    assert!(market.pool.coeff() < coeff);
}

#[test]
fn test_set_liquidity_through_governance() {
    let mut market = Market::new();
    let governor = market.pool.governor;
    let doubled = market.pool.coeff() * perp_curve::math::U256::from(2u8);
    let action = GovernanceAction::SetLiquidity {
        coeff: doubled.0,
        reserve0: 14_142_135_623_730_950_488_016_887,
    };

    assert_eq!(
        market.pool.govern(&Pubkey::new_unique(), &action),
        Err(PerpError::Unauthorized)
    );
    market.pool.govern(&governor, &action).unwrap();
    assert_eq!(market.pool.coeff(), doubled);
    assert_eq!(market.pool.reserve0(), 14_142_135_623_730_950_488_016_887);
}

#[test]
fn test_market_status_gates_trading() {
    let mut market = Market::new();
    let governor = market.pool.governor;
    let trader = Pubkey::new_unique();
    market.open_long(&trader, 0, 1_000 * WAD, LONG_5X_STRIKE).unwrap();

    market
        .pool
        .govern(&governor, &GovernanceAction::SetMarketStatus(MarketStatus::NoMint))
        .unwrap();
    assert_eq!(
        market.open_long(&trader, 0, WAD, LONG_5X_STRIKE),
        Err(err(PerpError::MintDisabled))
    );
    market.close_long(&trader, 0, 500 * WAD, LONG_5X_STRIKE).unwrap();

    market
        .pool
        .govern(&governor, &GovernanceAction::SetMarketStatus(MarketStatus::NoAction))
        .unwrap();
    assert_eq!(
        market.close_long(&trader, 0, 500 * WAD, LONG_5X_STRIKE),
        Err(err(PerpError::TradingHalted))
    );
    assert_eq!(market.position(&trader, LONG_5X_STRIKE, Side::Long), 500 * WAD);
}

#[test]
fn test_referrer_commission_and_reward_flow() {
    let mut market = Market::new();
    let trader = Pubkey::new_unique();
    let referrer = Pubkey::new_unique();

    market
        .trade(&trader, Some(&referrer), 0, |pool, ctx, collaborators| {
            pool.open_long(ctx, 1_000 * WAD, LONG_5X_STRIKE, 0, collaborators)
        })
        .unwrap();
    assert_eq!(market.pool.commission(&referrer), 124_987_501_249_875);
    assert_eq!(market.pool.insurance, 874_912_508_749_125);

    let claimed = market
        .pool
        .claim_commission(&referrer, &mut market.wallet)
        .unwrap();
    assert_eq!(claimed, 124_987_501_249_875);
    assert_eq!(market.wallet.paid_to(&referrer), claimed);
    assert_eq!(market.pool.commission(&referrer), 0);

    assert_eq!(market.pool.distribute_reward(3_599, &mut market.wallet).unwrap(), 0);
    assert_eq!(
        market.pool.distribute_reward(3_600, &mut market.wallet).unwrap(),
        249_975_002_499_751
    );
    assert_eq!(market.pool.reward, 0);
    assert_eq!(market.wallet.paid_to(&Pubkey::default()), 249_975_002_499_751);
}
