//! Collateral Engine Simulation.
//!
//! Walks the engine through full lifecycle scenarios: exchange rate
//! appreciation with revenue hiding, depeg and recovery, sustained depeg to
//! default, oracle outage to default, reward claims, and portfolio
//! aggregation over a mixed basket.

use collateral_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::rc::Rc;

const HOUR: i64 = 3600;
const DAY: i64 = 86_400;

fn main() {
    println!("Collateral Valuation and Default Detection Simulation");
    println!("One Engine per Asset, Explicit Refresh Cycles\n");

    scenario_1_appreciation_and_hiding();
    scenario_2_depeg_and_recovery();
    scenario_3_sustained_depeg_to_default();
    scenario_4_oracle_outage();
    scenario_5_reward_claims();
    scenario_6_portfolio_view();

    println!("\nAll simulations completed successfully.");
}

struct SimAsset {
    feed: Rc<MockFeed>,
    rate: Rc<MockRateSource>,
    rewards: Rc<MockRewardSource>,
    engine: CollateralEngine,
}

fn fiat_asset(id: u32, symbol: &str, hiding: Decimal) -> SimAsset {
    let feed = MockFeed::shared("usd/ref", dec!(1.00), Timestamp::from_secs(0));
    let rate = MockRateSource::shared("wrapper", dec!(1.00));
    let rewards = MockRewardSource::shared("COMP");

    let mut config = CollateralConfig::fiat_stable(AssetId(id), symbol);
    config.revenue_hiding = hiding;

    let engine = CollateralEngine::new(
        config,
        FeedSet::FiatPegged {
            uoa_per_ref: OracleHandle::new(Box::new(feed.clone()), HOUR),
        },
        Box::new(rate.clone()),
        Some(Box::new(rewards.clone())),
        Timestamp::from_secs(0),
    )
    .expect("valid preset config");

    SimAsset {
        feed,
        rate,
        rewards,
        engine,
    }
}

/// Exchange rate appreciation with a 10% hidden slice.
fn scenario_1_appreciation_and_hiding() {
    println!("Scenario 1: Appreciation and Revenue Hiding\n");

    let mut asset = fiat_asset(1, "cUSDC", dec!(0.10));

    for (i, raw) in [dec!(1.00), dec!(1.05), dec!(1.03)].into_iter().enumerate() {
        let now = Timestamp::from_secs(i as i64 * HOUR);
        asset.rate.set_rate(raw);
        asset.feed.set_price(dec!(1.00), now);
        asset.engine.refresh(now);
        println!(
            "  raw rate {} -> peak {}, exposed refPerTok {}",
            raw,
            asset.engine.peak_rate(),
            asset.engine.ref_per_tok()
        );
    }

    let (low, high) = asset.engine.price().expect("priced");
    println!("  price band: [{low}, {high}], status {}\n", asset.engine.status());
}

/// A 2% depeg that recovers inside the grace window.
fn scenario_2_depeg_and_recovery() {
    println!("Scenario 2: Depeg and Recovery\n");

    let mut asset = fiat_asset(2, "sDAI", dec!(0.0001));
    asset.engine.refresh(Timestamp::from_secs(0));

    asset.feed.set_price(dec!(0.98), Timestamp::from_secs(10));
    asset.engine.refresh(Timestamp::from_secs(10));
    println!("  peg at 0.98 -> status {}", asset.engine.status());

    asset.feed.set_price(dec!(0.995), Timestamp::from_secs(510));
    asset.engine.refresh(Timestamp::from_secs(510));
    println!("  peg back at 0.995 after 500s -> status {}", asset.engine.status());

    for event in asset.engine.take_events() {
        if let EventPayload::StatusChanged(e) = event.payload {
            println!("    event: {} -> {} at {}", e.from, e.to, event.timestamp);
        }
    }
    println!();
}

/// A depeg that persists for the full grace period.
fn scenario_3_sustained_depeg_to_default() {
    println!("Scenario 3: Sustained Depeg to Default\n");

    let mut asset = fiat_asset(3, "cUSDT", dec!(0.0001));
    asset.engine.refresh(Timestamp::from_secs(0));

    asset.feed.set_price(dec!(0.97), Timestamp::from_secs(0));
    asset.engine.refresh(Timestamp::from_secs(0));
    println!("  peg at 0.97 -> status {}", asset.engine.status());

    // keep observing the same broken peg every six hours
    let mut now = 0;
    while asset.engine.status() == CollateralStatus::Iffy {
        now += 6 * HOUR;
        asset.feed.set_price(dec!(0.97), Timestamp::from_secs(now));
        asset.engine.refresh(Timestamp::from_secs(now));
    }
    println!("  status {} after {}h in breach", asset.engine.status(), now / HOUR);

    // recovery afterwards changes nothing
    asset.feed.set_price(dec!(1.00), Timestamp::from_secs(now + 10));
    asset.engine.refresh(Timestamp::from_secs(now + 10));
    println!("  peg restored -> status still {}\n", asset.engine.status());
}

/// A feed that stops publishing: unpriceable first, defaulted once the
/// price timeout passes.
fn scenario_4_oracle_outage() {
    println!("Scenario 4: Oracle Outage\n");

    let mut asset = fiat_asset(4, "cUSDC", dec!(0.0001));
    asset.engine.refresh(Timestamp::from_secs(0));

    // feed frozen at t=0; two hours later the 1h feed timeout has passed
    asset.engine.refresh(Timestamp::from_secs(2 * HOUR));
    match asset.engine.try_price() {
        Err(e) => println!("  after 2h silence: unpriceable ({e}), status {}", asset.engine.status()),
        Ok(_) => unreachable!("feed is stale"),
    }

    // a week of silence exceeds the price timeout
    asset.engine.refresh(Timestamp::from_secs(7 * DAY + 1));
    println!("  after a week of silence: status {}\n", asset.engine.status());
}

/// Reward stream pass-through, decoupled from soundness.
fn scenario_5_reward_claims() {
    println!("Scenario 5: Reward Claims\n");

    let mut asset = fiat_asset(5, "aUSDC", dec!(0.0001));
    asset.engine.refresh(Timestamp::from_secs(0));

    asset.rewards.accrue(dec!(41.7));
    let claimed = asset
        .engine
        .claim_rewards(Timestamp::from_secs(100))
        .expect("claim succeeds");
    println!("  claimed {claimed} COMP, status {}", asset.engine.status());

    let claimed = asset
        .engine
        .claim_rewards(Timestamp::from_secs(200))
        .expect("claim succeeds");
    println!("  second claim: {claimed} COMP (nothing accrued)\n");
}

/// Portfolio aggregation over three assets, one of which defaults.
fn scenario_6_portfolio_view() {
    println!("Scenario 6: Portfolio View\n");

    let healthy_a = fiat_asset(6, "cUSDC", dec!(0.0001));
    let healthy_b = fiat_asset(7, "sDAI", dec!(0.0001));
    let doomed = fiat_asset(8, "cUSDT", dec!(0.0001));

    let mut portfolio = Portfolio::new();
    portfolio.register(healthy_a.engine, dec!(500_000)).unwrap();
    portfolio.register(healthy_b.engine, dec!(300_000)).unwrap();
    portfolio.register(doomed.engine, dec!(200_000)).unwrap();
    portfolio.refresh_all(Timestamp::from_secs(0));

    println!(
        "  initial backing: {} across {} assets, worst status {}",
        portfolio.total_backing(),
        portfolio.len(),
        portfolio.worst_status()
    );

    // cUSDT breaks and stays broken for a full day
    doomed.feed.set_price(dec!(0.95), Timestamp::from_secs(10));
    for feed in [&healthy_a.feed, &healthy_b.feed] {
        feed.set_price(dec!(1.00), Timestamp::from_secs(10));
    }
    portfolio.refresh_all(Timestamp::from_secs(10));

    doomed.feed.set_price(dec!(0.95), Timestamp::from_secs(10 + DAY));
    for feed in [&healthy_a.feed, &healthy_b.feed] {
        feed.set_price(dec!(1.00), Timestamp::from_secs(10 + DAY));
    }
    portfolio.refresh_all(Timestamp::from_secs(10 + DAY));

    println!("  after cUSDT default:");
    for share in portfolio.basket_breakdown() {
        println!(
            "    {} [{}]: value {}, share {}",
            share.symbol, share.status, share.value, share.share
        );
    }

    let ratio = portfolio
        .collateralization_ratio(UoaValue::new(dec!(750_000)))
        .expect("liability is positive");
    println!(
        "  backing {}, collateralization ratio {}\n",
        portfolio.total_backing(),
        ratio
    );
}
