use crate::types::{RebalanceAction, RebalanceDecision, Urgency};
use collateral_pool::PoolState;
use money::{mul_div, usd_to_cents};

/// Upper bound on a single trade's size, as a fraction of total pool
/// capital.
const MAX_TRADE_SIZE_PCT: f64 = 0.20;
const SATS_PER_BTC: i64 = 100_000_000;

fn sats_to_usd_cents(sats: i64, btc_price_usd: f64) -> i64 {
    let price_cents_per_btc = usd_to_cents(btc_price_usd);
    mul_div(sats, price_cents_per_btc, SATS_PER_BTC)
}

/// Computes the rebalance action and its urgency for the current pool
/// state against a precomputed target fraction `u_star`.
pub fn decide(
    pool: &PoolState,
    btc_price_usd: f64,
    u_star: f64,
    rebalance_threshold: f64,
    min_btc_float_sats: i64,
) -> RebalanceDecision {
    let btc_value_cents = sats_to_usd_cents(pool.btc_float_sats, btc_price_usd);
    let total = pool.usd_reserves + btc_value_cents;
    let u = if total <= 0 { 1.0 } else { pool.usd_reserves as f64 / total as f64 };
    let drift = (u - u_star).abs();

    let action = if drift < rebalance_threshold {
        RebalanceAction::Hold
    } else if u > u_star {
        let excess_cents = ((u - u_star) * total as f64) as i64;
        let total_capital = pool.total_capital_usd();
        let cap = (total_capital as f64 * MAX_TRADE_SIZE_PCT) as i64;
        RebalanceAction::BuyBtc(excess_cents.min(cap).max(0))
    } else {
        let deficit_cents = ((u_star - u) * total as f64) as i64;
        let sellable_sats = (pool.btc_float_sats - min_btc_float_sats).max(0);
        let sellable_cents = sats_to_usd_cents(sellable_sats, btc_price_usd);
        let sell_cents = deficit_cents.min(sellable_cents).max(0);
        if sell_cents == 0 {
            RebalanceAction::Hold
        } else {
            RebalanceAction::SellBtc(sell_cents)
        }
    };

    let urgency = classify_urgency(drift, pool.reserve_ratio(), pool.effective_ltv());

    RebalanceDecision { action, urgency, target_usd_fraction: u_star, current_usd_fraction: u }
}

fn classify_urgency(drift: f64, reserve_ratio: f64, ltv: f64) -> Urgency {
    if ltv > 0.95 || reserve_ratio < 0.05 || drift > 0.30 {
        Urgency::Critical
    } else if ltv > 0.85 || reserve_ratio < 0.15 || drift > 0.20 {
        Urgency::High
    } else if drift > 0.10 {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}
