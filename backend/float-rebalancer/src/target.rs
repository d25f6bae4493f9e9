use collateral_pool::PoolState;
use money::Asset;
use std::collections::HashMap;

/// Fraction of active policies assumed to trigger simultaneously under
/// a stress scenario.
const STRESS_SIMULTANEOUS_FRACTION: f64 = 0.5;
/// Safety multiplier applied to required liquidity when deriving the
/// minimum USD fraction floor.
const LIQUIDITY_SAFETY_MULTIPLIER: f64 = 1.5;
/// Volatility level at which no adjustment is applied to the base target.
const VOLATILITY_BASELINE: f64 = 0.30;
const VOL_ADJUST_FACTOR: f64 = 0.5;
const MAX_USD_FRACTION: f64 = 0.80;

/// Required liquidity: sum of each active policy's payout under its
/// asset's stress price, halved on the assumption that at most half of
/// the book triggers at once. Falls back to the policy's own floor
/// price when no stress price was supplied for its asset.
pub fn required_liquidity(pool: &PoolState, stress_prices: &HashMap<Asset, f64>) -> i64 {
    let total: i64 = pool
        .active_policies
        .values()
        .map(|policy| {
            let stress_price = stress_prices.get(&policy.asset).copied().unwrap_or(policy.floor_price);
            payout_under_stress(policy.coverage_amount, policy.trigger_price, policy.floor_price, stress_price)
        })
        .sum();
    (total as f64 * STRESS_SIMULTANEOUS_FRACTION) as i64
}

fn payout_under_stress(coverage_amount: i64, trigger_price: f64, floor_price: f64, price: f64) -> i64 {
    if price >= trigger_price {
        return 0;
    }
    if price <= floor_price {
        return coverage_amount;
    }
    let ratio = (trigger_price - price) / (trigger_price - floor_price);
    (coverage_amount as f64 * ratio).floor() as i64
}

/// `u* = clamp(max(u_min, u_0 + (volatility - baseline) * vol_adjust_factor), 0, 0.80)`
pub fn target_usd_fraction(
    pool: &PoolState,
    stress_prices: &HashMap<Asset, f64>,
    volatility: f64,
    base_usd_fraction: f64,
) -> f64 {
    let total_capital = pool.total_capital_usd();
    if total_capital <= 0 {
        return base_usd_fraction.clamp(0.0, MAX_USD_FRACTION);
    }
    let l = required_liquidity(pool, stress_prices);
    let u_min = (l as f64 * LIQUIDITY_SAFETY_MULTIPLIER) / total_capital as f64;
    let adjustment = (volatility - VOLATILITY_BASELINE) * VOL_ADJUST_FACTOR;
    (base_usd_fraction + adjustment).max(u_min).clamp(0.0, MAX_USD_FRACTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use money::{Policy, TrancheId};

    fn pool_with_capital(capital: i64) -> PoolState {
        let mut pool = PoolState::new(0);
        pool.tranche_mut(TrancheId::Eqt).allocated_capital = capital;
        pool
    }

    #[test]
    fn zero_volatility_adjustment_below_baseline_lowers_target() {
        let pool = pool_with_capital(10_000_000_00);
        let u = target_usd_fraction(&pool, &HashMap::new(), 0.10, 0.40);
        assert!(u < 0.40);
    }

    #[test]
    fn high_volatility_raises_target() {
        let pool = pool_with_capital(10_000_000_00);
        let u = target_usd_fraction(&pool, &HashMap::new(), 0.80, 0.40);
        assert!(u > 0.40);
    }

    #[test]
    fn target_never_exceeds_cap() {
        let pool = pool_with_capital(10_000_000_00);
        let u = target_usd_fraction(&pool, &HashMap::new(), 5.0, 0.40);
        assert_eq!(u, MAX_USD_FRACTION);
    }

    #[test]
    fn required_liquidity_accounts_for_stress_price() {
        let mut pool = PoolState::new(0);
        let policy =
            Policy::new(1, "h".into(), "b".into(), Asset::Usdc, 1_000_000_00, 0, 0.97, 0.90, 0, 1_000_000_000)
                .unwrap();
        pool.active_policies.insert(1, policy);
        let mut stress = HashMap::new();
        stress.insert(Asset::Usdc, 0.90);
        let l = required_liquidity(&pool, &stress);
        assert_eq!(l, 500_000_00);
    }
}
