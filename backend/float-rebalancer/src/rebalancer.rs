use crate::decision::decide;
use crate::target::target_usd_fraction;
use crate::types::{RebalanceAction, RebalanceDecision, Urgency};
use collateral_pool::{CollateralPoolManager, PoolState};
use money::{mul_div, usd_to_cents, Asset, CoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const SATS_PER_BTC: i64 = 100_000_000;

fn usd_cents_to_sats(cents: i64, btc_price_usd: f64) -> i64 {
    let price_cents_per_btc = usd_to_cents(btc_price_usd);
    mul_div(cents, SATS_PER_BTC, price_cents_per_btc)
}

/// Drives one rebalance iteration: computes the target USD fraction,
/// decides an action against the live pool snapshot, and applies it
/// atomically through the pool manager.
pub struct FloatRebalancer {
    pool: Arc<CollateralPoolManager>,
    target_usd_ratio: f64,
    rebalance_threshold: f64,
    min_btc_float_sats: i64,
}

impl FloatRebalancer {
    pub fn new(
        pool: Arc<CollateralPoolManager>,
        target_usd_ratio: f64,
        rebalance_threshold: f64,
        min_btc_float_sats: i64,
    ) -> Self {
        Self { pool, target_usd_ratio, rebalance_threshold, min_btc_float_sats }
    }

    pub async fn run_iteration(
        &self,
        btc_price_usd: f64,
        volatility: f64,
        stress_prices: &HashMap<Asset, f64>,
        now: i64,
    ) -> Result<RebalanceDecision, CoreError> {
        let snapshot = self.pool.snapshot().await;
        let u_star = target_usd_fraction(&snapshot, stress_prices, volatility, self.target_usd_ratio);
        let decision = decide(&snapshot, btc_price_usd, u_star, self.rebalance_threshold, self.min_btc_float_sats);
        self.apply(&snapshot, &decision, btc_price_usd, now).await?;
        log_urgency(&decision);
        Ok(decision)
    }

    async fn apply(
        &self,
        snapshot: &PoolState,
        decision: &RebalanceDecision,
        btc_price_usd: f64,
        now: i64,
    ) -> Result<(), CoreError> {
        match decision.action {
            RebalanceAction::Hold => Ok(()),
            RebalanceAction::BuyBtc(cents) => {
                if cents <= 0 {
                    return Ok(());
                }
                let sats = usd_cents_to_sats(cents, btc_price_usd);
                self.pool.apply_float_rebalance(sats, -cents, cents, now).await
            }
            RebalanceAction::SellBtc(cents) => {
                if cents <= 0 {
                    return Ok(());
                }
                let sats = usd_cents_to_sats(cents, btc_price_usd);
                let cost_basis_reduction = if snapshot.btc_float_sats > 0 {
                    mul_div(snapshot.btc_cost_basis_usd, sats, snapshot.btc_float_sats)
                } else {
                    0
                };
                self.pool.apply_float_rebalance(-sats, cents, -cost_basis_reduction, now).await
            }
        }
    }
}

fn log_urgency(decision: &RebalanceDecision) {
    let action = decision.action;
    let drift = decision.current_usd_fraction - decision.target_usd_fraction;
    match decision.urgency {
        Urgency::Critical => warn!(?action, drift, "float drift is critical"),
        Urgency::High => warn!(?action, drift, "float drift is high"),
        Urgency::Medium => info!(?action, "float rebalance executing"),
        Urgency::Low => info!(?action, "float rebalance iteration complete"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collateral_pool::UnderwritingThresholds;
    use money::TrancheId;
    use persistence::InMemoryStore;
    use utilization_tracker::UtilizationTracker;

    async fn rebalancer_with_capital(capital: i64) -> (FloatRebalancer, Arc<CollateralPoolManager>) {
        let tracker = Arc::new(UtilizationTracker::new(Arc::new(InMemoryStore::new())));
        let pool = Arc::new(CollateralPoolManager::new(tracker, UnderwritingThresholds::default()));
        pool.add_liquidity("lp1", TrancheId::Eqt, capital).await.unwrap();
        let rebalancer = FloatRebalancer::new(pool.clone(), 0.40, 0.10, 0);
        (rebalancer, pool)
    }

    #[tokio::test]
    async fn buy_action_increases_btc_float_and_spends_usd() {
        let (rebalancer, pool) = rebalancer_with_capital(10_000_000_00).await;
        let decision = rebalancer.run_iteration(60_000.0, 0.30, &HashMap::new(), 100).await.unwrap();
        assert!(matches!(decision.action, RebalanceAction::BuyBtc(_)));
        let snapshot = pool.snapshot().await;
        assert!(snapshot.btc_float_sats > 0);
        assert_eq!(snapshot.last_rebalance_time, 100);
    }

    #[tokio::test]
    async fn already_at_target_holds() {
        let (rebalancer, pool) = rebalancer_with_capital(10_000_000_00).await;
        // Pre-seed a 40/60 USD/BTC split directly, matching the default target.
        let sats = usd_cents_to_sats(6_000_000_00, 60_000.0);
        pool.apply_float_rebalance(sats, -6_000_000_00, 6_000_000_00, 50).await.unwrap();

        let decision = rebalancer.run_iteration(60_000.0, 0.30, &HashMap::new(), 100).await.unwrap();

        assert_eq!(decision.action, RebalanceAction::Hold);
        let snapshot = pool.snapshot().await;
        assert_eq!(snapshot.last_rebalance_time, 50);
    }
}
