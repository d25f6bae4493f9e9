use crate::onchain::OnChainPayout;
use crate::payout_calc::compute_payout;
use crate::trigger_state::TriggerState;
use collateral_pool::CollateralPoolManager;
use money::{Asset, CoreError, Policy, PolicyStatus};
use oracle::{resolve_quote, PriceOracle};
use persistence::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, warn};

pub struct TriggerMonitorConfig {
    pub confirmation_period_secs: i64,
    pub max_oracle_staleness_secs: i64,
    pub fallback_stable_price: f64,
    pub fallback_btc_price: f64,
}

impl Default for TriggerMonitorConfig {
    fn default() -> Self {
        Self {
            confirmation_period_secs: 14_400,
            max_oracle_staleness_secs: 300,
            fallback_stable_price: 1.00,
            fallback_btc_price: 60_000.0,
        }
    }
}

/// Evaluates active policies against fresh prices on every iteration,
/// drives the confirmation-window state machine, and executes payouts
/// exactly once per policy.
pub struct TriggerMonitor {
    store: Arc<dyn Store>,
    price_oracle: Arc<dyn PriceOracle>,
    pool: Arc<CollateralPoolManager>,
    payout: Arc<dyn OnChainPayout>,
    trigger_states: RwLock<HashMap<u64, TriggerState>>,
    config: TriggerMonitorConfig,
}

impl TriggerMonitor {
    pub fn new(
        store: Arc<dyn Store>,
        price_oracle: Arc<dyn PriceOracle>,
        pool: Arc<CollateralPoolManager>,
        payout: Arc<dyn OnChainPayout>,
        config: TriggerMonitorConfig,
    ) -> Self {
        Self { store, price_oracle, pool, payout, trigger_states: RwLock::new(HashMap::new()), config }
    }

    pub async fn trigger_state(&self, policy_id: u64) -> Option<TriggerState> {
        self.trigger_states.read().await.get(&policy_id).copied()
    }

    /// One scheduler tick: load active policies, group by asset, step
    /// each policy's state machine. A single policy's failure is
    /// logged and does not block the rest of the batch.
    pub async fn run_iteration(&self, now: i64) -> Result<(), CoreError> {
        let policies = self.store.get_active_policies().await?;

        let mut prices: HashMap<Asset, Option<f64>> = HashMap::new();
        for policy in &policies {
            if prices.contains_key(&policy.asset) {
                continue;
            }
            let quote = self.price_oracle.get_consensus_price(policy.asset, None).await;
            let resolved = resolve_quote(
                quote,
                policy.asset,
                self.config.fallback_stable_price,
                self.config.fallback_btc_price,
                self.config.max_oracle_staleness_secs,
                now,
            );
            prices.insert(policy.asset, resolved);
        }

        for policy in policies {
            if policy.status.is_terminal() {
                continue;
            }
            if now > policy.expiry_time {
                if let Err(err) = self.store.update_policy_status(policy.policy_id, PolicyStatus::Expired).await {
                    error!(policy_id = policy.policy_id, %err, "failed to mark policy expired");
                }
                self.trigger_states.write().await.remove(&policy.policy_id);
                continue;
            }
            let Some(price) = prices.get(&policy.asset).copied().flatten() else {
                warn!(policy_id = policy.policy_id, "oracle unavailable for policy's asset this iteration");
                continue;
            };
            if let Err(err) = self.step_policy(&policy, price, now).await {
                error!(policy_id = policy.policy_id, %err, "trigger step failed");
            }
        }
        Ok(())
    }

    async fn step_policy(&self, policy: &Policy, price: f64, now: i64) -> Result<(), CoreError> {
        if policy.status == PolicyStatus::Confirmed {
            return self.attempt_payout(policy, price).await;
        }

        let existing = self.trigger_states.read().await.get(&policy.policy_id).copied();

        if price >= policy.trigger_price {
            if existing.is_some() {
                self.trigger_states.write().await.remove(&policy.policy_id);
                if policy.status == PolicyStatus::Triggered {
                    self.store.update_policy_status(policy.policy_id, PolicyStatus::Active).await?;
                }
            }
            return Ok(());
        }

        match existing {
            None => {
                self.trigger_states
                    .write()
                    .await
                    .insert(policy.policy_id, TriggerState::new(policy.policy_id, now));
                self.store.update_policy_status(policy.policy_id, PolicyStatus::Triggered).await?;
                warn!(policy_id = policy.policy_id, price, trigger = policy.trigger_price, "Depeg Detected");
            }
            Some(state) if state.is_due_for_confirmation(now, self.config.confirmation_period_secs) => {
                let sustained = self
                    .store
                    .check_sustained_depeg(policy.asset, policy.trigger_price, self.config.confirmation_period_secs)
                    .await?;
                if sustained {
                    self.store.update_policy_status(policy.policy_id, PolicyStatus::Confirmed).await?;
                    self.trigger_states.write().await.remove(&policy.policy_id);
                    self.attempt_payout(policy, price).await?;
                }
            }
            Some(_) => {}
        }
        Ok(())
    }

    async fn attempt_payout(&self, policy: &Policy, price: f64) -> Result<(), CoreError> {
        let payout_amount = compute_payout(policy.coverage_amount, policy.trigger_price, policy.floor_price, price);
        let scaled_price = (price * 100_000_000.0).round() as i64;
        let Some(tx_hash) = self.payout.execute_payout(policy.policy_id, scaled_price).await else {
            // stays Confirmed, retried next iteration
            return Ok(());
        };
        if !self.payout.wait_for_transaction(&tx_hash, 120).await {
            return Ok(());
        }
        let applied = self.store.update_policy_status(policy.policy_id, PolicyStatus::Paid).await?;
        if applied {
            self.pool.execute_payout(policy.policy_id, payout_amount).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onchain::{AlwaysFailsPayout, AlwaysSucceedsPayout};
    use collateral_pool::UnderwritingThresholds;
    use money::Asset;
    use oracle::{InMemoryOracle, PriceQuote};
    use persistence::InMemoryStore;
    use utilization_tracker::UtilizationTracker;

    async fn fresh_monitor(payout: Arc<dyn OnChainPayout>) -> (TriggerMonitor, Arc<InMemoryStore>, Arc<InMemoryOracle>, Arc<CollateralPoolManager>) {
        let store = Arc::new(InMemoryStore::new());
        let price_oracle = Arc::new(InMemoryOracle::new());
        let tracker = Arc::new(UtilizationTracker::new(store.clone() as Arc<dyn Store>));
        let pool = Arc::new(CollateralPoolManager::new(tracker, UnderwritingThresholds::default()));
        let monitor = TriggerMonitor::new(
            store.clone() as Arc<dyn Store>,
            price_oracle.clone() as Arc<dyn PriceOracle>,
            pool.clone(),
            payout,
            TriggerMonitorConfig::default(),
        );
        (monitor, store, price_oracle, pool)
    }

    fn policy(id: u64) -> Policy {
        Policy::new(id, "h".into(), "b".into(), Asset::Usdc, 100_000_00, 0, 0.97, 0.90, 0, 1_000_000_000)
            .unwrap()
    }

    #[tokio::test]
    async fn depeg_creates_trigger_state_and_marks_triggered() {
        let (monitor, store, price_oracle, _pool) = fresh_monitor(Arc::new(AlwaysSucceedsPayout::default())).await;
        store.insert_policy(policy(1)).await;
        price_oracle.set(Asset::Usdc, PriceQuote { price: 0.96, timestamp: 0, confidence: 0.95 });

        monitor.run_iteration(0).await.unwrap();

        let p = store.get_policy(1).await.unwrap();
        assert_eq!(p.status, PolicyStatus::Triggered);
        assert!(monitor.trigger_state(1).await.is_some());
    }

    #[tokio::test]
    async fn price_recovery_before_confirmation_resets_to_active() {
        let (monitor, store, price_oracle, _pool) = fresh_monitor(Arc::new(AlwaysSucceedsPayout::default())).await;
        store.insert_policy(policy(1)).await;
        price_oracle.set(Asset::Usdc, PriceQuote { price: 0.96, timestamp: 0, confidence: 0.95 });
        monitor.run_iteration(0).await.unwrap();

        price_oracle.set(Asset::Usdc, PriceQuote { price: 0.98, timestamp: 7_200, confidence: 0.95 });
        monitor.run_iteration(7_200).await.unwrap();

        let p = store.get_policy(1).await.unwrap();
        assert_eq!(p.status, PolicyStatus::Active);
        assert!(monitor.trigger_state(1).await.is_none());
    }

    #[tokio::test]
    async fn confirmation_and_payout_at_window_edge() {
        let (monitor, store, price_oracle, pool) = fresh_monitor(Arc::new(AlwaysSucceedsPayout::default())).await;
        for tranche in money::ALL_TRANCHES {
            pool.add_liquidity("lp1", tranche, 5_000_000_00).await.unwrap();
        }
        store.insert_policy(policy(1)).await;
        pool.allocate_coverage(policy(1), Some(5_000_000_00.0)).await.unwrap();
        price_oracle.set(Asset::Usdc, PriceQuote { price: 0.96, timestamp: 0, confidence: 0.95 });
        monitor.run_iteration(0).await.unwrap();
        store.insert_price(Asset::Usdc, 0.96, "test", 0).await.unwrap();
        store.insert_price(Asset::Usdc, 0.95, "test", 14_400).await.unwrap();

        price_oracle.set(Asset::Usdc, PriceQuote { price: 0.95, timestamp: 14_400, confidence: 0.95 });
        monitor.run_iteration(14_400).await.unwrap();

        let p = store.get_policy(1).await.unwrap();
        assert_eq!(p.status, PolicyStatus::Paid);
    }

    #[tokio::test]
    async fn failed_onchain_call_keeps_policy_confirmed() {
        let (monitor, store, price_oracle, _pool) = fresh_monitor(Arc::new(AlwaysFailsPayout::default())).await;
        let mut p = policy(1);
        p.status = PolicyStatus::Confirmed;
        store.insert_policy(p).await;
        price_oracle.set(Asset::Usdc, PriceQuote { price: 0.90, timestamp: 0, confidence: 0.95 });

        monitor.run_iteration(0).await.unwrap();

        let p = store.get_policy(1).await.unwrap();
        assert_eq!(p.status, PolicyStatus::Confirmed);
    }
}
