use crate::gate::{can_underwrite, UnderwritingThresholds};
use crate::liquidity::{add_liquidity, remove_liquidity};
use crate::pool_state::PoolState;
use crate::waterfall::{apply_loss, distribute_revenue, WaterfallResult};
use chrono::Utc;
use money::{CoreError, Policy, TrancheId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use utilization_tracker::UtilizationTracker;

/// Owns the unified pool. Every mutator goes through this service;
/// reads of tranche state for external consumers go through the
/// utilization tracker it keeps in sync on every mutation.
pub struct CollateralPoolManager {
    state: RwLock<PoolState>,
    utilization: Arc<UtilizationTracker>,
    thresholds: UnderwritingThresholds,
}

impl CollateralPoolManager {
    pub fn new(utilization: Arc<UtilizationTracker>, thresholds: UnderwritingThresholds) -> Self {
        Self { state: RwLock::new(PoolState::new(Utc::now().timestamp())), utilization, thresholds }
    }

    pub async fn snapshot(&self) -> PoolState {
        self.state.read().await.clone()
    }

    pub async fn can_underwrite(
        &self,
        policy: &Policy,
        worst_case_loss: Option<f64>,
    ) -> (bool, Option<String>) {
        let pool = self.state.read().await;
        can_underwrite(&pool, policy, worst_case_loss, &self.thresholds)
    }

    pub async fn allocate_coverage(
        &self,
        policy: Policy,
        worst_case_loss: Option<f64>,
    ) -> Result<(), CoreError> {
        let mut pool = self.state.write().await;
        let (accepted, reason) = can_underwrite(&pool, &policy, worst_case_loss, &self.thresholds);
        if !accepted {
            return Err(CoreError::UnderwritingRejected(reason.unwrap_or_default()));
        }
        let per_tranche = pool.distribute_by_risk_weight(policy.coverage_amount);
        for (id, amount) in &per_tranche {
            pool.tranche_mut(*id).allocated_coverage += amount;
        }
        let policy_id = policy.policy_id;
        pool.active_policies.insert(policy_id, policy);
        drop(pool);

        for (id, amount) in per_tranche {
            if amount != 0 {
                self.utilization.update_coverage(id, amount).await?;
            }
        }
        info!(policy_id, "coverage allocated");
        Ok(())
    }

    /// Idempotent: a second call with the same id is a no-op.
    pub async fn release_coverage(&self, policy_id: u64) -> Result<(), CoreError> {
        let mut pool = self.state.write().await;
        let Some(policy) = pool.active_policies.remove(&policy_id) else {
            return Ok(());
        };
        let per_tranche = pool.distribute_by_risk_weight(policy.coverage_amount);
        for (id, amount) in &per_tranche {
            let tranche = pool.tranche_mut(*id);
            tranche.allocated_coverage = (tranche.allocated_coverage - amount).max(0);
        }
        drop(pool);
        for (id, amount) in per_tranche {
            if amount != 0 {
                self.utilization.update_coverage(id, -amount).await?;
            }
        }
        Ok(())
    }

    pub async fn execute_payout(&self, policy_id: u64, payout_amount: i64) -> Result<WaterfallResult, CoreError> {
        let mut pool = self.state.write().await;
        if !pool.active_policies.contains_key(&policy_id) {
            return Err(CoreError::NotFound(format!("policy {policy_id}")));
        }
        let result = apply_loss(&mut pool, payout_amount)?;
        if pool.is_insolvent() {
            warn!(policy_id, unallocated = pool.unallocated_loss, "EMERGENCY: pool insolvent after payout");
        }
        drop(pool);
        self.release_coverage(policy_id).await?;
        for (id, charge) in &result.charged {
            if *charge != 0 {
                self.utilization.update_capital(*id, -*charge).await?;
            }
        }
        Ok(result)
    }

    /// Atomically applies a float trade's effect on the physical BTC/USD
    /// split. Positive `usd_cents_delta` is USD received (a sell);
    /// negative is USD spent (a buy). Clamped at zero on both legs so a
    /// caller's rounding cannot drive either side negative.
    pub async fn apply_float_rebalance(
        &self,
        btc_sats_delta: i64,
        usd_cents_delta: i64,
        cost_basis_delta_usd: i64,
        now: i64,
    ) -> Result<(), CoreError> {
        let mut pool = self.state.write().await;
        pool.btc_float_sats = (pool.btc_float_sats + btc_sats_delta).max(0);
        pool.usd_reserves = (pool.usd_reserves + usd_cents_delta).max(0);
        pool.btc_cost_basis_usd += cost_basis_delta_usd;
        pool.last_rebalance_time = now;
        Ok(())
    }

    /// Moves capital directly between two tranches, never touching
    /// total pool capital. Used by the tranche arbitrage engine to act
    /// on a mispricing signal, not by LP-driven deposit/withdrawal.
    pub async fn reallocate_capital(&self, from: TrancheId, to: TrancheId, amount_cents: i64) -> Result<(), CoreError> {
        if amount_cents <= 0 {
            return Err(CoreError::ValidationError("amount_cents must be > 0".into()));
        }
        let mut pool = self.state.write().await;
        if amount_cents > pool.tranche(from).allocated_capital {
            return Err(CoreError::InsufficientBalance);
        }
        pool.tranche_mut(from).allocated_capital -= amount_cents;
        pool.tranche_mut(to).allocated_capital += amount_cents;
        drop(pool);
        self.utilization.update_capital(from, -amount_cents).await?;
        self.utilization.update_capital(to, amount_cents).await?;
        Ok(())
    }

    pub async fn add_liquidity(
        &self,
        lp_address: &str,
        tranche_id: TrancheId,
        amount_cents: i64,
    ) -> Result<i64, CoreError> {
        let mut pool = self.state.write().await;
        let minted = add_liquidity(&mut pool, lp_address, tranche_id, amount_cents)?;
        drop(pool);
        self.utilization.update_capital(tranche_id, amount_cents).await?;
        Ok(minted)
    }

    /// Distributes `premium_cents` senior-to-junior per §4.3's revenue
    /// waterfall, each tranche bounded by its own modeled yield at the
    /// utilization tracker's current `current_apy_bps` over
    /// `elapsed_secs`. Returns the residual after the equity tranche
    /// (protocol surplus, out of scope, not tracked further).
    pub async fn distribute_revenue(&self, premium_cents: i64, elapsed_secs: i64) -> Result<i64, CoreError> {
        let mut apy_bps = HashMap::with_capacity(money::ALL_TRANCHES.len());
        for id in money::ALL_TRANCHES {
            apy_bps.insert(id, self.utilization.get(id).await?.current_apy_bps);
        }
        let mut pool = self.state.write().await;
        Ok(distribute_revenue(&mut pool, premium_cents, elapsed_secs, &apy_bps))
    }

    pub async fn remove_liquidity(
        &self,
        lp_address: &str,
        tranche_id: TrancheId,
        tokens: i64,
    ) -> Result<i64, CoreError> {
        let mut pool = self.state.write().await;
        remove_liquidity(&mut pool, lp_address, tranche_id, tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use money::Asset;
    use persistence::InMemoryStore;

    fn manager() -> CollateralPoolManager {
        let tracker = Arc::new(UtilizationTracker::new(Arc::new(InMemoryStore::new())));
        CollateralPoolManager::new(tracker, UnderwritingThresholds::default())
    }

    fn policy(id: u64, coverage: i64) -> Policy {
        Policy::new(id, "h".into(), "b".into(), Asset::Usdc, coverage, 0, 0.97, 0.90, 0, 1_000_000).unwrap()
    }

    #[tokio::test]
    async fn allocate_then_release_is_idempotent() {
        let manager = manager();
        {
            let mut pool = manager.state.write().await;
            pool.tranche_mut(TrancheId::Eqt).allocated_capital = 10_000_000;
            pool.usd_reserves = 10_000_000;
        }
        manager.allocate_coverage(policy(1, 100_000), Some(0.0)).await.unwrap();
        manager.release_coverage(1).await.unwrap();
        manager.release_coverage(1).await.unwrap();
        let pool = manager.snapshot().await;
        assert!(!pool.active_policies.contains_key(&1));
    }

    #[tokio::test]
    async fn rejects_underwriting_when_gate_fails() {
        let manager = manager();
        let err = manager.allocate_coverage(policy(1, 100_000), Some(0.0)).await.unwrap_err();
        matches!(err, CoreError::UnderwritingRejected(_));
    }

    #[tokio::test]
    async fn float_rebalance_updates_all_four_fields_atomically() {
        let manager = manager();
        {
            let mut pool = manager.state.write().await;
            pool.usd_reserves = 5_000_000_00;
        }
        manager.apply_float_rebalance(50_000_000, -3_000_000_00, 3_000_000_00, 1_700).await.unwrap();
        let pool = manager.snapshot().await;
        assert_eq!(pool.btc_float_sats, 50_000_000);
        assert_eq!(pool.usd_reserves, 2_000_000_00);
        assert_eq!(pool.btc_cost_basis_usd, 3_000_000_00);
        assert_eq!(pool.last_rebalance_time, 1_700);
    }

    #[tokio::test]
    async fn reallocate_capital_conserves_total() {
        let manager = manager();
        {
            let mut pool = manager.state.write().await;
            pool.tranche_mut(TrancheId::Eqt).allocated_capital = 1_000_000;
        }
        manager.reallocate_capital(TrancheId::Eqt, TrancheId::BtcSenior, 400_000).await.unwrap();
        let pool = manager.snapshot().await;
        assert_eq!(pool.tranche(TrancheId::Eqt).allocated_capital, 600_000);
        assert_eq!(pool.tranche(TrancheId::BtcSenior).allocated_capital, 400_000);
    }

    #[tokio::test]
    async fn reallocate_capital_rejects_overdraw() {
        let manager = manager();
        let err = manager.reallocate_capital(TrancheId::Eqt, TrancheId::BtcSenior, 1).await.unwrap_err();
        assert_eq!(err, CoreError::InsufficientBalance);
    }

    #[tokio::test]
    async fn add_liquidity_preserves_existing_coverage() {
        let manager = manager();
        {
            let mut pool = manager.state.write().await;
            pool.tranche_mut(TrancheId::Eqt).allocated_capital = 10_000_000;
            pool.usd_reserves = 10_000_000;
        }
        manager.allocate_coverage(policy(1, 100_000), Some(0.0)).await.unwrap();
        manager.add_liquidity("lp2", TrancheId::Eqt, 1_000_000).await.unwrap();

        let record = manager.utilization.get(TrancheId::Eqt).await.unwrap();
        assert_eq!(record.coverage_sold, 100_000);
        assert_eq!(record.total_capital, 11_000_000);
    }

    #[tokio::test]
    async fn distribute_revenue_credits_tranches_via_live_apy() {
        let manager = manager();
        {
            let mut pool = manager.state.write().await;
            pool.tranche_mut(TrancheId::Eqt).allocated_capital = 1_000_000;
        }
        manager.utilization.sync_from_chain(TrancheId::Eqt, 1_000_000, 0).await.unwrap();

        let surplus = manager.distribute_revenue(10_000, 30 * 24 * 3600).await.unwrap();

        let pool = manager.snapshot().await;
        assert!(pool.tranche(TrancheId::Eqt).accumulated_yields > 0);
        assert_eq!(surplus, 10_000 - pool.tranche(TrancheId::Eqt).accumulated_yields);
    }
}
