use crate::store::{CorrelationMatrix, PricePoint, Store, UtilizationRecord, VolatilityEstimate};
use async_trait::async_trait;
use money::{Asset, CoreError, Policy, PolicyStatus, TrancheId};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory durable store used by the default supervisor wiring and
/// by tests. Never a substitute for the real persistence backend.
#[derive(Default)]
pub struct InMemoryStore {
    policies: RwLock<HashMap<u64, Policy>>,
    prices: RwLock<HashMap<Asset, Vec<PricePoint>>>,
    utilization: RwLock<HashMap<TrancheId, UtilizationRecord>>,
    volatility: RwLock<Vec<VolatilityEstimate>>,
    correlation: RwLock<Option<CorrelationMatrix>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_policy(&self, policy: Policy) {
        self.policies.write().await.insert(policy.policy_id, policy);
    }

    pub async fn get_policy(&self, policy_id: u64) -> Option<Policy> {
        self.policies.read().await.get(&policy_id).cloned()
    }

    pub async fn get_correlation_matrix(&self) -> Option<CorrelationMatrix> {
        self.correlation.read().await.clone()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_active_policies(&self) -> Result<Vec<Policy>, CoreError> {
        Ok(self
            .policies
            .read()
            .await
            .values()
            .filter(|p| !p.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn insert_price(
        &self,
        asset: Asset,
        price: f64,
        source: &str,
        timestamp: i64,
    ) -> Result<(), CoreError> {
        debug!(?asset, price, source, "recording price point");
        self.prices
            .write()
            .await
            .entry(asset)
            .or_default()
            .push(PricePoint { asset, price, timestamp });
        Ok(())
    }

    async fn check_sustained_depeg(
        &self,
        asset: Asset,
        trigger_price: f64,
        duration_seconds: i64,
    ) -> Result<bool, CoreError> {
        let prices = self.prices.read().await;
        let Some(series) = prices.get(&asset) else {
            return Ok(false);
        };
        let Some(latest) = series.iter().map(|p| p.timestamp).max() else {
            return Ok(false);
        };
        let window_start = latest - duration_seconds;
        let in_window: Vec<&PricePoint> =
            series.iter().filter(|p| p.timestamp >= window_start).collect();
        if in_window.is_empty() {
            return Ok(false);
        }
        let window_covered = in_window.iter().map(|p| p.timestamp).min().unwrap() <= window_start;
        let all_below_trigger = in_window.iter().all(|p| p.price < trigger_price);
        Ok(window_covered && all_below_trigger)
    }

    async fn price_history(&self, asset: Asset, since: i64) -> Result<Vec<f64>, CoreError> {
        let prices = self.prices.read().await;
        let Some(series) = prices.get(&asset) else {
            return Ok(Vec::new());
        };
        let mut in_window: Vec<&PricePoint> = series.iter().filter(|p| p.timestamp >= since).collect();
        in_window.sort_by_key(|p| p.timestamp);
        Ok(in_window.into_iter().map(|p| p.price).collect())
    }

    async fn update_policy_status(
        &self,
        policy_id: u64,
        new_status: PolicyStatus,
    ) -> Result<bool, CoreError> {
        let mut policies = self.policies.write().await;
        let policy = policies
            .get_mut(&policy_id)
            .ok_or_else(|| CoreError::NotFound(format!("policy {policy_id}")))?;
        if !policy.status.can_transition_to(new_status) {
            return Ok(false);
        }
        policy.status = new_status;
        Ok(true)
    }

    async fn upsert_utilization(&self, record: UtilizationRecord) -> Result<(), CoreError> {
        self.utilization.write().await.insert(record.tranche_id, record);
        Ok(())
    }

    async fn load_utilization(
        &self,
        tranche_id: TrancheId,
    ) -> Result<Option<UtilizationRecord>, CoreError> {
        Ok(self.utilization.read().await.get(&tranche_id).copied())
    }

    async fn persist_volatility_estimates(
        &self,
        estimates: Vec<VolatilityEstimate>,
    ) -> Result<(), CoreError> {
        *self.volatility.write().await = estimates;
        Ok(())
    }

    async fn persist_correlation_matrix(&self, matrix: CorrelationMatrix) -> Result<(), CoreError> {
        *self.correlation.write().await = Some(matrix);
        Ok(())
    }
}
