use async_trait::async_trait;
use money::{Asset, CoreError, Policy, PolicyStatus, TrancheId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricePoint {
    pub asset: Asset,
    pub price: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilizationRecord {
    pub tranche_id: TrancheId,
    pub total_capital: i64,
    pub coverage_sold: i64,
    pub utilization_ratio: f64,
    pub current_apy_bps: u32,
    pub last_updated: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolatilityEstimate {
    pub asset: Asset,
    pub annualized_volatility: f64,
    pub as_of: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub assets: Vec<Asset>,
    pub matrix: Vec<Vec<f64>>,
    pub as_of: i64,
}

/// The durable-store contract the core relies on. Every operation is
/// transactional and composable; the real backend (schema, migrations,
/// connection pooling) is out of scope — only this contract is.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_active_policies(&self) -> Result<Vec<Policy>, CoreError>;

    async fn insert_price(
        &self,
        asset: Asset,
        price: f64,
        source: &str,
        timestamp: i64,
    ) -> Result<(), CoreError>;

    async fn check_sustained_depeg(
        &self,
        asset: Asset,
        trigger_price: f64,
        duration_seconds: i64,
    ) -> Result<bool, CoreError>;

    /// Chronological price series for `asset` at or after `since`,
    /// oldest first. Backs volatility/correlation estimation; returns
    /// an empty vector for an untracked asset.
    async fn price_history(&self, asset: Asset, since: i64) -> Result<Vec<f64>, CoreError>;

    /// Conditional: succeeds only if `policy.status` is a legal
    /// predecessor of `new_status`. Returns `Ok(true)` if the update
    /// applied, `Ok(false)` if it was a no-op (already in or past
    /// `new_status`), making a duplicate `Paid` retry safe.
    async fn update_policy_status(
        &self,
        policy_id: u64,
        new_status: PolicyStatus,
    ) -> Result<bool, CoreError>;

    async fn upsert_utilization(&self, record: UtilizationRecord) -> Result<(), CoreError>;

    async fn load_utilization(
        &self,
        tranche_id: TrancheId,
    ) -> Result<Option<UtilizationRecord>, CoreError>;

    async fn persist_volatility_estimates(
        &self,
        estimates: Vec<VolatilityEstimate>,
    ) -> Result<(), CoreError>;

    async fn persist_correlation_matrix(&self, matrix: CorrelationMatrix) -> Result<(), CoreError>;
}
