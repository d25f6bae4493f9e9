use crate::apy_curve::bonding_curve_bps;
use chrono::Utc;
use money::{mul_div, CoreError, TrancheId};
use persistence::{Store, UtilizationRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, warn};

const CACHE_TTL_SECS: i64 = 30;
const MAX_UTILIZATION: f64 = 0.95;
const HIGH_UTILIZATION_WARN: f64 = 0.90;
const MIN_COLLATERALIZATION_RATIO: f64 = 1.10;

struct CacheEntry {
    record: UtilizationRecord,
    cached_at: i64,
}

/// Authoritative per-tranche capital/coverage state. The sole writer
/// of the `utilization` persistence rows; reads are served from a
/// bounded-staleness cache so dashboard traffic does not hit the store
/// on every hit, while any mutation is visible to the next read in the
/// same process immediately.
pub struct UtilizationTracker {
    store: Arc<dyn Store>,
    cache: RwLock<HashMap<TrancheId, CacheEntry>>,
    cache_ttl_secs: i64,
}

impl UtilizationTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_ttl(store, CACHE_TTL_SECS)
    }

    /// Same as `new`, with an overridden cache TTL — used by tests that
    /// need to exercise staleness without a 30-second real-time sleep.
    pub fn with_ttl(store: Arc<dyn Store>, cache_ttl_secs: i64) -> Self {
        Self { store, cache: RwLock::new(HashMap::new()), cache_ttl_secs }
    }

    pub async fn get(&self, tranche: TrancheId) -> Result<UtilizationRecord, CoreError> {
        let now = Utc::now().timestamp();
        if let Some(entry) = self.cache.read().await.get(&tranche) {
            if now - entry.cached_at <= self.cache_ttl_secs {
                return Ok(entry.record);
            }
        }
        let record = match self.store.load_utilization(tranche).await? {
            Some(record) => record,
            None => default_record(tranche, now),
        };
        self.cache.write().await.insert(tranche, CacheEntry { record, cached_at: now });
        Ok(record)
    }

    pub async fn update_capital(&self, tranche: TrancheId, delta: i64) -> Result<UtilizationRecord, CoreError> {
        let current = self.get(tranche).await?;
        let new_capital = (current.total_capital + delta).max(0);
        self.commit(tranche, new_capital, current.coverage_sold).await
    }

    pub async fn update_coverage(&self, tranche: TrancheId, delta: i64) -> Result<UtilizationRecord, CoreError> {
        let current = self.get(tranche).await?;
        let new_coverage = (current.coverage_sold + delta).max(0);
        self.commit(tranche, current.total_capital, new_coverage).await
    }

    /// Overwrites capital and coverage directly, for reconciliation
    /// against on-chain state. Idempotent for identical arguments.
    pub async fn sync_from_chain(&self, tranche: TrancheId, capital: i64, coverage: i64) -> Result<UtilizationRecord, CoreError> {
        self.commit(tranche, capital, coverage).await
    }

    pub async fn can_accept_coverage(&self, tranche: TrancheId, amount: i64) -> Result<bool, CoreError> {
        let current = self.get(tranche).await?;
        if current.total_capital == 0 {
            return Ok(amount <= 0);
        }
        let projected = current.coverage_sold + amount;
        Ok(projected as f64 / current.total_capital as f64 <= MAX_UTILIZATION)
    }

    pub async fn get_available_capacity(&self, tranche: TrancheId) -> Result<i64, CoreError> {
        let current = self.get(tranche).await?;
        let cap = mul_div(current.total_capital, 95, 100);
        Ok((cap - current.coverage_sold).max(0))
    }

    async fn commit(&self, tranche: TrancheId, total_capital: i64, coverage_sold: i64) -> Result<UtilizationRecord, CoreError> {
        let now = Utc::now().timestamp();
        let utilization_ratio =
            if total_capital == 0 { 0.0 } else { coverage_sold as f64 / total_capital as f64 };
        let current_apy_bps = bonding_curve_bps(tranche, utilization_ratio);
        let record = UtilizationRecord {
            tranche_id: tranche,
            total_capital,
            coverage_sold,
            utilization_ratio,
            current_apy_bps,
            last_updated: now,
        };
        self.alert_if_needed(tranche, &record);
        self.store.upsert_utilization(record).await?;
        self.cache.write().await.insert(tranche, CacheEntry { record, cached_at: now });
        Ok(record)
    }

    fn alert_if_needed(&self, tranche: TrancheId, record: &UtilizationRecord) {
        if record.utilization_ratio >= HIGH_UTILIZATION_WARN {
            warn!(?tranche, ratio = record.utilization_ratio, "tranche utilization is high");
        }
        if record.coverage_sold > 0 {
            let collateralization_ratio = record.total_capital as f64 / record.coverage_sold as f64;
            if collateralization_ratio < MIN_COLLATERALIZATION_RATIO {
                error!(?tranche, collateralization_ratio, "tranche collateralization below minimum");
            }
        }
    }
}

fn default_record(tranche: TrancheId, now: i64) -> UtilizationRecord {
    UtilizationRecord {
        tranche_id: tranche,
        total_capital: 0,
        coverage_sold: 0,
        utilization_ratio: 0.0,
        current_apy_bps: bonding_curve_bps(tranche, 0.0),
        last_updated: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::InMemoryStore;

    fn tracker() -> UtilizationTracker {
        UtilizationTracker::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn zero_capital_tranche_has_zero_utilization() {
        let t = tracker();
        let record = t.get(TrancheId::Mezz).await.unwrap();
        assert_eq!(record.utilization_ratio, 0.0);
    }

    #[tokio::test]
    async fn update_capital_clamps_at_zero() {
        let t = tracker();
        t.update_capital(TrancheId::Mezz, -100).await.unwrap();
        let record = t.get(TrancheId::Mezz).await.unwrap();
        assert_eq!(record.total_capital, 0);
    }

    #[tokio::test]
    async fn can_accept_coverage_at_exact_threshold() {
        let t = tracker();
        t.update_capital(TrancheId::Mezz, 1_000_000).await.unwrap();
        assert!(t.can_accept_coverage(TrancheId::Mezz, 950_000).await.unwrap());
        assert!(!t.can_accept_coverage(TrancheId::Mezz, 950_001).await.unwrap());
    }

    #[tokio::test]
    async fn available_capacity_matches_ninety_five_percent_rule() {
        let t = tracker();
        t.update_capital(TrancheId::Mezz, 1_000_000).await.unwrap();
        t.update_coverage(TrancheId::Mezz, 100_000).await.unwrap();
        let capacity = t.get_available_capacity(TrancheId::Mezz).await.unwrap();
        assert_eq!(capacity, 850_000);
    }

    #[tokio::test]
    async fn capital_roundtrip_restores_previous_value() {
        let t = tracker();
        t.update_capital(TrancheId::Snr, 500_000).await.unwrap();
        t.update_capital(TrancheId::Snr, 250_000).await.unwrap();
        t.update_capital(TrancheId::Snr, -250_000).await.unwrap();
        let record = t.get(TrancheId::Snr).await.unwrap();
        assert_eq!(record.total_capital, 500_000);
    }

    /// Scenario 5, scaled to a one-second TTL: a read within the TTL
    /// window returns the cached record unchanged; a write always
    /// invalidates the cache regardless of how fresh it is.
    #[tokio::test]
    async fn write_invalidates_cache_before_ttl_expiry() {
        let t = UtilizationTracker::with_ttl(Arc::new(InMemoryStore::new()), 1);
        t.update_capital(TrancheId::Mezz, 1_000_000).await.unwrap();

        let immediate = t.get(TrancheId::Mezz).await.unwrap();
        assert_eq!(immediate.coverage_sold, 0);

        t.update_coverage(TrancheId::Mezz, 50_000).await.unwrap();
        let after_write = t.get(TrancheId::Mezz).await.unwrap();
        assert_eq!(after_write.coverage_sold, 50_000);
    }

    #[tokio::test]
    async fn cached_record_expires_after_ttl() {
        let t = UtilizationTracker::with_ttl(Arc::new(InMemoryStore::new()), 1);
        t.update_capital(TrancheId::Mezz, 1_000_000).await.unwrap();
        let cached = t.get(TrancheId::Mezz).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
        let refreshed = t.get(TrancheId::Mezz).await.unwrap();
        assert_eq!(cached.total_capital, refreshed.total_capital);
    }

    #[tokio::test]
    async fn sync_from_chain_is_idempotent() {
        let t = tracker();
        let first = t.sync_from_chain(TrancheId::Jnr, 200_000, 50_000).await.unwrap();
        let second = t.sync_from_chain(TrancheId::Jnr, 200_000, 50_000).await.unwrap();
        assert_eq!(first.total_capital, second.total_capital);
        assert_eq!(first.coverage_sold, second.coverage_sold);
    }
}
