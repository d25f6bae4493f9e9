use crate::fair_value::{confidence, fair_nav, fair_yield, mispricing, recommend, risk_contribution};
use crate::types::{MispricingReport, Recommendation, ReallocationProposal};
use collateral_pool::{CollateralPoolManager, PoolState};
use money::{CoreError, TrancheId, ALL_TRANCHES};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use utilization_tracker::UtilizationTracker;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Prices every tranche against a fair-value model, then reallocates
/// capital from the most overpriced tranche to the most underpriced
/// one, bounded by `max_reallocation_pct` of the source tranche.
pub struct TrancheArbitrageEngine {
    pool: Arc<CollateralPoolManager>,
    utilization: Arc<UtilizationTracker>,
    mispricing_threshold: f64,
    max_reallocation_pct: f64,
    risk_free_rate: f64,
}

impl TrancheArbitrageEngine {
    pub fn new(
        pool: Arc<CollateralPoolManager>,
        utilization: Arc<UtilizationTracker>,
        mispricing_threshold: f64,
        max_reallocation_pct: f64,
        risk_free_rate: f64,
    ) -> Self {
        Self { pool, utilization, mispricing_threshold, max_reallocation_pct, risk_free_rate }
    }

    pub async fn run_iteration(
        &self,
        now: i64,
        historical_expected_loss_rates: &HashMap<TrancheId, f64>,
    ) -> Result<Vec<MispricingReport>, CoreError> {
        let snapshot = self.pool.snapshot().await;
        let total_capital = snapshot.total_capital_usd();
        let days = (now - snapshot.created_at).max(0) as f64 / SECONDS_PER_DAY;
        let conf = confidence(days);

        let mut reports = Vec::with_capacity(ALL_TRANCHES.len());
        for id in ALL_TRANCHES {
            reports.push(self.price_tranche(&snapshot, id, total_capital, conf, historical_expected_loss_rates).await?);
        }

        if let Some(proposal) = pair_candidates(&reports, &snapshot, self.max_reallocation_pct) {
            self.pool.reallocate_capital(proposal.from, proposal.to, proposal.amount_cents).await?;
            info!(from = ?proposal.from, to = ?proposal.to, amount = proposal.amount_cents, "tranche capital reallocated");
        }

        Ok(reports)
    }

    async fn price_tranche(
        &self,
        snapshot: &PoolState,
        id: TrancheId,
        total_capital: i64,
        conf: f64,
        historical_expected_loss_rates: &HashMap<TrancheId, f64>,
    ) -> Result<MispricingReport, CoreError> {
        let tranche = snapshot.tranche(id);
        let current_nav = tranche.nav_per_token();
        let current_yield = self.utilization.get(id).await?.current_apy_bps as f64 / 10_000.0;
        let loss_absorption = if tranche.allocated_capital > 0 {
            tranche.accumulated_losses as f64 / tranche.allocated_capital as f64
        } else {
            0.0
        };
        let expected_loss = historical_expected_loss_rates.get(&id).copied().unwrap_or(0.0);
        let rc = risk_contribution(id.seniority(), tranche.allocated_capital, total_capital);
        let fy = fair_yield(self.risk_free_rate, rc, loss_absorption, expected_loss);
        let fnav = fair_nav(current_nav, fy, current_yield);
        let mp = mispricing(fnav, current_nav);
        let recommendation = recommend(mp, self.mispricing_threshold);
        Ok(MispricingReport {
            tranche_id: id,
            current_nav,
            fair_nav: fnav,
            mispricing: mp,
            recommendation,
            confidence: conf,
        })
    }
}

fn pair_candidates(
    reports: &[MispricingReport],
    snapshot: &PoolState,
    max_reallocation_pct: f64,
) -> Option<ReallocationProposal> {
    let sell = reports
        .iter()
        .filter(|r| r.recommendation == Recommendation::Sell)
        .max_by(|a, b| a.mispricing.abs().partial_cmp(&b.mispricing.abs()).unwrap())?;
    let buy = reports
        .iter()
        .filter(|r| r.recommendation == Recommendation::Buy)
        .max_by(|a, b| a.mispricing.abs().partial_cmp(&b.mispricing.abs()).unwrap())?;
    let source_capital = snapshot.tranche(sell.tranche_id).allocated_capital;
    let amount = (source_capital as f64 * max_reallocation_pct) as i64;
    if amount <= 0 {
        return None;
    }
    Some(ReallocationProposal { from: sell.tranche_id, to: buy.tranche_id, amount_cents: amount })
}

#[cfg(test)]
mod tests {
    use super::*;
    use collateral_pool::UnderwritingThresholds;
    use persistence::InMemoryStore;

    async fn engine_with(capitals: &[(TrancheId, i64)]) -> (TrancheArbitrageEngine, Arc<CollateralPoolManager>) {
        let store = Arc::new(InMemoryStore::new());
        let tracker = Arc::new(UtilizationTracker::new(store));
        let pool = Arc::new(CollateralPoolManager::new(tracker.clone(), UnderwritingThresholds::default()));
        for (id, amount) in capitals {
            pool.add_liquidity("lp1", *id, *amount).await.unwrap();
        }
        let engine = TrancheArbitrageEngine::new(pool.clone(), tracker, 0.02, 0.10, 0.03);
        (engine, pool)
    }

    #[tokio::test]
    async fn produces_one_report_per_tranche() {
        let (engine, _pool) = engine_with(&[(TrancheId::Eqt, 1_000_000_00)]).await;
        let reports = engine.run_iteration(0, &HashMap::new()).await.unwrap();
        assert_eq!(reports.len(), 6);
    }

    #[tokio::test]
    async fn high_expected_loss_on_one_tranche_drives_buy_recommendation() {
        let (engine, _pool) =
            engine_with(&[(TrancheId::BtcSenior, 5_000_000_00), (TrancheId::Eqt, 5_000_000_00)]).await;
        let mut expected_loss = HashMap::new();
        expected_loss.insert(TrancheId::Eqt, 0.05);
        let reports = engine.run_iteration(0, &expected_loss).await.unwrap();
        let eqt = reports.iter().find(|r| r.tranche_id == TrancheId::Eqt).unwrap();
        assert_eq!(eqt.recommendation, Recommendation::Buy);
    }

    #[tokio::test]
    async fn confidence_is_zero_at_creation() {
        let (engine, _pool) = engine_with(&[(TrancheId::Eqt, 1_000_000_00)]).await;
        let reports = engine.run_iteration(0, &HashMap::new()).await.unwrap();
        assert_eq!(reports[0].confidence, 0.0);
    }

    #[tokio::test]
    async fn total_pool_capital_is_invariant_across_iteration() {
        let (engine, pool) =
            engine_with(&[(TrancheId::BtcSenior, 5_000_000_00), (TrancheId::Eqt, 5_000_000_00)]).await;
        let before = pool.snapshot().await.total_capital_usd();
        let mut expected_loss = HashMap::new();
        expected_loss.insert(TrancheId::Eqt, 0.05);
        engine.run_iteration(0, &expected_loss).await.unwrap();
        let after = pool.snapshot().await.total_capital_usd();
        assert_eq!(before, after);
    }
}
