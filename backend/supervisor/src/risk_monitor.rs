use chrono::Utc;
use collateral_pool::CollateralPoolManager;
use money::Asset;
use persistence::{CorrelationMatrix, Store, VolatilityEstimate};
use std::sync::Arc;
use tracing::{info, warn};

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;

/// Fraction of total pool capital beyond which an elevated CVaR is
/// worth a warning log, not just a persisted estimate.
const HIGH_RISK_CVAR_FRACTION: f64 = 0.50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSnapshot {
    pub value_at_risk: f64,
    pub conditional_value_at_risk: f64,
}

/// One risk-monitor tick: for each tracked asset, turns its recent
/// price history into an annualized volatility estimate (persisted via
/// C4) and a set of historical-simulation loss scenarios — the loss
/// the pool's coverage in that asset would have taken had the price
/// dropped to each historical sample. `risk_stats::value_at_risk` and
/// `conditional_value_at_risk` are evaluated over the pooled scenario
/// set across every tracked asset.
pub async fn run_risk_tick(
    pool: &Arc<CollateralPoolManager>,
    store: &Arc<dyn Store>,
    tracked_assets: &[Asset],
    lookback_secs: i64,
) -> anyhow::Result<RiskSnapshot> {
    let now = Utc::now().timestamp();
    let snapshot = pool.snapshot().await;

    let mut estimates = Vec::new();
    let mut scenarios = Vec::new();
    for asset in tracked_assets {
        let history = store.price_history(*asset, now - lookback_secs).await?;
        if history.len() < 2 {
            continue;
        }
        let returns: Vec<f64> = history.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
        let periods_per_year = (SECONDS_PER_YEAR / lookback_secs.max(1) as f64).max(1.0);
        let annualized_volatility = risk_stats::std_dev(&returns) * periods_per_year.sqrt();
        estimates.push(VolatilityEstimate { asset: *asset, annualized_volatility, as_of: now });

        let exposure = snapshot.coverage_by_asset(*asset) as f64;
        if exposure > 0.0 {
            scenarios.extend(history.iter().map(|price| exposure * (1.0 - price).max(0.0)));
        }
    }

    if !estimates.is_empty() {
        store.persist_volatility_estimates(estimates).await?;
    }

    if scenarios.is_empty() {
        return Ok(RiskSnapshot { value_at_risk: 0.0, conditional_value_at_risk: 0.0 });
    }

    let value_at_risk = risk_stats::value_at_risk(&scenarios, 0.95);
    let conditional_value_at_risk = risk_stats::conditional_value_at_risk(&scenarios, 0.95);
    let total_capital = snapshot.total_capital_usd() as f64;
    if total_capital > 0.0 && conditional_value_at_risk > total_capital * HIGH_RISK_CVAR_FRACTION {
        warn!(
            value_at_risk,
            conditional_value_at_risk, total_capital, "unified risk monitor: CVaR elevated relative to pool capital"
        );
    } else {
        info!(value_at_risk, conditional_value_at_risk, "unified risk monitor tick complete");
    }
    Ok(RiskSnapshot { value_at_risk, conditional_value_at_risk })
}

/// Pairwise Pearson correlation across `assets`' price histories in
/// `[now - window_secs, now]`, aligned to the shorter of each pair's
/// series. `None` entries (per `risk_stats::correlation`'s contract)
/// are left at `0.0`; the diagonal is always `1.0`.
pub async fn compute_correlation_matrix(
    store: &Arc<dyn Store>,
    assets: &[Asset],
    window_secs: i64,
) -> anyhow::Result<Option<CorrelationMatrix>> {
    let now = Utc::now().timestamp();
    let since = now - window_secs;
    let mut series = Vec::with_capacity(assets.len());
    for asset in assets {
        series.push(store.price_history(*asset, since).await?);
    }

    let n = assets.len();
    let mut matrix = vec![vec![0.0; n]; n];
    let mut any_computed = false;
    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let len = series[i].len().min(series[j].len());
            if len < 10 {
                continue;
            }
            let xs = &series[i][series[i].len() - len..];
            let ys = &series[j][series[j].len() - len..];
            if let Some(r) = risk_stats::correlation(xs, ys) {
                matrix[i][j] = r;
                matrix[j][i] = r;
                any_computed = true;
            }
        }
    }

    if !any_computed {
        return Ok(None);
    }
    Ok(Some(CorrelationMatrix { assets: assets.to_vec(), matrix, as_of: now }))
}
