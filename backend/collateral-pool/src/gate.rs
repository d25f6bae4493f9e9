use crate::pool_state::PoolState;
use money::{Policy, ALL_TRANCHES};

#[derive(Debug, Clone)]
pub struct UnderwritingThresholds {
    pub max_ltv: f64,
    pub max_tranche_utilization: f64,
    pub equity_tranche_max_utilization: f64,
    pub min_reserve_ratio: f64,
    pub max_single_asset_exposure: f64,
    pub max_correlated_exposure: f64,
    pub stress_buffer_multiplier: f64,
}

impl Default for UnderwritingThresholds {
    fn default() -> Self {
        Self {
            max_ltv: 0.85,
            max_tranche_utilization: 0.95,
            equity_tranche_max_utilization: 0.90,
            min_reserve_ratio: 0.15,
            max_single_asset_exposure: 0.30,
            max_correlated_exposure: 0.50,
            stress_buffer_multiplier: 1.0,
        }
    }
}

/// Conservative worst-case-loss fallback used when the numerical
/// library's VaR/CVaR estimate is unavailable.
pub const STRESS_FALLBACK_FRACTION: f64 = 0.5;

/// Evaluates the seven ordered underwriting checks against a
/// hypothetical new `policy`. Returns `(true, None)` if every check
/// passes, or `(false, Some(reason))` for the first failing check.
/// `worst_case_loss` is the numerical library's VaR/CVaR estimate in
/// cents; `None` falls back to `STRESS_FALLBACK_FRACTION` of total
/// capital.
pub fn can_underwrite(
    pool: &PoolState,
    policy: &Policy,
    worst_case_loss: Option<f64>,
    thresholds: &UnderwritingThresholds,
) -> (bool, Option<String>) {
    let effective_capital = pool.effective_capital();
    let projected_coverage = pool.total_coverage_sold() + policy.coverage_amount;
    let projected_ltv =
        if effective_capital == 0.0 { f64::INFINITY } else { projected_coverage as f64 / effective_capital };
    if projected_ltv > thresholds.max_ltv {
        return (
            false,
            Some(format!(
                "effective LTV {:.4} would exceed max {:.4}",
                projected_ltv, thresholds.max_ltv
            )),
        );
    }

    let projected_tranche_coverage = pool.distribute_by_risk_weight(policy.coverage_amount);
    for id in ALL_TRANCHES {
        let tranche = pool.tranche(id);
        let new_coverage = tranche.allocated_coverage + projected_tranche_coverage[&id];
        let capacity = tranche.allocated_capital as f64 * id.risk_capacity_pct();
        let ratio = if capacity == 0.0 { 0.0 } else { new_coverage as f64 / capacity };
        if ratio > thresholds.max_tranche_utilization {
            return (false, Some(format!("tranche {id:?} utilization {ratio:.4} exceeds max")));
        }
    }

    let equity = pool.tranche(money::TrancheId::Eqt);
    let equity_new_coverage =
        equity.allocated_coverage + projected_tranche_coverage[&money::TrancheId::Eqt];
    let equity_capacity = equity.allocated_capital as f64 * money::TrancheId::Eqt.risk_capacity_pct();
    let equity_ratio = if equity_capacity == 0.0 { 0.0 } else { equity_new_coverage as f64 / equity_capacity };
    if equity_ratio > thresholds.equity_tranche_max_utilization {
        return (false, Some(format!("equity tranche utilization {equity_ratio:.4} exceeds max")));
    }

    let reserve_ratio = pool.reserve_ratio();
    if reserve_ratio < thresholds.min_reserve_ratio {
        return (false, Some(format!("reserve ratio {reserve_ratio:.4} below minimum")));
    }

    let total_capital = pool.total_capital_usd().max(1) as f64;
    let single_asset = (pool.coverage_by_asset(policy.asset) + policy.coverage_amount) as f64 / total_capital;
    if single_asset > thresholds.max_single_asset_exposure {
        return (false, Some(format!("single-asset concentration {single_asset:.4} exceeds max")));
    }

    let correlated =
        (pool.coverage_by_correlated_cluster(policy.asset) + policy.coverage_amount) as f64 / total_capital;
    if correlated > thresholds.max_correlated_exposure {
        return (false, Some(format!("correlated-asset concentration {correlated:.4} exceeds max")));
    }

    let worst_case = worst_case_loss.unwrap_or(total_capital * STRESS_FALLBACK_FRACTION);
    let uncommitted = (pool.total_capital_usd() - pool.total_coverage_sold()) as f64;
    if uncommitted < thresholds.stress_buffer_multiplier * worst_case {
        return (false, Some("stress buffer insufficient against worst-case loss".to_string()));
    }

    (true, None)
}
