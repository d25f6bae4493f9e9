use crate::tranche_state::TrancheState;
use money::{Asset, Policy, TrancheId, ALL_TRANCHES};
use std::collections::HashMap;

/// The unified collateral pool: physical capital, the six tranches,
/// and the set of active (non-terminal) policies. Exclusively owned by
/// the Collateral Pool Manager; every mutator goes through it.
#[derive(Debug, Clone)]
pub struct PoolState {
    pub tranches: HashMap<TrancheId, TrancheState>,
    pub btc_float_sats: i64,
    pub btc_cost_basis_usd: i64,
    pub usd_reserves: i64,
    pub active_policies: HashMap<u64, Policy>,
    pub last_rebalance_time: i64,
    pub created_at: i64,
    /// Loss the waterfall could not absorb across all six tranches.
    /// Non-zero means the pool is insolvent.
    pub unallocated_loss: i64,
}

impl PoolState {
    pub fn new(created_at: i64) -> Self {
        let tranches = ALL_TRANCHES.iter().map(|t| (*t, TrancheState::default())).collect();
        Self {
            tranches,
            btc_float_sats: 0,
            btc_cost_basis_usd: 0,
            usd_reserves: 0,
            active_policies: HashMap::new(),
            last_rebalance_time: created_at,
            created_at,
            unallocated_loss: 0,
        }
    }

    pub fn tranche(&self, id: TrancheId) -> &TrancheState {
        self.tranches.get(&id).expect("all six tranches are always present")
    }

    pub fn tranche_mut(&mut self, id: TrancheId) -> &mut TrancheState {
        self.tranches.get_mut(&id).expect("all six tranches are always present")
    }

    /// Σ tranche net value: `allocated_capital - accumulated_losses +
    /// accumulated_yields` (invariant I1).
    pub fn total_capital_usd(&self) -> i64 {
        self.tranches.values().map(|t| t.net_value()).sum()
    }

    pub fn total_coverage_sold(&self) -> i64 {
        self.active_policies.values().map(|p| p.coverage_amount).sum()
    }

    /// Risk-weighted sum of tranche capitals, the LTV denominator.
    pub fn effective_capital(&self) -> f64 {
        self.tranches
            .iter()
            .map(|(id, t)| t.allocated_capital as f64 * id.risk_capacity_pct())
            .sum()
    }

    pub fn effective_ltv(&self) -> f64 {
        let capital = self.effective_capital();
        if capital == 0.0 {
            0.0
        } else {
            self.total_coverage_sold() as f64 / capital
        }
    }

    pub fn reserve_ratio(&self) -> f64 {
        let total = self.total_capital_usd();
        if total == 0 {
            0.0
        } else {
            self.usd_reserves as f64 / total as f64
        }
    }

    pub fn coverage_by_asset(&self, asset: Asset) -> i64 {
        self.active_policies
            .values()
            .filter(|p| p.asset == asset)
            .map(|p| p.coverage_amount)
            .sum()
    }

    pub fn coverage_by_correlated_cluster(&self, asset: Asset) -> i64 {
        self.active_policies
            .values()
            .filter(|p| p.asset == asset || p.asset.is_correlated_with(asset))
            .map(|p| p.coverage_amount)
            .sum()
    }

    /// Each tranche's share of risk-weighted effective capital, used to
    /// pro-rate a new policy's coverage across tranches.
    pub fn risk_weighted_shares(&self) -> HashMap<TrancheId, f64> {
        let effective = self.effective_capital();
        let mut shares = HashMap::new();
        for id in ALL_TRANCHES {
            let weighted = self.tranche(id).allocated_capital as f64 * id.risk_capacity_pct();
            let share = if effective == 0.0 { 1.0 / ALL_TRANCHES.len() as f64 } else { weighted / effective };
            shares.insert(id, share);
        }
        shares
    }

    /// Distributes `amount` cents across the six tranches in
    /// proportion to `risk_weighted_shares`, conserving the total
    /// exactly by assigning any rounding remainder to the most senior
    /// tranche.
    pub fn distribute_by_risk_weight(&self, amount: i64) -> HashMap<TrancheId, i64> {
        let shares = self.risk_weighted_shares();
        let mut allocated = HashMap::new();
        let mut running_total = 0i64;
        for id in ALL_TRANCHES {
            let portion = (amount as f64 * shares[&id]).floor() as i64;
            allocated.insert(id, portion);
            running_total += portion;
        }
        let remainder = amount - running_total;
        if remainder != 0 {
            let senior = ALL_TRANCHES[0];
            *allocated.get_mut(&senior).unwrap() += remainder;
        }
        allocated
    }

    pub fn is_insolvent(&self) -> bool {
        self.unallocated_loss > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_capital_matches_scenario_one() {
        let mut pool = PoolState::new(0);
        let weights = [
            (TrancheId::BtcSenior, 25_000_000_00i64),
            (TrancheId::Snr, 20_000_000_00),
            (TrancheId::Mezz, 18_000_000_00),
            (TrancheId::Jnr, 15_000_000_00),
            (TrancheId::JnrPlus, 12_000_000_00),
            (TrancheId::Eqt, 10_000_000_00),
        ];
        for (id, capital) in weights {
            pool.tranche_mut(id).allocated_capital = capital;
        }
        let effective = pool.effective_capital();
        let expected = 69_900_000_00f64;
        assert!((effective - expected).abs() < 1.0);
    }

    #[test]
    fn distribute_by_risk_weight_conserves_total() {
        let mut pool = PoolState::new(0);
        pool.tranche_mut(TrancheId::Mezz).allocated_capital = 1_000_000;
        pool.tranche_mut(TrancheId::Snr).allocated_capital = 2_000_000;
        let allocated = pool.distribute_by_risk_weight(12_345);
        let sum: i64 = allocated.values().sum();
        assert_eq!(sum, 12_345);
    }
}
