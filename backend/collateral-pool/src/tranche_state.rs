use money::TrancheId;
use std::collections::HashMap;

/// A single virtual tranche's mutable accounting state.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TrancheState {
    pub allocated_capital: i64,
    pub lp_token_supply: i64,
    pub lp_holders: HashMap<String, i64>,
    pub accumulated_losses: i64,
    pub accumulated_yields: i64,
    pub allocated_coverage: i64,
}

impl TrancheState {
    pub fn net_value(&self) -> i64 {
        self.allocated_capital - self.accumulated_losses + self.accumulated_yields
    }

    pub fn nav_per_token(&self) -> f64 {
        if self.lp_token_supply == 0 {
            1.0
        } else {
            self.net_value() as f64 / self.lp_token_supply as f64
        }
    }

    /// Capital still available to absorb loss: `allocated_capital -
    /// accumulated_losses`, floored at zero.
    pub fn available_capital(&self) -> i64 {
        (self.allocated_capital - self.accumulated_losses).max(0)
    }

    pub fn utilization_ratio(&self, tranche: TrancheId) -> f64 {
        let capacity = self.allocated_capital as f64 * tranche.risk_capacity_pct();
        if capacity == 0.0 {
            0.0
        } else {
            self.allocated_coverage as f64 / capacity
        }
    }

    pub fn lp_balance_sum(&self) -> i64 {
        self.lp_holders.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capital_tranche_has_zero_utilization() {
        let t = TrancheState::default();
        assert_eq!(t.utilization_ratio(TrancheId::Mezz), 0.0);
    }

    #[test]
    fn nav_per_token_defaults_to_one_before_any_deposit() {
        let t = TrancheState::default();
        assert_eq!(t.nav_per_token(), 1.0);
    }

    #[test]
    fn lp_balance_sum_matches_token_supply_invariant() {
        let mut t = TrancheState::default();
        t.lp_holders.insert("a".into(), 10);
        t.lp_holders.insert("b".into(), 15);
        t.lp_token_supply = 25;
        assert_eq!(t.lp_balance_sum(), t.lp_token_supply);
    }
}
