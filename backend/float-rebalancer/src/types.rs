use serde::{Deserialize, Serialize};

/// The trade the rebalancer wants executed this iteration. Amounts are
/// USD cents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RebalanceAction {
    Hold,
    BuyBtc(i64),
    SellBtc(i64),
}

/// Affects logging only; never gates whether a rebalance executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RebalanceDecision {
    pub action: RebalanceAction,
    pub urgency: Urgency,
    pub target_usd_fraction: f64,
    pub current_usd_fraction: f64,
}
