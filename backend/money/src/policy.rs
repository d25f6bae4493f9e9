use crate::{Asset, CoreError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyStatus {
    Active,
    Triggered,
    Confirmed,
    Paid,
    Expired,
    Cancelled,
}

impl PolicyStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PolicyStatus::Paid | PolicyStatus::Expired | PolicyStatus::Cancelled)
    }

    /// Whether `self -> next` is a legal transition in the policy
    /// state machine. Used as the persistence conditional-update gate
    /// that makes the `Paid` transition at-most-once.
    pub fn can_transition_to(self, next: PolicyStatus) -> bool {
        use PolicyStatus::*;
        match (self, next) {
            (Active, Triggered) | (Active, Expired) | (Active, Cancelled) => true,
            (Triggered, Confirmed) | (Triggered, Active) => true,
            (Confirmed, Paid) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub policy_id: u64,
    pub policyholder: String,
    pub beneficiary: String,
    pub asset: Asset,
    pub coverage_amount: i64,
    pub premium_paid: i64,
    pub trigger_price: f64,
    pub floor_price: f64,
    pub start_time: i64,
    pub expiry_time: i64,
    pub status: PolicyStatus,
    pub payout_amount: Option<i64>,
    pub payout_time: Option<i64>,
}

impl Policy {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy_id: u64,
        policyholder: String,
        beneficiary: String,
        asset: Asset,
        coverage_amount: i64,
        premium_paid: i64,
        trigger_price: f64,
        floor_price: f64,
        start_time: i64,
        expiry_time: i64,
    ) -> Result<Self, CoreError> {
        if coverage_amount <= 0 {
            return Err(CoreError::ValidationError("coverage_amount must be > 0".into()));
        }
        if premium_paid < 0 {
            return Err(CoreError::ValidationError("premium_paid must be >= 0".into()));
        }
        if !(floor_price > 0.0 && floor_price < trigger_price && trigger_price <= 1.5) {
            return Err(CoreError::ValidationError(
                "require 0 < floor_price < trigger_price <= 1.5".into(),
            ));
        }
        if start_time >= expiry_time {
            return Err(CoreError::ValidationError("start_time must precede expiry_time".into()));
        }
        Ok(Self {
            policy_id,
            policyholder,
            beneficiary,
            asset,
            coverage_amount,
            premium_paid,
            trigger_price,
            floor_price,
            start_time,
            expiry_time,
            status: PolicyStatus::Active,
            payout_amount: None,
            payout_time: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Policy {
        Policy::new(
            1,
            "holder".into(),
            "beneficiary".into(),
            Asset::Usdc,
            100_000_00,
            500_00,
            0.97,
            0.90,
            0,
            1_000_000,
        )
        .unwrap()
    }

    #[test]
    fn rejects_non_positive_coverage() {
        let err = Policy::new(1, "h".into(), "b".into(), Asset::Usdc, 0, 0, 0.97, 0.90, 0, 10);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_price_band_violation() {
        let err =
            Policy::new(1, "h".into(), "b".into(), Asset::Usdc, 100, 0, 0.90, 0.97, 0, 10);
        assert!(err.is_err());
    }

    #[test]
    fn legal_transitions_only() {
        let p = sample();
        assert!(p.status.can_transition_to(PolicyStatus::Triggered));
        assert!(!p.status.can_transition_to(PolicyStatus::Paid));
        assert!(PolicyStatus::Confirmed.can_transition_to(PolicyStatus::Paid));
        assert!(!PolicyStatus::Paid.can_transition_to(PolicyStatus::Active));
    }
}
