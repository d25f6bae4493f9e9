use crate::types::Recommendation;

const RISK_CONTRIBUTION_WEIGHT: f64 = 0.20;
const LOSS_ABSORPTION_WEIGHT: f64 = 0.15;
const EXPECTED_LOSS_WEIGHT: f64 = 2.0;
const CONFIDENCE_FULL_DAYS: f64 = 90.0;

/// `seniority_weight · (tranche_capital / total_capital)`; seniority 6
/// (equity) carries six times the weight of seniority 1 (BTC senior)
/// for the same capital share.
pub fn risk_contribution(seniority: u8, tranche_capital: i64, total_capital: i64) -> f64 {
    if total_capital <= 0 {
        return 0.0;
    }
    seniority as f64 * (tranche_capital as f64 / total_capital as f64)
}

pub fn fair_yield(
    risk_free_rate: f64,
    risk_contribution: f64,
    loss_absorption_capacity: f64,
    historical_expected_loss_rate: f64,
) -> f64 {
    risk_free_rate
        + RISK_CONTRIBUTION_WEIGHT * risk_contribution
        + LOSS_ABSORPTION_WEIGHT * loss_absorption_capacity
        + EXPECTED_LOSS_WEIGHT * historical_expected_loss_rate
}

pub fn fair_nav(current_nav: f64, fair_yield: f64, current_yield: f64) -> f64 {
    current_nav * (1.0 + (fair_yield - current_yield))
}

pub fn mispricing(fair_nav: f64, current_nav: f64) -> f64 {
    if current_nav == 0.0 {
        0.0
    } else {
        (fair_nav - current_nav) / current_nav
    }
}

pub fn recommend(mispricing: f64, threshold: f64) -> Recommendation {
    if mispricing > threshold {
        Recommendation::Buy
    } else if mispricing < -threshold {
        Recommendation::Sell
    } else {
        Recommendation::Hold
    }
}

/// Grows linearly from 0 at pool creation to 1.0 at 90 days.
pub fn confidence(days_since_creation: f64) -> f64 {
    (days_since_creation / CONFIDENCE_FULL_DAYS).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_contribution_scales_with_seniority_and_share() {
        let equity = risk_contribution(6, 1_000_000, 10_000_000);
        let senior = risk_contribution(1, 1_000_000, 10_000_000);
        assert!(equity > senior);
    }

    #[test]
    fn overpriced_tranche_recommends_sell() {
        let mp = mispricing(90.0, 100.0);
        assert_eq!(recommend(mp, 0.02), Recommendation::Sell);
    }

    #[test]
    fn underpriced_tranche_recommends_buy() {
        let mp = mispricing(110.0, 100.0);
        assert_eq!(recommend(mp, 0.02), Recommendation::Buy);
    }

    #[test]
    fn within_threshold_holds() {
        let mp = mispricing(100.5, 100.0);
        assert_eq!(recommend(mp, 0.02), Recommendation::Hold);
    }

    #[test]
    fn confidence_caps_at_ninety_days() {
        assert_eq!(confidence(45.0), 0.5);
        assert_eq!(confidence(90.0), 1.0);
        assert_eq!(confidence(200.0), 1.0);
        assert_eq!(confidence(0.0), 0.0);
    }
}
