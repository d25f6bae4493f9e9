use money::TrancheId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MispricingReport {
    pub tranche_id: TrancheId,
    pub current_nav: f64,
    pub fair_nav: f64,
    pub mispricing: f64,
    pub recommendation: Recommendation,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReallocationProposal {
    pub from: TrancheId,
    pub to: TrancheId,
    pub amount_cents: i64,
}
