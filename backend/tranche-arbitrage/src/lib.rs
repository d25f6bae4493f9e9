pub mod engine;
pub mod fair_value;
pub mod types;

pub use engine::TrancheArbitrageEngine;
pub use fair_value::{confidence, fair_nav, fair_yield, mispricing, recommend, risk_contribution};
pub use types::{MispricingReport, Recommendation, ReallocationProposal};
