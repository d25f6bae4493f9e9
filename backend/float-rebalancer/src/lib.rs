pub mod decision;
pub mod rebalancer;
pub mod target;
pub mod types;

pub use decision::decide;
pub use rebalancer::FloatRebalancer;
pub use target::{required_liquidity, target_usd_fraction};
pub use types::{RebalanceAction, RebalanceDecision, Urgency};
