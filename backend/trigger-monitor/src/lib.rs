pub mod monitor;
pub mod onchain;
pub mod payout_calc;
pub mod trigger_state;

pub use monitor::{TriggerMonitor, TriggerMonitorConfig};
pub use onchain::{AlwaysFailsPayout, AlwaysSucceedsPayout, OnChainPayout};
pub use payout_calc::compute_payout;
pub use trigger_state::TriggerState;
