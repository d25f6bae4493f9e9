pub mod gate;
pub mod liquidity;
pub mod manager;
pub mod pool_state;
pub mod tranche_state;
pub mod waterfall;

pub use gate::UnderwritingThresholds;
pub use manager::CollateralPoolManager;
pub use pool_state::PoolState;
pub use tranche_state::TrancheState;
