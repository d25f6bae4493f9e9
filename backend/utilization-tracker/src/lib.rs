pub mod apy_curve;
pub mod tracker;

pub use apy_curve::bonding_curve_bps;
pub use persistence::UtilizationRecord;
pub use tracker::UtilizationTracker;
