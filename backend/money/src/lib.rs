pub mod asset;
pub mod error;
pub mod fixed_point;
pub mod policy;
pub mod tranche;

pub use asset::Asset;
pub use error::CoreError;
pub use fixed_point::{
    btc_to_sats, cents_to_usd, mul_div, mul_div_round, sats_to_btc, saturating_add_cents,
    saturating_sub_cents, usd_to_cents,
};
pub use policy::{Policy, PolicyStatus};
pub use tranche::{ApyShape, TrancheId, ALL_TRANCHES};
