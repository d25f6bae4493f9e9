pub mod memory;
pub mod store;

pub use memory::InMemoryStore;
pub use store::{CorrelationMatrix, PricePoint, Store, UtilizationRecord, VolatilityEstimate};
