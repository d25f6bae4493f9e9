pub mod consensus;
pub mod memory;

pub use consensus::{resolve_quote, PriceOracle, PriceQuote};
pub use memory::InMemoryOracle;
