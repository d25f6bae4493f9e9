use crate::consensus::{PriceOracle, PriceQuote};
use async_trait::async_trait;
use money::Asset;
use std::collections::HashMap;
use std::sync::RwLock;

/// Test-double implementation that serves prices from an in-memory
/// table, used by the supervisor's default wiring and by the
/// integration tests; never a substitute for a real feed backend.
#[derive(Default)]
pub struct InMemoryOracle {
    prices: RwLock<HashMap<Asset, PriceQuote>>,
}

impl InMemoryOracle {
    pub fn new() -> Self {
        Self { prices: RwLock::new(HashMap::new()) }
    }

    pub fn set(&self, asset: Asset, quote: PriceQuote) {
        self.prices.write().unwrap().insert(asset, quote);
    }
}

#[async_trait]
impl PriceOracle for InMemoryOracle {
    async fn get_consensus_price(
        &self,
        asset: Asset,
        _previous_price: Option<f64>,
    ) -> Option<PriceQuote> {
        self.prices.read().unwrap().get(&asset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_none_when_unset() {
        let oracle = InMemoryOracle::new();
        assert!(oracle.get_consensus_price(Asset::Usdc, None).await.is_none());
    }

    #[tokio::test]
    async fn returns_set_quote() {
        let oracle = InMemoryOracle::new();
        let quote = PriceQuote { price: 0.99, timestamp: 100, confidence: 0.9 };
        oracle.set(Asset::Usdc, quote);
        let got = oracle.get_consensus_price(Asset::Usdc, None).await.unwrap();
        assert_eq!(got.price, 0.99);
    }
}
