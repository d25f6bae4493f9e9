use async_trait::async_trait;
use money::Asset;
use serde::{Deserialize, Serialize};

/// A single consensus price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub timestamp: i64,
    pub confidence: f64,
}

const MIN_USABLE_CONFIDENCE: f64 = 0.7;

/// Narrow collaborator interface to the price oracle backend(s). The
/// backend itself (HTTP/WebSocket clients, aggregation across feeds)
/// is out of scope; callers depend only on this trait.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn get_consensus_price(
        &self,
        asset: Asset,
        previous_price: Option<f64>,
    ) -> Option<PriceQuote>;
}

/// Resolves a raw oracle quote into a usable price, applying the
/// confidence floor and staleness window the core relies on. Returns
/// `None` when the quote is unusable and no fallback applies (the
/// caller must then treat the read as `OracleUnavailable`/`StaleOracle`).
pub fn resolve_quote(
    quote: Option<PriceQuote>,
    asset: Asset,
    fallback_stable: f64,
    fallback_btc: f64,
    max_staleness_secs: i64,
    now: i64,
) -> Option<f64> {
    let fallback = if asset == Asset::Btc {
        fallback_btc
    } else {
        fallback_stable
    };
    match quote {
        None => Some(fallback),
        Some(q) if now - q.timestamp > max_staleness_secs => None,
        Some(q) if q.confidence < MIN_USABLE_CONFIDENCE => Some(fallback),
        Some(q) => Some(q.price),
    }
}
