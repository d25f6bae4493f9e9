use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Narrow collaborator interface to the on-chain payout path. Treated
/// as an at-least-once effect; persistence enforces at-most-once on
/// top of it via the conditional policy-status update.
#[async_trait]
pub trait OnChainPayout: Send + Sync {
    async fn execute_payout(&self, policy_id: u64, current_price_scaled: i64) -> Option<String>;
    async fn wait_for_transaction(&self, tx_hash: &str, max_wait_seconds: u64) -> bool;
}

/// Test double that always succeeds, for default wiring and tests.
#[derive(Default)]
pub struct AlwaysSucceedsPayout {
    counter: AtomicU64,
}

#[async_trait]
impl OnChainPayout for AlwaysSucceedsPayout {
    async fn execute_payout(&self, policy_id: u64, _current_price_scaled: i64) -> Option<String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Some(format!("tx-{policy_id}-{n}"))
    }

    async fn wait_for_transaction(&self, _tx_hash: &str, _max_wait_seconds: u64) -> bool {
        true
    }
}

/// Test double that always fails the on-chain call, to exercise the
/// "policy stays Confirmed and is retried" path.
#[derive(Default)]
pub struct AlwaysFailsPayout {
    pub attempts: Mutex<u64>,
}

#[async_trait]
impl OnChainPayout for AlwaysFailsPayout {
    async fn execute_payout(&self, _policy_id: u64, _current_price_scaled: i64) -> Option<String> {
        *self.attempts.lock().unwrap() += 1;
        None
    }

    async fn wait_for_transaction(&self, _tx_hash: &str, _max_wait_seconds: u64) -> bool {
        false
    }
}
