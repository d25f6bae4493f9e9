use thiserror::Error;

/// The distinct failure kinds the core can return. Every component crate
/// narrows to this taxonomy rather than inventing its own.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("underwriting rejected: {0}")]
    UnderwritingRejected(String),

    #[error("insufficient reserves")]
    InsufficientReserves,

    #[error("insufficient liquidity")]
    InsufficientLiquidity,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("oracle unavailable for {0}")]
    OracleUnavailable(String),

    #[error("stale oracle price for {0}")]
    StaleOracle(String),

    #[error("persistence error: {0}")]
    PersistenceError(String),

    #[error("external call failed: {0}")]
    ExternalCallFailed(String),

    #[error("operation timed out after {0}s")]
    Timeout(u64),

    #[error("pool is insolvent: unallocated loss of {0} cents")]
    InsolventPool(i64),
}
