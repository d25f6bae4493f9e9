pub mod etl;
pub mod health;
pub mod risk_monitor;
pub mod supervisor;
pub mod worker;

pub use health::{evaluate, HealthSnapshot};
pub use risk_monitor::RiskSnapshot;
pub use supervisor::Supervisor;
pub use worker::{run_periodic_worker, ErrorCounters, RetryPolicy};
