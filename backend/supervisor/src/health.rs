use collateral_pool::{CollateralPoolManager, PoolState};
use core_config::EmergencyConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::worker::ErrorCounters;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthSnapshot {
    pub ltv: f64,
    pub reserve_ratio: f64,
    pub total_consecutive_errors: u32,
    pub should_stop: bool,
}

/// Pure decision function over a pool snapshot and the current error
/// tally; kept free of I/O so the shutdown condition is independently
/// testable from the health check's scheduling and logging.
pub fn evaluate(pool: &PoolState, total_consecutive_errors: u32, config: &EmergencyConfig) -> HealthSnapshot {
    let total_capital = pool.total_capital_usd();
    let ltv = if total_capital > 0 { pool.total_coverage_sold() as f64 / total_capital as f64 } else { 0.0 };
    let reserve_ratio = if total_capital > 0 { pool.usd_reserves as f64 / total_capital as f64 } else { 0.0 };
    let should_stop = config.enable_emergency_shutdown
        && (ltv > config.max_ltv_shutdown
            || reserve_ratio < config.min_reserve_shutdown
            || total_consecutive_errors > config.max_error_count);
    HealthSnapshot { ltv, reserve_ratio, total_consecutive_errors, should_stop }
}

/// Runs every tick: reads the pool, sums error counters, and trips
/// `is_running` to false on any emergency condition. Never resets
/// `is_running` back to true; recovery requires a process restart.
pub async fn run_health_check(
    pool: &Arc<CollateralPoolManager>,
    counters: &ErrorCounters,
    config: &EmergencyConfig,
    is_running: &Arc<AtomicBool>,
    uptime_ticks: &Arc<RwLock<u64>>,
) -> anyhow::Result<()> {
    let snapshot = pool.snapshot().await;
    let total_errors: u32 = counters.read().await.values().sum();
    let health = evaluate(&snapshot, total_errors, config);

    let mut ticks = uptime_ticks.write().await;
    *ticks += 1;
    info!(ltv = health.ltv, reserve_ratio = health.reserve_ratio, total_errors, uptime_ticks = *ticks, "health check");
    drop(ticks);

    if health.should_stop {
        error!(
            ltv = health.ltv,
            reserve_ratio = health.reserve_ratio,
            total_errors,
            "EMERGENCY STOP: pool health breached shutdown thresholds"
        );
        is_running.store(false, Ordering::SeqCst);
    }
    Ok(())
}

pub fn sum_counters(counters: &HashMap<String, u32>) -> u32 {
    counters.values().sum()
}
