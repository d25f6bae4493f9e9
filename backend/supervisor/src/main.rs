use anyhow::Result;
use collateral_pool::{CollateralPoolManager, UnderwritingThresholds};
use core_config::Config;
use float_rebalancer::FloatRebalancer;
use money::Asset;
use oracle::{InMemoryOracle, PriceOracle};
use persistence::{InMemoryStore, Store};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use supervisor::Supervisor;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tranche_arbitrage::TrancheArbitrageEngine;
use trigger_monitor::{AlwaysSucceedsPayout, TriggerMonitor, TriggerMonitorConfig};
use utilization_tracker::UtilizationTracker;

const MAX_RESTARTS: u32 = 5;
const RESTART_BACKOFF_SECS: u64 = 30;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let config = match Config::load_with_env_override("config.toml") {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "config load failed, using defaults");
            Config::default()
        }
    };

    let mut attempts = 0;
    loop {
        attempts += 1;
        info!(attempts, "starting supervisor");
        match run_once(config.clone()).await {
            Ok(Outcome::GracefulShutdown) => {
                info!("supervisor shut down cleanly");
                return ExitCode::from(0);
            }
            Ok(Outcome::EmergencyStop) => {
                error!("supervisor stopped via emergency shutdown");
                return ExitCode::from(2);
            }
            Err(err) => {
                error!(error = %err, attempts, "supervisor terminated abnormally");
                if attempts >= MAX_RESTARTS {
                    error!(attempts, "exhausted restart budget, giving up");
                    return ExitCode::from(1);
                }
                warn!(backoff_secs = RESTART_BACKOFF_SECS, "restarting supervisor after backoff");
                tokio::time::sleep(Duration::from_secs(RESTART_BACKOFF_SECS)).await;
            }
        }
    }
}

enum Outcome {
    GracefulShutdown,
    EmergencyStop,
}

async fn run_once(config: Config) -> Result<Outcome> {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let oracle: Arc<dyn PriceOracle> = Arc::new(InMemoryOracle::new());
    let tracker = Arc::new(UtilizationTracker::new(store.clone()));
    let pool = Arc::new(CollateralPoolManager::new(tracker.clone(), UnderwritingThresholds::default()));

    let float_rebalancer = Arc::new(FloatRebalancer::new(
        pool.clone(),
        config.thresholds.target_usd_ratio,
        config.thresholds.rebalance_threshold,
        config.thresholds.min_btc_float_sats,
    ));
    let tranche_arbitrage = Arc::new(TrancheArbitrageEngine::new(pool.clone(), tracker.clone(), 0.02, 0.10, 0.03));
    let trigger_monitor = Arc::new(TriggerMonitor::new(
        store.clone(),
        oracle.clone(),
        pool.clone(),
        Arc::new(AlwaysSucceedsPayout::default()),
        TriggerMonitorConfig { confirmation_period_secs: config.worker_periods.confirmation_period_secs, ..Default::default() },
    ));

    let tracked_assets = vec![Asset::Usdc, Asset::Usdt, Asset::Dai, Asset::Btc];

    let supervisor = Arc::new(Supervisor::new(
        config,
        store,
        oracle,
        pool,
        float_rebalancer,
        tranche_arbitrage,
        trigger_monitor,
        tracked_assets,
    ));

    let mut run_handle = tokio::spawn(supervisor.clone().run());

    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received, requesting graceful stop");
            supervisor.request_shutdown();
            run_handle.await??;
        }
        result = &mut run_handle => {
            result??;
        }
    }

    if supervisor.emergency_triggered() {
        Ok(Outcome::EmergencyStop)
    } else {
        Ok(Outcome::GracefulShutdown)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
