use crate::etl::{due, run_daily_etl, run_weekly_etl, CronSchedule};
use crate::health::run_health_check;
use crate::risk_monitor::run_risk_tick;
use crate::worker::{run_periodic_worker, ErrorCounters, RetryPolicy};
use chrono::Utc;
use collateral_pool::CollateralPoolManager;
use core_config::Config;
use float_rebalancer::FloatRebalancer;
use money::{Asset, TrancheId};
use oracle::PriceOracle;
use persistence::Store;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tranche_arbitrage::TrancheArbitrageEngine;
use trigger_monitor::TriggerMonitor;

/// Owns process lifetime: spawns the periodic workers, the health
/// monitor, and the two cron-style ETL jobs, and coordinates graceful
/// shutdown when `is_running` clears (externally, via signal, or
/// internally, via the health monitor's emergency stop).
pub struct Supervisor {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub oracle: Arc<dyn PriceOracle>,
    pub pool: Arc<CollateralPoolManager>,
    pub float_rebalancer: Arc<FloatRebalancer>,
    pub tranche_arbitrage: Arc<TrancheArbitrageEngine>,
    pub trigger_monitor: Arc<TriggerMonitor>,
    pub tracked_assets: Vec<Asset>,
    is_running: Arc<AtomicBool>,
    counters: ErrorCounters,
    uptime_ticks: Arc<RwLock<u64>>,
    last_daily_run: RwLock<Option<i64>>,
    last_weekly_run: RwLock<Option<i64>>,
    emergency_triggered: Arc<AtomicBool>,
    latest_worst_case_loss: Arc<RwLock<Option<f64>>>,
}

/// How far back the unified risk monitor looks for historical-simulation
/// scenarios on every tick (spec.md §4.7: 60s period, independent of the
/// lookback window used to build each scenario set).
const RISK_MONITOR_LOOKBACK_SECS: i64 = 7 * 86_400;

impl Supervisor {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        oracle: Arc<dyn PriceOracle>,
        pool: Arc<CollateralPoolManager>,
        float_rebalancer: Arc<FloatRebalancer>,
        tranche_arbitrage: Arc<TrancheArbitrageEngine>,
        trigger_monitor: Arc<TriggerMonitor>,
        tracked_assets: Vec<Asset>,
    ) -> Self {
        Self {
            config,
            store,
            oracle,
            pool,
            float_rebalancer,
            tranche_arbitrage,
            trigger_monitor,
            tracked_assets,
            is_running: Arc::new(AtomicBool::new(true)),
            counters: Arc::new(RwLock::new(HashMap::new())),
            uptime_ticks: Arc::new(RwLock::new(0)),
            last_daily_run: RwLock::new(None),
            last_weekly_run: RwLock::new(None),
            emergency_triggered: Arc::new(AtomicBool::new(false)),
            latest_worst_case_loss: Arc::new(RwLock::new(None)),
        }
    }

    pub fn is_running(&self) -> Arc<AtomicBool> {
        self.is_running.clone()
    }

    /// True only if the health monitor (not an external shutdown
    /// signal) was the one that cleared `is_running`.
    pub fn emergency_triggered(&self) -> bool {
        self.emergency_triggered.load(Ordering::SeqCst)
    }

    /// The unified risk monitor's most recent CVaR estimate, in cents.
    /// `None` until the worker has completed at least one tick with
    /// enough price history to produce a scenario set.
    pub async fn latest_worst_case_loss(&self) -> Option<f64> {
        *self.latest_worst_case_loss.read().await
    }

    /// Runs every worker concurrently until `is_running` clears (via
    /// signal or emergency stop), then waits for all of them to finish
    /// their current iteration before returning.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let policy = RetryPolicy::default();
        let mut tasks = tokio::task::JoinSet::new();

        {
            let this = self.clone();
            tasks.spawn(run_periodic_worker(
                "trigger_monitor",
                self.config.worker_periods.trigger_poll_interval_secs,
                policy,
                self.is_running.clone(),
                self.counters.clone(),
                move || {
                    let this = this.clone();
                    async move { this.trigger_monitor.run_iteration(Utc::now().timestamp()).await.map_err(Into::into) }
                },
            ));
        }
        {
            let this = self.clone();
            tasks.spawn(run_periodic_worker(
                "float_rebalancer",
                self.config.worker_periods.rebalancer_interval_secs,
                policy,
                self.is_running.clone(),
                self.counters.clone(),
                move || {
                    let this = this.clone();
                    async move { this.run_float_rebalance().await }
                },
            ));
        }
        {
            let this = self.clone();
            tasks.spawn(run_periodic_worker(
                "tranche_arbitrage",
                self.config.worker_periods.arbitrage_interval_secs,
                policy,
                self.is_running.clone(),
                self.counters.clone(),
                move || {
                    let this = this.clone();
                    async move { this.run_tranche_arbitrage().await }
                },
            ));
        }
        {
            let this = self.clone();
            tasks.spawn(run_periodic_worker(
                "price_ingestion",
                self.config.worker_periods.price_update_interval_secs,
                policy,
                self.is_running.clone(),
                self.counters.clone(),
                move || {
                    let this = this.clone();
                    async move { this.run_price_ingestion().await }
                },
            ));
        }
        {
            let this = self.clone();
            tasks.spawn(run_periodic_worker(
                "risk_monitor",
                self.config.worker_periods.risk_monitor_interval_secs,
                policy,
                self.is_running.clone(),
                self.counters.clone(),
                move || {
                    let this = this.clone();
                    async move { this.run_risk_monitor().await }
                },
            ));
        }
        {
            let this = self.clone();
            tasks.spawn(run_periodic_worker(
                "health_check",
                self.config.worker_periods.health_check_interval_secs,
                policy,
                self.is_running.clone(),
                self.counters.clone(),
                move || {
                    let this = this.clone();
                    async move {
                        let was_running = this.is_running.load(Ordering::SeqCst);
                        run_health_check(&this.pool, &this.counters, &this.config.emergency, &this.is_running, &this.uptime_ticks)
                            .await?;
                        if was_running && !this.is_running.load(Ordering::SeqCst) {
                            this.emergency_triggered.store(true, Ordering::SeqCst);
                        }
                        Ok(())
                    }
                },
            ));
        }
        {
            let this = self.clone();
            tasks.spawn(run_periodic_worker(
                "etl_scheduler",
                60,
                policy,
                self.is_running.clone(),
                self.counters.clone(),
                move || {
                    let this = this.clone();
                    async move { this.run_etl_tick().await }
                },
            ));
        }

        while tasks.join_next().await.is_some() {}
        info!("all workers stopped, supervisor run loop exiting");
        Ok(())
    }

    /// Signals every worker to stop after its current iteration.
    pub fn request_shutdown(&self) {
        self.is_running.store(false, Ordering::SeqCst);
    }

    async fn run_float_rebalance(&self) -> anyhow::Result<()> {
        let btc_quote = self.oracle.get_consensus_price(Asset::Btc, None).await;
        let btc_price = btc_quote.map(|q| q.price).unwrap_or(60_000.0);
        self.float_rebalancer
            .run_iteration(btc_price, 0.30, &HashMap::new(), Utc::now().timestamp())
            .await?;
        Ok(())
    }

    async fn run_risk_monitor(&self) -> anyhow::Result<()> {
        let snapshot =
            run_risk_tick(&self.pool, &self.store, &self.tracked_assets, RISK_MONITOR_LOOKBACK_SECS).await?;
        *self.latest_worst_case_loss.write().await = Some(snapshot.conditional_value_at_risk);
        Ok(())
    }

    async fn run_tranche_arbitrage(&self) -> anyhow::Result<()> {
        let empty: HashMap<TrancheId, f64> = HashMap::new();
        self.tranche_arbitrage.run_iteration(Utc::now().timestamp(), &empty).await?;
        Ok(())
    }

    async fn run_price_ingestion(&self) -> anyhow::Result<()> {
        let now = Utc::now().timestamp();
        for asset in &self.tracked_assets {
            if let Some(quote) = self.oracle.get_consensus_price(*asset, None).await {
                self.store.insert_price(*asset, quote.price, "consensus", now).await?;
            }
        }
        Ok(())
    }

    async fn run_etl_tick(&self) -> anyhow::Result<()> {
        let now = Utc::now().timestamp();
        let trigger_prices: Vec<(Asset, f64)> = Vec::new();
        let daily = CronSchedule::Daily { hour: 2, minute: 0 };
        let weekly = CronSchedule::WeeklySunday { hour: 3, minute: 0 };
        if due(daily, now, self.last_daily_run().await) {
            run_daily_etl(&self.store, &self.tracked_assets, &trigger_prices, 86_400).await?;
            self.set_last_daily_run(now).await;
        }
        if due(weekly, now, self.last_weekly_run().await) {
            run_weekly_etl(&self.store, &self.tracked_assets, &trigger_prices, 7 * 86_400).await?;
            self.set_last_weekly_run(now).await;
        }
        Ok(())
    }

    async fn last_daily_run(&self) -> Option<i64> {
        *self.last_daily_run.read().await
    }

    async fn set_last_daily_run(&self, now: i64) {
        *self.last_daily_run.write().await = Some(now);
    }

    async fn last_weekly_run(&self) -> Option<i64> {
        *self.last_weekly_run.read().await
    }

    async fn set_last_weekly_run(&self, now: i64) {
        *self.last_weekly_run.write().await = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collateral_pool::UnderwritingThresholds;
    use core_config::WorkerPeriods;
    use oracle::InMemoryOracle;
    use persistence::InMemoryStore;
    use std::time::Duration;
    use tranche_arbitrage::TrancheArbitrageEngine;
    use trigger_monitor::{AlwaysSucceedsPayout, TriggerMonitorConfig};
    use utilization_tracker::UtilizationTracker;

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.worker_periods = WorkerPeriods {
            price_update_interval_secs: 1,
            risk_monitor_interval_secs: 1,
            rebalancer_interval_secs: 1,
            arbitrage_interval_secs: 1,
            health_check_interval_secs: 1,
            trigger_poll_interval_secs: 1,
            confirmation_period_secs: 14_400,
        };
        config
    }

    async fn supervisor_with(capital: i64) -> Arc<Supervisor> {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let oracle: Arc<dyn PriceOracle> = Arc::new(InMemoryOracle::new());
        let tracker = Arc::new(UtilizationTracker::new(store.clone() as Arc<dyn persistence::Store>));
        let pool = Arc::new(CollateralPoolManager::new(tracker.clone(), UnderwritingThresholds::default()));
        pool.add_liquidity("lp1", money::TrancheId::Eqt, capital).await.unwrap();
        let float_rebalancer = Arc::new(FloatRebalancer::new(pool.clone(), 0.40, 0.10, 0));
        let tranche_arbitrage = Arc::new(TrancheArbitrageEngine::new(pool.clone(), tracker.clone(), 0.02, 0.10, 0.03));
        let trigger_monitor = Arc::new(TriggerMonitor::new(
            store.clone(),
            oracle.clone(),
            pool.clone(),
            Arc::new(AlwaysSucceedsPayout::default()),
            TriggerMonitorConfig::default(),
        ));
        Arc::new(Supervisor::new(
            fast_config(),
            store,
            oracle,
            pool,
            float_rebalancer,
            tranche_arbitrage,
            trigger_monitor,
            vec![money::Asset::Usdc, money::Asset::Btc],
        ))
    }

    #[tokio::test]
    async fn healthy_supervisor_runs_a_few_ticks_and_shuts_down_cleanly_on_request() {
        let supervisor = supervisor_with(10_000_000_00).await;
        let handle = tokio::spawn(supervisor.clone().run());

        tokio::time::sleep(Duration::from_millis(300)).await;
        supervisor.request_shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();

        assert!(!supervisor.emergency_triggered());
    }

    #[tokio::test]
    async fn breached_pool_trips_emergency_stop_without_external_signal() {
        let supervisor = supervisor_with(10_000_000_00).await;
        // Drain usd_reserves far below the 5% shutdown floor without
        // touching tranche capital, so the gate never enters into it.
        supervisor.pool.apply_float_rebalance(1, -9_999_000_00, 0, 0).await.unwrap();

        let handle = tokio::spawn(supervisor.clone().run());
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();

        assert!(supervisor.emergency_triggered());
    }
}
