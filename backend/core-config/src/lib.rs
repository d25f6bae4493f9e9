use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub worker_periods: WorkerPeriods,
    pub thresholds: Thresholds,
    pub emergency: EmergencyConfig,
    pub integration: IntegrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPeriods {
    pub price_update_interval_secs: u64,
    pub risk_monitor_interval_secs: u64,
    pub rebalancer_interval_secs: u64,
    pub arbitrage_interval_secs: u64,
    pub health_check_interval_secs: u64,
    pub trigger_poll_interval_secs: u64,
    pub confirmation_period_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub max_ltv: f64,
    pub min_reserve_ratio: f64,
    pub max_single_asset_exposure: f64,
    pub max_correlated_exposure: f64,
    pub required_stress_buffer: f64,
    pub target_usd_ratio: f64,
    pub rebalance_threshold: f64,
    pub min_btc_float_sats: i64,
    pub high_utilization_threshold: f64,
    pub min_collateralization_ratio: f64,
    pub max_utilization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyConfig {
    pub enable_emergency_shutdown: bool,
    pub max_ltv_shutdown: f64,
    pub min_reserve_shutdown: f64,
    pub max_error_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub oracle_endpoint: String,
    pub oracle_api_key: String,
    pub database_url: String,
    pub onchain_endpoint: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Path override via `CORE_CONFIG_PATH`, falling back to the given
    /// default. Options are read once at startup; changes require restart.
    pub fn load_with_env_override(default_path: &str) -> Result<Self> {
        let path = std::env::var("CORE_CONFIG_PATH").unwrap_or_else(|_| default_path.to_string());
        Self::load(&path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_periods.confirmation_period_secs <= 0 {
            return Err(anyhow!("confirmation_period_secs must be positive"));
        }
        if !(0.0..=1.0).contains(&self.thresholds.max_ltv) {
            return Err(anyhow!("max_ltv must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.thresholds.min_reserve_ratio) {
            return Err(anyhow!("min_reserve_ratio must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.thresholds.max_utilization) {
            return Err(anyhow!("max_utilization must be in [0, 1]"));
        }
        if self.thresholds.min_collateralization_ratio <= 0.0 {
            return Err(anyhow!("min_collateralization_ratio must be positive"));
        }
        if self.emergency.max_error_count == 0 {
            return Err(anyhow!("max_error_count must be at least 1"));
        }
        if self.integration.database_url.is_empty() {
            return Err(anyhow!("database_url cannot be empty"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_periods: WorkerPeriods {
                price_update_interval_secs: 120,
                risk_monitor_interval_secs: 60,
                rebalancer_interval_secs: 300,
                arbitrage_interval_secs: 900,
                health_check_interval_secs: 30,
                trigger_poll_interval_secs: 60,
                confirmation_period_secs: 14_400,
            },
            thresholds: Thresholds {
                max_ltv: 0.85,
                min_reserve_ratio: 0.15,
                max_single_asset_exposure: 0.30,
                max_correlated_exposure: 0.50,
                required_stress_buffer: 1.0,
                target_usd_ratio: 0.40,
                rebalance_threshold: 0.10,
                min_btc_float_sats: 0,
                high_utilization_threshold: 0.90,
                min_collateralization_ratio: 1.10,
                max_utilization: 0.95,
            },
            emergency: EmergencyConfig {
                enable_emergency_shutdown: true,
                max_ltv_shutdown: 0.95,
                min_reserve_shutdown: 0.05,
                max_error_count: 10,
            },
            integration: IntegrationConfig {
                oracle_endpoint: "https://oracle.invalid/v1".to_string(),
                oracle_api_key: String::new(),
                database_url: "postgres://localhost/core".to_string(),
                onchain_endpoint: "https://rpc.invalid".to_string(),
            },
        }
    }
}
