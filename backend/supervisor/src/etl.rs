use chrono::{DateTime, Datelike, Timelike, Utc};
use money::Asset;
use persistence::Store;
use std::sync::Arc;
use tracing::info;

/// The two batch jobs run no scheduling library justifies pulling in;
/// each fires once per their period by comparing the current UTC
/// wall-clock against the last epoch second it ran.
#[derive(Debug, Clone, Copy)]
pub enum CronSchedule {
    Daily { hour: u32, minute: u32 },
    WeeklySunday { hour: u32, minute: u32 },
}

/// True if `now` falls within the job's one-minute trigger window and
/// `last_run` was not already inside that same window (same UTC day
/// for `Daily`, same UTC week for `WeeklySunday`).
pub fn due(schedule: CronSchedule, now: i64, last_run: Option<i64>) -> bool {
    let now_dt = DateTime::<Utc>::from_timestamp(now, 0).expect("valid epoch seconds");
    let (target_hour, target_minute, in_window) = match schedule {
        CronSchedule::Daily { hour, minute } => (hour, minute, true),
        CronSchedule::WeeklySunday { hour, minute } => {
            (hour, minute, now_dt.weekday() == chrono::Weekday::Sun)
        }
    };
    if !in_window || now_dt.hour() != target_hour || now_dt.minute() != target_minute {
        return false;
    }
    match last_run {
        None => true,
        Some(last) => {
            let last_dt = DateTime::<Utc>::from_timestamp(last, 0).expect("valid epoch seconds");
            match schedule {
                CronSchedule::Daily { .. } => last_dt.date_naive() != now_dt.date_naive(),
                CronSchedule::WeeklySunday { .. } => {
                    last_dt.iso_week() != now_dt.iso_week()
                }
            }
        }
    }
}

/// Depeg backfill, a pairwise correlation refresh, and a coarse risk
/// report: for each tracked asset, checks whether a sustained depeg
/// occurred in the trailing window so operators get a daily signal
/// independent of the live trigger monitor, then recomputes the
/// cross-asset correlation matrix the correlated-exposure check relies
/// on being fresh.
pub async fn run_daily_etl(
    store: &Arc<dyn Store>,
    assets: &[Asset],
    trigger_prices: &[(Asset, f64)],
    backfill_window_secs: i64,
) -> anyhow::Result<()> {
    info!("daily ETL: depeg backfill starting");
    for asset in assets {
        let trigger_price = trigger_prices
            .iter()
            .find(|(a, _)| a == asset)
            .map(|(_, p)| *p)
            .unwrap_or(1.0);
        let depegged = store.check_sustained_depeg(*asset, trigger_price, backfill_window_secs).await?;
        if depegged {
            info!(?asset, "daily ETL: sustained depeg observed in backfill window");
        }
    }

    match crate::risk_monitor::compute_correlation_matrix(store, assets, backfill_window_secs).await? {
        Some(matrix) => {
            store.persist_correlation_matrix(matrix).await?;
            info!("daily ETL: correlation matrix refreshed");
        }
        None => info!("daily ETL: insufficient price history for a correlation refresh"),
    }

    info!("daily ETL: risk report complete");
    Ok(())
}

/// Full backfill over a longer window plus a utilization invariant
/// validation pass. No persistence delete operation is exposed by the
/// store contract, so "cleanup" is a logged no-op placeholder for a
/// real backend's retention policy.
pub async fn run_weekly_etl(
    store: &Arc<dyn Store>,
    assets: &[Asset],
    trigger_prices: &[(Asset, f64)],
    backfill_window_secs: i64,
) -> anyhow::Result<()> {
    info!("weekly ETL: full backfill starting");
    run_daily_etl(store, assets, trigger_prices, backfill_window_secs).await?;
    for id in money::ALL_TRANCHES {
        if let Some(record) = store.load_utilization(id).await? {
            let expected = if record.total_capital > 0 {
                record.coverage_sold as f64 / record.total_capital as f64
            } else {
                0.0
            };
            if (record.utilization_ratio - expected).abs() > 1e-6 {
                tracing::warn!(?id, stored = record.utilization_ratio, recomputed = expected, "weekly ETL: utilization record drifted from definition");
            }
        }
    }
    info!("weekly ETL: cleanup (no-op; retention policy owned by the real backend)");
    Ok(())
}
