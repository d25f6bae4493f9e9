use crate::pool_state::PoolState;
use money::{CoreError, TrancheId};
use tracing::error;

/// Result of a single `execute_payout` call: how much was charged to
/// each tranche, junior to senior.
#[derive(Debug, Clone)]
pub struct WaterfallResult {
    pub charged: Vec<(TrancheId, i64)>,
    pub unallocated: i64,
}

/// Deducts `payout_amount` from reserves and allocates the loss
/// junior-to-senior across the six tranches. Does not release the
/// policy or touch persistence; callers (the manager) do that.
pub fn apply_loss(pool: &mut PoolState, payout_amount: i64) -> Result<WaterfallResult, CoreError> {
    if payout_amount <= 0 {
        return Err(CoreError::ValidationError("payout_amount must be > 0".into()));
    }
    if payout_amount > pool.usd_reserves {
        return Err(CoreError::InsufficientReserves);
    }

    pool.usd_reserves -= payout_amount;

    let mut remaining = payout_amount;
    let mut charged = Vec::with_capacity(6);
    for id in TrancheId::waterfall_order() {
        if remaining == 0 {
            charged.push((id, 0));
            continue;
        }
        let tranche = pool.tranche_mut(id);
        let available = tranche.available_capital();
        if available == 0 {
            charged.push((id, 0));
            continue;
        }
        let charge = remaining.min(available);
        tranche.accumulated_losses += charge;
        remaining -= charge;
        charged.push((id, charge));
    }

    if remaining > 0 {
        pool.unallocated_loss += remaining;
        error!(unallocated = remaining, "waterfall exhausted without absorbing full loss; pool insolvent");
    }

    charged.reverse(); // report senior-to-junior order for readability
    Ok(WaterfallResult { charged, unallocated: remaining })
}

/// Distributes `premium` senior-to-junior, each tranche capped by its
/// modeled yield over `elapsed_secs` at `current_apy_bps`. Any
/// remainder after the equity tranche is protocol surplus (out of
/// scope) and is not tracked further.
pub fn distribute_revenue(pool: &mut PoolState, premium: i64, elapsed_secs: i64, apy_bps: &std::collections::HashMap<TrancheId, u32>) -> i64 {
    let mut remaining = premium;
    for id in money::ALL_TRANCHES {
        if remaining == 0 {
            break;
        }
        let bps = *apy_bps.get(&id).unwrap_or(&0);
        let tranche = pool.tranche(id);
        let modeled_yield = money::mul_div(
            tranche.allocated_capital,
            bps as i64 * elapsed_secs.max(0),
            10_000 * 365 * 24 * 3600,
        )
        .max(0);
        let share = remaining.min(modeled_yield);
        pool.tranche_mut(id).accumulated_yields += share;
        remaining -= share;
    }
    remaining
}
