/// One record per active, triggered policy, owned exclusively by the
/// trigger monitor. Created when a price first crosses below the
/// policy's trigger price; destroyed on payout, expiry, or a recovery
/// above trigger before confirmation.
#[derive(Debug, Clone, Copy)]
pub struct TriggerState {
    pub policy_id: u64,
    pub first_trigger_time: i64,
    pub is_confirmed: bool,
}

impl TriggerState {
    pub fn new(policy_id: u64, first_trigger_time: i64) -> Self {
        Self { policy_id, first_trigger_time, is_confirmed: false }
    }

    pub fn elapsed(&self, now: i64) -> i64 {
        now - self.first_trigger_time
    }

    pub fn is_due_for_confirmation(&self, now: i64, confirmation_period_secs: i64) -> bool {
        self.elapsed(now) >= confirmation_period_secs
    }
}
