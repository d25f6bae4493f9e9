/// Linear payout between trigger and floor:
/// `price >= trigger` pays nothing, `price <= floor` pays full
/// coverage, and between the two it scales linearly.
pub fn compute_payout(coverage_amount: i64, trigger_price: f64, floor_price: f64, price: f64) -> i64 {
    if price >= trigger_price {
        return 0;
    }
    if price <= floor_price {
        return coverage_amount;
    }
    let ratio = (trigger_price - price) / (trigger_price - floor_price);
    (coverage_amount as f64 * ratio).floor() as i64
}
