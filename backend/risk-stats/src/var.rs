//! Monte Carlo VaR/CVaR consumed as a pure function over a caller-supplied
//! scenario set, per the open-question decision that the numerical
//! library takes pool state plus scenarios rather than a connection
//! pool handle.

/// Value at risk at `confidence` (e.g. 0.95) over a set of simulated
/// or historical loss scenarios (positive = loss, in cents).
pub fn value_at_risk(loss_scenarios: &[f64], confidence: f64) -> f64 {
    if loss_scenarios.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = loss_scenarios.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = ((sorted.len() as f64 - 1.0) * confidence).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Conditional VaR (expected shortfall): the mean of all scenarios at
/// or beyond the VaR threshold.
pub fn conditional_value_at_risk(loss_scenarios: &[f64], confidence: f64) -> f64 {
    if loss_scenarios.is_empty() {
        return 0.0;
    }
    let var = value_at_risk(loss_scenarios, confidence);
    let tail: Vec<f64> = loss_scenarios.iter().copied().filter(|l| *l >= var).collect();
    if tail.is_empty() {
        return var;
    }
    tail.iter().sum::<f64>() / tail.len() as f64
}
