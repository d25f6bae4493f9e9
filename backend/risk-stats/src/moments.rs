//! Black-box statistical primitives, consumed by the core as pure
//! functions over in-memory series. A reimplementation may swap these
//! for a library's equivalents without affecting callers.

pub fn mean(xs: &[f64]) -> f64 {
    assert!(!xs.is_empty(), "mean: empty series");
    xs.iter().sum::<f64>() / xs.len() as f64
}

pub fn variance(xs: &[f64]) -> f64 {
    assert!(!xs.is_empty(), "variance: empty series");
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64
}

pub fn std_dev(xs: &[f64]) -> f64 {
    variance(xs).sqrt()
}

/// Pearson correlation. Returns `None` when either series has fewer
/// than 10 points or zero variance, matching the contract the core
/// relies on for the correlated-asset concentration check.
pub fn correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 10 {
        return None;
    }
    let var_x = variance(xs);
    let var_y = variance(ys);
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    let mx = mean(xs);
    let my = mean(ys);
    let cov: f64 = xs
        .iter()
        .zip(ys.iter())
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>()
        / xs.len() as f64;
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
