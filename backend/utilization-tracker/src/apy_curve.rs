use money::{ApyShape, TrancheId};

/// Evaluates a tranche's bonding curve at a utilization ratio in
/// `[0, 1]`, returning basis points within the tranche's configured
/// `[min, max]` range.
pub fn bonding_curve_bps(tranche: TrancheId, utilization_ratio: f64) -> u32 {
    let r = utilization_ratio.clamp(0.0, 1.0);
    let (min, max) = tranche.apy_range_bps();
    let span = (max - min) as f64;
    let f = match tranche.apy_shape() {
        ApyShape::Flat => 0.5,
        ApyShape::Logarithmic => (1.0 + 9.0 * r).ln() / 10f64.ln(),
        ApyShape::Linear => r,
        ApyShape::Sigmoidal => 1.0 / (1.0 + (-10.0 * (r - 0.5)).exp()),
        ApyShape::Quadratic => r * r,
        ApyShape::Exponential => ((3.0 * r).exp() - 1.0) / (3f64.exp() - 1.0),
    };
    (min as f64 + span * f).round() as u32
}
