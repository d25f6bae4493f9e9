use serde::{Deserialize, Serialize};

/// A tranche's bonding-curve APY shape as a function of utilization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApyShape {
    Flat,
    Logarithmic,
    Linear,
    Sigmoidal,
    Quadratic,
    Exponential,
}

/// The six fixed tranches, ordered by seniority 1..6 (most senior
/// first). `ALL_TRANCHES` gives that order for waterfall iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrancheId {
    BtcSenior,
    Snr,
    Mezz,
    Jnr,
    JnrPlus,
    Eqt,
}

pub const ALL_TRANCHES: [TrancheId; 6] = [
    TrancheId::BtcSenior,
    TrancheId::Snr,
    TrancheId::Mezz,
    TrancheId::Jnr,
    TrancheId::JnrPlus,
    TrancheId::Eqt,
];

impl TrancheId {
    /// 1 = most senior, 6 = most junior.
    pub fn seniority(self) -> u8 {
        match self {
            TrancheId::BtcSenior => 1,
            TrancheId::Snr => 2,
            TrancheId::Mezz => 3,
            TrancheId::Jnr => 4,
            TrancheId::JnrPlus => 5,
            TrancheId::Eqt => 6,
        }
    }

    pub fn risk_capacity_pct(self) -> f64 {
        match self {
            TrancheId::BtcSenior => 0.50,
            TrancheId::Snr => 0.60,
            TrancheId::Mezz => 0.70,
            TrancheId::Jnr => 0.80,
            TrancheId::JnrPlus => 0.90,
            TrancheId::Eqt => 1.00,
        }
    }

    pub fn apy_shape(self) -> ApyShape {
        match self {
            TrancheId::BtcSenior => ApyShape::Flat,
            TrancheId::Snr => ApyShape::Logarithmic,
            TrancheId::Mezz => ApyShape::Linear,
            TrancheId::Jnr => ApyShape::Sigmoidal,
            TrancheId::JnrPlus => ApyShape::Quadratic,
            TrancheId::Eqt => ApyShape::Exponential,
        }
    }

    /// `(min, max)` APY in basis points for this tranche's bonding curve.
    pub fn apy_range_bps(self) -> (u32, u32) {
        match self {
            TrancheId::BtcSenior => (200, 400),
            TrancheId::Snr => (300, 600),
            TrancheId::Mezz => (500, 900),
            TrancheId::Jnr => (800, 1400),
            TrancheId::JnrPlus => (1200, 2200),
            TrancheId::Eqt => (1800, 4000),
        }
    }

    /// Tranches strictly junior to `self`, in junior-to-senior waterfall
    /// order (used by the loss waterfall, which walks 6, 5, 4, ... 1).
    pub fn waterfall_order() -> impl Iterator<Item = TrancheId> {
        ALL_TRANCHES.iter().rev().copied()
    }
}
