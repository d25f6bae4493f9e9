use serde::{Deserialize, Serialize};

/// The closed (but treated-as-extensible) set of covered assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    Usdc,
    Usdt,
    Dai,
    Usdp,
    Frax,
    Busd,
    UsdE,
    SUsdE,
    Usdy,
    PyUsd,
    Gho,
    Lusd,
    CrvUsd,
    MkUsd,
    Btc,
}

/// Static correlation clustering used by the correlated-asset
/// concentration check: centralized, fiat-collateralized stablecoins
/// are mutually correlated; algorithmic/crypto-collateralized
/// stablecoins form a separate cluster. BTC is its own cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetCluster {
    CentralizedStable,
    AlgorithmicStable,
    Btc,
}

impl Asset {
    pub fn cluster(self) -> AssetCluster {
        match self {
            Asset::Usdc | Asset::Usdt | Asset::Usdp | Asset::Busd | Asset::Usdy | Asset::PyUsd => {
                AssetCluster::CentralizedStable
            }
            Asset::Dai
            | Asset::Frax
            | Asset::UsdE
            | Asset::SUsdE
            | Asset::Gho
            | Asset::Lusd
            | Asset::CrvUsd
            | Asset::MkUsd => AssetCluster::AlgorithmicStable,
            Asset::Btc => AssetCluster::Btc,
        }
    }

    pub fn is_correlated_with(self, other: Asset) -> bool {
        self != other && self.cluster() == other.cluster()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centralized_stables_are_mutually_correlated() {
        assert!(Asset::Usdc.is_correlated_with(Asset::Usdt));
        assert!(Asset::Usdp.is_correlated_with(Asset::Busd));
    }

    #[test]
    fn centralized_and_algorithmic_are_not_correlated() {
        assert!(!Asset::Usdc.is_correlated_with(Asset::Dai));
    }

    #[test]
    fn asset_is_not_correlated_with_itself_for_the_check() {
        assert!(!Asset::Usdc.is_correlated_with(Asset::Usdc));
    }
}
