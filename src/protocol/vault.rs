use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::{ContractAddresses, ProtocolConfig, VaultsConfig};
use crate::protocol::address::Address;
use crate::protocol::amount::Usdc;

/// The two ERC-4626 vaults the protocol routes deposits into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultKind {
    Aave,
    Morpho,
}

impl VaultKind {
    pub const ALL: [VaultKind; 2] = [VaultKind::Aave, VaultKind::Morpho];

    pub fn display_name(&self) -> &'static str {
        match self {
            VaultKind::Aave => "Aave v3",
            VaultKind::Morpho => "Morpho",
        }
    }

    pub fn address(&self, contracts: &ContractAddresses) -> Address {
        match self {
            VaultKind::Aave => contracts.aave_vault.clone(),
            VaultKind::Morpho => contracts.morpho_vault.clone(),
        }
    }

    pub fn apy_bps(&self, vaults: &VaultsConfig) -> u32 {
        match self {
            VaultKind::Aave => vaults.aave_apy_bps,
            VaultKind::Morpho => vaults.morpho_apy_bps,
        }
    }
}

impl fmt::Display for VaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VaultKind::Aave => "aave",
            VaultKind::Morpho => "morpho",
        })
    }
}

impl FromStr for VaultKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aave" => Ok(VaultKind::Aave),
            "morpho" => Ok(VaultKind::Morpho),
            other => Err(format!("unknown vault '{other}' (expected aave or morpho)")),
        }
    }
}

/// An investor's holding in one vault, as read from chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultPosition {
    pub vault: VaultKind,
    pub shares: Usdc,
    pub assets: Usdc,
    pub max_withdraw: Usdc,
}

impl VaultPosition {
    pub fn empty(vault: VaultKind) -> Self {
        Self {
            vault,
            shares: Usdc::ZERO,
            assets: Usdc::ZERO,
            max_withdraw: Usdc::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_zero()
    }
}

/// Deposit summary figures shown before confirming
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldEstimate {
    pub apy_bps: u32,
    pub annual_yield: Usdc,
    pub annual_public_goods: Usdc,
}

impl YieldEstimate {
    pub fn for_deposit(amount: Usdc, apy_bps: u32, protocol: &ProtocolConfig) -> Self {
        let annual_yield = amount.percent_bps(apy_bps);
        Self {
            apy_bps,
            annual_yield,
            annual_public_goods: annual_yield.percent_bps(protocol.public_goods_bps),
        }
    }

    /// "6.50%"
    pub fn apy_label(&self) -> String {
        format!("{}.{:02}%", self.apy_bps / 100, self.apy_bps % 100)
    }
}

/// How a harvested amount is split between investors, public goods and the
/// protocol treasury
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionBreakdown {
    pub total: Usdc,
    pub investors: Usdc,
    pub public_goods: Usdc,
    pub protocol_fee: Usdc,
}

impl DistributionBreakdown {
    /// Rounding dust goes to investors so the three parts always sum to the total
    pub fn split(total: Usdc, protocol: &ProtocolConfig) -> Self {
        let public_goods = total.percent_bps(protocol.public_goods_bps);
        let protocol_fee = total.percent_bps(protocol.protocol_fee_bps);
        let investors = total.saturating_sub(public_goods).saturating_sub(protocol_fee);
        Self {
            total,
            investors,
            public_goods,
            protocol_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_kind_parsing() {
        assert_eq!("Aave".parse::<VaultKind>().unwrap(), VaultKind::Aave);
        assert_eq!("morpho".parse::<VaultKind>().unwrap(), VaultKind::Morpho);
        assert!("compound".parse::<VaultKind>().is_err());
        assert_eq!(VaultKind::Aave.to_string(), "aave");
    }

    #[test]
    fn deposit_yield_estimates() {
        let protocol = ProtocolConfig::default();
        let vaults = VaultsConfig::default();
        let amount = Usdc::from_whole(1_000);

        let aave = YieldEstimate::for_deposit(amount, VaultKind::Aave.apy_bps(&vaults), &protocol);
        assert_eq!(aave.annual_yield.to_fixed(2), "65.00");
        assert_eq!(aave.annual_public_goods.to_fixed(2), "16.25");
        assert_eq!(aave.apy_label(), "6.50%");

        let morpho =
            YieldEstimate::for_deposit(amount, VaultKind::Morpho.apy_bps(&vaults), &protocol);
        assert_eq!(morpho.annual_yield.to_fixed(2), "82.00");
    }

    #[test]
    fn distribution_sums_to_total() {
        let protocol = ProtocolConfig::default();
        let split = DistributionBreakdown::split(Usdc::from_whole(100), &protocol);
        assert_eq!(split.investors, Usdc::from_whole(70));
        assert_eq!(split.public_goods, Usdc::from_whole(25));
        assert_eq!(split.protocol_fee, Usdc::from_whole(5));

        let odd = DistributionBreakdown::split(Usdc::from_units(7), &protocol);
        assert_eq!(odd.investors + odd.public_goods + odd.protocol_fee, odd.total);
    }
}
