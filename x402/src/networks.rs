//! Supported network definitions and USDC deployments.
//!
//! Networks are static, process-wide read-only data: chain ID, the
//! canonical Circle USDC contract on that chain, a default public RPC
//! endpoint, a block-explorer root, the average block time, and a
//! relative gas-cost multiplier used only for cross-chain comparisons
//! (Base = 1.0).
//!
//! Source for contract addresses:
//! <https://developers.circle.com/stablecoins/usdc-contract-addresses>

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported network, identified on the wire by its kebab-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    /// Base mainnet (chain 8453).
    #[serde(rename = "base-mainnet")]
    BaseMainnet,
    /// Base Sepolia testnet (chain 84532).
    #[serde(rename = "base-sepolia")]
    BaseSepolia,
    /// Ethereum mainnet (chain 1).
    #[serde(rename = "ethereum-mainnet")]
    EthereumMainnet,
    /// Arbitrum One (chain 42161).
    #[serde(rename = "arbitrum-one")]
    ArbitrumOne,
    /// OP Mainnet (chain 10).
    #[serde(rename = "optimism-mainnet")]
    OptimismMainnet,
}

impl Network {
    /// Every network advertised by `/supported`.
    pub const ALL: [Self; 5] = [
        Self::BaseMainnet,
        Self::BaseSepolia,
        Self::EthereumMainnet,
        Self::ArbitrumOne,
        Self::OptimismMainnet,
    ];

    /// The wire name (e.g. `"base-sepolia"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BaseMainnet => "base-mainnet",
            Self::BaseSepolia => "base-sepolia",
            Self::EthereumMainnet => "ethereum-mainnet",
            Self::ArbitrumOne => "arbitrum-one",
            Self::OptimismMainnet => "optimism-mainnet",
        }
    }

    /// The EIP-155 chain ID.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        match self {
            Self::BaseMainnet => 8453,
            Self::BaseSepolia => 84532,
            Self::EthereumMainnet => 1,
            Self::ArbitrumOne => 42161,
            Self::OptimismMainnet => 10,
        }
    }

    /// The canonical Circle USDC contract on this network.
    #[must_use]
    pub const fn usdc_address(&self) -> Address {
        match self {
            Self::BaseMainnet => address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            Self::BaseSepolia => address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
            Self::EthereumMainnet => address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            Self::ArbitrumOne => address!("0xaf88d065e77c8cC2239327C5EDb3A432268e5831"),
            Self::OptimismMainnet => address!("0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
        }
    }

    /// A default public RPC endpoint, used when no override is configured.
    #[must_use]
    pub const fn default_rpc_url(&self) -> &'static str {
        match self {
            Self::BaseMainnet => "https://mainnet.base.org",
            Self::BaseSepolia => "https://sepolia.base.org",
            Self::EthereumMainnet => "https://eth.llamarpc.com",
            Self::ArbitrumOne => "https://arb1.arbitrum.io/rpc",
            Self::OptimismMainnet => "https://mainnet.optimism.io",
        }
    }

    /// The block-explorer root for this network.
    #[must_use]
    pub const fn explorer_url(&self) -> &'static str {
        match self {
            Self::BaseMainnet => "https://basescan.org",
            Self::BaseSepolia => "https://sepolia.basescan.org",
            Self::EthereumMainnet => "https://etherscan.io",
            Self::ArbitrumOne => "https://arbiscan.io",
            Self::OptimismMainnet => "https://optimistic.etherscan.io",
        }
    }

    /// Average block time in seconds.
    #[must_use]
    pub const fn avg_block_time_secs(&self) -> f64 {
        match self {
            Self::BaseMainnet | Self::BaseSepolia | Self::OptimismMainnet => 2.0,
            Self::EthereumMainnet => 12.0,
            Self::ArbitrumOne => 0.25,
        }
    }

    /// Relative gas-cost multiplier for cross-chain comparisons (Base = 1.0).
    #[must_use]
    pub const fn gas_cost_multiplier(&self) -> f64 {
        match self {
            Self::BaseMainnet | Self::BaseSepolia => 1.0,
            Self::EthereumMainnet => 40.0,
            Self::ArbitrumOne => 1.5,
            Self::OptimismMainnet => 1.2,
        }
    }

    /// Whether this is a layer-2 network. Used by the client's
    /// option-selection tie-break, which prefers L2s over L1s.
    #[must_use]
    pub const fn is_l2(&self) -> bool {
        !matches!(self, Self::EthereumMainnet)
    }

    /// The environment variable carrying the RPC override for this network
    /// (`RPC_URL_<NETWORK_ID>` with dashes mapped to underscores).
    #[must_use]
    pub fn rpc_env_key(&self) -> String {
        format!("RPC_URL_{}", self.as_str().to_uppercase().replace('-', "_"))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|n| n.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown network '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for network in Network::ALL {
            let json = serde_json::to_string(&network).unwrap();
            assert_eq!(serde_json::from_str::<Network>(&json).unwrap(), network);
            assert_eq!(network.as_str().parse::<Network>().unwrap(), network);
        }
    }

    #[test]
    fn env_key_mapping() {
        assert_eq!(Network::BaseSepolia.rpc_env_key(), "RPC_URL_BASE_SEPOLIA");
        assert_eq!(Network::ArbitrumOne.rpc_env_key(), "RPC_URL_ARBITRUM_ONE");
    }

    #[test]
    fn l2_classification() {
        assert!(!Network::EthereumMainnet.is_l2());
        assert!(Network::BaseMainnet.is_l2());
        assert!(Network::ArbitrumOne.is_l2());
        assert!(Network::OptimismMainnet.is_l2());
    }
}
