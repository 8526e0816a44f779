//! Networks the faucet knows how to fund on
//!
//! Each entry pins the chain id the node must report, the gas price to use
//! when the node cannot suggest one, and the default top-up amount.

use ethers::types::U256;

const GWEI: u64 = 1_000_000_000;

/// Static description of a supported network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: &'static str,
    pub chain_id: u64,
    /// Used when the node fails to suggest a gas price
    fallback_gas_price_gwei: u64,
    /// Networks with a fixed price never ask the node
    fixed_gas_price_gwei: Option<u64>,
    default_amount_gwei: u64,
}

const NETWORKS: &[Network] = &[
    Network {
        name: "mainnet",
        chain_id: 1,
        fallback_gas_price_gwei: 30,
        fixed_gas_price_gwei: None,
        default_amount_gwei: 10_000_000,
    },
    Network {
        name: "goerli",
        chain_id: 5,
        fallback_gas_price_gwei: 2,
        fixed_gas_price_gwei: None,
        default_amount_gwei: 50_000_000,
    },
    Network {
        name: "sepolia",
        chain_id: 11155111,
        fallback_gas_price_gwei: 2,
        fixed_gas_price_gwei: None,
        default_amount_gwei: 50_000_000,
    },
    Network {
        name: "xdai",
        chain_id: 100,
        fallback_gas_price_gwei: 1,
        fixed_gas_price_gwei: Some(1),
        default_amount_gwei: 100_000_000,
    },
    Network {
        name: "sokol",
        chain_id: 77,
        fallback_gas_price_gwei: 1,
        fixed_gas_price_gwei: Some(1),
        default_amount_gwei: 100_000_000,
    },
    Network {
        name: "matic",
        chain_id: 137,
        fallback_gas_price_gwei: 50,
        fixed_gas_price_gwei: None,
        default_amount_gwei: 100_000_000,
    },
    Network {
        name: "mumbai",
        chain_id: 80001,
        fallback_gas_price_gwei: 5,
        fixed_gas_price_gwei: None,
        default_amount_gwei: 100_000_000,
    },
    Network {
        name: "anvil",
        chain_id: 31337,
        fallback_gas_price_gwei: 1,
        fixed_gas_price_gwei: None,
        default_amount_gwei: 1_000_000_000,
    },
];

impl Network {
    /// Look a network up by name; `gnosis` is accepted as an alias of `xdai`
    pub fn by_name(name: &str) -> Option<&'static Network> {
        let name = name.trim().to_lowercase();
        let name = match name.as_str() {
            "gnosis" => "xdai",
            "polygon" => "matic",
            "ethereum" => "mainnet",
            other => other,
        };
        NETWORKS.iter().find(|n| n.name == name)
    }

    pub fn fallback_gas_price(&self) -> U256 {
        U256::from(self.fallback_gas_price_gwei) * U256::from(GWEI)
    }

    pub fn fixed_gas_price(&self) -> Option<U256> {
        self.fixed_gas_price_gwei
            .map(|gwei| U256::from(gwei) * U256::from(GWEI))
    }

    pub fn default_amount(&self) -> U256 {
        U256::from(self.default_amount_gwei) * U256::from(GWEI)
    }
}

/// Convert a gwei amount into wei
pub fn gwei(amount: u64) -> U256 {
    U256::from(amount) * U256::from(GWEI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(Network::by_name("Goerli").unwrap().chain_id, 5);
        assert_eq!(Network::by_name("gnosis").unwrap().name, "xdai");
        assert_eq!(Network::by_name("polygon").unwrap().chain_id, 137);
        assert!(Network::by_name("atlantis").is_none());
    }

    #[test]
    fn test_units() {
        let xdai = Network::by_name("xdai").unwrap();
        assert_eq!(xdai.fixed_gas_price(), Some(U256::from(1_000_000_000u64)));
        assert_eq!(xdai.default_amount(), U256::exp10(17));

        let mainnet = Network::by_name("mainnet").unwrap();
        assert_eq!(mainnet.fixed_gas_price(), None);
        assert_eq!(mainnet.fallback_gas_price(), gwei(30));
        assert_eq!(mainnet.default_amount(), U256::exp10(16));
    }
}
