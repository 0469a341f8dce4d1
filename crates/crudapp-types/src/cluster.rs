use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named network environment hosting a deployment of the journal program.
///
/// Parsing is total: any string that is not a well-known cluster name becomes
/// [`Cluster::Custom`], which resolves like `mainnet-beta` and uses the string
/// itself as its RPC endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Cluster {
    #[default]
    Devnet,
    Testnet,
    MainnetBeta,
    Localnet,
    Custom(String),
}

impl Cluster {
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "devnet" => Self::Devnet,
            "testnet" => Self::Testnet,
            "mainnet-beta" => Self::MainnetBeta,
            "localnet" | "localhost" => Self::Localnet,
            _ => Self::Custom(trimmed.to_string()),
        }
    }

    /// The cluster's canonical name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Devnet => "devnet",
            Self::Testnet => "testnet",
            Self::MainnetBeta => "mainnet-beta",
            Self::Localnet => "localnet",
            Self::Custom(name) => name,
        }
    }

    /// Public JSON-RPC endpoint for the cluster.
    pub fn default_rpc_url(&self) -> &str {
        match self {
            Self::Devnet => "https://api.devnet.solana.com",
            Self::Testnet => "https://api.testnet.solana.com",
            Self::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Self::Localnet => "http://127.0.0.1:8899",
            Self::Custom(endpoint) => endpoint,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl FromStr for Cluster {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for Cluster {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&str> for Cluster {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<Cluster> for String {
    fn from(cluster: Cluster) -> Self {
        cluster.as_str().to_string()
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_known_names() {
        assert_eq!(Cluster::parse("devnet"), Cluster::Devnet);
        assert_eq!(Cluster::parse("testnet"), Cluster::Testnet);
        assert_eq!(Cluster::parse("mainnet-beta"), Cluster::MainnetBeta);
        assert_eq!(Cluster::parse("localhost"), Cluster::Localnet);
        assert_eq!(Cluster::parse(" DevNet "), Cluster::Devnet);
    }

    #[test]
    fn unknown_names_become_custom() {
        let cluster = Cluster::parse("http://10.0.0.5:8899");
        assert!(cluster.is_custom());
        assert_eq!(cluster.default_rpc_url(), "http://10.0.0.5:8899");
        assert_eq!(cluster.to_string(), "http://10.0.0.5:8899");
    }

    #[test]
    fn default_endpoints() {
        assert_eq!(Cluster::Devnet.default_rpc_url(), "https://api.devnet.solana.com");
        assert_eq!(Cluster::Localnet.default_rpc_url(), "http://127.0.0.1:8899");
    }

    #[test]
    fn serde_as_plain_string() {
        let json = serde_json::to_string(&Cluster::MainnetBeta).unwrap();
        assert_eq!(json, "\"mainnet-beta\"");
        let parsed: Cluster = serde_json::from_str("\"testnet\"").unwrap();
        assert_eq!(parsed, Cluster::Testnet);
    }
}
