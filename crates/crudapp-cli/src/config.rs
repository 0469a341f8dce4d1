use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crudapp_rpc::{Commitment, RpcConfig};
use crudapp_types::Cluster;

/// Client settings, read from TOML and overridden by command-line flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub cluster: Cluster,
    /// Overrides the cluster's default endpoint.
    pub rpc_url: Option<String>,
    pub keypair_path: Option<PathBuf>,
    pub commitment: Commitment,
    pub confirm_poll_interval_ms: u64,
    pub confirm_max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cluster: Cluster::Devnet,
            rpc_url: None,
            keypair_path: None,
            commitment: Commitment::Confirmed,
            confirm_poll_interval_ms: 500,
            confirm_max_attempts: 60,
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

impl ClientConfig {
    pub fn default_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(".config").join("crudapp").join("config.toml"))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("invalid client config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("in {}", path.display()))
    }

    /// Load `explicit` (which must exist), else the default file if present,
    /// else defaults.
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::load(&path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn with_overrides(
        mut self,
        cluster: Option<&str>,
        rpc_url: Option<&str>,
        keypair: Option<&Path>,
    ) -> Self {
        if let Some(cluster) = cluster {
            self.cluster = Cluster::parse(cluster);
            // A new cluster brings its own endpoint unless one is given too.
            self.rpc_url = None;
        }
        if let Some(url) = rpc_url {
            self.rpc_url = Some(url.to_string());
        }
        if let Some(path) = keypair {
            self.keypair_path = Some(path.to_path_buf());
        }
        self
    }

    pub fn effective_rpc_url(&self) -> &str {
        self.rpc_url
            .as_deref()
            .unwrap_or_else(|| self.cluster.default_rpc_url())
    }

    /// Configured keypair, or the Solana CLI default `~/.config/solana/id.json`.
    pub fn effective_keypair_path(&self) -> Option<PathBuf> {
        self.keypair_path.clone().or_else(|| {
            home_dir().map(|h| h.join(".config").join("solana").join("id.json"))
        })
    }

    pub fn rpc_config(&self) -> RpcConfig {
        let mut config = RpcConfig::new(self.effective_rpc_url()).with_commitment(self.commitment);
        config.confirm_poll_interval = Duration::from_millis(self.confirm_poll_interval_ms);
        config.confirm_max_attempts = self.confirm_max_attempts;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_devnet() {
        let config = ClientConfig::default();
        assert_eq!(config.cluster, Cluster::Devnet);
        assert_eq!(config.effective_rpc_url(), "https://api.devnet.solana.com");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml("cluster = \"localnet\"\ncommitment = \"finalized\"\n").unwrap();
        assert_eq!(config.cluster, Cluster::Localnet);
        assert_eq!(config.commitment, Commitment::Finalized);
        assert_eq!(config.confirm_max_attempts, 60);
        assert_eq!(config.effective_rpc_url(), "http://127.0.0.1:8899");
    }

    #[test]
    fn custom_cluster_uses_its_endpoint() {
        let config = ClientConfig::from_toml("cluster = \"https://rpc.example.org\"").unwrap();
        assert!(config.cluster.is_custom());
        assert_eq!(config.effective_rpc_url(), "https://rpc.example.org");
    }

    #[test]
    fn explicit_url_wins() {
        let config = ClientConfig::default().with_overrides(None, Some("http://node:8899"), None);
        assert_eq!(config.effective_rpc_url(), "http://node:8899");
        assert_eq!(config.rpc_config().url, "http://node:8899");
    }

    #[test]
    fn cluster_flag_resets_file_url() {
        let config = ClientConfig {
            rpc_url: Some("http://file-node".into()),
            ..ClientConfig::default()
        }
        .with_overrides(Some("testnet"), None, None);
        assert_eq!(config.effective_rpc_url(), "https://api.testnet.solana.com");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "cluster = \"mainnet-beta\"\nkeypair_path = \"/keys/id.json\"\nconfirm_poll_interval_ms = 250\n",
        )
        .unwrap();
        let config = ClientConfig::resolve(Some(&path)).unwrap();
        assert_eq!(config.cluster, Cluster::MainnetBeta);
        assert_eq!(config.keypair_path, Some(PathBuf::from("/keys/id.json")));
        assert_eq!(config.rpc_config().confirm_poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ClientConfig::resolve(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn roundtrips_through_toml() {
        let config = ClientConfig::default().with_overrides(Some("localnet"), None, None);
        let raw = toml::to_string(&config).unwrap();
        assert_eq!(ClientConfig::from_toml(&raw).unwrap(), config);
    }
}
