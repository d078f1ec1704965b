//! Configuration management.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{Error, NodeEndpoint, Result};

/// Block-chain RPC settings, used only to mine blocks in dev/test setups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinRpcConfig {
    /// RPC URL, e.g. `http://127.0.0.1:18443`.
    pub host: String,
    /// RPC username.
    pub username: String,
    /// RPC password.
    pub password: String,
    /// Wallet name; empty for the default wallet.
    #[serde(default)]
    pub wallet: String,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Known node profiles.
    pub nodes: Vec<NodeEndpoint>,
    /// Name of the selected profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    /// Block-chain RPC settings.
    #[serde(default)]
    pub bitcoin: BitcoinRpcConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nodes: vec![
                NodeEndpoint::new("regtest", "alice", "http://127.0.0.1:3001"),
                NodeEndpoint::new("regtest", "bob", "http://127.0.0.1:3002"),
            ],
            selected: None,
            bitcoin: BitcoinRpcConfig {
                host: "http://127.0.0.1:18443".to_string(),
                username: "user".to_string(),
                password: "password".to_string(),
                wallet: String::new(),
            },
        }
    }
}

impl Config {
    /// Load configuration from disk or create default, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file, creating it with defaults if missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `PANEL_*` overrides looked up through `var`.
    ///
    /// Node overrides touch the `alice`/`bob` profiles (host and name) and
    /// every profile's network and relay.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| var(key).filter(|value| !value.is_empty());

        if let Some(network) = var("PANEL_NODE_NETWORK") {
            for node in &mut self.nodes {
                node.network.clone_from(&network);
            }
        }
        if let Some(relay) = var("PANEL_NODE_API_PROXY") {
            for node in &mut self.nodes {
                node.relay = Some(relay.clone());
            }
        }

        for (profile, host_key, name_key) in [
            ("alice", "PANEL_NODE_ALICE_HOST", "PANEL_NODE_ALICE_NAME"),
            ("bob", "PANEL_NODE_BOB_HOST", "PANEL_NODE_BOB_NAME"),
        ] {
            let Some(node) = self.nodes.iter_mut().find(|n| n.name == profile) else {
                continue;
            };
            if let Some(host) = var(host_key) {
                node.base_url = host;
            }
            if let Some(name) = var(name_key) {
                node.name = name;
            }
        }

        if let Some(host) = var("PANEL_BITCOIN_HOST") {
            self.bitcoin.host = host;
        }
        if let Some(user) = var("PANEL_BITCOIN_USER") {
            self.bitcoin.username = user;
        }
        if let Some(password) = var("PANEL_BITCOIN_PASSWORD") {
            self.bitcoin.password = password;
        }
        if let Some(wallet) = var("PANEL_BITCOIN_WALLET") {
            self.bitcoin.wallet = wallet;
        }
    }

    /// Find a node profile by name.
    pub fn node(&self, name: &str) -> Result<&NodeEndpoint> {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| Error::Config(format!("unknown node profile: {name}")))
    }

    /// Select a node profile.
    pub fn select(&mut self, name: &str) -> Result<&NodeEndpoint> {
        self.node(name)?;
        self.selected = Some(name.to_string());
        self.node(name)
    }

    /// Clear the selection.
    pub fn reset(&mut self) {
        self.selected = None;
    }

    /// The selected node profile, if any.
    pub fn selected(&self) -> Option<&NodeEndpoint> {
        self.selected.as_deref().and_then(|name| self.node(name).ok())
    }

    /// Get configuration file path.
    fn config_path() -> Result<PathBuf> {
        ProjectDirs::from("", "", "ldk-panel")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .ok_or_else(|| Error::Config("could not determine config directory".into()))
    }
}
