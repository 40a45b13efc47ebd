//! CLI configuration, parsed from a TOML file plus environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use alph_explorer::{default_explorer_url, Network};
use alph_keyring::{AddressIndex, DEFAULT_MIN_GAP};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyringConfig {
    /// Where and under which name the wallet is stored
    #[serde(default)]
    pub wallet: WalletSection,

    /// Network and explorer backend
    #[serde(default)]
    pub network: NetworkSection,

    /// Address discovery tuning
    #[serde(default)]
    pub discovery: DiscoverySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSection {
    /// Directory holding the wallet store file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Name of the wallet inside the store
    #[serde(default = "default_wallet_name")]
    pub wallet_name: String,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for WalletSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            wallet_name: default_wallet_name(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSection {
    /// "mainnet", "testnet" or "devnet"
    #[serde(default = "default_network")]
    pub network: String,

    /// Explorer backend URL; the network's public backend when unset
    #[serde(default)]
    pub explorer_url: Option<String>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            network: default_network(),
            explorer_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySection {
    /// Consecutive unused addresses that end a group's scan
    #[serde(default = "default_min_gap")]
    pub min_gap: usize,

    /// Indexes discovery must not touch
    #[serde(default)]
    pub skip_indexes: Vec<AddressIndex>,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            min_gap: default_min_gap(),
            skip_indexes: Vec::new(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_data_dir() -> PathBuf {
    PathBuf::from("./alph-wallet")
}

fn default_wallet_name() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_network() -> String {
    "mainnet".to_string()
}

fn default_min_gap() -> usize {
    DEFAULT_MIN_GAP
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl KeyringConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: KeyringConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Like [`from_file`](Self::from_file), but a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            log::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `ALPH_KEYRING_DATA_DIR`
    /// - `ALPH_KEYRING_WALLET`
    /// - `ALPH_KEYRING_LOG_LEVEL`
    /// - `ALPH_KEYRING_NETWORK`
    /// - `ALPH_KEYRING_EXPLORER_URL`
    /// - `ALPH_KEYRING_MIN_GAP`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ALPH_KEYRING_DATA_DIR") {
            self.wallet.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ALPH_KEYRING_WALLET") {
            self.wallet.wallet_name = v;
        }
        if let Ok(v) = std::env::var("ALPH_KEYRING_LOG_LEVEL") {
            self.wallet.log_level = v;
        }
        if let Ok(v) = std::env::var("ALPH_KEYRING_NETWORK") {
            self.network.network = v;
        }
        if let Ok(v) = std::env::var("ALPH_KEYRING_EXPLORER_URL") {
            self.network.explorer_url = Some(v);
        }
        if let Ok(v) = std::env::var("ALPH_KEYRING_MIN_GAP") {
            if let Ok(gap) = v.parse::<usize>() {
                self.discovery.min_gap = gap;
            }
        }
    }

    /// Parse the network string.
    pub fn network(&self) -> Result<Network> {
        self.network
            .network
            .parse()
            .map_err(|e: String| anyhow::anyhow!("network.network: {}", e))
    }

    /// Configured explorer URL, or the network's default backend
    pub fn explorer_url(&self) -> Result<String> {
        match &self.network.explorer_url {
            Some(url) => Ok(url.clone()),
            None => Ok(default_explorer_url(self.network()?).to_string()),
        }
    }

    /// File the wallet store lives in
    pub fn store_path(&self) -> PathBuf {
        self.wallet.data_dir.join("wallets.json")
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.wallet.wallet_name.is_empty(),
            "wallet.wallet_name must not be empty"
        );

        anyhow::ensure!(self.discovery.min_gap > 0, "discovery.min_gap must be > 0");

        self.network()?;

        if let Some(ref url) = self.network.explorer_url {
            anyhow::ensure!(
                url.starts_with("https://") || url.starts_with("http://"),
                "network.explorer_url must be an http(s) URL"
            );
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
