//! Alephium Explorer Client
//!
//! Answers "has this address ever been used?" against an Alephium explorer
//! backend, for gap-limit discovery.
//!
//! # Security
//!
//! - Use https endpoints; the list of queried addresses reveals wallet ownership
//! - Only addresses are ever sent, never keys
//!
//! # Example
//!
//! ```ignore
//! use alph_explorer::{default_explorer_url, ExplorerClient, Network};
//! use alph_keyring::Keyring;
//!
//! let client = ExplorerClient::new(default_explorer_url(Network::Mainnet))?;
//! let found = keyring.discover_and_cache_active_addresses(&client, &[], None)?;
//! ```

use alph_keyring::{Address, AddressOracle, OracleError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from explorer requests
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid explorer URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Explorer returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Explorer answered {got} flags for {expected} addresses")]
    LengthMismatch { expected: usize, got: usize },
}

/// Alephium network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Devnet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
        })
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            other => Err(format!("unknown network {:?} (expected mainnet, testnet or devnet)", other)),
        }
    }
}

/// Public explorer backend for each network
pub fn default_explorer_url(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "https://backend.mainnet.alephium.org",
        Network::Testnet => "https://backend.testnet.alephium.org",
        Network::Devnet => "http://127.0.0.1:9090",
    }
}

/// Blocking client for the explorer backend
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl ExplorerClient {
    /// Create a client for `base_url` (e.g. "https://backend.mainnet.alephium.org")
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(Error::InvalidUrl(base_url.to_string()));
        }
        if base_url.starts_with("http://") {
            log::warn!("Connecting to explorer without TLS - queried addresses are visible on the wire");
        }

        let http = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /addresses/used`: one flag per address, in request order
    pub fn check_addresses_used(&self, addresses: &[Address]) -> Result<Vec<bool>, Error> {
        let body: Vec<String> = addresses.iter().map(Address::to_string).collect();
        let url = format!("{}/addresses/used", self.base_url);
        log::debug!("querying {} addresses at {}", body.len(), url);

        let response = self.http.post(&url).json(&body).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        let used: Vec<bool> = response.json()?;
        if used.len() != addresses.len() {
            return Err(Error::LengthMismatch {
                expected: addresses.len(),
                got: used.len(),
            });
        }
        Ok(used)
    }
}

impl AddressOracle for ExplorerClient {
    fn check_addresses_used(&self, addresses: &[Address]) -> Result<Vec<bool>, OracleError> {
        ExplorerClient::check_addresses_used(self, addresses).map_err(|e| match e {
            Error::LengthMismatch { expected, got } => OracleError::LengthMismatch { expected, got },
            other => OracleError::Request(other.to_string()),
        })
    }
}
