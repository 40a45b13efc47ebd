//! Discovery through the real explorer client.
//!
//! Offline tests point the client at a closed local port; the live test
//! needs network access and is ignored by default.

use alph_explorer::{default_explorer_url, ExplorerClient, Network};
use alph_keyring::{DiscoveryError, GenerateAddressOptions, Keyring, KeyringError, OracleError};
use std::net::TcpListener;
use std::time::Duration;

const VAULT: &str = "vault alarm sad mass witness property virus style good flower rice alpha viable evidence run glare pretty scout evil judge enroll refuse another lava";

/// A local URL nothing is listening on
fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[test]
fn test_unreachable_explorer_fails_whole_discovery() {
    let client = ExplorerClient::with_timeout(&closed_port_url(), Duration::from_secs(2)).unwrap();

    let mut keyring = Keyring::new();
    keyring.init_from_mnemonic(VAULT, "").unwrap();
    keyring
        .generate_and_cache_address(&GenerateAddressOptions::default())
        .unwrap();
    let before = keyring.cached_addresses();

    let result = keyring.discover_and_cache_active_addresses(&client, &[], None);
    assert!(matches!(
        result,
        Err(KeyringError::Discovery(DiscoveryError::OracleFailure(OracleError::Request(_))))
    ));
    assert_eq!(keyring.cached_addresses(), before);
}

// Integration tests require network access
// Run with: cargo test --package alph-keyring-e2e -- --ignored

#[test]
#[ignore = "requires network access"]
fn test_testnet_discovery_completes() {
    let client = ExplorerClient::new(default_explorer_url(Network::Testnet)).unwrap();

    let mut keyring = Keyring::new();
    keyring.init_from_mnemonic(VAULT, "").unwrap();
    let found = keyring
        .discover_and_cache_active_addresses(&client, &[], Some(5))
        .unwrap();

    for info in &found {
        assert!(keyring.export_private_key_of_address(&info.hash).is_ok());
    }
    println!("found {} used addresses on testnet", found.len());
}
