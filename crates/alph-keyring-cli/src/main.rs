//! alph-keyring: headless Alephium wallet keyring
//!
//! Creates and restores encrypted wallets, derives group-specific addresses
//! and scans an explorer backend for used addresses.
//!
//! # Usage
//!
//! ```bash
//! alph-keyring new --words 24
//! alph-keyring restore < mnemonic.txt
//! alph-keyring address --group 2
//! alph-keyring discover --min-gap 20
//! ```

mod config;
mod store;

use alph_explorer::ExplorerClient;
use alph_keyring::{
    disable_core_dumps, encrypt, validate_mnemonic, AddressIndex, EncryptedEnvelope, GenerateAddressOptions, Group,
    Keyring, WalletStore, WordCount,
};
use anyhow::{Context, Result};
use config::KeyringConfig;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use store::FileStore;
use zeroize::Zeroizing;

#[derive(Debug)]
enum Command {
    New { words: WordCount },
    Restore,
    Address { group: Option<Group>, index: Option<AddressIndex> },
    Discover { min_gap: Option<usize> },
    Validate,
}

fn main() -> Result<()> {
    // Security hardening: keep seed material out of core dumps
    disable_core_dumps();

    // Parse CLI args (hand-rolled, the surface is small)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("alph-keyring.toml");
    let mut command_name: Option<String> = None;
    let mut words = WordCount::default();
    let mut group = None;
    let mut index = None;
    let mut min_gap = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                config_path = PathBuf::from(value_of(&args, &mut i)?);
            }
            "--words" => {
                let n: usize = value_of(&args, &mut i)?.parse().context("--words expects 12 or 24")?;
                words = WordCount::try_from(n).map_err(|e| anyhow::anyhow!("--words: {}", e))?;
            }
            "--group" => {
                group = Some(value_of(&args, &mut i)?.parse::<Group>().context("--group")?);
            }
            "--index" => {
                index = Some(value_of(&args, &mut i)?.parse::<AddressIndex>().context("--index")?);
            }
            "--min-gap" => {
                min_gap = Some(value_of(&args, &mut i)?.parse::<usize>().context("--min-gap")?);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("alph-keyring {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other if other.starts_with('-') => {
                anyhow::bail!("Unknown argument: {}", other);
            }
            other => {
                if let Some(ref existing) = command_name {
                    anyhow::bail!("Unexpected argument {:?} after command {:?}", other, existing);
                }
                command_name = Some(other.to_string());
            }
        }
        i += 1;
    }

    let command = match command_name.as_deref() {
        Some("new") => Command::New { words },
        Some("restore") => Command::Restore,
        Some("address") => Command::Address { group, index },
        Some("discover") => Command::Discover { min_gap },
        Some("validate") => Command::Validate,
        Some(other) => anyhow::bail!("Unknown command: {} (see --help)", other),
        None => {
            print_help();
            return Ok(());
        }
    };

    // Load config
    let mut keyring_config = KeyringConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Apply env overrides
    keyring_config.apply_env_overrides();

    // Validate
    keyring_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    env_logger::Builder::new()
        .parse_filters(&keyring_config.wallet.log_level)
        .init();

    log::debug!("running {:?}", command);
    let wallets = WalletStore::new(FileStore::new(keyring_config.store_path()));

    match command {
        Command::Validate => {
            println!("✅ Configuration is valid.");
            println!("  Wallet:    {}", keyring_config.wallet.wallet_name);
            println!("  Store:     {}", keyring_config.store_path().display());
            println!("  Network:   {}", keyring_config.network()?);
            println!("  Explorer:  {}", keyring_config.explorer_url()?);
            println!("  Min gap:   {}", keyring_config.discovery.min_gap);
            Ok(())
        }
        Command::New { words } => cmd_new(&keyring_config, &wallets, words),
        Command::Restore => cmd_restore(&keyring_config, &wallets),
        Command::Address { group, index } => cmd_address(&keyring_config, &wallets, group, index),
        Command::Discover { min_gap } => cmd_discover(&keyring_config, &wallets, min_gap),
    }
}

fn value_of<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{} requires a value", flag))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_new(config: &KeyringConfig, wallets: &WalletStore<FileStore>, words: WordCount) -> Result<()> {
    let name = &config.wallet.wallet_name;
    anyhow::ensure!(!wallets.exists(name)?, "wallet {:?} already exists", name);

    let password = read_password(true)?;
    let mut keyring = Keyring::new();
    let (envelope, mnemonic) = keyring.generate_random(words, &password, "")?;
    wallets.save(name, &envelope)?;

    let first = keyring.generate_and_cache_address(&GenerateAddressOptions::default())?;

    println!("Wallet {:?} created.", name);
    println!();
    println!("Write down your recovery phrase. It will not be shown again:");
    println!();
    println!("  {}", mnemonic.as_str());
    println!();
    println!("First address: {} (group {})", first.hash, first.group());
    Ok(())
}

fn cmd_restore(config: &KeyringConfig, wallets: &WalletStore<FileStore>) -> Result<()> {
    let name = &config.wallet.wallet_name;
    anyhow::ensure!(!wallets.exists(name)?, "wallet {:?} already exists", name);

    eprintln!("Enter recovery phrase:");
    let mnemonic = read_line()?;
    anyhow::ensure!(validate_mnemonic(&mnemonic), "invalid recovery phrase");
    let mnemonic = alph_keyring::mnemonic::normalize_mnemonic(&mnemonic)?;

    let password = read_password(true)?;
    let envelope = encrypt(&password, mnemonic.as_bytes())?;

    let mut keyring = Keyring::new();
    keyring.init_from_mnemonic(&mnemonic, "")?;
    wallets.save(name, &envelope)?;

    let first = keyring.generate_and_cache_address(&GenerateAddressOptions::default())?;
    println!("Wallet {:?} restored.", name);
    println!("First address: {} (group {})", first.hash, first.group());
    Ok(())
}

fn cmd_address(
    config: &KeyringConfig,
    wallets: &WalletStore<FileStore>,
    group: Option<Group>,
    index: Option<AddressIndex>,
) -> Result<()> {
    let mut keyring = unlock(config, wallets)?;
    let info = keyring.generate_and_cache_address(&GenerateAddressOptions {
        group,
        address_index: index,
        skip_address_indexes: Vec::new(),
    })?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn cmd_discover(config: &KeyringConfig, wallets: &WalletStore<FileStore>, min_gap: Option<usize>) -> Result<()> {
    let mut keyring = unlock(config, wallets)?;
    let explorer_url = config.explorer_url()?;
    let client = ExplorerClient::new(&explorer_url).context("Failed to create explorer client")?;
    let min_gap = min_gap.unwrap_or(config.discovery.min_gap);

    log::info!("discovering addresses via {} (min gap {})", explorer_url, min_gap);
    let found = keyring
        .discover_and_cache_active_addresses(&client, &config.discovery.skip_indexes, Some(min_gap))
        .context("Address discovery failed")?;

    if found.is_empty() {
        eprintln!("No used addresses found.");
    }
    println!("{}", serde_json::to_string_pretty(&found)?);
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn unlock(config: &KeyringConfig, wallets: &WalletStore<FileStore>) -> Result<Keyring> {
    let name = &config.wallet.wallet_name;
    let envelope: EncryptedEnvelope = wallets
        .load(name)
        .with_context(|| format!("Failed to load wallet {:?}", name))?;

    let password = read_password(false)?;
    let mut keyring = Keyring::new();
    keyring
        .init_from_encrypted_mnemonic(&envelope, &password, "")
        .context("Failed to unlock wallet")?;
    Ok(keyring)
}

/// Password from `ALPH_KEYRING_PASSWORD`, else one line of stdin
fn read_password(confirm: bool) -> Result<Zeroizing<String>> {
    if let Ok(password) = std::env::var("ALPH_KEYRING_PASSWORD") {
        return Ok(Zeroizing::new(password));
    }

    eprint!("Password: ");
    std::io::stderr().flush()?;
    let password = read_line()?;
    if confirm {
        eprint!("Repeat password: ");
        std::io::stderr().flush()?;
        let again = read_line()?;
        anyhow::ensure!(*password == *again, "passwords do not match");
    }
    Ok(password)
}

fn read_line() -> Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    let trimmed = Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string());
    Ok(trimmed)
}

fn print_help() {
    println!(
        r#"alph-keyring: headless Alephium wallet keyring

USAGE:
    alph-keyring [OPTIONS] <COMMAND>

COMMANDS:
    new                   Create a wallet and print its recovery phrase once
    restore               Restore a wallet from a recovery phrase on stdin
    address               Derive and print an address
    discover              Find used addresses via the explorer backend
    validate              Validate configuration and exit

OPTIONS:
    -c, --config <PATH>   Config file path (default: ./alph-keyring.toml)
    --words <12|24>       Phrase length for `new` (default: 24)
    --group <0-3>         Group for `address`
    --index <N>           Index for `address` (start of the search with --group)
    --min-gap <N>         Gap limit for `discover`
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    ALPH_KEYRING_DATA_DIR      Data directory path
    ALPH_KEYRING_WALLET        Wallet name
    ALPH_KEYRING_LOG_LEVEL     Log level (error/warn/info/debug/trace)
    ALPH_KEYRING_NETWORK       Network (mainnet/testnet/devnet)
    ALPH_KEYRING_EXPLORER_URL  Explorer backend URL
    ALPH_KEYRING_MIN_GAP       Discovery gap limit
    ALPH_KEYRING_PASSWORD      Wallet password (skips the prompt)

EXAMPLES:
    # New 12-word wallet
    alph-keyring new --words 12

    # First address in group 3
    alph-keyring address --group 3

    # Scan testnet with a wider gap
    ALPH_KEYRING_NETWORK=testnet alph-keyring discover --min-gap 20
"#
    );
}
