//! Alephium Keyring
//!
//! Seed handling, group-aware key derivation and active-address discovery
//! for Alephium wallets.
//!
//! # Key Derivation
//!
//! From a single BIP-39 seed, address `<index>` uses `m/44'/1234'/0'/0/<index>`.
//! Addresses are `base58(0x00 || blake2b-256(compressed pubkey))`, and belong
//! to group `last hash byte mod 4`.
//!
//! # Encrypted Storage
//!
//! Mnemonics are encrypted at rest using PBKDF2-HMAC-SHA256 + AES-256-GCM in a
//! versioned JSON envelope.

pub mod address;
pub mod discovery;
pub mod envelope;
pub mod keyring;
pub mod keys;
pub mod memory;
pub mod mnemonic;
pub mod signing;
pub mod store;

pub use address::{group_of, Address, AddressError, AddressIndex, Group, TOTAL_NUMBER_OF_GROUPS};
pub use discovery::{
    discover_active_addresses, AddressOracle, DiscoveryError, DiscoveryOptions, OracleError, DEFAULT_MIN_GAP,
    PAGE_SIZE,
};
pub use envelope::{decrypt, encrypt, EncryptedEnvelope, EnvelopeError, KeyDerivation};
pub use keyring::{GenerateAddressOptions, Keyring, KeyringError};
pub use keys::{derive_address, derive_address_in_group, AccountKey, AddressInfo, AddressRecord, DeriveError};
pub use memory::disable_core_dumps;
pub use mnemonic::{generate_mnemonic, mnemonic_to_seed, validate_mnemonic, MnemonicError, Seed, WordCount};
pub use signing::{message_digest, verify_signature, SignError};
pub use store::{MemoryStore, SecretStore, StoreError, WalletStore};

/// secp256k1 types used in signatures and public keys
pub use bitcoin::secp256k1;
