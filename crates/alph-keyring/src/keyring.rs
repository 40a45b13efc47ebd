//! Stateful keyring session
//!
//! A [`Keyring`] is either empty or holds one account key plus a cache of
//! derived addresses. Private keys only ever leave through
//! [`Keyring::export_private_key_of_address`], wrapped in [`Zeroizing`].
//!
//! There is no internal locking: callers that share a keyring across threads
//! wrap it in a mutex.

use crate::address::{Address, AddressIndex, Group};
use crate::discovery::{
    discover_active_addresses, AddressOracle, DiscoveryError, DiscoveryOptions, DEFAULT_MIN_GAP,
};
use crate::envelope::{self, EncryptedEnvelope, EnvelopeError};
use crate::keys::{derive_address, derive_address_in_group, AccountKey, AddressInfo, AddressRecord, DeriveError};
use crate::mnemonic::{generate_mnemonic, mnemonic_to_seed, MnemonicError, WordCount};
use crate::signing::{message_digest, parse_tx_id, sign_digest, SignError};
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::PublicKey;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyringError {
    #[error("Keyring is already initialized")]
    AlreadyInitialized,

    #[error("Keyring is not initialized")]
    NotInitialized,

    #[error("Unknown address: {0}")]
    UnknownAddress(Address),

    #[error(transparent)]
    InvalidMnemonic(#[from] MnemonicError),

    #[error(transparent)]
    Derive(#[from] DeriveError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Sign(#[from] SignError),
}

/// What [`Keyring::generate_and_cache_address`] should derive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateAddressOptions {
    /// Only accept an address in this group
    pub group: Option<Group>,
    /// Index to derive at, or to start the group search from (default 0)
    pub address_index: Option<AddressIndex>,
    /// Indexes the group search must pass over
    pub skip_address_indexes: Vec<AddressIndex>,
}

impl GenerateAddressOptions {
    pub fn at_index(index: AddressIndex) -> Self {
        Self {
            address_index: Some(index),
            ..Default::default()
        }
    }

    pub fn in_group(group: Group) -> Self {
        Self {
            group: Some(group),
            ..Default::default()
        }
    }
}

/// Keyring session: `Empty` until initialized, `Empty` again after [`clear`](Keyring::clear)
#[derive(Default)]
pub struct Keyring {
    account: Option<AccountKey>,
    addresses: HashMap<Address, AddressRecord>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.account.is_some()
    }

    /// Load the account key from a mnemonic and optional BIP-39 passphrase
    pub fn init_from_mnemonic(&mut self, mnemonic: &str, passphrase: &str) -> Result<(), KeyringError> {
        if self.is_initialized() {
            return Err(KeyringError::AlreadyInitialized);
        }

        let seed = mnemonic_to_seed(mnemonic, passphrase)?;
        let account = AccountKey::from_seed(&seed)?;
        drop(seed);

        self.account = Some(account);
        log::info!("keyring initialized");
        Ok(())
    }

    /// Decrypt a stored mnemonic and initialize from it
    pub fn init_from_encrypted_mnemonic(
        &mut self,
        envelope: &EncryptedEnvelope,
        password: &str,
        passphrase: &str,
    ) -> Result<(), KeyringError> {
        if self.is_initialized() {
            return Err(KeyringError::AlreadyInitialized);
        }

        let plaintext = envelope::decrypt(password, envelope)?;
        let mnemonic = std::str::from_utf8(&plaintext)
            .map_err(|_| MnemonicError::InvalidMnemonic("decrypted mnemonic is not UTF-8".into()))?;
        self.init_from_mnemonic(mnemonic, passphrase)
    }

    /// Create a new wallet: generate a mnemonic, initialize from it, and
    /// return it encrypted under `password` along with the phrase itself
    /// (for the user to write down).
    pub fn generate_random(
        &mut self,
        word_count: WordCount,
        password: &str,
        passphrase: &str,
    ) -> Result<(EncryptedEnvelope, Zeroizing<String>), KeyringError> {
        if self.is_initialized() {
            return Err(KeyringError::AlreadyInitialized);
        }

        let mnemonic = generate_mnemonic(word_count)?;
        let envelope = envelope::encrypt(password, mnemonic.as_bytes())?;
        self.init_from_mnemonic(&mnemonic, passphrase)?;
        Ok((envelope, mnemonic))
    }

    /// Drop the account key and every cached address
    pub fn clear(&mut self) {
        let had_account = self.account.take().is_some();
        let cached = self.addresses.len();
        self.addresses.clear();
        if had_account {
            log::info!("keyring cleared ({} cached addresses dropped)", cached);
        }
    }

    fn account(&self) -> Result<&AccountKey, KeyringError> {
        self.account.as_ref().ok_or(KeyringError::NotInitialized)
    }

    /// Derive an address (or reuse the cached one) and keep it in the cache
    pub fn generate_and_cache_address(
        &mut self,
        options: &GenerateAddressOptions,
    ) -> Result<AddressInfo, KeyringError> {
        let account = self.account()?;
        let start = options.address_index.unwrap_or_default();

        let record = match options.group {
            None => {
                if let Some(cached) = self.addresses.values().find(|r| r.index() == start) {
                    return Ok(cached.info());
                }
                derive_address(account, start)?
            }
            Some(group) => {
                let skip: BTreeSet<AddressIndex> = options.skip_address_indexes.iter().copied().collect();
                derive_address_in_group(account, group, start, &skip)?
            }
        };

        let info = record.info();
        self.addresses.entry(info.hash).or_insert(record);
        log::debug!("cached address {} at index {}", info.hash, info.index);
        Ok(info)
    }

    /// Raw private key of a cached address. Wiped when the returned value drops.
    pub fn export_private_key_of_address(&self, address: &Address) -> Result<Zeroizing<[u8; 32]>, KeyringError> {
        Ok(self.record(address)?.secret_bytes())
    }

    /// Sign a 32-byte hex transaction id with a cached address's key
    pub fn sign_transaction(&self, tx_id: &str, address: &Address) -> Result<Signature, KeyringError> {
        let digest = parse_tx_id(tx_id)?;
        self.sign(digest, address)
    }

    /// Sign an arbitrary message; see [`message_digest`] for what is signed
    pub fn sign_message(&self, message: impl AsRef<[u8]>, address: &Address) -> Result<Signature, KeyringError> {
        self.sign(message_digest(message.as_ref()), address)
    }

    fn sign(&self, digest: [u8; 32], address: &Address) -> Result<Signature, KeyringError> {
        let account = self.account()?;
        let record = self.record(address)?;
        Ok(sign_digest(account.secp(), record.secret_key(), digest))
    }

    fn record(&self, address: &Address) -> Result<&AddressRecord, KeyringError> {
        self.account()?;
        self.addresses
            .get(address)
            .ok_or(KeyringError::UnknownAddress(*address))
    }

    pub fn public_key_of(&self, address: &Address) -> Result<PublicKey, KeyringError> {
        Ok(*self.record(address)?.public_key())
    }

    /// Find every used address and add it to the cache.
    ///
    /// The cache is only touched once discovery has fully succeeded.
    pub fn discover_and_cache_active_addresses<O: AddressOracle + ?Sized>(
        &mut self,
        oracle: &O,
        indexes_to_skip: &[AddressIndex],
        min_gap: Option<usize>,
    ) -> Result<Vec<AddressInfo>, KeyringError> {
        let account = self.account()?;
        let options = DiscoveryOptions {
            min_gap: min_gap.unwrap_or(DEFAULT_MIN_GAP),
            skip_indexes: indexes_to_skip.to_vec(),
        };

        let found = discover_active_addresses(account, oracle, &options)?;

        let infos: Vec<AddressInfo> = found.iter().map(AddressRecord::info).collect();
        for record in found {
            self.addresses.entry(*record.hash()).or_insert(record);
        }
        Ok(infos)
    }

    /// Public view of the cache, ordered by index
    pub fn cached_addresses(&self) -> Vec<AddressInfo> {
        let mut infos: Vec<AddressInfo> = self.addresses.values().map(AddressRecord::info).collect();
        infos.sort_by_key(|info| info.index);
        infos
    }
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring")
            .field("initialized", &self.is_initialized())
            .field("cached_addresses", &self.addresses.len())
            .finish()
    }
}
