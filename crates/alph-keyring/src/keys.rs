//! Hierarchical key derivation
//!
//! Keys live on the BIP-44 path `m/44'/1234'/0'/0/<index>`. The hardened
//! prefix is derived once per session into an [`AccountKey`]; every address is
//! then one non-hardened step away.

use crate::address::{Address, AddressError, AddressIndex, Group};
use crate::memory::SecretBuffer;
use crate::mnemonic::Seed;
use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv};
use bitcoin::secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use bitcoin::Network;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Full derivation path of address `<index>`
pub const DERIVATION_PATH: &str = "m/44'/1234'/0'/0/<index>";

/// Path of the account-level key shared by all addresses
pub const ACCOUNT_PATH: &str = "m/44'/1234'/0'/0";

/// Derivations tried by [`derive_address_in_group`] before giving up.
/// With four uniformly distributed groups, missing this many times in a row
/// has probability 0.75^256.
pub const MAX_GROUP_SEARCH: u32 = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeriveError {
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("Derivation failed: {0}")]
    DerivationFailed(String),
    #[error("No address in group {group} within {attempts} derivations from index {start}")]
    DerivationExhausted {
        group: Group,
        start: AddressIndex,
        attempts: u32,
    },
}

impl From<bitcoin::bip32::Error> for DeriveError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        DeriveError::DerivationFailed(e.to_string())
    }
}

// ============================================================================
// AccountKey
// ============================================================================

/// Extended private key at [`ACCOUNT_PATH`].
///
/// Only the serialized form is kept, in a locked buffer. Each derivation
/// decodes a transient copy and erases it before returning.
pub struct AccountKey {
    encoded: SecretBuffer,
    secp: Secp256k1<All>,
}

impl AccountKey {
    pub fn from_seed(seed: &Seed) -> Result<Self, DeriveError> {
        let secp = Secp256k1::new();
        let path: DerivationPath = ACCOUNT_PATH.parse()?;

        let mut master = Xpriv::new_master(Network::Bitcoin, seed.as_bytes())?;
        let account = master.derive_priv(&secp, &path);
        master.private_key.non_secure_erase();
        let mut account = account?;

        let mut raw = account.encode();
        let encoded = SecretBuffer::from_slice(&raw);
        raw.zeroize();
        account.private_key.non_secure_erase();

        Ok(Self { encoded, secp })
    }

    pub(crate) fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }

    fn child_secret(&self, index: AddressIndex) -> Result<SecretKey, DeriveError> {
        let child_number = ChildNumber::from_normal_idx(index.value())?;

        let mut account = Xpriv::decode(self.encoded.as_slice())?;
        let child = account.derive_priv(&self.secp, &[child_number]);
        account.private_key.non_secure_erase();

        let mut child = child?;
        let secret = child.private_key;
        child.private_key.non_secure_erase();
        Ok(secret)
    }
}

impl std::fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccountKey(..)")
    }
}

// ============================================================================
// Address records
// ============================================================================

/// A derived address together with its private key.
///
/// Never leaves the crate with the key readable; the key is erased on drop.
pub struct AddressRecord {
    hash: Address,
    index: AddressIndex,
    public_key: PublicKey,
    private_key: SecretKey,
}

impl AddressRecord {
    pub fn hash(&self) -> &Address {
        &self.hash
    }

    pub fn index(&self) -> AddressIndex {
        self.index
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn group(&self) -> Group {
        self.hash.group()
    }

    /// The record without its private key
    pub fn info(&self) -> AddressInfo {
        AddressInfo {
            hash: self.hash,
            index: self.index,
            public_key: self.public_key,
        }
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.private_key
    }

    pub(crate) fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.private_key.secret_bytes())
    }
}

impl Drop for AddressRecord {
    fn drop(&mut self) {
        self.private_key.non_secure_erase();
    }
}

impl std::fmt::Debug for AddressRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressRecord")
            .field("hash", &self.hash)
            .field("index", &self.index)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Public projection of an [`AddressRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddressInfo {
    pub hash: Address,
    pub index: AddressIndex,
    #[serde(with = "public_key_hex")]
    pub public_key: PublicKey,
}

impl AddressInfo {
    pub fn group(&self) -> Group {
        self.hash.group()
    }
}

mod public_key_hex {
    use bitcoin::secp256k1::PublicKey;
    use serde::Serializer;

    pub fn serialize<S>(public_key: &PublicKey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(public_key.serialize()))
    }
}

// ============================================================================
// Derivation
// ============================================================================

/// Derive the address at `index`
pub fn derive_address(account: &AccountKey, index: AddressIndex) -> Result<AddressRecord, DeriveError> {
    let private_key = account.child_secret(index)?;
    let public_key = PublicKey::from_secret_key(&account.secp, &private_key);
    let hash = Address::from_public_key(&public_key.serialize());

    Ok(AddressRecord {
        hash,
        index,
        public_key,
        private_key,
    })
}

/// Derive the first address in `group` at or after `start`, skipping any
/// index in `skip`.
pub fn derive_address_in_group(
    account: &AccountKey,
    group: Group,
    start: AddressIndex,
    skip: &BTreeSet<AddressIndex>,
) -> Result<AddressRecord, DeriveError> {
    let exhausted = || DeriveError::DerivationExhausted {
        group,
        start,
        attempts: MAX_GROUP_SEARCH,
    };

    let mut index = start;
    let mut attempts = 0;
    while attempts < MAX_GROUP_SEARCH {
        if !skip.contains(&index) {
            attempts += 1;
            let record = derive_address(account, index)?;
            if record.group() == group {
                return Ok(record);
            }
        }
        index = index.next().ok_or_else(exhausted)?;
    }

    log::error!(
        "group search exhausted: group {} from index {} after {} derivations",
        group,
        start,
        MAX_GROUP_SEARCH
    );
    Err(exhausted())
}
