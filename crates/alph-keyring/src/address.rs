//! Alephium address types
//!
//! A P2PKH address is `base58([0x00] || blake2b-256(compressed public key))`.
//! Every address belongs to exactly one of [`TOTAL_NUMBER_OF_GROUPS`] groups,
//! computed from its hash and never stored.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of address groups (shards) on the network
pub const TOTAL_NUMBER_OF_GROUPS: u8 = 4;

/// Address type prefix for public-key-hash addresses
pub const ADDRESS_TYPE_P2PKH: u8 = 0x00;

/// Hash length of an address body
pub const ADDRESS_HASH_LEN: usize = 32;

type Blake2b256 = Blake2b<U32>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid address index: {0}")]
    InvalidIndex(String),
    #[error("Invalid group {0}, expected below {max}", max = TOTAL_NUMBER_OF_GROUPS)]
    InvalidGroup(u8),
}

/// blake2b with a 256-bit digest
pub fn blake2b256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

// ============================================================================
// Group
// ============================================================================

/// One of the network's address groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Group(u8);

impl Group {
    pub fn new(group: u8) -> Result<Self, AddressError> {
        if group >= TOTAL_NUMBER_OF_GROUPS {
            return Err(AddressError::InvalidGroup(group));
        }
        Ok(Group(group))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// All groups in ascending order
    pub fn all() -> impl Iterator<Item = Group> {
        (0..TOTAL_NUMBER_OF_GROUPS).map(Group)
    }
}

impl TryFrom<u8> for Group {
    type Error = AddressError;

    fn try_from(group: u8) -> Result<Self, Self::Error> {
        Group::new(group)
    }
}

impl From<Group> for u8 {
    fn from(group: Group) -> u8 {
        group.0
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Group {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u8 = s
            .parse()
            .map_err(|_| AddressError::InvalidAddress(format!("not a group number: {s:?}")))?;
        Group::new(n)
    }
}

/// Group of an address hash: last byte modulo the number of groups
pub fn group_of_hash(hash: &[u8; ADDRESS_HASH_LEN]) -> Group {
    Group(hash[ADDRESS_HASH_LEN - 1] % TOTAL_NUMBER_OF_GROUPS)
}

/// Group of an address
pub fn group_of(address: &Address) -> Group {
    group_of_hash(address.hash())
}

// ============================================================================
// AddressIndex
// ============================================================================

/// Non-hardened child index along `m/44'/1234'/0'/0/<index>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct AddressIndex(u32);

impl AddressIndex {
    /// Largest non-hardened index (2^31 - 1)
    pub const MAX: AddressIndex = AddressIndex((1 << 31) - 1);

    pub fn new(index: u32) -> Result<Self, AddressError> {
        if index > Self::MAX.0 {
            return Err(AddressError::InvalidIndex(format!(
                "{index} is outside the non-hardened range"
            )));
        }
        Ok(AddressIndex(index))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// The following index, or `None` past [`AddressIndex::MAX`]
    pub fn next(self) -> Option<AddressIndex> {
        if self.0 >= Self::MAX.0 {
            None
        } else {
            Some(AddressIndex(self.0 + 1))
        }
    }
}

impl TryFrom<u32> for AddressIndex {
    type Error = AddressError;

    fn try_from(index: u32) -> Result<Self, Self::Error> {
        AddressIndex::new(index)
    }
}

impl TryFrom<i64> for AddressIndex {
    type Error = AddressError;

    fn try_from(index: i64) -> Result<Self, Self::Error> {
        let index = u32::try_from(index)
            .map_err(|_| AddressError::InvalidIndex(format!("{index} is not a valid index")))?;
        AddressIndex::new(index)
    }
}

impl From<AddressIndex> for u32 {
    fn from(index: AddressIndex) -> u32 {
        index.0
    }
}

impl FromStr for AddressIndex {
    type Err = AddressError;

    /// Only plain decimal digits are accepted. Signs, fractions and exponents
    /// are caller mistakes, not addresses.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AddressError::InvalidIndex(format!(
                "{s:?} is not a non-negative integer"
            )));
        }
        let index: u32 = s
            .parse()
            .map_err(|_| AddressError::InvalidIndex(format!("{s:?} overflows")))?;
        AddressIndex::new(index)
    }
}

impl fmt::Display for AddressIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Address
// ============================================================================

/// A P2PKH address, stored as its 32-byte hash
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    hash: [u8; ADDRESS_HASH_LEN],
}

impl Address {
    pub fn from_hash(hash: [u8; ADDRESS_HASH_LEN]) -> Self {
        Self { hash }
    }

    /// Address of a 33-byte compressed secp256k1 public key
    pub fn from_public_key(public_key: &[u8; 33]) -> Self {
        Self::from_hash(blake2b256(public_key))
    }

    pub fn hash(&self) -> &[u8; ADDRESS_HASH_LEN] {
        &self.hash
    }

    pub fn group(&self) -> Group {
        group_of(self)
    }

    /// `[type || hash]`, the bytes that get base58-encoded
    pub fn to_bytes(&self) -> [u8; ADDRESS_HASH_LEN + 1] {
        let mut bytes = [0u8; ADDRESS_HASH_LEN + 1];
        bytes[0] = ADDRESS_TYPE_P2PKH;
        bytes[1..].copy_from_slice(&self.hash);
        bytes
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.to_bytes()).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AddressError::InvalidAddress(format!("{s:?}: {e}")))?;

        if bytes.len() != ADDRESS_HASH_LEN + 1 {
            return Err(AddressError::InvalidAddress(format!(
                "{s:?}: expected {} bytes, got {}",
                ADDRESS_HASH_LEN + 1,
                bytes.len()
            )));
        }
        if bytes[0] != ADDRESS_TYPE_P2PKH {
            return Err(AddressError::InvalidAddress(format!(
                "{s:?}: unsupported address type {:#04x}",
                bytes[0]
            )));
        }

        let mut hash = [0u8; ADDRESS_HASH_LEN];
        hash.copy_from_slice(&bytes[1..]);
        Ok(Self { hash })
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
