//! BIP-39 mnemonic handling
//!
//! Generates, validates and stretches mnemonic phrases into 64-byte seeds.
//! Phrases are returned as [`Zeroizing`] strings and nothing here keeps a
//! copy once a call returns.

use crate::memory::SecretBuffer;
use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MnemonicError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
}

/// Supported phrase lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WordCount {
    /// 128 bits of entropy
    Twelve,
    /// 256 bits of entropy
    #[default]
    TwentyFour,
}

impl WordCount {
    pub fn entropy_bytes(self) -> usize {
        match self {
            WordCount::Twelve => 16,
            WordCount::TwentyFour => 32,
        }
    }

    pub fn words(self) -> usize {
        match self {
            WordCount::Twelve => 12,
            WordCount::TwentyFour => 24,
        }
    }
}

impl TryFrom<usize> for WordCount {
    type Error = MnemonicError;

    fn try_from(words: usize) -> Result<Self, Self::Error> {
        match words {
            12 => Ok(WordCount::Twelve),
            24 => Ok(WordCount::TwentyFour),
            other => Err(MnemonicError::InvalidMnemonic(format!(
                "unsupported word count {other}, expected 12 or 24"
            ))),
        }
    }
}

/// A 64-byte BIP-39 seed held in a locked buffer that is wiped on drop.
pub struct Seed(SecretBuffer);

impl Seed {
    pub const LEN: usize = 64;

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    fn from_array(mut bytes: [u8; Self::LEN]) -> Self {
        let seed = Seed(SecretBuffer::from_slice(&bytes));
        bytes.zeroize();
        seed
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed(..)")
    }
}

/// Generate a fresh English mnemonic from OS randomness
pub fn generate_mnemonic(count: WordCount) -> Result<Zeroizing<String>, MnemonicError> {
    let mut entropy = Zeroizing::new(vec![0u8; count.entropy_bytes()]);
    OsRng.fill_bytes(&mut entropy);

    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| MnemonicError::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Check the phrase against the English wordlist and its checksum
pub fn validate_mnemonic(phrase: &str) -> bool {
    parse(phrase).is_ok()
}

/// Stretch a mnemonic and optional passphrase into a seed (PBKDF2-HMAC-SHA512, 2048 rounds)
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<Seed, MnemonicError> {
    let mnemonic = parse(phrase)?;
    Ok(Seed::from_array(mnemonic.to_seed(passphrase)))
}

/// Canonical form of a valid phrase: lowercase words joined by single spaces
pub fn normalize_mnemonic(phrase: &str) -> Result<Zeroizing<String>, MnemonicError> {
    let mnemonic = parse(phrase)?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

fn parse(phrase: &str) -> Result<Mnemonic, MnemonicError> {
    let lowered = Zeroizing::new(phrase.trim().to_lowercase());
    Mnemonic::parse_in(Language::English, lowered.as_str())
        .map_err(|e| MnemonicError::InvalidMnemonic(e.to_string()))
}
