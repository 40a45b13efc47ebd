//! Password-based encryption envelope
//!
//! Wraps arbitrary bytes (in practice the mnemonic) for storage at rest.
//!
//! # Versions
//!
//! | version | KDF | salt | wire form |
//! |---------|-----|------|-----------|
//! | 1 | PBKDF2-HMAC-SHA256, 10 000 rounds | 64 random bytes | `{"iv","encrypted","salt","version":1}` |
//! | 2 ("simple") | PBKDF2-HMAC-SHA512, 10 000 rounds | empty | `{"iv","e","v":2}` |
//!
//! Both use AES-256-GCM with the 16-byte tag appended to the ciphertext.
//! New envelopes are always version 1; version 2 is read-only so older
//! wallets can still be opened.
//!
//! A wrong password and a corrupted envelope both surface as
//! [`EnvelopeError::AuthenticationFailed`].

use aes_gcm::aead::consts::{U16, U64};
use aes_gcm::aead::generic_array::typenum::Unsigned;
use aes_gcm::aead::{Aead, KeyInit, Nonce};
use aes_gcm::aes::Aes256;
use aes_gcm::{Aes256Gcm, AesGcm};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use thiserror::Error;
use zeroize::Zeroizing;

/// Version written by [`encrypt`]
pub const VERSION_CURRENT: u8 = 1;

/// Legacy saltless version, decode only
pub const VERSION_SIMPLE: u8 = 2;

pub const SALT_LEN: usize = 64;
pub const IV_LEN: usize = 64;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;
pub const PBKDF2_ITERATIONS: u32 = 10_000;

/// AES-256-GCM with a 64-byte IV
type Aes256Gcm64 = AesGcm<Aes256, U64>;

/// AES-256-GCM with a 16-byte IV
type Aes256Gcm16 = AesGcm<Aes256, U16>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u8),
    #[error("Authentication failed: wrong password or corrupted data")]
    AuthenticationFailed,
    #[error("Invalid envelope format: {0}")]
    InvalidFormat(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
}

// ============================================================================
// Key derivation
// ============================================================================

/// How the password is stretched for a given envelope version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfScheme {
    Pbkdf2Sha256 { iterations: u32 },
    Pbkdf2Sha512 { iterations: u32 },
}

impl KdfScheme {
    pub fn for_version(version: u8) -> Result<Self, EnvelopeError> {
        match version {
            VERSION_CURRENT => Ok(KdfScheme::Pbkdf2Sha256 {
                iterations: PBKDF2_ITERATIONS,
            }),
            VERSION_SIMPLE => Ok(KdfScheme::Pbkdf2Sha512 {
                iterations: PBKDF2_ITERATIONS,
            }),
            other => Err(EnvelopeError::UnsupportedVersion(other)),
        }
    }
}

/// Pluggable password stretching.
///
/// Implementations must be pure: the same inputs give the same key, so an
/// envelope written with one implementation opens with any other.
pub trait KeyDerivation {
    fn derive_key(
        &self,
        password: &[u8],
        salt: &[u8],
        scheme: KdfScheme,
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, EnvelopeError>;
}

/// In-process PBKDF2
#[derive(Debug, Clone, Copy, Default)]
pub struct Pbkdf2;

impl KeyDerivation for Pbkdf2 {
    fn derive_key(
        &self,
        password: &[u8],
        salt: &[u8],
        scheme: KdfScheme,
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, EnvelopeError> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        match scheme {
            KdfScheme::Pbkdf2Sha256 { iterations } => {
                pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key[..])
            }
            KdfScheme::Pbkdf2Sha512 { iterations } => {
                pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut key[..])
            }
        }
        Ok(key)
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// A versioned, password-encrypted payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    version: u8,
    salt: Vec<u8>,
    iv: Vec<u8>,
    /// ciphertext || 16-byte GCM tag
    ciphertext: Vec<u8>,
}

/// JSON shapes on disk. Field names are part of the stored format.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireEnvelope {
    Current {
        iv: String,
        encrypted: String,
        salt: String,
        version: u8,
    },
    Simple {
        iv: String,
        e: String,
        v: u8,
    },
}

impl EncryptedEnvelope {
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serialize to the JSON wire form
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        let wire = if self.version == VERSION_SIMPLE && self.salt.is_empty() {
            WireEnvelope::Simple {
                iv: hex::encode(&self.iv),
                e: hex::encode(&self.ciphertext),
                v: self.version,
            }
        } else {
            WireEnvelope::Current {
                iv: hex::encode(&self.iv),
                encrypted: hex::encode(&self.ciphertext),
                salt: hex::encode(&self.salt),
                version: self.version,
            }
        };
        serde_json::to_string(&wire).map_err(|e| EnvelopeError::InvalidFormat(e.to_string()))
    }

    /// Parse either wire form. The version is checked at decryption time.
    pub fn from_json(json: &str) -> Result<Self, EnvelopeError> {
        let wire: WireEnvelope =
            serde_json::from_str(json).map_err(|e| EnvelopeError::InvalidFormat(e.to_string()))?;

        let (version, salt, iv, ciphertext) = match wire {
            WireEnvelope::Current {
                iv,
                encrypted,
                salt,
                version,
            } => (version, decode_hex("salt", &salt)?, iv, encrypted),
            WireEnvelope::Simple { iv, e, v } => (v, Vec::new(), iv, e),
        };

        let envelope = Self {
            version,
            salt,
            iv: decode_hex("iv", &iv)?,
            ciphertext: decode_hex("ciphertext", &ciphertext)?,
        };

        if envelope.iv.is_empty() {
            return Err(EnvelopeError::InvalidFormat("empty iv".into()));
        }
        if envelope.ciphertext.len() < TAG_LEN {
            return Err(EnvelopeError::InvalidFormat(format!(
                "ciphertext shorter than the {TAG_LEN}-byte tag"
            )));
        }
        Ok(envelope)
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, EnvelopeError> {
    hex::decode(value).map_err(|e| EnvelopeError::InvalidFormat(format!("{field}: {e}")))
}

// ============================================================================
// Encrypt / decrypt
// ============================================================================

/// Encrypt `plaintext` under `password` as a version 1 envelope
pub fn encrypt(password: &str, plaintext: &[u8]) -> Result<EncryptedEnvelope, EnvelopeError> {
    encrypt_with(&Pbkdf2, password, plaintext)
}

/// [`encrypt`] with a caller-supplied KDF
pub fn encrypt_with<K: KeyDerivation + ?Sized>(
    kdf: &K,
    password: &str,
    plaintext: &[u8],
) -> Result<EncryptedEnvelope, EnvelopeError> {
    let (salt, iv) = fresh_salt_and_iv();
    let scheme = KdfScheme::for_version(VERSION_CURRENT)?;
    let key = kdf.derive_key(password.as_bytes(), &salt, scheme)?;
    seal(&key, salt, iv, plaintext)
}

/// Decrypt a version 1 or legacy version 2 envelope
pub fn decrypt(
    password: &str,
    envelope: &EncryptedEnvelope,
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    decrypt_with(&Pbkdf2, password, envelope)
}

/// [`decrypt`] with a caller-supplied KDF
pub fn decrypt_with<K: KeyDerivation + ?Sized>(
    kdf: &K,
    password: &str,
    envelope: &EncryptedEnvelope,
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    let scheme = KdfScheme::for_version(envelope.version)?;
    let key = kdf.derive_key(password.as_bytes(), &envelope.salt, scheme)?;
    open(&key, &envelope.iv, &envelope.ciphertext)
}

/// [`encrypt`] with the KDF moved onto tokio's blocking pool
pub async fn encrypt_async(
    password: &str,
    plaintext: &[u8],
) -> Result<EncryptedEnvelope, EnvelopeError> {
    encrypt_async_with(Pbkdf2, password, plaintext).await
}

pub async fn encrypt_async_with<K>(
    kdf: K,
    password: &str,
    plaintext: &[u8],
) -> Result<EncryptedEnvelope, EnvelopeError>
where
    K: KeyDerivation + Send + 'static,
{
    let (salt, iv) = fresh_salt_and_iv();
    let scheme = KdfScheme::for_version(VERSION_CURRENT)?;
    let key = derive_key_blocking(kdf, password, salt.clone(), scheme).await?;
    seal(&key, salt, iv, plaintext)
}

/// [`decrypt`] with the KDF moved onto tokio's blocking pool
pub async fn decrypt_async(
    password: &str,
    envelope: &EncryptedEnvelope,
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    decrypt_async_with(Pbkdf2, password, envelope).await
}

pub async fn decrypt_async_with<K>(
    kdf: K,
    password: &str,
    envelope: &EncryptedEnvelope,
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError>
where
    K: KeyDerivation + Send + 'static,
{
    let scheme = KdfScheme::for_version(envelope.version)?;
    let key = derive_key_blocking(kdf, password, envelope.salt.clone(), scheme).await?;
    open(&key, &envelope.iv, &envelope.ciphertext)
}

async fn derive_key_blocking<K>(
    kdf: K,
    password: &str,
    salt: Vec<u8>,
    scheme: KdfScheme,
) -> Result<Zeroizing<[u8; KEY_LEN]>, EnvelopeError>
where
    K: KeyDerivation + Send + 'static,
{
    let password = Zeroizing::new(password.as_bytes().to_vec());
    tokio::task::spawn_blocking(move || kdf.derive_key(&password, &salt, scheme))
        .await
        .map_err(|e| EnvelopeError::KeyDerivationFailed(e.to_string()))?
}

fn fresh_salt_and_iv() -> (Vec<u8>, Vec<u8>) {
    let mut salt = vec![0u8; SALT_LEN];
    let mut iv = vec![0u8; IV_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);
    (salt, iv)
}

fn seal(
    key: &[u8; KEY_LEN],
    salt: Vec<u8>,
    iv: Vec<u8>,
    plaintext: &[u8],
) -> Result<EncryptedEnvelope, EnvelopeError> {
    let cipher = Aes256Gcm64::new_from_slice(key)
        .map_err(|e| EnvelopeError::EncryptionFailed(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::<Aes256Gcm64>::from_slice(&iv), plaintext)
        .map_err(|e| EnvelopeError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedEnvelope {
        version: VERSION_CURRENT,
        salt,
        iv,
        ciphertext,
    })
}

fn open(key: &[u8; KEY_LEN], iv: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    match iv.len() {
        12 => open_with::<Aes256Gcm>(key, iv, ciphertext),
        16 => open_with::<Aes256Gcm16>(key, iv, ciphertext),
        IV_LEN => open_with::<Aes256Gcm64>(key, iv, ciphertext),
        n => Err(EnvelopeError::InvalidFormat(format!("unsupported iv length {n}"))),
    }
}

fn open_with<C: Aead + KeyInit>(
    key: &[u8; KEY_LEN],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    if iv.len() != <C::NonceSize as Unsigned>::USIZE {
        return Err(EnvelopeError::InvalidFormat("iv length mismatch".into()));
    }
    let cipher =
        C::new_from_slice(key).map_err(|e| EnvelopeError::InvalidFormat(e.to_string()))?;
    cipher
        .decrypt(Nonce::<C>::from_slice(iv), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| EnvelopeError::AuthenticationFailed)
}
