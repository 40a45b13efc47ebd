//! Security-specific tests for audit preparation.
//!
//! These tests verify:
//! 1. Envelope tampering and wrong passwords never yield plaintext
//! 2. Keyring state misuse is rejected
//! 3. Secrets are zeroed after use (flow-level verification)
//! 4. Malformed inputs don't panic

use alph_keyring::envelope::{decrypt, encrypt, EncryptedEnvelope, EnvelopeError};
use alph_keyring::{
    validate_mnemonic, Address, AddressIndex, GenerateAddressOptions, Group, Keyring, KeyringError, WordCount,
};
use serde_json::Value;
use zeroize::{Zeroize, Zeroizing};

const VAULT: &str = "vault alarm sad mass witness property virus style good flower rice alpha viable evidence run glare pretty scout evil judge enroll refuse another lava";

fn tamper_hex_field(json: &str, field: &str, position: usize) -> String {
    let mut value: Value = serde_json::from_str(json).unwrap();
    let hex_str = value[field].as_str().unwrap().to_string();
    let mut bytes = hex::decode(&hex_str).unwrap();
    let at = position % bytes.len();
    bytes[at] ^= 0x01;
    value[field] = Value::String(hex::encode(bytes));
    value.to_string()
}

// ============================================================================
// 1. Envelope Security Tests
// ============================================================================

#[test]
fn test_wrong_password_fails_decryption() {
    let envelope = encrypt("correct horse battery staple", VAULT.as_bytes()).unwrap();
    let result = decrypt("wrong horse battery staple", &envelope);
    assert_eq!(result.unwrap_err(), EnvelopeError::AuthenticationFailed);
}

#[test]
fn test_empty_password_is_still_a_password() {
    let envelope = encrypt("", b"payload").unwrap();
    assert!(decrypt("notempty", &envelope).is_err());
    assert_eq!(&decrypt("", &envelope).unwrap()[..], b"payload");
}

#[test]
fn test_tampered_fields_fail_authentication() {
    let json = encrypt("pw", VAULT.as_bytes()).unwrap().to_json().unwrap();

    for field in ["encrypted", "iv", "salt"] {
        for position in [0, 7, 31, 63, 1000] {
            let tampered = tamper_hex_field(&json, field, position);
            let envelope = EncryptedEnvelope::from_json(&tampered).unwrap();
            assert_eq!(
                decrypt("pw", &envelope).unwrap_err(),
                EnvelopeError::AuthenticationFailed,
                "{field} byte {position}"
            );
        }
    }
}

#[test]
fn test_truncated_ciphertext_fails() {
    let envelope = encrypt("pw", VAULT.as_bytes()).unwrap();
    let mut value: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
    let full = value["encrypted"].as_str().unwrap().to_string();
    value["encrypted"] = Value::String(full[..full.len() - 2].to_string());

    let truncated = EncryptedEnvelope::from_json(&value.to_string()).unwrap();
    assert_eq!(
        decrypt("pw", &truncated).unwrap_err(),
        EnvelopeError::AuthenticationFailed
    );
}

#[test]
fn test_version_field_is_enforced() {
    let envelope = encrypt("pw", b"payload").unwrap();
    let mut value: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

    value["version"] = Value::from(9);
    let unknown = EncryptedEnvelope::from_json(&value.to_string()).unwrap();
    assert_eq!(
        decrypt("pw", &unknown).unwrap_err(),
        EnvelopeError::UnsupportedVersion(9)
    );

    // relabelling as legacy changes the KDF, so the tag no longer verifies
    value["version"] = Value::from(2);
    let downgraded = EncryptedEnvelope::from_json(&value.to_string()).unwrap();
    assert_eq!(
        decrypt("pw", &downgraded).unwrap_err(),
        EnvelopeError::AuthenticationFailed
    );
}

#[test]
fn test_wrong_password_variants_all_fail() {
    let envelope = encrypt("correct password", b"payload").unwrap();
    let long = "a".repeat(1000);
    let wrong_passwords = [
        "wrong1",
        "",
        long.as_str(),
        "correct passwor",   // Off by one
        "correct password ", // Extra space
        "Correct password",  // Case
    ];

    for wp in &wrong_passwords {
        assert_eq!(
            decrypt(wp, &envelope).unwrap_err(),
            EnvelopeError::AuthenticationFailed,
            "wrong password {:?}",
            wp
        );
    }
}

// ============================================================================
// 2. Keyring State Misuse
// ============================================================================

#[test]
fn test_operations_on_empty_keyring_fail() {
    let mut keyring = Keyring::new();
    let address: Address = "1DrDyTr9RpRsQnDnXo2YRiPzPW4ooHX5LLoqXrqfMrpQH".parse().unwrap();

    assert_eq!(
        keyring.generate_and_cache_address(&GenerateAddressOptions::default()),
        Err(KeyringError::NotInitialized)
    );
    assert_eq!(
        keyring.export_private_key_of_address(&address),
        Err(KeyringError::NotInitialized)
    );
    assert_eq!(
        keyring.sign_transaction(&"00".repeat(32), &address),
        Err(KeyringError::NotInitialized)
    );
}

#[test]
fn test_second_init_does_not_replace_secrets() {
    let mut keyring = Keyring::new();
    keyring.init_from_mnemonic(VAULT, "").unwrap();
    let before = keyring
        .generate_and_cache_address(&GenerateAddressOptions::default())
        .unwrap();

    let other = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    assert_eq!(
        keyring.init_from_mnemonic(other, ""),
        Err(KeyringError::AlreadyInitialized)
    );

    keyring.clear();
    keyring.init_from_mnemonic(VAULT, "").unwrap();
    let after = keyring
        .generate_and_cache_address(&GenerateAddressOptions::default())
        .unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_export_only_for_cached_addresses() {
    let mut keyring = Keyring::new();
    keyring.init_from_mnemonic(VAULT, "").unwrap();

    let index_1: Address = "15jjExDyS8q3Wqk9v29PCQ21jDqubDrD8WQdgn6VW2oi4".parse().unwrap();
    assert_eq!(
        keyring.export_private_key_of_address(&index_1),
        Err(KeyringError::UnknownAddress(index_1))
    );

    keyring
        .generate_and_cache_address(&GenerateAddressOptions::at_index(AddressIndex::new(1).unwrap()))
        .unwrap();
    assert!(keyring.export_private_key_of_address(&index_1).is_ok());
}

#[test]
fn test_different_passphrases_different_keys() {
    let mut a = Keyring::new();
    let mut b = Keyring::new();
    a.init_from_mnemonic(VAULT, "").unwrap();
    b.init_from_mnemonic(VAULT, "TREZOR").unwrap();

    let group = Group::new(0).unwrap();
    let from_a = a
        .generate_and_cache_address(&GenerateAddressOptions::in_group(group))
        .unwrap();
    let from_b = b
        .generate_and_cache_address(&GenerateAddressOptions::in_group(group))
        .unwrap();
    assert_ne!(from_a.public_key, from_b.public_key);
}

// ============================================================================
// 3. Zeroing Flow Tests
// ============================================================================

#[test]
fn test_exported_key_can_be_wiped() {
    let mut keyring = Keyring::new();
    keyring.init_from_mnemonic(VAULT, "").unwrap();
    let info = keyring
        .generate_and_cache_address(&GenerateAddressOptions::default())
        .unwrap();

    let mut key = keyring.export_private_key_of_address(&info.hash).unwrap();
    assert_ne!(*key, [0u8; 32]);
    key.zeroize();
    assert_eq!(*key, [0u8; 32]);
}

#[test]
fn test_generated_mnemonic_can_be_wiped() {
    let mut keyring = Keyring::new();
    let (_, mut mnemonic) = keyring
        .generate_random(WordCount::Twelve, "pw", "")
        .unwrap();
    assert!(validate_mnemonic(&mnemonic));
    mnemonic.zeroize();
    assert!(mnemonic.is_empty());
}

#[test]
fn test_decrypted_plaintext_is_zeroizing() {
    let envelope = encrypt("pw", VAULT.as_bytes()).unwrap();
    let plaintext: Zeroizing<Vec<u8>> = decrypt("pw", &envelope).unwrap();
    assert_eq!(&plaintext[..], VAULT.as_bytes());
}

#[test]
fn test_debug_never_shows_secrets() {
    let mut keyring = Keyring::new();
    keyring.init_from_mnemonic(VAULT, "").unwrap();
    keyring
        .generate_and_cache_address(&GenerateAddressOptions::default())
        .unwrap();

    let rendered = format!("{:?}", keyring);
    assert!(!rendered.contains("a642942e"));
    assert!(!rendered.contains("vault"));

    let seed = alph_keyring::mnemonic_to_seed(VAULT, "").unwrap();
    assert_eq!(format!("{:?}", seed), "Seed(..)");
}

// ============================================================================
// 4. Malformed Input Panic Tests (should NOT panic)
// ============================================================================

#[test]
fn test_mnemonic_garbage_does_not_panic() {
    let many = "abandon ".repeat(100);
    let long = "a".repeat(10000);
    let inputs = [
        "",
        "a",
        "hello world",
        "abandon abandon abandon", // Too few words
        many.as_str(),             // Too many words
        "🎉 🎊 🎈 🎃 🎄 🎅 🎆 🎇 🎁 🎂 🎀 🎍",
        "\0\0\0\0\0\0\0\0\0\0\0\0",
        long.as_str(),
    ];

    for input in &inputs {
        assert!(!validate_mnemonic(input));
        let mut keyring = Keyring::new();
        assert!(matches!(
            keyring.init_from_mnemonic(input, ""),
            Err(KeyringError::InvalidMnemonic(_))
        ));
    }
}

#[test]
fn test_envelope_garbage_does_not_panic() {
    let inputs = [
        "",
        "{}",
        "[]",
        "null",
        r#"{"iv":"","encrypted":"","salt":"","version":1}"#,
        r#"{"iv":"zz","encrypted":"00","salt":"00","version":1}"#,
        r#"{"iv":"00","e":"00","v":2}"#,
        r#"{"iv":"00","encrypted":"00","salt":"00","version":300}"#,
        r#"{"iv":"00","encrypted":"00","salt":"00","version":-1}"#,
    ];

    for input in &inputs {
        assert!(EncryptedEnvelope::from_json(input).is_err(), "{input}");
    }
}

#[test]
fn test_address_and_index_garbage_does_not_panic() {
    let addresses = [
        "",
        "0",
        "1",
        "11111111111111111111111111111111111",
        "1DrDyTr9RpRsQnDnXo2YRiPzPW4ooHX5LLoqXrqfMrpQHH",
        "O0Il",
        "🎉",
    ];
    for input in &addresses {
        assert!(input.parse::<Address>().is_err(), "{input}");
    }

    for input in ["-1", "1.5", "1e3", "", " 1", "2147483648", "99999999999999999999"] {
        assert!(input.parse::<AddressIndex>().is_err(), "{input}");
    }
}

#[test]
fn test_random_envelope_json_does_not_panic() {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let valid = encrypt("pw", b"payload").unwrap().to_json().unwrap();

    for _ in 0..500 {
        let mut bytes: Vec<u8> = valid.bytes().collect();
        let idx = rng.gen_range(0..bytes.len());
        bytes[idx] = rng.gen_range(0x20..0x7f);
        let corrupted = String::from_utf8_lossy(&bytes).to_string();

        if let Ok(envelope) = EncryptedEnvelope::from_json(&corrupted) {
            // either unchanged in meaning, or rejected
            let _ = decrypt("pw", &envelope);
        }
    }
}
