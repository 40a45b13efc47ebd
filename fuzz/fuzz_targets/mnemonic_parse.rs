#![no_main]

use alph_keyring::mnemonic::{normalize_mnemonic, validate_mnemonic};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary text must be accepted or rejected as a BIP-39 phrase, never panic.
    if let Ok(s) = std::str::from_utf8(data) {
        let valid = validate_mnemonic(s);
        let normalized = normalize_mnemonic(s);
        assert_eq!(valid, normalized.is_ok());

        // Canonical form is a fixed point
        if let Ok(phrase) = normalized {
            assert_eq!(normalize_mnemonic(&phrase).ok().as_deref().map(String::as_str), Some(phrase.as_str()));
        }
    }
});
