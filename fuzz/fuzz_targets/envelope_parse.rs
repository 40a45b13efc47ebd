#![no_main]

use alph_keyring::envelope::EncryptedEnvelope;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // EncryptedEnvelope::from_json must never panic, only return Ok or Err.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(envelope) = EncryptedEnvelope::from_json(s) {
            // Whatever parses must survive its own serialization
            let json = envelope.to_json().expect("parsed envelope must serialize");
            let again = EncryptedEnvelope::from_json(&json);
            assert_eq!(again.as_ref().ok(), Some(&envelope));
        }
    }
});
