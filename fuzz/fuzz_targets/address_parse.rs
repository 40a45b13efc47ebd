#![no_main]

use alph_keyring::{Address, AddressIndex};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Address and index parsing must never panic.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(address) = s.parse::<Address>() {
            assert_eq!(address.to_string().parse::<Address>().ok(), Some(address));
            assert!(address.group().value() < alph_keyring::TOTAL_NUMBER_OF_GROUPS);
        }
        let _ = s.parse::<AddressIndex>();
    }
});
