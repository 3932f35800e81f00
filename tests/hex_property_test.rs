//! Property tests for credential validation: the gate that runs before any
//! process is spawned.

use proptest::prelude::*;
use shannon_core::keyring::{validate_hex_key, validate_mnemonic};

proptest! {
    #[test]
    fn any_64_char_hex_is_accepted(key in "[0-9a-fA-F]{64}") {
        let cleaned = validate_hex_key(&key).unwrap();
        prop_assert_eq!(cleaned, key.to_lowercase());
    }

    #[test]
    fn any_128_char_hex_is_accepted(key in "[0-9a-fA-F]{128}") {
        prop_assert!(validate_hex_key(&key).is_ok());
    }

    #[test]
    fn prefix_is_stripped(key in "[0-9a-f]{64}") {
        let cleaned = validate_hex_key(&format!("0x{key}")).unwrap();
        prop_assert_eq!(cleaned, key);
    }

    #[test]
    fn wrong_lengths_are_rejected(key in "[0-9a-f]{1,200}") {
        prop_assume!(key.len() != 64 && key.len() != 128);
        prop_assert!(validate_hex_key(&key).is_err());
    }

    #[test]
    fn non_hex_charsets_are_rejected(key in "[g-z]{64}") {
        prop_assert!(validate_hex_key(&key).is_err());
    }

    #[test]
    fn word_counts_in_range_are_accepted(count in 12usize..=24) {
        let phrase = vec!["word"; count].join(" ");
        prop_assert!(validate_mnemonic(&phrase).is_ok());
    }

    #[test]
    fn word_counts_out_of_range_are_rejected(count in 1usize..12) {
        let phrase = vec!["word"; count].join(" ");
        prop_assert!(validate_mnemonic(&phrase).is_err());
        let long = vec!["word"; 25 + count].join(" ");
        prop_assert!(validate_mnemonic(&long).is_err());
    }
}
