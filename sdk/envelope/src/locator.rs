//! Mock content locators
//!
//! Stands in for real content addressing: `bafy` plus 32 base32 characters.
//! Not a CID and carries no integrity meaning.

use rand::RngCore;
use rand::rngs::OsRng;

pub const LOCATOR_PREFIX: &str = "bafy";

const ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";
const SUFFIX_LEN: usize = 32;

/// Generate a mock locator
pub fn generate_locator() -> String {
    let mut random = [0u8; SUFFIX_LEN];
    OsRng.fill_bytes(&mut random);

    let mut locator = String::with_capacity(LOCATOR_PREFIX.len() + SUFFIX_LEN);
    locator.push_str(LOCATOR_PREFIX);
    locator.extend(
        random
            .iter()
            .map(|b| ALPHABET[*b as usize % ALPHABET.len()] as char),
    );
    locator
}
