//! Random identifiers for list keys and correlation tokens.
//!
//! Backed by `nanoid`, which draws from the operating system's secure
//! random source. No shared mutable state beyond that source.

use nanoid::nanoid;

/// Alphabet of generated keys and token parts.
pub const KEY_ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I',
    'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b',
    'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u',
    'v', 'w', 'x', 'y', 'z',
];

/// Length of generated list item keys.
pub const LIST_KEY_LEN: usize = 16;

/// Length of each random part of a dispatcher token.
pub const TOKEN_PART_LEN: usize = 16;

/// Fresh key for a list item.
#[must_use]
pub fn list_key() -> String {
    nanoid!(LIST_KEY_LEN, &KEY_ALPHABET)
}

/// Fresh random token part.
#[must_use]
pub fn token_part() -> String {
    nanoid!(TOKEN_PART_LEN, &KEY_ALPHABET)
}

/// True if `key` has the length and alphabet of a generated list key.
#[must_use]
pub fn is_list_key(key: &str) -> bool {
    key.chars().count() == LIST_KEY_LEN && key.chars().all(|c| c.is_ascii_alphanumeric())
}
