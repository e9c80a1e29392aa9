//! Display-safe masking of API keys

/// Number of leading characters left visible
pub const VISIBLE_PREFIX: usize = 8;

/// Number of trailing characters left visible
pub const VISIBLE_SUFFIX: usize = 4;

/// Character substituted for every hidden character
pub const MASK_CHAR: char = '*';

/// Returns a redacted version of an API key. The first 8 and last 4
/// characters are kept, everything between them is replaced by `*`.
///
/// The output has the same number of characters as the input.
///
/// # Panics
///
/// Panics if `key` has fewer than 12 characters. Callers must only redact
/// keys that passed [`crate::validate::validate_api_key`].
pub fn redact(key: &str) -> String {
    let len = key.chars().count();
    assert!(
        len >= VISIBLE_PREFIX + VISIBLE_SUFFIX,
        "redact called with a {}-character key; at least {} required",
        len,
        VISIBLE_PREFIX + VISIBLE_SUFFIX
    );

    key.chars()
        .enumerate()
        .map(|(i, c)| {
            if i < VISIBLE_PREFIX || i >= len - VISIBLE_SUFFIX {
                c
            } else {
                MASK_CHAR
            }
        })
        .collect()
}
