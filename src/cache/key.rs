//! Cache key derivation
//!
//! Keys are derived textually from the fully-resolved request URL. Two URLs
//! that are logically equivalent but spelled differently (for example with
//! query parameters in another order) map to different keys.

/// Character substituted for URL delimiters when deriving a key
pub const KEY_SEPARATOR: char = '_';

/// URL delimiters replaced by [`KEY_SEPARATOR`]
const DELIMITERS: [char; 5] = [':', '/', '?', '=', '&'];

/// Derives a cache key from a fully-resolved URL
///
/// # Example
/// ```
/// use rest_cache::cache::derive_key;
///
/// assert_eq!(
///     derive_key("https://api.example.com/v1/lists?page=2"),
///     "https___api.example.com_v1_lists_page_2"
/// );
/// ```
pub fn derive_key(url: &str) -> String {
    url.chars()
        .map(|c| if DELIMITERS.contains(&c) { KEY_SEPARATOR } else { c })
        .collect()
}

/// Returns the cache key for a call: the explicit id if one was supplied,
/// otherwise the key derived from the URL
pub fn key_for(url: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => derive_key(url),
    }
}
