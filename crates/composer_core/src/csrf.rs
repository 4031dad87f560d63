//! CSRF token extraction from a `Cookie` header value.

use percent_encoding::percent_decode_str;

/// Finds `name` among the `; `-separated pairs of a cookie header and returns
/// its percent-decoded value. Empty or undecodable values count as absent.
pub fn token_from_cookie_header(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| percent_decode_str(value).decode_utf8().ok())
        .map(|value| value.into_owned())
        .filter(|value| !value.is_empty())
}
