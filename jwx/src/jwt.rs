//! JWT claims and the token factory
//!
//! Minting applies the RFC 7519 production rules: factory defaults are
//! overlaid with the caller's claims, the registered members are
//! stamped in as final, and the result is signed through the JWS
//! pipeline. Decoding verifies the signature, then applies the temporal
//! and identity validation algorithm under a caller-supplied current
//! time and clock skew.

mod claims;
mod factory;

pub use claims::Claims;
pub use factory::JwtFactory;
pub use jwx_clock::{Clock, DurationSecs, System, TestClock, UnixTime};

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::JwtError;

/// The registered claim names that become final once a token has been
/// minted or validated
pub const PROTECTED: [&str; 7] = ["iss", "sub", "aud", "iat", "nbf", "exp", "jti"];

lazy_static! {
    static ref URI_RE: Regex = Regex::new(
        r"^[A-Za-z][A-Za-z0-9+.\-]*:[A-Za-z0-9\-._~:/?#\[\]@!$&'()*+,;=%]*$"
    )
    .unwrap();
}

/// Checks the `StringOrURI` rule: a value containing `:` must parse as
/// an RFC 3986 URI
///
/// # Errors
///
/// Fails with [`JwtError::BadUri`].
pub fn validate_string_or_uri(value: &str) -> Result<(), JwtError> {
    if !value.contains(':') {
        return Ok(());
    }

    if !URI_RE.is_match(value) {
        return Err(JwtError::BadUri);
    }

    // percent escapes must carry two hex digits
    let bytes = value.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'%'
            && !(i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit())
        {
            return Err(JwtError::BadUri);
        }
    }

    Ok(())
}
