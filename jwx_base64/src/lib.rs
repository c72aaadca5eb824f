//! # jwx_base64
//!
//! Base64URL wrappers for values carried in JOSE structures
//!
//! Underlying data is stored as an actual byte slice. Costs of conversion
//! between base64url and raw bytes are only incurred by `from_encoded()`
//! or by rendering the value through its debug or display formatting.
//!
//! The codec is the unpadded `base64url` alphabet of RFC 4648 §5 as used
//! by the JOSE family of standards. Decoding is tolerant of trailing `=`
//! padding, but rejects bytes outside the alphabet and inputs truncated
//! inside a 4-character quantum.
//!
//! ## Example
//!
//! ```
//! use jwx_base64::Base64Url;
//!
//! let data = Base64Url::from_raw("hello, world".as_bytes());
//! assert_eq!(data.to_string(), "aGVsbG8sIHdvcmxk");
//!
//! let decoded = Base64Url::from_encoded("aGVsbG8sIHdvcmxk").unwrap();
//! assert_eq!(decoded.as_slice(), b"hello, world");
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::{error::Error, fmt};

/// An error while decoding a value which is not properly formatted
/// base64url data
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvalidBase64Data {
    source: ::base64::DecodeError,
}

impl From<::base64::DecodeError> for InvalidBase64Data {
    fn from(err: ::base64::DecodeError) -> Self {
        Self { source: err }
    }
}

impl fmt::Display for InvalidBase64Data {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid base64url data")
    }
}

impl Error for InvalidBase64Data {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Encodes a byte slice as unpadded base64url
#[must_use]
pub fn encode<T: AsRef<[u8]>>(raw: T) -> String {
    ::base64::encode_config(raw.as_ref(), ::base64::URL_SAFE_NO_PAD)
}

/// Decodes base64url data, with or without trailing padding
///
/// # Errors
///
/// Returns an error if the input contains bytes outside the base64url
/// alphabet, carries malformed padding, or stops short inside a
/// 4-character quantum.
pub fn decode<T: AsRef<[u8]>>(enc: T) -> Result<Vec<u8>, InvalidBase64Data> {
    let enc = enc.as_ref();

    // tolerate canonical padding; anything stripped must have closed a
    // full quantum
    let trimmed = match enc {
        [head @ .., b'=', b'='] => head,
        [head @ .., b'='] => head,
        _ => enc,
    };

    if trimmed.len() != enc.len() && enc.len() % 4 != 0 {
        return Err(::base64::DecodeError::InvalidLength.into());
    }

    Ok(::base64::decode_config(trimmed, ::base64::URL_SAFE_NO_PAD)?)
}

/// The number of characters required to encode `len` raw bytes without
/// padding
#[must_use]
pub const fn calc_encoded_len(len: usize) -> usize {
    (len * 4 + 2) / 3
}

/// A buffer of raw bytes serialized to and from unpadded base64url
///
/// Data is held in memory in its raw form. Costs of converting to
/// base64url form are only incurred when displaying the value. Costs of
/// converting from base64url form are incurred on calling
/// [`from_encoded`][Base64Url::from_encoded].
#[derive(Clone, Default, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct Base64Url(Vec<u8>);

impl Base64Url {
    /// Creates a new buffer from an owned value
    ///
    /// To decode a base64url-encoded buffer, use
    /// [`from_encoded`][Self::from_encoded].
    #[inline]
    #[must_use]
    pub fn from_raw<T: Into<Vec<u8>>>(raw: T) -> Self {
        Self(raw.into())
    }

    /// Constructs a new buffer from a base64url-encoded slice
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64url.
    pub fn from_encoded<T: AsRef<[u8]>>(enc: T) -> Result<Self, InvalidBase64Data> {
        Ok(Self(decode(enc)?))
    }

    /// Unwraps the underlying buffer
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    /// Provides access to the underlying buffer as a slice
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Provides mutable access to the underlying buffer
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// The length of the underlying buffer
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the underlying buffer is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of characters required to represent this buffer in
    /// its encoded form
    #[inline]
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        calc_encoded_len(self.len())
    }
}

impl From<Vec<u8>> for Base64Url {
    #[inline]
    fn from(raw: Vec<u8>) -> Self {
        Self(raw)
    }
}

impl From<&[u8]> for Base64Url {
    #[inline]
    fn from(raw: &[u8]) -> Self {
        Self(raw.to_vec())
    }
}

impl AsRef<[u8]> for Base64Url {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Base64Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&encode(&self.0))
    }
}

impl fmt::Debug for Base64Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "`{}`", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_without_padding() {
        assert_eq!(encode(b"f"), "Zg");
        assert_eq!(encode(b"fo"), "Zm8");
        assert_eq!(encode(b"foo"), "Zm9v");
        assert_eq!(encode(b"foob"), "Zm9vYg");
    }

    #[test]
    fn decodes_unpadded() {
        assert_eq!(decode("Zm9vYg").unwrap(), b"foob");
    }

    #[test]
    fn decodes_padded() {
        assert_eq!(decode("Zm9vYg==").unwrap(), b"foob");
        assert_eq!(decode("Zm9vYmE=").unwrap(), b"fooba");
    }

    #[test]
    fn rejects_misplaced_padding() {
        assert!(decode("Zm9vYg=").is_err());
    }

    #[test]
    fn rejects_standard_alphabet() {
        // '+' and '/' belong to the standard alphabet, not base64url
        assert!(decode("+/==").is_err());
        assert!(decode("a+b_").is_err());
    }

    #[test]
    fn rejects_truncated_quantum() {
        assert!(decode("Zm9vY").is_err());
    }

    #[test]
    fn url_safe_symbols_round_trip() {
        let raw = [0xfbu8, 0xff, 0xfe];
        let enc = encode(raw);
        assert_eq!(enc, "-__-");
        assert_eq!(decode(&enc).unwrap(), raw);
    }

    #[test]
    fn encoded_len_matches() {
        for len in 0..32 {
            let data = Base64Url::from_raw(vec![0xa5; len]);
            assert_eq!(data.encoded_len(), data.to_string().len());
        }
    }
}
