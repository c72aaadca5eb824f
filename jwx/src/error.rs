//! Common errors

#![allow(missing_copy_implementations)]

use std::error::Error as StdError;

use thiserror::Error;

/// The provided name could not be matched with supported algorithms
#[derive(Debug, Error)]
#[error("'{alg}' does not match supported algorithms")]
pub struct UnknownAlgorithm {
    alg: String,
}

#[inline]
pub(crate) fn unknown_algorithm(alg: impl Into<String>) -> UnknownAlgorithm {
    UnknownAlgorithm { alg: alg.into() }
}

/// The cryptographic backend rejected an operation
///
/// The backend's own diagnostic is retained as the error source.
#[derive(Debug, Error)]
#[error("cryptographic backend failure")]
pub struct CryptoBackend {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn crypto_backend(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> CryptoBackend {
    CryptoBackend {
        source: source.into(),
    }
}

/// The signature did not verify
///
/// This error is deliberately opaque: the verification pipeline refuses
/// to reveal which of its steps failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("signature invalid")]
pub struct SignatureInvalid {
    _p: (),
}

pub(crate) const fn signature_invalid() -> SignatureInvalid {
    SignatureInvalid { _p: () }
}

/// The object's single-holder lock is already held
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("object busy")]
pub struct Busy {
    _p: (),
}

pub(crate) const fn busy() -> Busy {
    Busy { _p: () }
}

/// An error arising while working with JSON Web Keys
#[derive(Debug, Error)]
pub enum KeyError {
    /// The `kty` member does not name a supported key type
    #[error("unrecognized key type '{kty}'")]
    UnknownKeyType {
        /// The offending key type
        kty: String,
    },

    /// The key cannot be used with the requested algorithm
    #[error("key incompatible with algorithm '{alg}'")]
    IncompatibleAlgorithm {
        /// The requested algorithm
        alg: String,
    },

    /// A required key parameter is absent or of the wrong shape
    #[error("key parameter '{name}' missing or malformed")]
    MissingParameter {
        /// The JWK member name
        name: &'static str,
    },

    /// The PEM framing is malformed
    #[error("malformed PEM input")]
    PemFormat,

    /// No recognised key block was present in the input
    #[error("no usable key material found")]
    NoKeyFound,

    /// The key does not have a public form
    #[error("key type has no public counterpart")]
    NoPublicForm,

    /// The key parameters were not valid JSON
    #[error(transparent)]
    Json(#[from] crate::json::Error),

    /// The backend rejected the key material
    #[error(transparent)]
    CryptoBackend(#[from] CryptoBackend),
}

/// An error resolving an algorithm implementation from the registry
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The algorithm has no registered factory
    #[error(transparent)]
    UnknownAlgorithm(#[from] UnknownAlgorithm),

    /// The factory rejected the key
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// An error arising while producing a signed token
#[derive(Debug, Error)]
pub enum SigningError {
    /// No usable signer could be resolved
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Header or payload could not be rendered
    #[error(transparent)]
    Json(#[from] crate::json::Error),

    /// The backend failed to sign
    #[error(transparent)]
    CryptoBackend(#[from] CryptoBackend),
}

/// An error arising while minting or decoding a JWT
#[derive(Debug, Error)]
pub enum JwtError {
    /// The token's signature could not be verified
    #[error(transparent)]
    Signature(#[from] SignatureInvalid),

    /// The token is expired according to the `exp` claim
    #[error("token expired")]
    Expired,

    /// The token is not yet valid according to the `nbf` claim
    #[error("token not yet valid")]
    NotYetValid,

    /// The token claims issuance at a future time
    #[error("token issued in the future")]
    IssuedInFuture,

    /// None of the token's audiences is acceptable
    #[error("audience mismatch")]
    AudienceMismatch,

    /// The token's issuer is not the required issuer
    #[error("issuer mismatch")]
    IssuerMismatch,

    /// The token's subject is not the required subject
    #[error("subject mismatch")]
    SubjectMismatch,

    /// A StringOrURI value containing `:` is not a valid URI
    #[error("invalid StringOrURI value")]
    BadUri,

    /// The factory has been locked against mutation
    #[error("locked against modification")]
    Locked,

    /// The object's mutation lock is held elsewhere
    #[error(transparent)]
    Busy(#[from] Busy),

    /// No JWS factory is configured, so tokens cannot be signed
    #[error("no JWS factory configured for signing")]
    Unsigned,

    /// The default skew adjustment is outside the accepted range
    #[error("skew adjustment out of range: {skew}")]
    SkewOutOfRange {
        /// The rejected value, in seconds
        skew: i64,
    },

    /// The claims payload was not acceptable JSON
    #[error(transparent)]
    Json(#[from] crate::json::Error),

    /// Token production failed
    #[error(transparent)]
    Sign(#[from] SigningError),
}
