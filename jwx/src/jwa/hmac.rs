//! HMAC JSON Web Algorithm implementations

use std::fmt;

use zeroize::Zeroizing;

use super::{Signer, SignerFactory, Verifier, VerifierFactory};
use crate::{
    error::{self, CryptoBackend, KeyError, SignatureInvalid},
    jwk::Jwk,
};

/// HMAC signing algorithms
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum SigningAlgorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
}

impl SigningAlgorithm {
    pub(crate) fn from_name(alg: &str) -> Option<Self> {
        match alg {
            "HS256" => Some(Self::HS256),
            "HS384" => Some(Self::HS384),
            "HS512" => Some(Self::HS512),
            _ => None,
        }
    }

    /// The JWA name of this algorithm
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }

    /// The size in bytes of an HMAC signature
    #[must_use]
    pub const fn signature_size(self) -> usize {
        match self {
            Self::HS256 => 256 / 8,
            Self::HS384 => 384 / 8,
            Self::HS512 => 512 / 8,
        }
    }

    fn into_ring_algorithm(self) -> ring::hmac::Algorithm {
        match self {
            Self::HS256 => ring::hmac::HMAC_SHA256,
            Self::HS384 => ring::hmac::HMAC_SHA384,
            Self::HS512 => ring::hmac::HMAC_SHA512,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// HMAC key material bound to an algorithm and key identifier
///
/// The secret bytes are scrubbed when the value is dropped.
pub struct Hmac {
    alg: SigningAlgorithm,
    kid: Option<String>,
    secret: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for Hmac {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Hmac { secret }")
    }
}

impl Hmac {
    /// HMAC using the provided secret
    #[must_use]
    pub fn new(alg: SigningAlgorithm, kid: Option<&str>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            alg,
            kid: kid.map(str::to_owned),
            secret: Zeroizing::new(secret.into()),
        }
    }

    fn from_jwk(alg: &str, kid: Option<&str>, key: &Jwk) -> Result<Self, KeyError> {
        let alg = SigningAlgorithm::from_name(alg).ok_or_else(|| KeyError::IncompatibleAlgorithm {
            alg: alg.to_owned(),
        })?;

        if key.kty() != "oct" {
            return Err(KeyError::IncompatibleAlgorithm {
                alg: alg.name().to_owned(),
            });
        }

        let secret = key.param_bytes("k")?;
        let kid = kid.or_else(|| key.kid());

        Ok(Self::new(alg, kid, secret))
    }

    fn key(&self) -> ring::hmac::Key {
        ring::hmac::Key::new(self.alg.into_ring_algorithm(), &self.secret)
    }
}

impl Signer for Hmac {
    fn alg(&self) -> &str {
        self.alg.name()
    }

    fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    fn signature_size(&self) -> usize {
        self.alg.signature_size()
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoBackend> {
        let digest = ring::hmac::sign(&self.key(), data);
        Ok(digest.as_ref().to_owned())
    }
}

impl Verifier for Hmac {
    fn alg(&self) -> &str {
        self.alg.name()
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), SignatureInvalid> {
        ring::hmac::verify(&self.key(), data, signature).map_err(|_| error::signature_invalid())
    }
}

/// Builds HMAC signers and verifiers from `oct` keys
#[derive(Clone, Copy, Debug, Default)]
pub struct Factory;

impl SignerFactory for Factory {
    fn make(
        &self,
        alg: &str,
        kid: Option<&str>,
        key: &Jwk,
    ) -> Result<Box<dyn Signer>, KeyError> {
        Ok(Box::new(Hmac::from_jwk(alg, kid, key)?))
    }
}

impl VerifierFactory for Factory {
    fn make(
        &self,
        alg: &str,
        kid: Option<&str>,
        key: &Jwk,
    ) -> Result<Box<dyn Verifier>, KeyError> {
        Ok(Box::new(Hmac::from_jwk(alg, kid, key)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_key() -> Jwk {
        // "secret" in base64url
        Jwk::from_json(r#"{"kty":"oct","k":"c2VjcmV0","kid":"test key"}"#).unwrap()
    }

    #[test]
    fn sign_verify_round_trip() {
        let key = secret_key();
        let signer = SignerFactory::make(&Factory, "HS256", None, &key).unwrap();
        let sig = signer.sign(b"data to protect").unwrap();
        assert_eq!(sig.len(), 32);

        let verifier = VerifierFactory::make(&Factory, "HS256", None, &key).unwrap();
        verifier.verify(b"data to protect", &sig).unwrap();
        assert!(verifier.verify(b"data to protect!", &sig).is_err());
    }

    #[test]
    fn rejects_non_oct_keys() {
        let key = Jwk::from_json(r#"{"kty":"RSA","n":"AQAB","e":"AQAB"}"#).unwrap();
        assert!(matches!(
            SignerFactory::make(&Factory, "HS256", None, &key),
            Err(KeyError::IncompatibleAlgorithm { .. })
        ));
    }

    #[test]
    fn kid_flows_from_the_key() {
        let key = secret_key();
        let signer = SignerFactory::make(&Factory, "HS384", None, &key).unwrap();
        assert_eq!(signer.kid(), Some("test key"));
        assert_eq!(signer.alg(), "HS384");
    }
}
