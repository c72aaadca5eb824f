//! RSA JSON Web Algorithm implementations
//!
//! Signing builds a DER-encoded key out of the JWK's big-integer
//! parameters via openssl, then hands it to `ring`. Verification feeds
//! the public components to `ring` directly.

use std::fmt;

use openssl::{bn::BigNum, rsa::RsaPrivateKeyBuilder};
use zeroize::Zeroizing;

use super::{Signer, SignerFactory, Verifier, VerifierFactory};
use crate::{
    error::{self, CryptoBackend, KeyError, SignatureInvalid},
    jwk::Jwk,
};

/// RSA public/private key signing algorithms
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum SigningAlgorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// RSASSA-PSS using SHA-256
    PS256,
    /// RSASSA-PSS using SHA-384
    PS384,
    /// RSASSA-PSS using SHA-512
    PS512,
}

impl SigningAlgorithm {
    pub(crate) fn from_name(alg: &str) -> Option<Self> {
        match alg {
            "RS256" => Some(Self::RS256),
            "RS384" => Some(Self::RS384),
            "RS512" => Some(Self::RS512),
            "PS256" => Some(Self::PS256),
            "PS384" => Some(Self::PS384),
            "PS512" => Some(Self::PS512),
            _ => None,
        }
    }

    /// The JWA name of this algorithm
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
        }
    }

    fn into_verification_params(self) -> &'static ring::signature::RsaParameters {
        match self {
            Self::RS256 => &ring::signature::RSA_PKCS1_2048_8192_SHA256,
            Self::RS384 => &ring::signature::RSA_PKCS1_2048_8192_SHA384,
            Self::RS512 => &ring::signature::RSA_PKCS1_2048_8192_SHA512,
            Self::PS256 => &ring::signature::RSA_PSS_2048_8192_SHA256,
            Self::PS384 => &ring::signature::RSA_PSS_2048_8192_SHA384,
            Self::PS512 => &ring::signature::RSA_PSS_2048_8192_SHA512,
        }
    }

    fn into_signing_params(self) -> &'static dyn ring::signature::RsaEncoding {
        match self {
            Self::RS256 => &ring::signature::RSA_PKCS1_SHA256,
            Self::RS384 => &ring::signature::RSA_PKCS1_SHA384,
            Self::RS512 => &ring::signature::RSA_PKCS1_SHA512,
            Self::PS256 => &ring::signature::RSA_PSS_SHA256,
            Self::PS384 => &ring::signature::RSA_PSS_SHA384,
            Self::PS512 => &ring::signature::RSA_PSS_SHA512,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn bignum(key: &Jwk, name: &'static str) -> Result<BigNum, KeyError> {
    let bytes = key.param_bytes(name)?;
    BigNum::from_slice(&bytes).map_err(|e| KeyError::from(error::crypto_backend(e)))
}

/// An RSA signing key bound to an algorithm and key identifier
pub struct RsaSigner {
    alg: SigningAlgorithm,
    kid: Option<String>,
    key_pair: ring::signature::RsaKeyPair,
}

impl fmt::Debug for RsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RsaSigner")
            .field("alg", &self.alg)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl RsaSigner {
    fn from_jwk(alg: &str, kid: Option<&str>, key: &Jwk) -> Result<Self, KeyError> {
        let alg = SigningAlgorithm::from_name(alg).ok_or_else(|| {
            KeyError::IncompatibleAlgorithm {
                alg: alg.to_owned(),
            }
        })?;

        if key.kty() != "RSA" {
            return Err(KeyError::IncompatibleAlgorithm {
                alg: alg.name().to_owned(),
            });
        }

        let mut builder =
            RsaPrivateKeyBuilder::new(bignum(key, "n")?, bignum(key, "e")?, bignum(key, "d")?)
                .map_err(error::crypto_backend)?;

        if key.has_param("p") && key.has_param("q") {
            builder = builder
                .set_factors(bignum(key, "p")?, bignum(key, "q")?)
                .map_err(error::crypto_backend)?;
        }

        if key.has_param("dp") && key.has_param("dq") && key.has_param("qi") {
            builder = builder
                .set_crt_params(bignum(key, "dp")?, bignum(key, "dq")?, bignum(key, "qi")?)
                .map_err(error::crypto_backend)?;
        }

        let openssl_key = builder.build();
        let der = Zeroizing::new(
            openssl_key
                .private_key_to_der()
                .map_err(error::crypto_backend)?,
        );

        let key_pair = ring::signature::RsaKeyPair::from_der(&der)
            .map_err(|e| error::crypto_backend(e.to_string()))?;

        Ok(Self {
            alg,
            kid: kid.or_else(|| key.kid()).map(str::to_owned),
            key_pair,
        })
    }
}

impl Signer for RsaSigner {
    fn alg(&self) -> &str {
        self.alg.name()
    }

    fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    fn signature_size(&self) -> usize {
        self.key_pair.public().modulus_len()
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoBackend> {
        let mut buf = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                self.alg.into_signing_params(),
                &ring::rand::SystemRandom::new(),
                data,
                &mut buf,
            )
            .map_err(|e| error::crypto_backend(e.to_string()))?;
        Ok(buf)
    }
}

/// An RSA verification key: the public modulus and exponent
pub struct RsaVerifier {
    alg: SigningAlgorithm,
    modulus: Vec<u8>,
    exponent: Vec<u8>,
}

impl fmt::Debug for RsaVerifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RsaVerifier").field("alg", &self.alg).finish()
    }
}

impl RsaVerifier {
    fn from_jwk(alg: &str, key: &Jwk) -> Result<Self, KeyError> {
        let alg = SigningAlgorithm::from_name(alg).ok_or_else(|| {
            KeyError::IncompatibleAlgorithm {
                alg: alg.to_owned(),
            }
        })?;

        if key.kty() != "RSA" {
            return Err(KeyError::IncompatibleAlgorithm {
                alg: alg.name().to_owned(),
            });
        }

        Ok(Self {
            alg,
            modulus: key.param_bytes("n")?,
            exponent: key.param_bytes("e")?,
        })
    }
}

impl Verifier for RsaVerifier {
    fn alg(&self) -> &str {
        self.alg.name()
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), SignatureInvalid> {
        let public = ring::signature::RsaPublicKeyComponents {
            n: &self.modulus,
            e: &self.exponent,
        };

        public
            .verify(self.alg.into_verification_params(), data, signature)
            .map_err(|_| error::signature_invalid())
    }
}

/// Builds RSA signers and verifiers from `RSA` keys
#[derive(Clone, Copy, Debug, Default)]
pub struct Factory;

impl SignerFactory for Factory {
    fn make(
        &self,
        alg: &str,
        kid: Option<&str>,
        key: &Jwk,
    ) -> Result<Box<dyn Signer>, KeyError> {
        Ok(Box::new(RsaSigner::from_jwk(alg, kid, key)?))
    }
}

impl VerifierFactory for Factory {
    fn make(
        &self,
        alg: &str,
        _kid: Option<&str>,
        key: &Jwk,
    ) -> Result<Box<dyn Verifier>, KeyError> {
        Ok(Box::new(RsaVerifier::from_jwk(alg, key)?))
    }
}
