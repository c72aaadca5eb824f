//! ECDSA JSON Web Algorithm implementations
//!
//! JOSE carries ECDSA signatures as the fixed-width big-endian
//! concatenation `r || s`, while openssl works in DER. The signer and
//! verifier here convert between the two forms at the boundary.

use std::fmt;

use lazy_static::lazy_static;
use openssl::{
    bn::{BigNum, BigNumContext},
    ec::{EcGroup, EcGroupRef, EcKey, EcPoint},
    ecdsa::EcdsaSig,
    hash::MessageDigest,
    nid::Nid,
    pkey::{Private, Public},
};

use super::{Signer, SignerFactory, Verifier, VerifierFactory};
use crate::{
    error::{self, CryptoBackend, KeyError, SignatureInvalid},
    jwk::Jwk,
};

lazy_static! {
    static ref P256: EcGroup = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    static ref P384: EcGroup = EcGroup::from_curve_name(Nid::SECP384R1).unwrap();
    static ref P521: EcGroup = EcGroup::from_curve_name(Nid::SECP521R1).unwrap();
}

/// A named ECC curve
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Curve {
    /// The P-256 curve (prime256v1/secp256r1)
    P256,
    /// The P-384 curve (secp384r1)
    P384,
    /// The P-521 curve (secp521r1)
    P521,
}

impl Curve {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "P-256" => Some(Self::P256),
            "P-384" => Some(Self::P384),
            "P-521" => Some(Self::P521),
            _ => None,
        }
    }

    pub(crate) fn from_group(group: &EcGroupRef) -> Option<Self> {
        match group.curve_name()? {
            Nid::X9_62_PRIME256V1 => Some(Self::P256),
            Nid::SECP384R1 => Some(Self::P384),
            Nid::SECP521R1 => Some(Self::P521),
            _ => None,
        }
    }

    /// The JWK `crv` name of this curve
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// The width in bytes of one coordinate on this curve
    #[must_use]
    pub const fn coordinate_size(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    fn group(self) -> &'static EcGroupRef {
        match self {
            Self::P256 => &P256,
            Self::P384 => &P384,
            Self::P521 => &P521,
        }
    }
}

/// Elliptic curve signing algorithms
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum SigningAlgorithm {
    /// ECDSA using the P-256 curve and SHA-256
    ES256,
    /// ECDSA using the P-384 curve and SHA-384
    ES384,
    /// ECDSA using the P-521 curve and SHA-512
    ES512,
}

impl SigningAlgorithm {
    pub(crate) fn from_name(alg: &str) -> Option<Self> {
        match alg {
            "ES256" => Some(Self::ES256),
            "ES384" => Some(Self::ES384),
            "ES512" => Some(Self::ES512),
            _ => None,
        }
    }

    /// The JWA name of this algorithm
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
        }
    }

    /// The curve this algorithm signs on
    #[must_use]
    pub const fn curve(self) -> Curve {
        match self {
            Self::ES256 => Curve::P256,
            Self::ES384 => Curve::P384,
            Self::ES512 => Curve::P521,
        }
    }

    /// The size in bytes of the raw `r || s` signature
    #[must_use]
    pub const fn signature_size(self) -> usize {
        self.curve().coordinate_size() * 2
    }

    fn digest(self) -> MessageDigest {
        match self {
            Self::ES256 => MessageDigest::sha256(),
            Self::ES384 => MessageDigest::sha384(),
            Self::ES512 => MessageDigest::sha512(),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn check_curve(alg: SigningAlgorithm, key: &Jwk) -> Result<(), KeyError> {
    if key.kty() != "EC" {
        return Err(KeyError::IncompatibleAlgorithm {
            alg: alg.name().to_owned(),
        });
    }

    let crv = key
        .param("crv")
        .ok_or(KeyError::MissingParameter { name: "crv" })?;

    if Curve::from_name(crv) != Some(alg.curve()) {
        return Err(KeyError::IncompatibleAlgorithm {
            alg: alg.name().to_owned(),
        });
    }

    Ok(())
}

fn public_point(alg: SigningAlgorithm, key: &Jwk) -> Result<EcPoint, KeyError> {
    let group = alg.curve().group();
    let x = BigNum::from_slice(&key.param_bytes("x")?).map_err(error::crypto_backend)?;
    let y = BigNum::from_slice(&key.param_bytes("y")?).map_err(error::crypto_backend)?;

    let mut ctx = BigNumContext::new().map_err(error::crypto_backend)?;
    let mut point = EcPoint::new(group).map_err(error::crypto_backend)?;
    point
        .set_affine_coordinates_gfp(group, &x, &y, &mut ctx)
        .map_err(error::crypto_backend)?;

    Ok(point)
}

fn digest_of(alg: SigningAlgorithm, data: &[u8]) -> Result<Vec<u8>, CryptoBackend> {
    openssl::hash::hash(alg.digest(), data)
        .map(|d| d.to_vec())
        .map_err(error::crypto_backend)
}

/// An ECDSA signing key bound to an algorithm and key identifier
pub struct EcSigner {
    alg: SigningAlgorithm,
    kid: Option<String>,
    key: EcKey<Private>,
}

impl fmt::Debug for EcSigner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EcSigner")
            .field("alg", &self.alg)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl EcSigner {
    fn from_jwk(alg: &str, kid: Option<&str>, key: &Jwk) -> Result<Self, KeyError> {
        let alg = SigningAlgorithm::from_name(alg).ok_or_else(|| {
            KeyError::IncompatibleAlgorithm {
                alg: alg.to_owned(),
            }
        })?;

        check_curve(alg, key)?;

        let group = alg.curve().group();
        let point = public_point(alg, key)?;
        let d = BigNum::from_slice(&key.param_bytes("d")?).map_err(error::crypto_backend)?;

        let ec_key =
            EcKey::from_private_components(group, &d, &point).map_err(error::crypto_backend)?;
        ec_key.check_key().map_err(error::crypto_backend)?;

        Ok(Self {
            alg,
            kid: kid.or_else(|| key.kid()).map(str::to_owned),
            key: ec_key,
        })
    }
}

impl Signer for EcSigner {
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
        let digest = digest_of(self.alg, data)?;
        let sig = EcdsaSig::sign(&digest, &self.key).map_err(error::crypto_backend)?;

        let coord = self.alg.curve().coordinate_size() as i32;
        let mut out = sig
            .r()
            .to_vec_padded(coord)
            .map_err(error::crypto_backend)?;
        out.extend(
            sig.s()
                .to_vec_padded(coord)
                .map_err(error::crypto_backend)?,
        );

        Ok(out)
    }
}

/// An ECDSA verification key
pub struct EcVerifier {
    alg: SigningAlgorithm,
    key: EcKey<Public>,
}

impl fmt::Debug for EcVerifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EcVerifier").field("alg", &self.alg).finish()
    }
}

impl EcVerifier {
    fn from_jwk(alg: &str, key: &Jwk) -> Result<Self, KeyError> {
        let alg = SigningAlgorithm::from_name(alg).ok_or_else(|| {
            KeyError::IncompatibleAlgorithm {
                alg: alg.to_owned(),
            }
        })?;

        check_curve(alg, key)?;

        let group = alg.curve().group();
        let point = public_point(alg, key)?;
        let ec_key = EcKey::from_public_key(group, &point).map_err(error::crypto_backend)?;
        ec_key.check_key().map_err(error::crypto_backend)?;

        Ok(Self { alg, key: ec_key })
    }
}

impl Verifier for EcVerifier {
    fn alg(&self) -> &str {
        self.alg.name()
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), SignatureInvalid> {
        let coord = self.alg.curve().coordinate_size();
        if signature.len() != coord * 2 {
            return Err(error::signature_invalid());
        }

        let r = BigNum::from_slice(&signature[..coord]).map_err(|_| error::signature_invalid())?;
        let s = BigNum::from_slice(&signature[coord..]).map_err(|_| error::signature_invalid())?;
        let sig =
            EcdsaSig::from_private_components(r, s).map_err(|_| error::signature_invalid())?;

        let digest = digest_of(self.alg, data).map_err(|_| error::signature_invalid())?;

        match sig.verify(&digest, &self.key) {
            Ok(true) => Ok(()),
            _ => Err(error::signature_invalid()),
        }
    }
}

/// Builds ECDSA signers and verifiers from `EC` keys
#[derive(Clone, Copy, Debug, Default)]
pub struct Factory;

impl SignerFactory for Factory {
    fn make(
        &self,
        alg: &str,
        kid: Option<&str>,
        key: &Jwk,
    ) -> Result<Box<dyn Signer>, KeyError> {
        Ok(Box::new(EcSigner::from_jwk(alg, kid, key)?))
    }
}

impl VerifierFactory for Factory {
    fn make(
        &self,
        alg: &str,
        _kid: Option<&str>,
        key: &Jwk,
    ) -> Result<Box<dyn Verifier>, KeyError> {
        Ok(Box::new(EcVerifier::from_jwk(alg, key)?))
    }
}
