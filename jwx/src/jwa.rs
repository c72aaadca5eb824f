//! JSON Web Algorithm registry and implementations
//!
//! The registry is a single process-wide table mapping accepted
//! algorithm names to signer and verifier factories. The accept-list is
//! closed: only the twelve HS/RS/ES/PS algorithms are admitted, and
//! `none` is not among them. Registration of a name outside the list is
//! silently ignored; re-registration replaces the previous factory.
//!
//! The global registry is constructed lazily from a compile-time
//! descriptor table, so resolution is safe from the first call without
//! any pre-`main` initialization ceremony.

pub mod ec;
pub mod hmac;
pub mod rsa;

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock},
};

use lazy_static::lazy_static;

use crate::{
    error::{self, CryptoBackend, KeyError, ResolveError, SignatureInvalid},
    jwk::Jwk,
};

/// The closed set of accepted algorithm names
///
/// `none` is not accepted, on either the signing or verifying side.
pub const ACCEPTED: [&str; 12] = [
    "HS256", "HS384", "HS512", "RS256", "RS384", "RS512", "ES256", "ES384", "ES512", "PS256",
    "PS384", "PS512",
];

/// Whether `alg` is in the accept-list
#[must_use]
pub fn is_accepted(alg: &str) -> bool {
    ACCEPTED.contains(&alg)
}

/// Produces signature bytes over a signing input
pub trait Signer: Send + Sync + fmt::Debug {
    /// The JWA name of the algorithm this signer implements
    fn alg(&self) -> &str;

    /// The identifier of the key backing this signer, if any
    fn kid(&self) -> Option<&str>;

    /// The size in bytes of the signatures this signer produces
    fn signature_size(&self) -> usize;

    /// Signs the data, returning the raw signature bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to produce a signature.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoBackend>;
}

/// Checks a signature over a signing input
pub trait Verifier: Send + Sync + fmt::Debug {
    /// The JWA name of the algorithm this verifier implements
    fn alg(&self) -> &str;

    /// Verifies the signature over the data
    ///
    /// # Errors
    ///
    /// Returns an opaque error when the signature does not verify.
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), SignatureInvalid>;
}

/// Constructs [`Signer`]s for a family of algorithms
pub trait SignerFactory: Send + Sync {
    /// Builds a signer for `alg` backed by `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unusable with the algorithm.
    fn make(&self, alg: &str, kid: Option<&str>, key: &Jwk)
        -> Result<Box<dyn Signer>, KeyError>;
}

/// Constructs [`Verifier`]s for a family of algorithms
pub trait VerifierFactory: Send + Sync {
    /// Builds a verifier for `alg` backed by `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unusable with the algorithm.
    fn make(
        &self,
        alg: &str,
        kid: Option<&str>,
        key: &Jwk,
    ) -> Result<Box<dyn Verifier>, KeyError>;
}

/// The process-wide algorithm registry
pub struct Registry {
    signer_facts: RwLock<HashMap<String, Arc<dyn SignerFactory>>>,
    verifier_facts: RwLock<HashMap<String, Arc<dyn VerifierFactory>>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Registry { .. }")
    }
}

impl Registry {
    fn empty() -> Self {
        Self {
            signer_facts: RwLock::new(HashMap::new()),
            verifier_facts: RwLock::new(HashMap::new()),
        }
    }

    fn with_builtin() -> Self {
        let registry = Self::empty();

        for alg in ["HS256", "HS384", "HS512"] {
            registry.register_signer(alg, Arc::new(hmac::Factory));
            registry.register_verifier(alg, Arc::new(hmac::Factory));
        }

        for alg in ["RS256", "RS384", "RS512", "PS256", "PS384", "PS512"] {
            registry.register_signer(alg, Arc::new(rsa::Factory));
            registry.register_verifier(alg, Arc::new(rsa::Factory));
        }

        for alg in ["ES256", "ES384", "ES512"] {
            registry.register_signer(alg, Arc::new(ec::Factory));
            registry.register_verifier(alg, Arc::new(ec::Factory));
        }

        registry
    }

    /// Installs a signer factory for `alg`
    ///
    /// Names outside the accept-list are silently ignored. An existing
    /// factory for the name is replaced and released.
    pub fn register_signer(&self, alg: &str, factory: Arc<dyn SignerFactory>) {
        if !is_accepted(alg) {
            return;
        }
        if let Ok(mut map) = self.signer_facts.write() {
            map.insert(alg.to_owned(), factory);
        }
    }

    /// Installs a verifier factory for `alg`
    ///
    /// Names outside the accept-list are silently ignored. An existing
    /// factory for the name is replaced and released.
    pub fn register_verifier(&self, alg: &str, factory: Arc<dyn VerifierFactory>) {
        if !is_accepted(alg) {
            return;
        }
        if let Ok(mut map) = self.verifier_facts.write() {
            map.insert(alg.to_owned(), factory);
        }
    }

    /// Resolves a signer for `alg` backed by `key`
    ///
    /// # Errors
    ///
    /// Fails with an unknown-algorithm error when no factory is
    /// registered for the name, or with the factory's own error when
    /// the key is unusable.
    pub fn signer(
        &self,
        alg: &str,
        kid: Option<&str>,
        key: &Jwk,
    ) -> Result<Box<dyn Signer>, ResolveError> {
        let factory = self
            .signer_facts
            .read()
            .ok()
            .and_then(|map| map.get(alg).cloned())
            .ok_or_else(|| error::unknown_algorithm(alg))?;

        Ok(factory.make(alg, kid, key)?)
    }

    /// Resolves a verifier for `alg` backed by `key`
    ///
    /// # Errors
    ///
    /// Fails with an unknown-algorithm error when no factory is
    /// registered for the name, or with the factory's own error when
    /// the key is unusable.
    pub fn verifier(
        &self,
        alg: &str,
        kid: Option<&str>,
        key: &Jwk,
    ) -> Result<Box<dyn Verifier>, ResolveError> {
        let factory = self
            .verifier_facts
            .read()
            .ok()
            .and_then(|map| map.get(alg).cloned())
            .ok_or_else(|| error::unknown_algorithm(alg))?;

        Ok(factory.make(alg, kid, key)?)
    }
}

lazy_static! {
    static ref REGISTRY: Registry = Registry::with_builtin();
}

/// The process-wide registry, seeded with the built-in algorithm
/// families on first use
#[must_use]
pub fn registry() -> &'static Registry {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_list_is_closed() {
        assert!(is_accepted("HS256"));
        assert!(is_accepted("PS512"));
        assert!(!is_accepted("none"));
        assert!(!is_accepted("HS1024"));
    }

    #[test]
    fn registering_none_is_ignored() {
        let registry = Registry::with_builtin();
        registry.register_signer("none", Arc::new(hmac::Factory));

        let key = crate::jwk::Jwk::from_json(r#"{"kty":"oct","k":"c2VjcmV0"}"#).unwrap();
        let err = registry.signer("none", None, &key).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownAlgorithm(_)));
    }

    #[test]
    fn unknown_algorithm_is_reported() {
        let key = crate::jwk::Jwk::from_json(r#"{"kty":"oct","k":"c2VjcmV0"}"#).unwrap();
        let err = registry().verifier("XX999", None, &key).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownAlgorithm(_)));
    }

    #[test]
    fn reregistration_replaces_the_factory() {
        let registry = Registry::with_builtin();
        // swapping in the same family twice must not fail or duplicate
        registry.register_verifier("HS256", Arc::new(hmac::Factory));

        let key = crate::jwk::Jwk::from_json(r#"{"kty":"oct","k":"c2VjcmV0"}"#).unwrap();
        assert!(registry.verifier("HS256", None, &key).is_ok());
    }
}
