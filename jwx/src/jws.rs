//! Compact JWS serialization: sign and verify
//!
//! A compact token is `b64u(header) "." b64u(payload) "." b64u(sig)`,
//! with exactly two dots and no whitespace. The protected header is a
//! canonical object carrying at least `{typ:"JWT", alg}` and optionally
//! `kid`.
//!
//! Verification collapses every internal failure into the opaque
//! [`SignatureInvalid`] error. The actual cause is logged at `debug`
//! level only, where it cannot serve as an oracle.

use std::fmt::Write as _;

use jwx_base64::Base64Url;
use thiserror::Error;
use tracing::debug;

use crate::{
    error::{self, ResolveError, SignatureInvalid, SigningError},
    json::{self, utf8, Limits, Object, Value},
    jwa,
    jwk::{Jwk, JwkSet},
};

/// Produces and checks compact JWS tokens with a single key
pub struct JwsFactory {
    key: Jwk,
}

impl std::fmt::Debug for JwsFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("JwsFactory").field("key", &self.key).finish()
    }
}

impl JwsFactory {
    /// Constructs a factory around a key
    ///
    /// The key must carry an `alg` member naming an accepted algorithm,
    /// so that signing and verification can resolve an implementation.
    ///
    /// # Errors
    ///
    /// Fails when `alg` is absent or not in the accept-list.
    pub fn new(key: Jwk) -> Result<Self, ResolveError> {
        let alg = key
            .alg()
            .ok_or(error::KeyError::MissingParameter { name: "alg" })
            .map_err(ResolveError::from)?;

        if !jwa::is_accepted(alg) {
            return Err(error::unknown_algorithm(alg).into());
        }

        Ok(Self { key })
    }

    /// The key backing this factory
    #[must_use]
    pub fn key(&self) -> &Jwk {
        &self.key
    }

    /// Signs payload bytes into a compact token
    ///
    /// # Errors
    ///
    /// Fails when no signer can be resolved for the key or when the
    /// backend refuses to sign.
    pub fn sign(&self, payload: &[u8]) -> Result<String, SigningError> {
        let alg = self
            .key
            .alg()
            .ok_or(error::KeyError::MissingParameter { name: "alg" })
            .map_err(ResolveError::from)?;

        let mut jose = Object::new();
        jose.set_final("typ", Value::from("JWT"))?;
        jose.set_final("alg", Value::from(alg))?;
        if let Some(kid) = self.key.kid() {
            jose.set_final("kid", Value::from(kid))?;
        }

        let signer = jwa::registry().signer(alg, self.key.kid(), &self.key)?;
        sign_compact(&jose, payload, signer.as_ref())
    }

    /// Verifies a compact token and returns the decoded payload bytes
    ///
    /// # Errors
    ///
    /// Fails with the opaque [`SignatureInvalid`] error, whatever the
    /// internal cause.
    pub fn verify(&self, token: &str) -> Result<Vec<u8>, SignatureInvalid> {
        verify_compact(token, |alg, kid| {
            if let (Some(header_kid), Some(key_kid)) = (kid, self.key.kid()) {
                if header_kid != key_kid {
                    return Err(error::signature_invalid());
                }
            }

            if let Some(key_alg) = self.key.alg() {
                if key_alg != alg {
                    return Err(error::signature_invalid());
                }
            }

            jwa::registry()
                .verifier(alg, kid, &self.key)
                .map_err(|_| error::signature_invalid())
        })
    }
}

/// Signs payload bytes under the given protected header
///
/// # Errors
///
/// Fails when the backend refuses to sign.
pub fn sign_compact(
    jose: &Object,
    payload: &[u8],
    signer: &dyn jwa::Signer,
) -> Result<String, SigningError> {
    let h_raw = Base64Url::from_raw(jose.to_json().into_bytes());
    let p_raw = Base64Url::from_raw(payload);

    let expected_len = h_raw.encoded_len()
        + p_raw.encoded_len()
        + jwx_base64::calc_encoded_len(signer.signature_size())
        + 2;

    let mut message = String::with_capacity(expected_len);
    write!(message, "{h_raw}.{p_raw}").expect("writes to strings never fail");

    let s = Base64Url::from_raw(signer.sign(message.as_bytes())?);

    write!(message, ".{s}").expect("writes to strings never fail");

    debug_assert_eq!(message.len(), expected_len);

    Ok(message)
}

/// Verifies a compact token, resolving a verifier through `resolve`
///
/// `resolve` receives the header's `alg` and optional `kid` once they
/// have passed the accept-list gate.
///
/// # Errors
///
/// Fails with the opaque [`SignatureInvalid`] error, whatever the
/// internal cause.
pub fn verify_compact<F>(token: &str, resolve: F) -> Result<Vec<u8>, SignatureInvalid>
where
    F: FnOnce(&str, Option<&str>) -> Result<Box<dyn jwa::Verifier>, SignatureInvalid>,
{
    match verify_inner(token, resolve) {
        Ok(payload) => Ok(payload),
        Err(cause) => {
            debug!(%cause, "JWS verification failed");
            Err(error::signature_invalid())
        }
    }
}

/// Verifies a compact token against a key set
///
/// The header's `kid` selects the key; a token without one is checked
/// against the first key whose own `alg` does not contradict the
/// header.
///
/// # Errors
///
/// Fails with the opaque [`SignatureInvalid`] error, whatever the
/// internal cause.
pub fn verify_with_key_set(token: &str, keys: &JwkSet) -> Result<Vec<u8>, SignatureInvalid> {
    verify_compact(token, |alg, kid| {
        let key = match kid {
            Some(kid) => keys.get_key(kid),
            None => keys
                .iter()
                .find(|k| k.alg().map_or(true, |key_alg| key_alg == alg)),
        }
        .ok_or_else(error::signature_invalid)?;

        jwa::registry()
            .verifier(alg, kid, key)
            .map_err(|_| error::signature_invalid())
    })
}

#[derive(Debug, Error)]
enum VerifyCause {
    #[error("token does not have exactly three segments")]
    Segments,

    #[error("header segment is not decodable")]
    Header,

    #[error("header names an unacceptable algorithm")]
    Algorithm,

    #[error("no verifier could be resolved")]
    Resolver,

    #[error("signature segment is not decodable")]
    Signature,

    #[error("signature does not verify")]
    Mismatch,

    #[error("payload segment is not decodable")]
    Payload,
}

fn verify_inner<F>(token: &str, resolve: F) -> Result<Vec<u8>, VerifyCause>
where
    F: FnOnce(&str, Option<&str>) -> Result<Box<dyn jwa::Verifier>, SignatureInvalid>,
{
    let mut segments = token.split('.');
    let (h_b64, p_b64, s_b64) = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(VerifyCause::Segments),
    };

    let header_bytes = Base64Url::from_encoded(h_b64).map_err(|_| VerifyCause::Header)?;
    let header_text = utf8::validate(header_bytes.as_slice()).map_err(|_| VerifyCause::Header)?;
    let jose = json::parse_object_with_limits(header_text, &Limits::default())
        .map_err(|_| VerifyCause::Header)?;

    let alg = jose
        .get("alg")
        .and_then(Value::as_str)
        .ok_or(VerifyCause::Algorithm)?;

    if alg == "none" || !jwa::is_accepted(alg) {
        return Err(VerifyCause::Algorithm);
    }

    let kid = jose.get("kid").and_then(Value::as_str);
    let verifier = resolve(alg, kid).map_err(|_| VerifyCause::Resolver)?;

    let signature = Base64Url::from_encoded(s_b64).map_err(|_| VerifyCause::Signature)?;

    // the signing input is the first two raw segments joined by '.'
    let message = &token[..h_b64.len() + 1 + p_b64.len()];

    verifier
        .verify(message.as_bytes(), signature.as_slice())
        .map_err(|_| VerifyCause::Mismatch)?;

    Ok(Base64Url::from_encoded(p_b64)
        .map_err(|_| VerifyCause::Payload)?
        .into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hmac_factory() -> JwsFactory {
        let key = Jwk::from_json(r#"{"kty":"oct","k":"c2VjcmV0","alg":"HS256","kid":"k1"}"#)
            .unwrap();
        JwsFactory::new(key).unwrap()
    }

    #[test]
    fn sign_produces_three_segments() {
        let factory = hmac_factory();
        let token = factory.sign(b"{\"a\":1}").unwrap();
        assert_eq!(token.matches('.').count(), 2);
        assert!(!token.contains(char::is_whitespace));
    }

    #[test]
    fn header_is_canonical() {
        let factory = hmac_factory();
        let token = factory.sign(b"{}").unwrap();
        let h_b64 = token.split('.').next().unwrap();
        let header = jwx_base64::decode(h_b64).unwrap();
        assert_eq!(
            String::from_utf8(header).unwrap(),
            r#"{"typ":"JWT","alg":"HS256","kid":"k1"}"#
        );
    }

    #[test]
    fn verify_round_trip() {
        let factory = hmac_factory();
        let token = factory.sign(b"payload bytes").unwrap();
        let payload = factory.verify(&token).unwrap();
        assert_eq!(payload, b"payload bytes");
    }

    #[test]
    fn tampered_payload_fails_opaquely() {
        let factory = hmac_factory();
        let token = factory.sign(b"{\"n\":1}").unwrap();

        let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
        let mut payload = parts[1].clone().into_bytes();
        let last = payload.len() - 1;
        payload[last] = if payload[last] == b'A' { b'B' } else { b'A' };
        parts[1] = String::from_utf8(payload).unwrap();

        let err = factory.verify(&parts.join(".")).unwrap_err();
        assert_eq!(err, error::signature_invalid());
    }

    #[test]
    fn none_algorithm_is_refused() {
        let factory = hmac_factory();
        let token = factory.sign(b"{}").unwrap();
        let payload = token.split('.').nth(1).unwrap();

        let header = jwx_base64::encode(br#"{"alg":"none","typ":"JWT"}"#);
        let forged = format!("{header}.{payload}.");
        assert!(factory.verify(&forged).is_err());

        let forged_no_sig = format!("{header}.{payload}");
        assert!(factory.verify(&forged_no_sig).is_err());
    }

    #[test]
    fn wrong_segment_count_is_refused() {
        let factory = hmac_factory();
        assert!(factory.verify("onlyonesegment").is_err());
        assert!(factory.verify("a.b").is_err());
        assert!(factory.verify("a.b.c.d").is_err());
    }

    #[test]
    fn alien_kid_is_refused() {
        let factory = hmac_factory();
        let token = factory.sign(b"{}").unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let header = jwx_base64::encode(br#"{"typ":"JWT","alg":"HS256","kid":"other"}"#);
        let forged = format!("{header}.{}.{}", parts[1], parts[2]);
        assert!(factory.verify(&forged).is_err());
    }

    #[test]
    fn algorithm_substitution_is_refused() {
        // a token re-labelled HS384 must not verify against an HS256 key
        let factory = hmac_factory();
        let token = factory.sign(b"{}").unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let header = jwx_base64::encode(br#"{"typ":"JWT","alg":"HS384","kid":"k1"}"#);
        let forged = format!("{header}.{}.{}", parts[1], parts[2]);
        assert!(factory.verify(&forged).is_err());
    }

    #[test]
    fn key_set_resolution_by_kid() {
        let factory = hmac_factory();
        let token = factory.sign(b"data").unwrap();

        let mut keys = JwkSet::new();
        keys.add(
            Jwk::from_json(r#"{"kty":"oct","k":"b3RoZXI","alg":"HS256","kid":"k0"}"#).unwrap(),
        );
        keys.add(
            Jwk::from_json(r#"{"kty":"oct","k":"c2VjcmV0","alg":"HS256","kid":"k1"}"#).unwrap(),
        );

        let payload = verify_with_key_set(&token, &keys).unwrap();
        assert_eq!(payload, b"data");
    }

    #[test]
    fn key_set_without_match_fails() {
        let factory = hmac_factory();
        let token = factory.sign(b"data").unwrap();

        let mut keys = JwkSet::new();
        keys.add(
            Jwk::from_json(r#"{"kty":"oct","k":"b3RoZXI","alg":"HS256","kid":"k0"}"#).unwrap(),
        );

        assert!(verify_with_key_set(&token, &keys).is_err());
    }

    #[test]
    fn factory_requires_an_accepted_algorithm() {
        let no_alg = Jwk::from_json(r#"{"kty":"oct","k":"c2VjcmV0"}"#).unwrap();
        assert!(JwsFactory::new(no_alg).is_err());

        let bad_alg = Jwk::from_json(r#"{"kty":"oct","k":"c2VjcmV0","alg":"none"}"#).unwrap();
        assert!(JwsFactory::new(bad_alg).is_err());
    }
}
