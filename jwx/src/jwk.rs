//! JSON Web Keys
//!
//! A [`Jwk`] exclusively owns a JSON object holding its RFC 7517
//! members, so (de)serialization is simply a matter of parsing or
//! rendering that object. The typed surface is a set of accessor
//! wrappers over the object. When a key is dropped, the backing object
//! is invalidated, scrubbing every parameter it carried.

mod pem;
mod set;

use std::fmt;

pub use set::JwkSet;

use crate::{
    error::KeyError,
    json::{self, Object, Value},
};

/// A JSON Web Key
///
/// Holds HMAC (`oct`), RSA, or EC key material, in public or private
/// form. Secret parameters are scrubbed on drop.
#[derive(Clone)]
pub struct Jwk {
    props: Object,
}

impl fmt::Debug for Jwk {
    /// Key parameters are never printed; only the identifying members
    /// are shown
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty())
            .field("kid", &self.kid())
            .field("alg", &self.alg())
            .finish_non_exhaustive()
    }
}

impl Jwk {
    /// Inflates a key from RFC 7517 JWK JSON text
    ///
    /// Dispatches on `kty`: `oct` is an HMAC secret, `RSA` and `EC` are
    /// asymmetric pairs whose private form is detected by the presence
    /// of `d`. The legacy alias `ES` is accepted for `EC` and rewritten
    /// to the canonical name.
    ///
    /// # Errors
    ///
    /// Fails when the text is not a JSON object, when `kty` is missing
    /// or unrecognized, or when a required parameter of the declared
    /// type is absent.
    pub fn from_json(text: &str) -> Result<Self, KeyError> {
        Self::from_object(json::parse_object(text)?)
    }

    pub(crate) fn from_object(mut props: Object) -> Result<Self, KeyError> {
        let kty = props
            .get("kty")
            .and_then(Value::as_str)
            .ok_or(KeyError::MissingParameter { name: "kty" })?
            .to_owned();

        match kty.as_str() {
            "oct" => {
                require(&props, "k")?;
            }
            "RSA" => {
                require(&props, "n")?;
                require(&props, "e")?;
            }
            "EC" | "ES" => {
                require(&props, "crv")?;
                require(&props, "x")?;
                require(&props, "y")?;
                let known_curve = props
                    .get("crv")
                    .and_then(Value::as_str)
                    .and_then(crate::jwa::ec::Curve::from_name)
                    .is_some();
                if !known_curve {
                    return Err(KeyError::MissingParameter { name: "crv" });
                }
                if kty == "ES" {
                    props.set("kty", Value::from("EC"))?;
                }
            }
            other => {
                return Err(KeyError::UnknownKeyType {
                    kty: other.to_owned(),
                })
            }
        }

        Ok(Self { props })
    }

    /// Ingests the first recognised key block from PEM text
    ///
    /// `usage`, `alg`, and `kid` are injected into the resulting key.
    ///
    /// # Errors
    ///
    /// Fails when the framing is malformed, when the key parser rejects
    /// a recognised block, or when no recognised block is present.
    pub fn from_pem(
        pem_text: &str,
        usage: Option<&str>,
        alg: Option<&str>,
        kid: Option<&str>,
    ) -> Result<Self, KeyError> {
        pem::parse(pem_text, usage, alg, kid)
    }

    /// The key type (`oct`, `RSA`, or `EC`)
    #[must_use]
    pub fn kty(&self) -> &str {
        self.props.get("kty").and_then(Value::as_str).unwrap_or("")
    }

    /// The key identifier, if any
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.param("kid")
    }

    /// The intended algorithm, if any
    #[must_use]
    pub fn alg(&self) -> Option<&str> {
        self.param("alg")
    }

    /// The intended usage (`sig` or `enc`), if any
    #[must_use]
    pub fn usage(&self) -> Option<&str> {
        self.param("use")
    }

    /// A string-valued member, if present
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.props.get(name).and_then(Value::as_str)
    }

    /// Whether the named member is present
    #[must_use]
    pub fn has_param(&self, name: &str) -> bool {
        self.props.contains(name)
    }

    /// The raw bytes of a base64url-encoded member
    pub(crate) fn param_bytes(&self, name: &'static str) -> Result<Vec<u8>, KeyError> {
        let encoded = self
            .param(name)
            .ok_or(KeyError::MissingParameter { name })?;
        jwx_base64::decode(encoded).map_err(|_| KeyError::MissingParameter { name })
    }

    /// Whether this key carries private or symmetric-secret material
    #[must_use]
    pub fn is_private(&self) -> bool {
        match self.kty() {
            "oct" => true,
            _ => self.has_param("d"),
        }
    }

    /// Derives a key holding only the public parameters
    ///
    /// # Errors
    ///
    /// Fails for symmetric keys, which have no public form.
    pub fn to_public(&self) -> Result<Self, KeyError> {
        let params: &[&str] = match self.kty() {
            "RSA" => &["n", "e"],
            "EC" => &["crv", "x", "y"],
            "oct" => return Err(KeyError::NoPublicForm),
            other => {
                return Err(KeyError::UnknownKeyType {
                    kty: other.to_owned(),
                })
            }
        };

        let mut props = Object::new();
        for name in ["kty", "kid", "alg"] {
            if let Some(value) = self.props.get(name) {
                props.set(name, value.clone())?;
            }
        }
        for name in params {
            if let Some(value) = self.props.get(name) {
                props.set(name, value.clone())?;
            }
        }

        Ok(Self { props })
    }

    /// Renders the key as RFC 7517 JWK JSON
    #[must_use]
    pub fn to_json(&self) -> String {
        self.props.to_json()
    }
}

impl Drop for Jwk {
    fn drop(&mut self) {
        self.props.invalidate();
    }
}

fn require(props: &Object, name: &'static str) -> Result<(), KeyError> {
    match props.get(name) {
        Some(Value::String(_)) => Ok(()),
        _ => Err(KeyError::MissingParameter { name }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_hmac_key() {
        let key = Jwk::from_json(r#"{"kty":"oct","k":"c2VjcmV0","kid":"k1","alg":"HS256"}"#)
            .unwrap();
        assert_eq!(key.kty(), "oct");
        assert_eq!(key.kid(), Some("k1"));
        assert_eq!(key.alg(), Some("HS256"));
        assert!(key.is_private());
        assert_eq!(key.param_bytes("k").unwrap(), b"secret");
    }

    #[test]
    fn detects_private_rsa_by_d() {
        let public = Jwk::from_json(r#"{"kty":"RSA","n":"AQAB","e":"AQAB"}"#).unwrap();
        assert!(!public.is_private());

        let private =
            Jwk::from_json(r#"{"kty":"RSA","n":"AQAB","e":"AQAB","d":"AQAB"}"#).unwrap();
        assert!(private.is_private());
    }

    #[test]
    fn unknown_kty_fails() {
        assert!(matches!(
            Jwk::from_json(r#"{"kty":"OKP","x":"AA"}"#),
            Err(KeyError::UnknownKeyType { .. })
        ));
    }

    #[test]
    fn missing_parameters_fail() {
        assert!(matches!(
            Jwk::from_json(r#"{"kty":"oct"}"#),
            Err(KeyError::MissingParameter { name: "k" })
        ));
        assert!(matches!(
            Jwk::from_json(r#"{"kty":"RSA","n":"AQAB"}"#),
            Err(KeyError::MissingParameter { name: "e" })
        ));
    }

    #[test]
    fn es_alias_is_rewritten_to_ec() {
        let key = Jwk::from_json(r#"{"kty":"ES","crv":"P-256","x":"AQAB","y":"AQAB"}"#).unwrap();
        assert_eq!(key.kty(), "EC");
    }

    #[test]
    fn to_public_strips_private_parameters() {
        let key = Jwk::from_json(
            r#"{"kty":"RSA","kid":"r1","alg":"RS256","n":"AQAB","e":"AQAB","d":"AQAB","p":"AQAB","q":"AQAB"}"#,
        )
        .unwrap();

        let public = key.to_public().unwrap();
        assert_eq!(public.kty(), "RSA");
        assert_eq!(public.kid(), Some("r1"));
        assert_eq!(public.alg(), Some("RS256"));
        assert!(public.has_param("n"));
        assert!(public.has_param("e"));
        assert!(!public.has_param("d"));
        assert!(!public.has_param("p"));
        assert!(!public.is_private());
    }

    #[test]
    fn symmetric_keys_have_no_public_form() {
        let key = Jwk::from_json(r#"{"kty":"oct","k":"c2VjcmV0"}"#).unwrap();
        assert!(matches!(key.to_public(), Err(KeyError::NoPublicForm)));
    }

    #[test]
    fn json_round_trip() {
        let src = r#"{"kty":"oct","k":"c2VjcmV0","kid":"k1"}"#;
        let key = Jwk::from_json(src).unwrap();
        let again = Jwk::from_json(&key.to_json()).unwrap();
        assert_eq!(again.param("k"), Some("c2VjcmV0"));
        assert_eq!(again.kid(), Some("k1"));
    }
}
