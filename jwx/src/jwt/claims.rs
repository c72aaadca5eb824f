//! The claims object model

use std::sync::{Mutex, MutexGuard, TryLockError};

use super::{validate_string_or_uri, PROTECTED};
use crate::{
    error::{self, Busy, JwtError},
    json::{Array, Object, Value},
};

/// A set of JWT claims
///
/// Wraps a JSON object together with the relative `duration` and
/// `not_before` intervals applied at mint time. Every access goes
/// through a single-holder, non-blocking lock: a second holder fails
/// immediately with a busy error rather than waiting.
///
/// Once a claims set has passed validation, the registered claim names
/// are final and any further mutation of them fails.
#[derive(Debug, Default)]
pub struct Claims {
    inner: Mutex<ClaimsInner>,
}

#[derive(Clone, Debug, Default)]
struct ClaimsInner {
    props: Object,
    duration: Option<i64>,
    not_before: Option<i64>,
}

impl Claims {
    /// Constructs a new, empty claims set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> Result<MutexGuard<'_, ClaimsInner>, Busy> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock | TryLockError::Poisoned(_)) => Err(error::busy()),
        }
    }

    /// Sets the `iss` claim
    ///
    /// # Errors
    ///
    /// Fails when the value is not a `StringOrURI`, when the claim is
    /// final, or when the lock is held.
    pub fn set_issuer(&self, iss: &str) -> Result<(), JwtError> {
        validate_string_or_uri(iss)?;
        let mut inner = self.guard()?;
        inner.props.set("iss", Value::from(iss))?;
        Ok(())
    }

    /// Sets the `sub` claim
    ///
    /// # Errors
    ///
    /// Fails when the value is not a `StringOrURI`, when the claim is
    /// final, or when the lock is held.
    pub fn set_subject(&self, sub: &str) -> Result<(), JwtError> {
        validate_string_or_uri(sub)?;
        let mut inner = self.guard()?;
        inner.props.set("sub", Value::from(sub))?;
        Ok(())
    }

    /// Appends an audience to the `aud` claim, storing it as an array
    ///
    /// # Errors
    ///
    /// Fails when the value is not a `StringOrURI`, when the claim is
    /// final, or when the lock is held.
    pub fn add_audience(&self, aud: &str) -> Result<(), JwtError> {
        validate_string_or_uri(aud)?;
        let mut inner = self.guard()?;

        let mut list = match inner.props.get("aud") {
            Some(Value::Array(a)) => a.clone(),
            Some(Value::String(s)) => Array::from(vec![Value::from(s.clone())]),
            _ => Array::new(),
        };
        list.push(Value::from(aud));

        inner.props.set("aud", Value::Array(list))?;
        Ok(())
    }

    /// Sets an arbitrary claim
    ///
    /// String values for `iss`, `sub`, and `aud` still pass through the
    /// `StringOrURI` check.
    ///
    /// # Errors
    ///
    /// Fails when the claim is final or when the lock is held.
    pub fn set_claim(&self, name: &str, value: Value) -> Result<(), JwtError> {
        match name {
            "iss" | "sub" => {
                if let Some(s) = value.as_str() {
                    validate_string_or_uri(s)?;
                }
            }
            "aud" => match &value {
                Value::String(s) => validate_string_or_uri(s)?,
                Value::Array(a) => {
                    for elem in a.iter() {
                        if let Some(s) = elem.as_str() {
                            validate_string_or_uri(s)?;
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }

        let mut inner = self.guard()?;
        inner.props.set(name, value)?;
        Ok(())
    }

    /// Sets the validity duration in seconds, applied at mint time as
    /// `exp = iat + duration`
    ///
    /// # Errors
    ///
    /// Fails when the lock is held.
    pub fn set_duration(&self, secs: i64) -> Result<(), JwtError> {
        let mut inner = self.guard()?;
        inner.duration = Some(secs);
        Ok(())
    }

    /// Sets the activation delay in seconds, applied at mint time as
    /// `nbf = iat + not_before`
    ///
    /// # Errors
    ///
    /// Fails when the lock is held.
    pub fn set_not_before(&self, secs: i64) -> Result<(), JwtError> {
        let mut inner = self.guard()?;
        inner.not_before = Some(secs);
        Ok(())
    }

    /// A claim value by name
    ///
    /// # Errors
    ///
    /// Fails when the lock is held.
    pub fn claim(&self, name: &str) -> Result<Option<Value>, Busy> {
        Ok(self.guard()?.props.get(name).cloned())
    }

    /// The `iss` claim
    ///
    /// # Errors
    ///
    /// Fails when the lock is held.
    pub fn issuer(&self) -> Result<Option<String>, Busy> {
        self.string_claim("iss")
    }

    /// The `sub` claim
    ///
    /// # Errors
    ///
    /// Fails when the lock is held.
    pub fn subject(&self) -> Result<Option<String>, Busy> {
        self.string_claim("sub")
    }

    /// The `jti` claim
    ///
    /// # Errors
    ///
    /// Fails when the lock is held.
    pub fn token_id(&self) -> Result<Option<String>, Busy> {
        self.string_claim("jti")
    }

    /// The audiences of the `aud` claim, whether stored as a string or
    /// an array
    ///
    /// # Errors
    ///
    /// Fails when the lock is held.
    pub fn audiences(&self) -> Result<Vec<String>, Busy> {
        let inner = self.guard()?;
        Ok(match inner.props.get("aud") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(a)) => a
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        })
    }

    /// The `iat` claim in seconds since the epoch
    ///
    /// # Errors
    ///
    /// Fails when the lock is held.
    pub fn issued_at(&self) -> Result<Option<i64>, Busy> {
        self.int_claim("iat")
    }

    /// The `nbf` claim in seconds since the epoch
    ///
    /// # Errors
    ///
    /// Fails when the lock is held.
    pub fn not_before(&self) -> Result<Option<i64>, Busy> {
        self.int_claim("nbf")
    }

    /// The `exp` claim in seconds since the epoch
    ///
    /// # Errors
    ///
    /// Fails when the lock is held.
    pub fn expiration(&self) -> Result<Option<i64>, Busy> {
        self.int_claim("exp")
    }

    /// Renders the claims as compact JSON text
    ///
    /// # Errors
    ///
    /// Fails when the lock is held.
    pub fn to_json(&self) -> Result<String, Busy> {
        Ok(self.guard()?.props.to_json())
    }

    fn string_claim(&self, name: &str) -> Result<Option<String>, Busy> {
        let inner = self.guard()?;
        Ok(inner
            .props
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_owned))
    }

    fn int_claim(&self, name: &str) -> Result<Option<i64>, Busy> {
        let inner = self.guard()?;
        Ok(inner.props.get(name).and_then(Value::as_i64))
    }

    /// Snapshots the claim object and mint intervals under the lock
    pub(super) fn snapshot(&self) -> Result<(Object, Option<i64>, Option<i64>), Busy> {
        let inner = self.guard()?;
        Ok((inner.props.clone(), inner.duration, inner.not_before))
    }

    /// Wraps a validated payload, sealing the registered claim names
    pub(super) fn from_validated(mut props: Object) -> Result<Self, JwtError> {
        for name in PROTECTED {
            if props.contains(name) {
                props.make_final(name)?;
            }
        }

        Ok(Self {
            inner: Mutex::new(ClaimsInner {
                props,
                duration: None,
                not_before: None,
            }),
        })
    }
}
