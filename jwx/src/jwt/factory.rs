//! The token factory

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Mutex, MutexGuard, TryLockError,
};

use jwx_clock::{Clock, DurationSecs, System, UnixTime};
use lazy_static::lazy_static;

use super::{claims::Claims, validate_string_or_uri};
use crate::{
    error::{self, Busy, JwtError},
    json::{self, utf8, Array, Object, Value},
    jws::JwsFactory,
};

/// Mints and decodes JWTs
///
/// The factory holds issuance defaults (`iss`, `sub`, audiences,
/// `duration`, `not_before`, and the default clock skew) and an
/// optional reference to the JWS factory that signs and verifies the
/// compact form. Without one, the factory operates in
/// unsigned/unverified mode: minting fails, and decoding skips
/// signature verification while still applying full claims validation.
///
/// A factory can be [`lock`][JwtFactory::lock]ed, after which every
/// setter fails; the transition is one-way.
#[derive(Debug)]
pub struct JwtFactory<'a> {
    jws: Option<&'a JwsFactory>,
    defaults: Mutex<Defaults>,
    sealed: AtomicBool,
}

#[derive(Clone, Debug, Default)]
struct Defaults {
    iss: Option<String>,
    sub: Option<String>,
    aud: Vec<String>,
    duration: Option<i64>,
    not_before: Option<i64>,
    dflt_skew: i64,
}

impl JwtFactory<'static> {
    /// Constructs a factory in unsigned/unverified mode
    #[must_use]
    pub fn unsigned() -> Self {
        Self {
            jws: None,
            defaults: Mutex::new(Defaults::default()),
            sealed: AtomicBool::new(false),
        }
    }
}

impl Default for JwtFactory<'static> {
    fn default() -> Self {
        Self::unsigned()
    }
}

impl<'a> JwtFactory<'a> {
    /// Constructs a factory that signs and verifies through `jws`
    ///
    /// The reference is non-owning: the JWS factory must outlive this
    /// one.
    #[must_use]
    pub fn with_jws(jws: &'a JwsFactory) -> Self {
        Self {
            jws: Some(jws),
            defaults: Mutex::new(Defaults::default()),
            sealed: AtomicBool::new(false),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, Defaults>, Busy> {
        match self.defaults.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock | TryLockError::Poisoned(_)) => Err(error::busy()),
        }
    }

    fn guard_mut(&self) -> Result<MutexGuard<'_, Defaults>, JwtError> {
        if self.is_locked() {
            return Err(JwtError::Locked);
        }
        Ok(self.guard()?)
    }

    /// Sets the default `iss` claim; decode requires tokens carrying an
    /// issuer to match it
    ///
    /// # Errors
    ///
    /// Fails when the value is not a `StringOrURI`, after the factory
    /// is locked, or when the lock is held.
    pub fn set_issuer(&self, iss: &str) -> Result<(), JwtError> {
        validate_string_or_uri(iss)?;
        self.guard_mut()?.iss = Some(iss.to_owned());
        Ok(())
    }

    /// Sets the default `sub` claim; decode requires tokens carrying a
    /// subject to match it
    ///
    /// # Errors
    ///
    /// Fails when the value is not a `StringOrURI`, after the factory
    /// is locked, or when the lock is held.
    pub fn set_subject(&self, sub: &str) -> Result<(), JwtError> {
        validate_string_or_uri(sub)?;
        self.guard_mut()?.sub = Some(sub.to_owned());
        Ok(())
    }

    /// Appends a required audience; decode requires a non-empty
    /// intersection with the token's audiences
    ///
    /// # Errors
    ///
    /// Fails when the value is not a `StringOrURI`, after the factory
    /// is locked, or when the lock is held.
    pub fn add_audience(&self, aud: &str) -> Result<(), JwtError> {
        validate_string_or_uri(aud)?;
        self.guard_mut()?.aud.push(aud.to_owned());
        Ok(())
    }

    /// Sets the default validity duration in seconds
    ///
    /// # Errors
    ///
    /// Fails after the factory is locked or when the lock is held.
    pub fn set_duration(&self, secs: i64) -> Result<(), JwtError> {
        self.guard_mut()?.duration = Some(secs);
        Ok(())
    }

    /// Sets the default activation delay in seconds
    ///
    /// # Errors
    ///
    /// Fails after the factory is locked or when the lock is held.
    pub fn set_not_before(&self, secs: i64) -> Result<(), JwtError> {
        self.guard_mut()?.not_before = Some(secs);
        Ok(())
    }

    /// Sets the default clock-skew adjustment applied by
    /// [`decode`][Self::decode]
    ///
    /// # Errors
    ///
    /// Fails when the value is outside `0..=3600` seconds, after the
    /// factory is locked, or when the lock is held.
    pub fn set_default_skew(&self, secs: i64) -> Result<(), JwtError> {
        if !(0..=3600).contains(&secs) {
            return Err(JwtError::SkewOutOfRange { skew: secs });
        }
        self.guard_mut()?.dflt_skew = secs;
        Ok(())
    }

    /// Forbids all further configuration; one-way
    pub fn lock(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    /// Whether the factory has been locked
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Mints a signed token from the claims, stamping the registered
    /// members under the system clock
    ///
    /// # Errors
    ///
    /// Fails in unsigned mode, when a stamped member conflicts with a
    /// final one, or when signing fails.
    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        self.sign_with_clock(claims, &System)
    }

    /// Mints a signed token from the claims under the given clock
    ///
    /// Factory defaults are overlaid with the claims; the registered
    /// members are then installed as final in the order `iss`, `sub`,
    /// `aud`, `jti`, `iat`, `nbf`, `exp`. `nbf` and `exp` are produced
    /// only when an activation delay or duration was configured.
    ///
    /// # Errors
    ///
    /// Fails in unsigned mode, when a stamped member conflicts with a
    /// final one, or when signing fails.
    pub fn sign_with_clock<C: Clock>(&self, claims: &Claims, clock: &C) -> Result<String, JwtError> {
        let jws = self.jws.ok_or(JwtError::Unsigned)?;

        let (mut payload, c_duration, c_not_before) = claims.snapshot()?;
        let defaults = self.guard()?.clone();

        let now = clock.now().0;

        let iss = payload
            .get("iss")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .or(defaults.iss);
        if let Some(iss) = iss {
            payload.set_final("iss", Value::from(iss))?;
        }

        let sub = payload
            .get("sub")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .or(defaults.sub);
        if let Some(sub) = sub {
            payload.set_final("sub", Value::from(sub))?;
        }

        let aud = match payload.get("aud") {
            Some(Value::Array(a)) => a.clone(),
            Some(Value::String(s)) => Array::from(vec![Value::from(s.clone())]),
            _ => Array::from(
                defaults
                    .aud
                    .iter()
                    .map(|a| Value::from(a.as_str()))
                    .collect::<Vec<_>>(),
            ),
        };
        if !aud.is_empty() {
            payload.set_final("aud", Value::Array(aud))?;
        }

        payload.set_final("jti", Value::from(make_id()))?;
        payload.set_final("iat", Value::Integer(now))?;

        if let Some(delay) = c_not_before.or(defaults.not_before) {
            payload.set_final("nbf", Value::Integer(now.saturating_add(delay)))?;
        }

        if let Some(duration) = c_duration.or(defaults.duration) {
            payload.set_final("exp", Value::Integer(now.saturating_add(duration)))?;
        }

        Ok(jws.sign(payload.to_json().as_bytes())?)
    }

    /// Decodes and validates a token at the current system time, using
    /// the factory's default skew
    ///
    /// # Errors
    ///
    /// Fails as [`decode_at`][Self::decode_at] does.
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let skew = self.guard()?.dflt_skew;
        self.decode_at(token, System.now(), DurationSecs(skew))
    }

    /// Decodes and validates a token at `cur_time` with the given skew
    ///
    /// The signature is verified first (unless the factory operates in
    /// unverified mode), then the payload is parsed and checked: `nbf`,
    /// `exp`, and `iat` against the skewed current time, and issuer,
    /// subject, and audiences against the factory's requirements. The
    /// registered claims of the returned set are final.
    ///
    /// # Errors
    ///
    /// Signature problems surface as the opaque signature error;
    /// temporal and identity failures keep their distinct kinds.
    pub fn decode_at(
        &self,
        token: &str,
        cur_time: UnixTime,
        skew: DurationSecs,
    ) -> Result<Claims, JwtError> {
        let payload_bytes = match self.jws {
            Some(jws) => jws.verify(token)?,
            None => unverified_payload(token)?,
        };

        let text = utf8::validate(&payload_bytes)?;
        let props = json::parse_object(text)?;

        for name in ["iss", "sub"] {
            if let Some(s) = props.get(name).and_then(Value::as_str) {
                validate_string_or_uri(s)?;
            }
        }
        match props.get("aud") {
            Some(Value::String(s)) => validate_string_or_uri(s)?,
            Some(Value::Array(list)) => {
                for elem in list.iter() {
                    if let Some(s) = elem.as_str() {
                        validate_string_or_uri(s)?;
                    }
                }
            }
            _ => {}
        }

        let cur = cur_time.0;
        let skew = skew.0;

        if let Some(nbf) = int_claim(&props, "nbf")? {
            if cur.saturating_add(skew) < nbf {
                return Err(JwtError::NotYetValid);
            }
        }

        if let Some(exp) = int_claim(&props, "exp")? {
            if cur.saturating_sub(skew) >= exp {
                return Err(JwtError::Expired);
            }
        }

        if let Some(iat) = int_claim(&props, "iat")? {
            if iat > cur.saturating_add(skew) {
                return Err(JwtError::IssuedInFuture);
            }
        }

        let defaults = self.guard()?.clone();

        if let Some(required) = &defaults.iss {
            if let Some(iss) = props.get("iss").and_then(Value::as_str) {
                if iss != required {
                    return Err(JwtError::IssuerMismatch);
                }
            }
        }

        if let Some(required) = &defaults.sub {
            if let Some(sub) = props.get("sub").and_then(Value::as_str) {
                if sub != required {
                    return Err(JwtError::SubjectMismatch);
                }
            }
        }

        if !defaults.aud.is_empty() {
            let token_auds: Vec<&str> = match props.get("aud") {
                Some(Value::String(s)) => vec![s.as_str()],
                Some(Value::Array(list)) => list.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };

            let intersects = token_auds
                .iter()
                .any(|t| defaults.aud.iter().any(|required| required == t));
            if !intersects {
                return Err(JwtError::AudienceMismatch);
            }
        }

        Claims::from_validated(props)
    }
}

fn int_claim(props: &Object, name: &'static str) -> Result<Option<i64>, JwtError> {
    match props.get(name) {
        None => Ok(None),
        Some(Value::Integer(i)) => Ok(Some(*i)),
        Some(_) => Err(json::Error::TypeMismatch {
            expected: "an integer number of seconds",
        }
        .into()),
    }
}

fn unverified_payload(token: &str) -> Result<Vec<u8>, JwtError> {
    let mut segments = token.split('.');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(_), Some(payload), Some(_), None) => {
            jwx_base64::decode(payload).map_err(|_| error::signature_invalid().into())
        }
        _ => Err(error::signature_invalid().into()),
    }
}

static JTI_COUNTER: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref PROCESS_TAG: String = process_tag();
}

fn process_tag() -> String {
    use ring::rand::SecureRandom;

    let mut buf = [0u8; 9];
    if ring::rand::SystemRandom::new().fill(&mut buf).is_err() {
        // degraded mode: still stable for the life of this process
        buf[..4].copy_from_slice(&std::process::id().to_be_bytes());
    }

    jwx_base64::encode(buf)
}

fn make_id() -> String {
    let seq = JTI_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{seq:x}", *PROCESS_TAG)
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use jwx_clock::TestClock;

    use super::*;
    use crate::jwk::Jwk;

    fn hmac_jws() -> JwsFactory {
        let key = Jwk::from_json(r#"{"kty":"oct","k":"c2VjcmV0","alg":"HS256","kid":"k1"}"#)
            .unwrap();
        JwsFactory::new(key).unwrap()
    }

    fn sample_claims() -> Claims {
        let claims = Claims::new();
        claims.set_issuer("a").unwrap();
        claims.set_subject("b").unwrap();
        claims.add_audience("c").unwrap();
        claims.set_duration(60).unwrap();
        claims
    }

    #[test]
    fn hmac_round_trip() -> Result<()> {
        let jws = hmac_jws();
        let factory = JwtFactory::with_jws(&jws);
        let clock = TestClock::new(UnixTime(1_700_000_000));

        let token = factory.sign_with_clock(&sample_claims(), &clock)?;
        assert_eq!(token.matches('.').count(), 2);

        let decoded = factory.decode_at(&token, UnixTime(1_700_000_030), DurationSecs(0))?;
        assert_eq!(decoded.issuer()?.as_deref(), Some("a"));
        assert_eq!(decoded.subject()?.as_deref(), Some("b"));
        assert_eq!(decoded.audiences()?, ["c"]);
        assert_eq!(decoded.issued_at()?, Some(1_700_000_000));
        assert_eq!(decoded.expiration()?, Some(1_700_000_060));
        assert!(decoded.token_id()?.is_some());

        Ok(())
    }

    #[test]
    fn expiry_honors_skew() {
        let jws = hmac_jws();
        let factory = JwtFactory::with_jws(&jws);
        let clock = TestClock::new(UnixTime(1_700_000_000));
        let token = factory.sign_with_clock(&sample_claims(), &clock).unwrap();

        let err = factory
            .decode_at(&token, UnixTime(1_700_000_061), DurationSecs(0))
            .unwrap_err();
        assert!(matches!(err, JwtError::Expired));

        factory
            .decode_at(&token, UnixTime(1_700_000_061), DurationSecs(5))
            .unwrap();
    }

    #[test]
    fn tampered_payload_is_a_signature_failure() {
        let jws = hmac_jws();
        let factory = JwtFactory::with_jws(&jws);
        let clock = TestClock::new(UnixTime(1_700_000_000));
        let token = factory.sign_with_clock(&sample_claims(), &clock).unwrap();

        let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
        let mut payload = parts[1].clone().into_bytes();
        let last = payload.len() - 1;
        payload[last] = if payload[last] == b'A' { b'B' } else { b'A' };
        parts[1] = String::from_utf8(payload).unwrap();

        let err = factory
            .decode_at(&parts.join("."), UnixTime(1_700_000_030), DurationSecs(0))
            .unwrap_err();
        assert!(matches!(err, JwtError::Signature(_)));
    }

    #[test]
    fn algorithm_downgrade_never_succeeds() {
        let jws = hmac_jws();
        let factory = JwtFactory::with_jws(&jws);
        let clock = TestClock::new(UnixTime(1_700_000_000));
        let token = factory.sign_with_clock(&sample_claims(), &clock).unwrap();
        let payload = token.split('.').nth(1).unwrap();

        let header = jwx_base64::encode(br#"{"alg":"none","typ":"JWT"}"#);
        let forged = format!("{header}.{payload}.");

        let err = factory
            .decode_at(&forged, UnixTime(1_700_000_030), DurationSecs(0))
            .unwrap_err();
        assert!(matches!(err, JwtError::Signature(_)));
    }

    #[test]
    fn not_before_gates_activation() {
        let jws = hmac_jws();
        let factory = JwtFactory::with_jws(&jws);
        let clock = TestClock::new(UnixTime(1_000));

        let claims = Claims::new();
        claims.set_not_before(30).unwrap();
        let token = factory.sign_with_clock(&claims, &clock).unwrap();

        let err = factory
            .decode_at(&token, UnixTime(1_010), DurationSecs(0))
            .unwrap_err();
        assert!(matches!(err, JwtError::NotYetValid));

        factory
            .decode_at(&token, UnixTime(1_010), DurationSecs(25))
            .unwrap();
        factory
            .decode_at(&token, UnixTime(1_031), DurationSecs(0))
            .unwrap();
    }

    #[test]
    fn future_issuance_is_rejected() {
        let jws = hmac_jws();
        let factory = JwtFactory::with_jws(&jws);
        let clock = TestClock::new(UnixTime(2_000));
        let token = factory.sign_with_clock(&Claims::new(), &clock).unwrap();

        let err = factory
            .decode_at(&token, UnixTime(1_000), DurationSecs(0))
            .unwrap_err();
        assert!(matches!(err, JwtError::IssuedInFuture));

        factory
            .decode_at(&token, UnixTime(1_000), DurationSecs(1_000))
            .unwrap();
    }

    #[test]
    fn factory_defaults_overlay_user_claims() -> Result<()> {
        let jws = hmac_jws();
        let factory = JwtFactory::with_jws(&jws);
        factory.set_issuer("default-iss")?;
        factory.set_duration(120)?;

        let clock = TestClock::new(UnixTime(50_000));

        // claims without an issuer pick up the default
        let token = factory.sign_with_clock(&Claims::new(), &clock)?;
        let decoded = factory.decode_at(&token, UnixTime(50_001), DurationSecs(0))?;
        assert_eq!(decoded.issuer()?.as_deref(), Some("default-iss"));
        assert_eq!(decoded.expiration()?, Some(50_120));

        // claims carrying their own issuer are not overridden, but then
        // fail the decode-side issuer requirement
        let claims = Claims::new();
        claims.set_issuer("someone-else")?;
        let token = factory.sign_with_clock(&claims, &clock)?;
        let err = factory
            .decode_at(&token, UnixTime(50_001), DurationSecs(0))
            .unwrap_err();
        assert!(matches!(err, JwtError::IssuerMismatch));

        Ok(())
    }

    #[test]
    fn audience_intersection_is_required() {
        let jws = hmac_jws();
        let factory = JwtFactory::with_jws(&jws);
        factory.add_audience("api").unwrap();

        let clock = TestClock::new(UnixTime(1_000));

        let claims = Claims::new();
        claims.add_audience("other").unwrap();
        let token = factory.sign_with_clock(&claims, &clock).unwrap();
        let err = factory
            .decode_at(&token, UnixTime(1_001), DurationSecs(0))
            .unwrap_err();
        assert!(matches!(err, JwtError::AudienceMismatch));

        let claims = Claims::new();
        claims.add_audience("other").unwrap();
        claims.add_audience("api").unwrap();
        let token = factory.sign_with_clock(&claims, &clock).unwrap();
        factory
            .decode_at(&token, UnixTime(1_001), DurationSecs(0))
            .unwrap();
    }

    #[test]
    fn decoded_claims_are_sealed() {
        let jws = hmac_jws();
        let factory = JwtFactory::with_jws(&jws);
        let clock = TestClock::new(UnixTime(1_700_000_000));
        let token = factory.sign_with_clock(&sample_claims(), &clock).unwrap();

        let decoded = factory
            .decode_at(&token, UnixTime(1_700_000_001), DurationSecs(0))
            .unwrap();
        assert!(decoded.set_issuer("mallory").is_err());
    }

    #[test]
    fn jti_is_unique_per_mint() {
        let jws = hmac_jws();
        let factory = JwtFactory::with_jws(&jws);
        let clock = TestClock::new(UnixTime(1_000));

        let a = factory.sign_with_clock(&Claims::new(), &clock).unwrap();
        let b = factory.sign_with_clock(&Claims::new(), &clock).unwrap();

        let ca = factory
            .decode_at(&a, UnixTime(1_001), DurationSecs(0))
            .unwrap();
        let cb = factory
            .decode_at(&b, UnixTime(1_001), DurationSecs(0))
            .unwrap();
        assert_ne!(ca.token_id().unwrap(), cb.token_id().unwrap());
    }

    #[test]
    fn locked_factory_rejects_configuration() {
        let jws = hmac_jws();
        let factory = JwtFactory::with_jws(&jws);
        factory.lock();

        assert!(matches!(factory.set_issuer("a"), Err(JwtError::Locked)));
        assert!(matches!(factory.set_duration(10), Err(JwtError::Locked)));
        assert!(matches!(factory.add_audience("x"), Err(JwtError::Locked)));
        assert!(factory.is_locked());
    }

    #[test]
    fn skew_adjustment_is_bounded() {
        let factory = JwtFactory::unsigned();
        assert!(matches!(
            factory.set_default_skew(-1),
            Err(JwtError::SkewOutOfRange { .. })
        ));
        assert!(matches!(
            factory.set_default_skew(3_601),
            Err(JwtError::SkewOutOfRange { .. })
        ));
        factory.set_default_skew(30).unwrap();
    }

    #[test]
    fn unsigned_mode_cannot_mint() {
        let factory = JwtFactory::unsigned();
        assert!(matches!(
            factory.sign(&Claims::new()),
            Err(JwtError::Unsigned)
        ));
    }

    #[test]
    fn unverified_mode_still_validates_claims() {
        let jws = hmac_jws();
        let signing = JwtFactory::with_jws(&jws);
        let clock = TestClock::new(UnixTime(1_000));
        let token = signing.sign_with_clock(&sample_claims(), &clock).unwrap();

        let inspector = JwtFactory::unsigned();
        let decoded = inspector
            .decode_at(&token, UnixTime(1_001), DurationSecs(0))
            .unwrap();
        assert_eq!(decoded.issuer().unwrap().as_deref(), Some("a"));

        let err = inspector
            .decode_at(&token, UnixTime(2_000), DurationSecs(0))
            .unwrap_err();
        assert!(matches!(err, JwtError::Expired));
    }

    #[test]
    fn non_integer_temporal_claims_are_rejected() {
        let props = json::parse_object(r#"{"exp":"soon"}"#).unwrap();
        assert!(matches!(
            int_claim(&props, "exp"),
            Err(JwtError::Json(json::Error::TypeMismatch { .. }))
        ));
    }
}
