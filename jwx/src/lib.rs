//! This crate issues and validates JSON Web Tokens in the compact JWS
//! serialization, implementing:
//!
//! * JSON Web Signature (JWS): [RFC7515][]
//! * JSON Web Key (JWK): [RFC7517][]
//! * JSON Web Algorithms (JWA): [RFC7518][]
//! * JSON Web Token (JWT): [RFC7519][]
//!
//! JSON Web Encryption (JWE), [RFC7516][], is not supported.
//!
//! Everything rests on a bounded JSON core: headers, claim sets, and
//! key parameters are carried by [`json`] values whose parser enforces
//! input-size, depth, and element-count limits, and whose objects
//! support *final* members so that validated claims cannot be
//! overwritten. Key material lives in [`Jwk`] objects that scrub their
//! parameters on drop.
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515
//! [RFC7516]: https://tools.ietf.org/html/rfc7516
//! [RFC7517]: https://tools.ietf.org/html/rfc7517
//! [RFC7518]: https://tools.ietf.org/html/rfc7518
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! # Example
//!
//! ```
//! use jwx::{Claims, Jwk, JwsFactory, JwtFactory};
//! use jwx::jwt::{DurationSecs, TestClock, UnixTime};
//!
//! let key = Jwk::from_json(
//!     r#"{"kty":"oct","k":"c2VjcmV0","alg":"HS256","kid":"demo"}"#,
//! ).unwrap();
//!
//! let jws = JwsFactory::new(key).unwrap();
//! let factory = JwtFactory::with_jws(&jws);
//!
//! let claims = Claims::new();
//! claims.set_issuer("authority").unwrap();
//! claims.add_audience("my_api").unwrap();
//! claims.set_duration(60).unwrap();
//!
//! let clock = TestClock::new(UnixTime(1_700_000_000));
//! let token = factory.sign_with_clock(&claims, &clock).unwrap();
//!
//! let verified = factory
//!     .decode_at(&token, UnixTime(1_700_000_030), DurationSecs(0))
//!     .unwrap();
//! assert_eq!(verified.issuer().unwrap().as_deref(), Some("authority"));
//! assert_eq!(verified.expiration().unwrap(), Some(1_700_000_060));
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod error;
pub mod json;
pub mod jwa;
pub mod jwk;
pub mod jws;
pub mod jwt;

#[doc(inline)]
pub use jwk::{Jwk, JwkSet};
#[doc(inline)]
pub use jws::JwsFactory;
#[doc(inline)]
pub use jwt::{Claims, JwtFactory};
