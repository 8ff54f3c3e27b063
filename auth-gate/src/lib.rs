//! # auth-gate
//!
//! Bearer-token authentication and permission-based authorization for HTTP
//! operations.
//!
//! ## Components
//!
//! - **Extractor:** Pulls the bearer token out of the `Authorization` header.
//! - **Key source:** Fetches and caches the identity provider's published RSA signing keys.
//! - **Verifier:** Checks the token signature and its issuer, audience and lifetime claims.
//! - **Enforcer:** Matches the verified permissions against the one an operation requires.
//! - **Gate:** Runs the steps above in order and maps failures to HTTP denials.

pub mod enforcer;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod key_source;
pub mod settings;
pub mod verifier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use enforcer::authorize;
pub use error::{AuthErrorKind, Denial, KeySourceError, SettingsError};
pub use extractor::{extract, BearerToken};
pub use gate::{AuthorizationGate, AuthorizationOutcome};
pub use jsonwebtoken::Algorithm;
pub use key_source::{HttpJwksFetcher, JwksFetcher, KeySet, KeySource, SigningKey};
pub use settings::{parse_algorithm, GateSettings};
pub use verifier::{Claims, TokenVerifier};
