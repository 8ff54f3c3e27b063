//! Signature and claims verification of bearer tokens.

use crate::error::AuthErrorKind;
use crate::extractor::BearerToken;
use crate::key_source::KeySource;
use crate::settings::GateSettings;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Verified token payload.
///
/// Only produced by [`TokenVerifier::verify`] once signature, expiry, issuer
/// and audience have all been checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub issuer: String,
    pub audience: Vec<String>,
    pub subject: Option<String>,
    pub expires_at: i64,
    pub not_before: Option<i64>,
    pub issued_at: Option<i64>,
    pub permissions: Vec<String>,
    /// Any other payload fields (`azp`, `scope`, ...)
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Exact string membership, no wildcards or hierarchy.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|granted| granted == permission)
    }
}

#[derive(Debug, Deserialize)]
struct TokenHeader {
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    kid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::Single(aud) => vec![aud],
            Self::Many(auds) => auds,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<Audience>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    nbf: Option<i64>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    permissions: Option<Vec<String>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Verifies compact RS-family JWTs against the identity provider's keys.
pub struct TokenVerifier {
    key_source: Arc<KeySource>,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    leeway: i64,
    require_permissions: bool,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(key_source: Arc<KeySource>, settings: &GateSettings) -> Self {
        // The library only checks the signature, claims are validated below
        // in a fixed order.
        let mut validation = Validation::new(settings.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        Self {
            key_source,
            algorithm: settings.algorithm,
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            leeway: i64::try_from(settings.leeway).unwrap_or(i64::MAX),
            require_permissions: settings.require_permissions,
            validation,
        }
    }

    pub fn key_source(&self) -> &Arc<KeySource> {
        &self.key_source
    }

    /// Verifies `token` and returns its claims.
    ///
    /// Checks run in a fixed order and stop at the first failure: structure,
    /// algorithm, key id, key lookup, signature, `exp`, `iss`, `aud`, `nbf`,
    /// `permissions`.
    pub async fn verify(&self, token: &BearerToken) -> Result<Claims, AuthErrorKind> {
        let header = decode_header(token.as_str())?;

        let algorithm = header.alg.as_deref().ok_or(AuthErrorKind::UnsupportedAlgorithm)?;
        if algorithm.parse::<Algorithm>().ok() != Some(self.algorithm) {
            debug!("Rejecting token signed with algorithm '{}'", algorithm);
            return Err(AuthErrorKind::UnsupportedAlgorithm);
        }

        let kid = header
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or(AuthErrorKind::MissingKeyId)?;
        let key = self.key_source.get_key(&kid).await?;

        let data = jsonwebtoken::decode::<RawClaims>(
            token.as_str(),
            key.decoding_key(),
            &self.validation,
        )
        .map_err(|e| signature_error(e.kind()))?;

        self.check_claims(data.claims, chrono::Utc::now().timestamp())
    }

    fn check_claims(&self, raw: RawClaims, now: i64) -> Result<Claims, AuthErrorKind> {
        let expires_at = match raw.exp {
            Some(exp) if exp.saturating_add(self.leeway) > now => exp,
            _ => return Err(AuthErrorKind::TokenExpired),
        };

        let issuer = match raw.iss {
            Some(iss) if iss == self.issuer => iss,
            _ => return Err(AuthErrorKind::InvalidIssuer),
        };

        let audience = raw.aud.map(Audience::into_vec).unwrap_or_default();
        if !audience.iter().any(|aud| *aud == self.audience) {
            return Err(AuthErrorKind::InvalidAudience);
        }

        if let Some(nbf) = raw.nbf {
            if nbf.saturating_sub(self.leeway) > now {
                return Err(AuthErrorKind::TokenNotYetValid);
            }
        }

        let permissions = match raw.permissions {
            Some(permissions) => permissions,
            None if self.require_permissions => {
                return Err(AuthErrorKind::MissingPermissionsClaim)
            }
            None => Vec::new(),
        };

        Ok(Claims {
            issuer,
            audience,
            subject: raw.sub,
            expires_at,
            not_before: raw.nbf,
            issued_at: raw.iat,
            permissions,
            extra: raw.extra,
        })
    }
}

/// Splits the token into its three segments, checks each is valid base64url
/// and decodes the header.
fn decode_header(token: &str) -> Result<TokenHeader, AuthErrorKind> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthErrorKind::MalformedToken);
    }

    let mut decoded = segments
        .iter()
        .map(|segment| URL_SAFE_NO_PAD.decode(segment))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| AuthErrorKind::MalformedToken)?;
    let header = decoded.swap_remove(0);

    serde_json::from_slice(&header).map_err(|_| AuthErrorKind::MalformedToken)
}

fn signature_error(kind: &ErrorKind) -> AuthErrorKind {
    match kind {
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => AuthErrorKind::MalformedToken,
        ErrorKind::InvalidAlgorithm => AuthErrorKind::UnsupportedAlgorithm,
        _ => AuthErrorKind::InvalidSignature,
    }
}
