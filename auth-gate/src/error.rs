use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Every reason the gate can refuse a request.
///
/// Messages are fixed strings so that nothing from the request (token text,
/// claim values) ever leaks into an error response.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    #[error("Authorization header must be a single 'Bearer <token>' value.")]
    MalformedHeader,

    #[error("Token is not a well-formed JWT.")]
    MalformedToken,

    #[error("Token is signed with an unsupported algorithm.")]
    UnsupportedAlgorithm,

    #[error("Token header does not name a signing key.")]
    MissingKeyId,

    #[error("Token is signed with an unknown key.")]
    UnknownKey,

    #[error("Token signature is invalid.")]
    InvalidSignature,

    #[error("Token expired.")]
    TokenExpired,

    #[error("Token was issued by an untrusted issuer.")]
    InvalidIssuer,

    #[error("Token was not issued for this audience.")]
    InvalidAudience,

    #[error("Token is not valid yet.")]
    TokenNotYetValid,

    #[error("Permissions not included in token.")]
    MissingPermissionsClaim,

    #[error("Permission not granted.")]
    InsufficientScope,

    #[error("Authorization server unreachable.")]
    KeySourceUnavailable,
}

impl AuthErrorKind {
    /// HTTP status the failure is reported with.
    ///
    /// Only an authenticated caller lacking a permission gets 403, everything
    /// else means no identity was established.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InsufficientScope => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Stable machine readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedHeader => "malformed_header",
            Self::MalformedToken => "malformed_token",
            Self::UnsupportedAlgorithm => "unsupported_algorithm",
            Self::MissingKeyId => "missing_key_id",
            Self::UnknownKey => "unknown_key",
            Self::InvalidSignature => "invalid_signature",
            Self::TokenExpired => "token_expired",
            Self::InvalidIssuer => "invalid_issuer",
            Self::InvalidAudience => "invalid_audience",
            Self::TokenNotYetValid => "token_not_yet_valid",
            Self::MissingPermissionsClaim => "missing_permissions_claim",
            Self::InsufficientScope => "insufficient_scope",
            Self::KeySourceUnavailable => "key_source_unavailable",
        }
    }
}

/// Structured refusal handed back to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    #[serde(skip)]
    pub kind: AuthErrorKind,
    pub status_code: u16,
    pub error_code: &'static str,
    pub message: String,
}

impl Denial {
    pub fn status(&self) -> StatusCode {
        self.kind.status_code()
    }
}

impl From<AuthErrorKind> for Denial {
    fn from(kind: AuthErrorKind) -> Self {
        Self {
            kind,
            status_code: kind.status_code().as_u16(),
            error_code: kind.error_code(),
            message: kind.to_string(),
        }
    }
}

/// Errors raised while loading the identity provider's key set.
///
/// These never reach a client directly, the gate reports them as
/// [`AuthErrorKind::KeySourceUnavailable`].
#[derive(Error, Debug)]
pub enum KeySourceError {
    #[error("JWKS request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JWKS endpoint returned status {0}")]
    Status(u16),

    #[error("Invalid JWKS document: {0}")]
    Document(String),
}

/// Errors found while validating gate settings at startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("expected issuer must not be empty")]
    MissingIssuer,

    #[error("expected audience must not be empty")]
    MissingAudience,

    #[error("invalid JWKS URL: {0}")]
    InvalidJwksUrl(String),

    #[error("JWKS URL must use https (plain http only allowed for loopback hosts): {0}")]
    InsecureJwksUrl(String),

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("failed to build JWKS client: {0}")]
    HttpClient(String),
}
