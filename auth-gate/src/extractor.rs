use crate::error::AuthErrorKind;
use http::header::AUTHORIZATION;
use http::HeaderMap;
use std::fmt;

const BEARER_SCHEME: &str = "Bearer";

/// Compact JWT taken from an `Authorization: Bearer <token>` header.
///
/// The token text is deliberately kept out of `Debug` output so it cannot end
/// up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Pulls the bearer token out of the request headers.
///
/// Exactly one `Authorization` header is accepted, and it must be the
/// case-sensitive `Bearer` scheme followed by a single space and a non-empty
/// token.
pub fn extract(headers: &HeaderMap) -> Result<BearerToken, AuthErrorKind> {
    let mut values = headers.get_all(AUTHORIZATION).iter();
    let value = values.next().ok_or(AuthErrorKind::MalformedHeader)?;
    if values.next().is_some() {
        return Err(AuthErrorKind::MalformedHeader);
    }

    let value = value.to_str().map_err(|_| AuthErrorKind::MalformedHeader)?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(BEARER_SCHEME), Some(token), None) if !token.is_empty() => {
            Ok(BearerToken::new(token))
        }
        _ => Err(AuthErrorKind::MalformedHeader),
    }
}
