use crate::enforcer;
use crate::error::{AuthErrorKind, Denial, SettingsError};
use crate::extractor;
use crate::key_source::{HttpJwksFetcher, KeySource};
use crate::settings::GateSettings;
use crate::verifier::{Claims, TokenVerifier};
use http::HeaderMap;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;

/// Result of running a request through the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizationOutcome {
    Granted(Claims),
    Denied(Denial),
}

impl AuthorizationOutcome {
    pub fn into_result(self) -> Result<Claims, Denial> {
        match self {
            Self::Granted(claims) => Ok(claims),
            Self::Denied(denial) => Err(denial),
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }
}

/// Guard placed in front of protected operations.
///
/// Extraction, verification and the permission check run in sequence; the
/// first failure ends the request. The gate holds no per-request state and is
/// cheap to clone, so one instance serves any number of concurrent requests.
#[derive(Clone)]
pub struct AuthorizationGate {
    verifier: Arc<TokenVerifier>,
}

impl AuthorizationGate {
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// Validates `settings` and wires the HTTP key source and verifier.
    pub fn from_settings(settings: &GateSettings) -> Result<Self, SettingsError> {
        settings.validate()?;

        let fetcher = HttpJwksFetcher::new(settings.jwks_url.clone(), settings.fetch_timeout)
            .map_err(|e| SettingsError::HttpClient(e.to_string()))?;
        let key_source = Arc::new(KeySource::new(
            Arc::new(fetcher),
            settings.algorithm,
            settings.refresh_interval,
            settings.refresh_cooldown,
        ));

        Ok(Self::new(Arc::new(TokenVerifier::new(key_source, settings))))
    }

    pub fn key_source(&self) -> &Arc<KeySource> {
        self.verifier.key_source()
    }

    /// Loads the key set ahead of the first request.
    ///
    /// A failure is only logged; requests trigger another attempt.
    pub async fn warm_up(&self) -> bool {
        match self.key_source().key_set().await {
            Ok(keys) => {
                info!("Authorization gate ready with {} signing key(s)", keys.len());
                true
            }
            Err(_) => {
                warn!(
                    "Could not load signing keys from {} at startup",
                    self.key_source().endpoint()
                );
                false
            }
        }
    }

    /// Runs the request headers through extraction, verification and the
    /// permission check.
    pub async fn check(
        &self,
        headers: &HeaderMap,
        required_permission: &str,
    ) -> AuthorizationOutcome {
        match self.authorize_request(headers, required_permission).await {
            Ok(claims) => {
                debug!(
                    "Granted '{}' to '{}'",
                    required_permission,
                    claims.subject.as_deref().unwrap_or("<unknown>")
                );
                AuthorizationOutcome::Granted(claims)
            }
            Err(kind) => {
                warn!("Denied '{}': {}", required_permission, kind.error_code());
                AuthorizationOutcome::Denied(Denial::from(kind))
            }
        }
    }

    async fn authorize_request(
        &self,
        headers: &HeaderMap,
        required_permission: &str,
    ) -> Result<Claims, AuthErrorKind> {
        let token = extractor::extract(headers)?;
        let claims = self.verifier.verify(&token).await?;
        enforcer::authorize(&claims, required_permission)?;
        Ok(claims)
    }

    /// Invokes `operation` with the verified claims if the request carries
    /// `required_permission`, otherwise returns the denial without calling it.
    pub async fn guard<F, Fut, T>(
        &self,
        headers: &HeaderMap,
        required_permission: &str,
        operation: F,
    ) -> Result<T, Denial>
    where
        F: FnOnce(Claims) -> Fut,
        Fut: Future<Output = T>,
    {
        let claims = self.check(headers, required_permission).await.into_result()?;
        Ok(operation(claims).await)
    }
}
