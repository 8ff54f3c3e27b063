use crate::error::SettingsError;
use jsonwebtoken::Algorithm;
use std::str::FromStr;
use std::time::Duration;
use url::{Host, Url};

/// Trust configuration for the gate: who issues tokens, for whom, and where
/// their public keys are published.
#[derive(Debug, Clone)]
pub struct GateSettings {
    /// JWKS endpoint of the identity provider
    pub jwks_url: String,
    /// Expected `iss` claim
    pub issuer: String,
    /// Audience that must appear in the `aud` claim
    pub audience: String,
    /// The only signing algorithm accepted (RSA family)
    pub algorithm: Algorithm,
    /// Upper bound for a single JWKS request
    pub fetch_timeout: Duration,
    /// How long a fetched key set is trusted before it is reloaded
    pub refresh_interval: Duration,
    /// Minimum delay between two refreshes forced by unknown key ids
    pub refresh_cooldown: Duration,
    /// Clock skew tolerated on `exp` and `nbf`, in seconds
    pub leeway: u64,
    /// Reject tokens that carry no `permissions` claim
    pub require_permissions: bool,
}

impl GateSettings {
    pub fn new(
        jwks_url: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            algorithm: Algorithm::RS256,
            fetch_timeout: Duration::from_secs(3),
            refresh_interval: Duration::from_secs(600),
            refresh_cooldown: Duration::from_secs(5),
            leeway: 0,
            require_permissions: true,
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    pub fn with_leeway(mut self, leeway: u64) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn with_require_permissions(mut self, require: bool) -> Self {
        self.require_permissions = require;
        self
    }

    /// Checks the settings once at startup so that misconfiguration never
    /// shows up as a per-request failure.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.issuer.trim().is_empty() {
            return Err(SettingsError::MissingIssuer);
        }
        if self.audience.trim().is_empty() {
            return Err(SettingsError::MissingAudience);
        }
        if !is_rsa_family(self.algorithm) {
            return Err(SettingsError::UnsupportedAlgorithm(format!(
                "{:?}",
                self.algorithm
            )));
        }

        let url = Url::parse(&self.jwks_url)
            .map_err(|e| SettingsError::InvalidJwksUrl(format!("{}: {}", self.jwks_url, e)))?;
        match url.scheme() {
            "https" => Ok(()),
            "http" if is_loopback(&url) => Ok(()),
            "http" => Err(SettingsError::InsecureJwksUrl(self.jwks_url.clone())),
            _ => Err(SettingsError::InvalidJwksUrl(self.jwks_url.clone())),
        }
    }
}

/// Parses an algorithm name such as `RS256`, accepting only asymmetric RSA
/// algorithms.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, SettingsError> {
    let algorithm = Algorithm::from_str(name)
        .map_err(|_| SettingsError::UnsupportedAlgorithm(name.to_string()))?;
    if is_rsa_family(algorithm) {
        Ok(algorithm)
    } else {
        Err(SettingsError::UnsupportedAlgorithm(name.to_string()))
    }
}

fn is_rsa_family(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
