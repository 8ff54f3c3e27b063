//! Identity provider configuration

use auth_gate::{parse_algorithm, GateSettings, SettingsError};
use confique::Config;
use std::time::Duration;

/// Identity provider and token validation configuration
#[derive(Debug, Config, Clone)]
pub struct AuthConfig {
    /// URL of the JWKS document publishing the signing keys (required)
    #[config(env = "CASTING_AUTH_JWKS_URL")]
    pub jwks_url: String,

    /// Expected `iss` claim, e.g. `https://tenant.auth0.com/` (required)
    #[config(env = "CASTING_AUTH_ISSUER")]
    pub issuer: String,

    /// Expected `aud` claim (required)
    #[config(env = "CASTING_AUTH_AUDIENCE")]
    pub audience: String,

    /// Token signing algorithm (default: RS256)
    #[config(env = "CASTING_AUTH_ALGORITHM", default = "RS256")]
    pub algorithm: String,

    /// Timeout in seconds for fetching the JWKS document (default: 3)
    #[config(env = "CASTING_AUTH_JWKS_TIMEOUT", default = 3)]
    pub jwks_timeout: u64,

    /// Seconds a fetched key set is reused before it is loaded again (default: 600)
    #[config(env = "CASTING_AUTH_JWKS_REFRESH_INTERVAL", default = 600)]
    pub jwks_refresh_interval: u64,

    /// Minimum seconds between refreshes forced by an unknown key id (default: 5)
    #[config(env = "CASTING_AUTH_JWKS_REFRESH_COOLDOWN", default = 5)]
    pub jwks_refresh_cooldown: u64,

    /// Allowed clock skew in seconds for `exp` and `nbf` (default: 0)
    #[config(env = "CASTING_AUTH_LEEWAY", default = 0)]
    pub leeway: u64,
}

impl AuthConfig {
    /// Builds validated gate settings from this configuration
    pub fn to_gate_settings(&self) -> Result<GateSettings, SettingsError> {
        let settings = GateSettings::new(
            self.jwks_url.clone(),
            self.issuer.clone(),
            self.audience.clone(),
        )
        .with_algorithm(parse_algorithm(&self.algorithm)?)
        .with_fetch_timeout(Duration::from_secs(self.jwks_timeout))
        .with_refresh_interval(Duration::from_secs(self.jwks_refresh_interval))
        .with_refresh_cooldown(Duration::from_secs(self.jwks_refresh_cooldown))
        .with_leeway(self.leeway);

        settings.validate()?;
        Ok(settings)
    }
}
