pub(crate) use crate::config::auth::AuthConfig;
use confique::Config;

pub mod auth;

/// Optional configuration file read from the working directory
const CONFIG_FILE: &str = "casting.toml";

/// Main configuration structure for the casting server
#[derive(Debug, Config, Clone)]
pub struct ServerConfig {
    /// The port the server listens on (default: 8080)
    #[config(env = "CASTING_PORT", default = 8080)]
    pub port: u16,

    /// Identity provider configuration
    #[config(nested)]
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Loads the configuration from `CASTING_*` environment variables, falling
    /// back to `casting.toml` and then to the defaults.
    pub fn new() -> Result<Self, confique::Error> {
        Self::builder().env().file(CONFIG_FILE).load()
    }

    #[cfg(test)]
    pub fn for_test_with_mocks(jwks_mock: &wiremock::MockServer) -> Self {
        Self {
            port: 0,
            auth: AuthConfig {
                jwks_url: format!("{}/.well-known/jwks.json", jwks_mock.uri()),
                issuer: auth_gate::testing::ISSUER.to_string(),
                audience: auth_gate::testing::AUDIENCE.to_string(),
                algorithm: "RS256".to_string(),
                jwks_timeout: 2,
                jwks_refresh_interval: 600,
                jwks_refresh_cooldown: 5,
                leeway: 0,
            },
        }
    }
}
