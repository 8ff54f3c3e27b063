use crate::catalog::Catalog;
use crate::config::ServerConfig;
use auth_gate::{AuthorizationGate, SettingsError};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub gate: AuthorizationGate,
    pub catalog: Arc<Catalog>,
}

impl AppState {
    /// Builds the state with a gate wired to the configured identity provider
    pub fn new(config: ServerConfig) -> Result<Self, SettingsError> {
        let gate = AuthorizationGate::from_settings(&config.auth.to_gate_settings()?)?;
        Ok(Self::with_gate(config, gate))
    }

    pub fn with_gate(config: ServerConfig, gate: AuthorizationGate) -> Self {
        Self {
            config: Arc::new(config),
            gate,
            catalog: Arc::new(Catalog::new()),
        }
    }

    /// Ready once the identity provider's signing keys can be loaded
    pub async fn health_check(&self) -> bool {
        self.gate.key_source().key_set().await.is_ok()
    }
}
