//! Shared state handed to every session.

use std::sync::Arc;
use std::time::Duration;

use crate::adapters::LpacBinary;
use crate::config::GatewayConfig;
use crate::ports::LpacLauncher;
use crate::session::SessionManager;

pub struct GatewayContext {
    /// Credential registry and shell-session table
    pub sessions: Arc<SessionManager>,
    /// Builds lpac child commands
    pub launcher: Arc<dyn LpacLauncher>,
    /// API lock inactivity timeout
    pub keepalive: Duration,
    /// How long lpac may keep running after printing its result
    pub exit_grace: Duration,
}

impl GatewayContext {
    pub fn new(config: &GatewayConfig, launcher: Arc<dyn LpacLauncher>) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(config.credentials.clone())),
            launcher,
            keepalive: config.keepalive(),
            exit_grace: config.lpac.exit_grace(),
        }
    }

    /// Context that launches the real lpac binary.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config, Arc::new(LpacBinary::new(&config.lpac)))
    }
}

impl std::fmt::Debug for GatewayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayContext")
            .field("sessions", &self.sessions.len())
            .field("keepalive", &self.keepalive)
            .field("exit_grace", &self.exit_grace)
            .finish_non_exhaustive()
    }
}
