//! Process-wide registry of shell sessions.
//!
//! Owns the credential registry and the id → session table. Entries are
//! added when a session enters shell mode and removed by its teardown.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::Session;
use crate::config::CredentialConfig;
use crate::domain::{Credential, CredentialRegistry, ShellReply};
use crate::error::ShellError;
use crate::ports::{ManagementApi, ManagementError};
use crate::workmode::ModeKind;

#[derive(Debug)]
pub struct SessionManager {
    credentials: CredentialRegistry,
    shells: DashMap<String, Arc<Session>>,
}

impl SessionManager {
    pub fn new(config: CredentialConfig) -> Self {
        Self {
            credentials: CredentialRegistry::new(config),
            shells: DashMap::new(),
        }
    }

    /// Issue a credential for `session` and make it reachable by id.
    pub fn register_shell(&self, session: &Arc<Session>) -> Option<Credential> {
        let credential = self.credentials.issue()?;
        session.assign_id(&credential.id);
        self.shells
            .insert(credential.id.clone(), Arc::clone(session));

        // Teardown may have run before the id was visible to it.
        if session.is_closing() {
            self.remove(&credential.id);
            return None;
        }
        debug!(peer = %session.peer(), session_id = %credential.id, "shell registered");
        Some(credential)
    }

    pub fn find(&self, id: &str) -> Option<Arc<Session>> {
        self.shells.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn verify(&self, id: &str, password: &str) -> bool {
        self.credentials.verify(id, password)
    }

    pub fn remove(&self, id: &str) {
        self.credentials.revoke(id);
        self.shells.remove(id);
    }

    pub fn len(&self) -> usize {
        self.shells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shells.is_empty()
    }

    fn session(&self, id: &str) -> Result<Arc<Session>, ManagementError> {
        self.find(id).ok_or(ManagementError::SessionNotFound)
    }
}

#[async_trait]
impl ManagementApi for SessionManager {
    fn authenticate(&self, id: &str, password: &str) -> bool {
        self.verify(id, password)
    }

    fn check_shell(&self, id: &str) -> Result<(), ManagementError> {
        match self.session(id)?.mode_kind() {
            Some(ModeKind::Shell) => Ok(()),
            _ => Err(ShellError::NotShellMode.into()),
        }
    }

    fn acquire_lock(&self, id: &str) -> Result<(), ManagementError> {
        Ok(self.session(id)?.acquire_api_lock()?)
    }

    fn keepalive(&self, id: &str) -> Result<(), ManagementError> {
        Ok(self.session(id)?.refresh_api_lock()?)
    }

    async fn execute_shell(&self, id: &str, command: &str) -> Result<ShellReply, ManagementError> {
        let session = self.session(id)?;
        Ok(session.execute_shell(command).await?)
    }

    async fn finish_shell(&self, id: &str) -> Result<(), ManagementError> {
        let session = self.session(id)?;
        Ok(session.finish_shell().await?)
    }
}
