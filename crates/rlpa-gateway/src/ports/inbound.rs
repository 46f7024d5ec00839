//! # Driving Ports (Inbound API)
//!
//! What the management boundary may do with shell sessions. The HTTP layer
//! depends on this trait only, so it can be tested against a stub.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ShellReply;
use crate::error::{LockError, ShellError};

/// Management operations on shell-mode sessions, addressed by credential id.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Check an id/password pair against the credential registry.
    fn authenticate(&self, id: &str, password: &str) -> bool;

    /// Confirm a live shell-mode session is registered under `id`.
    fn check_shell(&self, id: &str) -> Result<(), ManagementError>;

    /// Take the API lock and start the keepalive timer.
    fn acquire_lock(&self, id: &str) -> Result<(), ManagementError>;

    /// Reset the keepalive timer of a held lock.
    fn keepalive(&self, id: &str) -> Result<(), ManagementError>;

    /// Run one lpac command and wait for its result.
    async fn execute_shell(&self, id: &str, command: &str)
        -> Result<ShellReply, ManagementError>;

    /// End the session normally.
    async fn finish_shell(&self, id: &str) -> Result<(), ManagementError>;
}

#[derive(Debug, Error)]
pub enum ManagementError {
    /// No live session under this id
    #[error("rlpa client disconnected")]
    SessionNotFound,

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Shell(#[from] ShellError),
}
