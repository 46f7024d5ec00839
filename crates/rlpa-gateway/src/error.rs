//! Gateway error types.

use rlpa_codec::{FrameError, Tag};
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::activation_code::ActivationCodeError;

/// Session-level faults. Every variant is fatal to the session that hit it.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Socket or pipe failure other than a clean end-of-stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Device sent an invalid frame
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// lpac printed a line that is not a valid message
    #[error("malformed lpac message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("an lpac process is already running for this session")]
    SubprocessActive,

    #[error("failed to spawn lpac: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("session is closed")]
    SessionClosed,

    #[error(transparent)]
    ActivationCode(#[from] ActivationCodeError),

    #[error("unsupported notification operation: {0}")]
    UnsupportedOperation(String),

    #[error("unimplemented command: {0}")]
    UnimplementedCommand(Tag),

    #[error("lpac exited without reporting a result")]
    MissingResult,

    #[error("lpac wrote to stderr: {0}")]
    Stderr(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Shell execution failures reported to the management caller.
///
/// None of these disturb the session.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("rlpa client not in shell mode")]
    NotShellMode,

    #[error("already has one lpac shell running")]
    Busy,

    #[error("failed to open lpac: {0}")]
    Open(#[source] GatewayError),

    #[error("rlpa client disconnected")]
    Closed,
}

/// API lock failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("rlpa client not in shell mode")]
    NotShellMode,

    #[error("API already locked")]
    AlreadyLocked,

    #[error("API not locked")]
    NotLocked,
}
