//! How sessions end and what shell callers get back.

use std::fmt;

/// Terminal result of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionResult {
    Finished,
    ClientDisconnected,
    Error,
}

impl fmt::Display for SessionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished => f.write_str("finished"),
            Self::ClientDisconnected => f.write_str("client disconnected"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Reply handed to a waiting shell caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellReply {
    /// Serialized lpac result payload
    Output(String),
    Finished,
    ClientDisconnected,
    Error,
    /// API lock expired while waiting
    Timeout,
}

impl ShellReply {
    /// Text returned to the management caller.
    pub fn text(&self) -> &str {
        match self {
            Self::Output(body) => body,
            Self::Finished => "OK",
            Self::ClientDisconnected => "client disconnected",
            Self::Error => "lpac error",
            Self::Timeout => "timeout",
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Output(body) => body,
            other => other.text().to_string(),
        }
    }
}

impl From<SessionResult> for ShellReply {
    fn from(result: SessionResult) -> Self {
        match result {
            SessionResult::Finished => Self::Finished,
            SessionResult::ClientDisconnected => Self::ClientDisconnected,
            SessionResult::Error => Self::Error,
        }
    }
}
