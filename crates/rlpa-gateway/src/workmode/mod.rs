//! # Work Modes
//!
//! The first mode-select frame fixes what a session does:
//!
//! | Tag                   | Mode                  | Operations          |
//! |-----------------------|-----------------------|---------------------|
//! | `Management`          | [`ShellMode`]         | many, API driven    |
//! | `ProcessNotification` | [`NotificationMode`]  | list + one per item |
//! | `DownloadProfile`     | [`DownloadMode`]      | one                 |

mod download;
mod notification;
mod shell;

pub use download::DownloadMode;
pub use notification::NotificationMode;
pub use shell::ShellMode;

use std::fmt;
use std::sync::Arc;

use rlpa_codec::{Frame, Tag};

use crate::domain::Payload;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    Shell,
    ProcessNotification,
    Download,
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell => f.write_str("shell"),
            Self::ProcessNotification => f.write_str("process-notification"),
            Self::Download => f.write_str("download"),
        }
    }
}

#[derive(Debug)]
pub enum WorkMode {
    Shell(ShellMode),
    ProcessNotification(NotificationMode),
    Download(DownloadMode),
}

impl WorkMode {
    /// Mode selected by a frame tag, if any.
    pub fn select(tag: Tag) -> Option<Self> {
        match tag {
            Tag::Management => Some(Self::Shell(ShellMode)),
            Tag::ProcessNotification => Some(Self::ProcessNotification(NotificationMode::default())),
            Tag::DownloadProfile => Some(Self::Download(DownloadMode::default())),
            _ => None,
        }
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            Self::Shell(_) => ModeKind::Shell,
            Self::ProcessNotification(_) => ModeKind::ProcessNotification,
            Self::Download(_) => ModeKind::Download,
        }
    }

    /// Called once, right after the mode was selected by `frame`.
    pub async fn start(&mut self, session: &Arc<Session>, frame: &Frame) {
        match self {
            Self::Shell(mode) => mode.start(session).await,
            Self::ProcessNotification(mode) => mode.start(session).await,
            Self::Download(mode) => mode.start(session, &frame.value).await,
        }
    }

    /// Called once per completed lpac operation.
    pub async fn on_subprocess_result(&mut self, session: &Arc<Session>, payload: Payload) {
        match self {
            Self::Shell(mode) => mode.on_subprocess_result(session, payload),
            Self::ProcessNotification(mode) => mode.on_subprocess_result(session, payload).await,
            Self::Download(mode) => mode.on_subprocess_result(session, payload).await,
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            Self::Shell(_) => false,
            Self::ProcessNotification(mode) => mode.is_finished(),
            Self::Download(mode) => mode.is_finished(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_by_tag() {
        assert_eq!(WorkMode::select(Tag::Management).map(|m| m.kind()), Some(ModeKind::Shell));
        assert_eq!(
            WorkMode::select(Tag::ProcessNotification).map(|m| m.kind()),
            Some(ModeKind::ProcessNotification)
        );
        assert_eq!(
            WorkMode::select(Tag::DownloadProfile).map(|m| m.kind()),
            Some(ModeKind::Download)
        );
        for tag in [Tag::MessageBox, Tag::Reboot, Tag::Close, Tag::ApduLock, Tag::Unknown(0x42)] {
            assert!(WorkMode::select(tag).is_none());
        }
    }

    #[test]
    fn test_fresh_modes_not_finished() {
        for tag in [Tag::Management, Tag::ProcessNotification, Tag::DownloadProfile] {
            let mode = WorkMode::select(tag).unwrap();
            assert!(!mode.is_finished());
            assert!(tag.is_mode_select());
        }
    }
}
