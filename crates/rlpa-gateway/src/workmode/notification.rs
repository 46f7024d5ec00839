//! Send every pending notification, one lpac run each.
//!
//! ```text
//! AwaitingList ──list ok──► Processing ──queue empty──► Finished
//!      │                      ▲    │
//!      └─ list failed ─► close│    └─ result tallied, next item
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::bridge;
use crate::domain::notification::{self, Notification};
use crate::domain::{Payload, SessionResult};
use crate::session::Session;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Phase {
    #[default]
    AwaitingList,
    Processing,
    Finished,
}

#[derive(Debug, Default)]
pub struct NotificationMode {
    phase: Phase,
    queue: VecDeque<Notification>,
    total: usize,
    failed: usize,
}

impl NotificationMode {
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub(super) async fn start(&mut self, session: &Arc<Session>) {
        let args = vec!["notification".to_string(), "list".to_string()];
        if let Err(e) = bridge::open(session, args).await {
            error!(peer = %session.peer(), error = %e, "failed to list notifications");
            self.fail(session).await;
        }
    }

    pub(super) async fn on_subprocess_result(&mut self, session: &Arc<Session>, payload: Payload) {
        match self.phase {
            Phase::AwaitingList => {
                if !payload.is_success() {
                    error!(peer = %session.peer(), code = payload.code, "notification list failed");
                    self.fail(session).await;
                    return;
                }
                match notification::parse_list(payload.data) {
                    Ok(list) => {
                        info!(peer = %session.peer(), count = list.len(), "Pending notifications");
                        self.total = list.len();
                        self.queue = list.into();
                        self.phase = Phase::Processing;
                        self.process_next(session).await;
                    }
                    Err(e) => {
                        error!(peer = %session.peer(), error = %e, "malformed notification list");
                        self.fail(session).await;
                    }
                }
            }
            Phase::Processing => {
                if payload.is_success() {
                    info!(peer = %session.peer(), "Notification processed");
                } else {
                    warn!(peer = %session.peer(), code = payload.code, "Notification failed");
                    self.failed += 1;
                }
                self.process_next(session).await;
            }
            Phase::Finished => {
                warn!(peer = %session.peer(), "result after notifications finished, dropped");
            }
        }
    }

    async fn process_next(&mut self, session: &Arc<Session>) {
        let Some(next) = self.queue.pop_front() else {
            let summary = self.summary();
            info!(peer = %session.peer(), succeeded = self.total - self.failed, failed = self.failed, "Notifications done");
            let result = match session.message_box(&summary).await {
                Ok(()) => SessionResult::Finished,
                Err(_) => SessionResult::Error,
            };
            self.phase = Phase::Finished;
            session.close(result).await;
            return;
        };

        info!(
            peer = %session.peer(),
            seq = next.seq_number,
            operation = %next.profile_management_operation,
            iccid = %next.iccid,
            "Processing notification"
        );
        let opened = match next.process_args() {
            Ok(args) => bridge::open(session, args).await,
            Err(e) => Err(e),
        };
        if let Err(e) = opened {
            error!(peer = %session.peer(), seq = next.seq_number, error = %e, "cannot process notification");
            self.fail(session).await;
        }
    }

    fn summary(&self) -> String {
        format!(
            "All notification processing finished\n{} succeed\n{} failed",
            self.total - self.failed,
            self.failed
        )
    }

    async fn fail(&mut self, session: &Arc<Session>) {
        self.phase = Phase::Finished;
        session.close(SessionResult::Error).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_text() {
        let mode = NotificationMode {
            phase: Phase::Finished,
            queue: VecDeque::new(),
            total: 3,
            failed: 1,
        };
        assert_eq!(
            mode.summary(),
            "All notification processing finished\n2 succeed\n1 failed"
        );
        assert!(mode.is_finished());
    }
}
