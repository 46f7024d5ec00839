use std::sync::Arc;

use tracing::{debug, error, info};

use crate::domain::{Payload, SessionResult, ShellReply};
use crate::session::Session;

/// Management shell. Commands come from the HTTP API, not the device.
#[derive(Debug, Default)]
pub struct ShellMode;

impl ShellMode {
    pub(super) async fn start(&self, session: &Arc<Session>) {
        let Some(credential) = session.ctx().sessions.register_shell(session) else {
            error!(peer = %session.peer(), "no management credential available");
            session.close(SessionResult::Error).await;
            return;
        };
        info!(peer = %session.peer(), session_id = %credential.id, "Shell session registered");

        let text = format!("ManageID: {}\nPassword: {}", credential.id, credential.password);
        if let Err(e) = session.message_box(&text).await {
            error!(peer = %session.peer(), error = %e, "failed to send credentials");
            session.close(SessionResult::Error).await;
        }
    }

    pub(super) fn on_subprocess_result(&self, session: &Arc<Session>, payload: Payload) {
        let body = serde_json::to_string(&payload).unwrap_or_else(|e| e.to_string());
        if !session.deliver_shell_reply(ShellReply::Output(body)) {
            debug!(peer = %session.peer(), "shell result with no caller waiting, dropped");
        }
    }
}
