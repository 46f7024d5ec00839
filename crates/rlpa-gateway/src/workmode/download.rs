use std::sync::Arc;

use tracing::{error, info, warn};

use crate::bridge;
use crate::domain::activation_code::{self, PullInfo};
use crate::domain::{Payload, SessionResult};
use crate::session::Session;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Phase {
    #[default]
    Idle,
    Downloading,
    Finished,
}

/// Single profile download from an activation code sent by the device.
#[derive(Debug, Default)]
pub struct DownloadMode {
    phase: Phase,
}

impl DownloadMode {
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub(super) async fn start(&mut self, session: &Arc<Session>, raw_code: &[u8]) {
        let info = match activation_code::from_device_payload(raw_code) {
            Ok(info) => info,
            Err(e) => {
                warn!(peer = %session.peer(), error = %e, "bad activation code");
                let _ = session.message_box(&e.to_string()).await;
                self.finish(session, SessionResult::Error).await;
                return;
            }
        };

        if info.confirmation_code_required {
            let _ = session.message_box("Confirm Code is not supported yet").await;
            self.finish(session, SessionResult::Finished).await;
            return;
        }

        info!(peer = %session.peer(), smdp = %info.smdp, "Downloading profile");
        match bridge::open(session, download_args(&info)).await {
            Ok(()) => self.phase = Phase::Downloading,
            Err(e) => {
                error!(peer = %session.peer(), error = %e, "failed to start download");
                self.finish(session, SessionResult::Error).await;
            }
        }
    }

    pub(super) async fn on_subprocess_result(&mut self, session: &Arc<Session>, payload: Payload) {
        if self.phase != Phase::Downloading {
            warn!(peer = %session.peer(), "unexpected download result, dropped");
            return;
        }

        if payload.is_success() {
            info!(peer = %session.peer(), "Download success");
            let result = match session.message_box("Download success").await {
                Ok(()) => SessionResult::Finished,
                Err(_) => SessionResult::Error,
            };
            self.finish(session, result).await;
        } else {
            warn!(peer = %session.peer(), code = payload.code, data = %payload.data, "Download failed");
            let text = format!("Download failed\n{}", payload.data);
            let _ = session.message_box(&text).await;
            self.finish(session, SessionResult::Error).await;
        }
    }

    async fn finish(&mut self, session: &Arc<Session>, result: SessionResult) {
        self.phase = Phase::Finished;
        session.close(result).await;
    }
}

fn download_args(info: &PullInfo) -> Vec<String> {
    let mut args = vec!["profile".to_string(), "download".to_string()];
    if !info.smdp.is_empty() {
        args.extend(["-s".to_string(), info.smdp.clone()]);
    }
    if !info.matching_id.is_empty() {
        args.extend(["-m".to_string(), info.matching_id.clone()]);
    }
    args
}
