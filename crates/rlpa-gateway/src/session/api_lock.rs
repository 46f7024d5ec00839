//! Management API lock with an inactivity timer.
//!
//! The timer task holds only a weak reference, so an idle lock never keeps
//! a closed session alive.

use std::sync::Arc;

use tracing::info;

use super::{Session, SessionState};
use crate::domain::ShellReply;
use crate::error::LockError;
use crate::workmode::ModeKind;

impl Session {
    /// Take the API lock and start the keepalive timer.
    pub fn acquire_api_lock(self: &Arc<Self>) -> Result<(), LockError> {
        let mut state = self.state.lock();
        if state.mode != Some(ModeKind::Shell) {
            return Err(LockError::NotShellMode);
        }
        if state.api_locked {
            return Err(LockError::AlreadyLocked);
        }
        state.api_locked = true;
        self.restart_keepalive(&mut state);
        info!(peer = %self.peer, "API locked");
        Ok(())
    }

    /// Push the lock's expiry out by a full keepalive period.
    pub fn refresh_api_lock(self: &Arc<Self>) -> Result<(), LockError> {
        let mut state = self.state.lock();
        if !state.api_locked || state.keepalive.is_none() {
            return Err(LockError::NotLocked);
        }
        self.restart_keepalive(&mut state);
        Ok(())
    }

    fn restart_keepalive(self: &Arc<Self>, state: &mut SessionState) {
        if let Some(timer) = state.keepalive.take() {
            timer.abort();
        }
        state.keepalive_epoch += 1;
        let epoch = state.keepalive_epoch;
        let session = Arc::downgrade(self);
        let period = self.ctx.keepalive;
        state.keepalive = Some(tokio::spawn(async move {
            tokio::time::sleep(period).await;
            if let Some(session) = session.upgrade() {
                session.expire_api_lock(epoch);
            }
        }));
    }

    fn expire_api_lock(&self, epoch: u64) {
        {
            let mut state = self.state.lock();
            // A refresh raced with this timer firing.
            if state.keepalive_epoch != epoch {
                return;
            }
            state.api_locked = false;
            state.keepalive = None;
        }
        info!(peer = %self.peer, "API lock expired");
        if self.response.deliver(ShellReply::Timeout) {
            info!(peer = %self.peer, "waiting shell caller timed out");
        }
    }
}
