//! Single-slot rendezvous between a blocked shell caller and the session.
//!
//! Mirrors a pending-request store with capacity one: the caller reserves
//! the slot and awaits a oneshot receiver, the bridge or teardown fills it.
//!
//! ## Invariants
//!
//! - At most one caller waits at a time.
//! - A delivery with nobody waiting is dropped, never buffered.
//! - After `close` every current and future caller is answered at once.

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::domain::ShellReply;
use crate::error::ShellError;

#[derive(Debug, Default)]
struct SlotState {
    waiter: Option<oneshot::Sender<ShellReply>>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct ResponseSlot {
    state: Mutex<SlotState>,
}

impl ResponseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the slot for one caller.
    pub fn begin(&self) -> Result<oneshot::Receiver<ShellReply>, ShellError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ShellError::Closed);
        }
        if state.waiter.is_some() {
            return Err(ShellError::Busy);
        }
        let (tx, rx) = oneshot::channel();
        state.waiter = Some(tx);
        Ok(rx)
    }

    /// Hand a reply to the waiting caller. Returns false if nobody was waiting.
    pub fn deliver(&self, reply: ShellReply) -> bool {
        let waiter = self.state.lock().waiter.take();
        match waiter {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Release a reservation whose operation never started.
    pub fn abandon(&self) {
        self.state.lock().waiter = None;
    }

    pub fn is_waiting(&self) -> bool {
        self.state.lock().waiter.is_some()
    }

    /// Answer the current waiter with `reply` and refuse later callers.
    pub fn close(&self, reply: ShellReply) -> bool {
        let waiter = {
            let mut state = self.state.lock();
            state.closed = true;
            state.waiter.take()
        };
        match waiter {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }
}
