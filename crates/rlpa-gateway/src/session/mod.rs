//! # Device Session
//!
//! One TCP connection from a device.
//!
//! ```text
//!  socket ──► read loop ──► FrameDecoder ──► dispatch
//!                                              │ Apdu ──────────► lpac stdin
//!                                              │ mode select ───► WorkMode::start
//!                                              │ other ─────────► "Unimplemented command." + close
//!
//!  writers (read loop, bridge tasks, API) ──► writer mutex ──► socket
//! ```
//!
//! ## Invariants
//!
//! - Frames are dispatched in arrival order on the connection task.
//! - Each frame is written to the socket under one lock acquisition.
//! - At most one work mode per session, never replaced.
//! - `close` runs its teardown exactly once, whichever task calls it first.

mod api_lock;
pub mod handoff;
pub mod manager;

pub use handoff::ResponseSlot;
pub use manager::SessionManager;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rlpa_codec::{Frame, FrameDecoder, Tag};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bridge::{self, LpacHandle};
use crate::context::GatewayContext;
use crate::domain::{messages, Payload, SessionResult, ShellReply};
use crate::error::{GatewayError, GatewayResult, ShellError};
use crate::workmode::{ModeKind, WorkMode};

const READ_BUF_LEN: usize = 512;

#[derive(Debug, Default)]
struct SessionState {
    /// Management id, assigned by shell mode
    id: Option<String>,
    mode: Option<ModeKind>,
    process: Option<LpacHandle>,
    api_locked: bool,
    keepalive: Option<JoinHandle<()>>,
    /// Bumped on every timer restart
    keepalive_epoch: u64,
}

pub struct Session {
    peer: SocketAddr,
    ctx: Arc<GatewayContext>,
    writer: AsyncMutex<Option<OwnedWriteHalf>>,
    state: Mutex<SessionState>,
    mode: AsyncMutex<Option<WorkMode>>,
    response: ResponseSlot,
    closing: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl Session {
    /// Wrap an accepted connection. Drive it with [`Session::run`].
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        ctx: Arc<GatewayContext>,
    ) -> (Arc<Self>, OwnedReadHalf) {
        let (reader, writer) = stream.into_split();
        let (shutdown, _) = watch::channel(false);
        let session = Arc::new(Self {
            peer,
            ctx,
            writer: AsyncMutex::new(Some(writer)),
            state: Mutex::new(SessionState::default()),
            mode: AsyncMutex::new(None),
            response: ResponseSlot::new(),
            closing: AtomicBool::new(false),
            shutdown,
        });
        (session, reader)
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn id(&self) -> Option<String> {
        self.state.lock().id.clone()
    }

    pub fn mode_kind(&self) -> Option<ModeKind> {
        self.state.lock().mode
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    pub fn is_api_locked(&self) -> bool {
        self.state.lock().api_locked
    }

    /// Whether a shell caller is blocked on a result.
    pub fn is_awaiting_response(&self) -> bool {
        self.response.is_waiting()
    }

    pub fn has_process(&self) -> bool {
        self.state.lock().process.is_some()
    }

    pub(crate) fn ctx(&self) -> &GatewayContext {
        &self.ctx
    }

    /// Read loop. Returns when the device goes away or the session is closed.
    pub async fn run(self: Arc<Self>, mut reader: OwnedReadHalf) {
        let mut shutdown = self.shutdown.subscribe();
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; READ_BUF_LEN];

        let result = loop {
            if self.is_closing() {
                return;
            }
            let read = tokio::select! {
                read = reader.read(&mut buf) => read,
                _ = shutdown.changed() => return,
            };
            let n = match read {
                Ok(0) => break SessionResult::ClientDisconnected,
                Ok(n) => n,
                Err(e) => {
                    error!(peer = %self.peer, error = %e, "socket read failed");
                    break SessionResult::Error;
                }
            };
            debug!(peer = %self.peer, bytes = %hex::encode(&buf[..n]), "socket ->");

            if let Err(e) = self.feed(&mut decoder, &buf[..n]).await {
                error!(peer = %self.peer, error = %e, "session fault");
                break SessionResult::Error;
            }
        };
        self.close(result).await;
    }

    async fn feed(
        self: &Arc<Self>,
        decoder: &mut FrameDecoder,
        mut input: &[u8],
    ) -> GatewayResult<()> {
        while !input.is_empty() && !self.is_closing() {
            let consumed = decoder.decode_step(input)?;
            input = &input[consumed..];
            if decoder.is_complete() {
                if let Some(frame) = std::mem::take(decoder).into_frame() {
                    self.dispatch(frame).await?;
                }
            }
        }
        Ok(())
    }

    async fn dispatch(self: &Arc<Self>, frame: Frame) -> GatewayResult<()> {
        debug!(peer = %self.peer, tag = %frame.tag, len = frame.value.len(), "frame received");

        if frame.tag == Tag::Apdu {
            return self.forward_apdu(&frame.value).await;
        }

        let mut mode = self.mode.lock().await;
        if let Some(current) = mode.as_ref() {
            debug!(peer = %self.peer, tag = %frame.tag, mode = %current.kind(), "frame ignored, mode already set");
            return Ok(());
        }

        let Some(selected) = WorkMode::select(frame.tag) else {
            if frame.tag == Tag::Reboot {
                debug!(peer = %self.peer, "reboot request ignored");
                return Ok(());
            }
            self.message_box("Unimplemented command.").await?;
            return Err(GatewayError::UnimplementedCommand(frame.tag));
        };

        let kind = selected.kind();
        self.state.lock().mode = Some(kind);
        info!(peer = %self.peer, mode = %kind, "Entered work mode");

        mode.insert(selected).start(self, &frame).await;
        Ok(())
    }

    async fn forward_apdu(&self, value: &[u8]) -> GatewayResult<()> {
        let stdin = self.state.lock().process.as_ref().map(LpacHandle::stdin);
        let Some(stdin) = stdin else {
            debug!(peer = %self.peer, "APDU with no lpac running, dropped");
            return Ok(());
        };
        stdin.write_line(&messages::apdu_response(value)?).await
    }

    /// Write one frame to the device.
    pub async fn send_frame(&self, tag: Tag, value: &[u8]) -> GatewayResult<()> {
        self.write_frame(tag, value, false).await
    }

    pub async fn message_box(&self, text: &str) -> GatewayResult<()> {
        self.send_frame(Tag::MessageBox, text.as_bytes()).await
    }

    /// Write an empty control frame unless teardown has begun.
    pub(crate) async fn send_unless_closing(&self, tag: Tag) -> GatewayResult<()> {
        self.write_frame(tag, &[], true).await
    }

    async fn write_frame(&self, tag: Tag, value: &[u8], skip_if_closing: bool) -> GatewayResult<()> {
        let bytes = rlpa_codec::encode(tag, value)?;
        let mut writer = self.writer.lock().await;
        // Checked under the writer lock so nothing lands after the Close frame.
        if skip_if_closing && self.is_closing() {
            return Ok(());
        }
        let Some(socket) = writer.as_mut() else {
            return Err(GatewayError::SessionClosed);
        };
        socket.write_all(&bytes).await?;
        debug!(peer = %self.peer, %tag, bytes = %hex::encode(&bytes), "socket <-");
        Ok(())
    }

    /// Tear the session down. Only the first call has any effect.
    pub async fn close(&self, result: SessionResult) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.send_replace(true);

        let (id, process, keepalive) = {
            let mut state = self.state.lock();
            state.api_locked = false;
            (state.id.clone(), state.process.take(), state.keepalive.take())
        };
        if let Some(process) = process {
            process.kill();
        }
        if let Some(timer) = keepalive {
            timer.abort();
        }
        if let Some(id) = id.as_deref() {
            self.ctx.sessions.remove(id);
        }
        if self.response.close(ShellReply::from(result)) {
            debug!(peer = %self.peer, %result, "released waiting shell caller");
        }

        let writer = self.writer.lock().await.take();
        if let Some(mut socket) = writer {
            for tag in [Tag::ApduUnlock, Tag::Close] {
                let sent = match rlpa_codec::encode(tag, &[]) {
                    Ok(bytes) => socket.write_all(&bytes).await.map_err(GatewayError::from),
                    Err(e) => Err(e.into()),
                };
                if let Err(e) = sent {
                    debug!(peer = %self.peer, %tag, error = %e, "final frame not delivered");
                    break;
                }
            }
            if let Err(e) = socket.shutdown().await {
                debug!(peer = %self.peer, error = %e, "socket shutdown failed");
            }
        }

        info!(
            peer = %self.peer,
            session_id = id.as_deref().unwrap_or("-"),
            %result,
            "Session closed"
        );
    }

    /// Run one lpac command on behalf of a management caller.
    ///
    /// Blocks until the command's result arrives or the session ends.
    pub async fn execute_shell(self: &Arc<Self>, command: &str) -> Result<ShellReply, ShellError> {
        if self.mode_kind() != Some(ModeKind::Shell) {
            return Err(ShellError::NotShellMode);
        }
        let reply = self.response.begin()?;

        let args: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        info!(peer = %self.peer, command, "Shell command");

        match bridge::open(self, args).await {
            Ok(()) => {}
            // The child of an earlier, timed-out command is still running.
            Err(GatewayError::SubprocessActive) => {
                self.response.abandon();
                return Err(ShellError::Busy);
            }
            Err(e) => {
                self.response.abandon();
                warn!(peer = %self.peer, error = %e, "failed to open lpac");
                return Err(ShellError::Open(e));
            }
        }

        Ok(reply.await.unwrap_or(ShellReply::ClientDisconnected))
    }

    /// End a shell session normally.
    pub async fn finish_shell(&self) -> Result<(), ShellError> {
        if self.mode_kind() != Some(ModeKind::Shell) {
            return Err(ShellError::NotShellMode);
        }
        self.close(SessionResult::Finished).await;
        Ok(())
    }

    /// Hand a completed operation's payload to the work mode.
    pub(crate) async fn deliver_result(self: &Arc<Self>, payload: Payload) {
        info!(peer = %self.peer, code = payload.code, "lpac operation finished");
        let mut mode = self.mode.lock().await;
        match mode.as_mut() {
            Some(mode) => {
                mode.on_subprocess_result(self, payload).await;
                if mode.is_finished() {
                    debug!(peer = %self.peer, mode = %mode.kind(), "work mode finished");
                }
            }
            None => warn!(peer = %self.peer, "lpac result with no work mode, dropped"),
        }
    }

    pub(crate) fn deliver_shell_reply(&self, reply: ShellReply) -> bool {
        self.response.deliver(reply)
    }

    pub(crate) fn assign_id(&self, id: &str) {
        self.state.lock().id = Some(id.to_string());
    }

    pub(crate) fn reserve_process(&self, handle: LpacHandle) -> GatewayResult<()> {
        let mut state = self.state.lock();
        if self.is_closing() {
            return Err(GatewayError::SessionClosed);
        }
        if state.process.is_some() {
            return Err(GatewayError::SubprocessActive);
        }
        state.process = Some(handle);
        Ok(())
    }

    pub(crate) fn release_process(&self) {
        self.state.lock().process = None;
    }

    pub(crate) fn kill_process(&self) {
        let process = self.state.lock().process.take();
        if let Some(process) = process {
            process.kill();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("closing", &self.is_closing())
            .finish_non_exhaustive()
    }
}
