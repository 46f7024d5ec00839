//! # lpac Subprocess Bridge
//!
//! One child process per operation. Three tasks run for its lifetime:
//!
//! ```text
//!                 ┌──────────────── exit watcher ────────────────┐
//!                 │ wait / kill → ApduUnlock → release handle    │
//!                 └──────────────────────┬───────────────────────┘
//!                                        │ exited
//!  lpac stdout ──► stdout relay ─────────┴──► Work Mode result
//!                   │ apdu connect/open ──► ack on lpac stdin
//!                   │ apdu transmit     ──► Apdu frame to device
//!  lpac stderr ──► stderr watch ──► close(Error) on first line
//! ```
//!
//! ## Invariants
//!
//! - At most one child per session; the handle lives in the session state.
//! - `ApduLock` precedes spawning, `ApduUnlock` follows exit, and the next
//!   operation can only start after the unlock was written.
//! - Once teardown has begun no unlock is written.

use std::io;
use std::process::Stdio;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use rlpa_codec::Tag;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use crate::domain::messages::{self, ApduFunc, LpacMessage, MessageKind, Payload};
use crate::domain::SessionResult;
use crate::error::{GatewayError, GatewayResult};
use crate::session::Session;

/// Shared write end of the child's stdin. Empty once the child has exited.
#[derive(Debug, Clone, Default)]
pub(crate) struct LpacStdin(Arc<AsyncMutex<Option<ChildStdin>>>);

impl LpacStdin {
    async fn attach(&self, stdin: ChildStdin) {
        *self.0.lock().await = Some(stdin);
    }

    async fn detach(&self) {
        self.0.lock().await.take();
    }

    /// Write one JSON line. Writing to a child that is gone is a no-op.
    pub(crate) async fn write_line(&self, line: &str) -> GatewayResult<()> {
        let mut guard = self.0.lock().await;
        let Some(stdin) = guard.as_mut() else {
            return Ok(());
        };

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        match stdin.write_all(&buf).await {
            Ok(()) => {
                debug!(line, "lpac <-");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                guard.take();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Session-side handle of a running child.
#[derive(Debug)]
pub(crate) struct LpacHandle {
    stdin: LpacStdin,
    kill: Option<oneshot::Sender<()>>,
}

impl LpacHandle {
    pub(crate) fn stdin(&self) -> LpacStdin {
        self.stdin.clone()
    }

    /// Ask the exit watcher to terminate the child.
    pub(crate) fn kill(mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

/// Start one lpac operation for `session`.
pub(crate) async fn open(session: &Arc<Session>, args: Vec<String>) -> GatewayResult<()> {
    let (kill_tx, kill_rx) = oneshot::channel();
    let stdin = LpacStdin::default();
    session.reserve_process(LpacHandle {
        stdin: stdin.clone(),
        kill: Some(kill_tx),
    })?;

    if let Err(e) = session.send_frame(Tag::ApduLock, &[]).await {
        session.release_process();
        return Err(e);
    }

    let spawned = session
        .ctx()
        .launcher
        .command(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            abort_open(session).await;
            return Err(GatewayError::Spawn(e));
        }
    };

    let (Some(child_stdin), Some(stdout), Some(stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        abort_open(session).await;
        return Err(GatewayError::Spawn(io::Error::new(
            io::ErrorKind::Other,
            "lpac stdio was not captured",
        )));
    };
    stdin.attach(child_stdin).await;

    info!(peer = %session.peer(), pid = ?child.id(), ?args, "lpac started");

    let (exited_tx, exited_rx) = oneshot::channel();
    tokio::spawn(watch_exit(
        Arc::clone(session),
        child,
        kill_rx,
        stdin.clone(),
        exited_tx,
    ));
    tokio::spawn(relay_stdout(Arc::clone(session), stdout, stdin, exited_rx));
    tokio::spawn(watch_stderr(Arc::clone(session), stderr));
    Ok(())
}

async fn abort_open(session: &Session) {
    if let Err(e) = session.send_unless_closing(Tag::ApduUnlock).await {
        warn!(peer = %session.peer(), error = %e, "failed to release card");
    }
    session.release_process();
}

async fn watch_exit(
    session: Arc<Session>,
    mut child: Child,
    kill: oneshot::Receiver<()>,
    stdin: LpacStdin,
    exited: oneshot::Sender<()>,
) {
    let finished = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill => None,
    };
    let status = match finished {
        Some(status) => status,
        None => {
            debug!(peer = %session.peer(), "killing lpac");
            if let Err(e) = child.start_kill() {
                debug!(peer = %session.peer(), error = %e, "kill failed");
            }
            child.wait().await
        }
    };
    stdin.detach().await;

    match status {
        Ok(status) => info!(peer = %session.peer(), %status, "lpac exited"),
        Err(e) => warn!(peer = %session.peer(), error = %e, "failed to reap lpac"),
    }

    if let Err(e) = session.send_unless_closing(Tag::ApduUnlock).await {
        error!(peer = %session.peer(), error = %e, "failed to release card");
        session.close(SessionResult::Error).await;
    }
    session.release_process();
    let _ = exited.send(());
}

// Boxed: delivering a result may open the next operation, which spawns this again.
fn relay_stdout(
    session: Arc<Session>,
    stdout: ChildStdout,
    stdin: LpacStdin,
    exited: oneshot::Receiver<()>,
) -> BoxFuture<'static, ()> {
    async move {
        let result = match read_until_result(&session, stdout, &stdin).await {
            Ok(result) => result,
            Err(e) => {
                error!(peer = %session.peer(), error = %e, "lpac bridge fault");
                session.close(SessionResult::Error).await;
                return;
            }
        };

        wait_for_exit(&session, exited).await;
        if session.is_closing() {
            return;
        }

        match result {
            Some(payload) => session.deliver_result(payload).await,
            None => {
                error!(peer = %session.peer(), error = %GatewayError::MissingResult, "lpac bridge fault");
                session.close(SessionResult::Error).await;
            }
        }
    }
    .boxed()
}

async fn read_until_result(
    session: &Session,
    stdout: ChildStdout,
    stdin: &LpacStdin,
) -> GatewayResult<Option<Payload>> {
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(peer = %session.peer(), line, "lpac ->");

        let message: LpacMessage = serde_json::from_str(line)?;
        match message.kind() {
            MessageKind::Apdu => match message.apdu_func() {
                ApduFunc::Connect | ApduFunc::LogicChannelOpen => {
                    stdin.write_line(&messages::apdu_ack()?).await?;
                }
                ApduFunc::Transmit => {
                    let apdu = hex::decode(message.payload.param.trim())?;
                    session.send_frame(Tag::Apdu, &apdu).await?;
                }
                ApduFunc::Other(func) => {
                    debug!(peer = %session.peer(), func, "apdu request ignored");
                }
            },
            MessageKind::Lpa => return Ok(Some(message.payload)),
            MessageKind::Other(kind) => {
                debug!(peer = %session.peer(), kind, "lpac message ignored");
            }
        }
    }
    Ok(None)
}

async fn wait_for_exit(session: &Session, mut exited: oneshot::Receiver<()>) {
    let grace = session.ctx().exit_grace;
    if tokio::time::timeout(grace, &mut exited).await.is_err() {
        warn!(peer = %session.peer(), ?grace, "lpac still running after its result, killing");
        session.kill_process();
        let _ = exited.await;
    }
}

async fn watch_stderr(session: Arc<Session>, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    let fault = match lines.next_line().await {
        Ok(None) => return,
        Ok(Some(line)) => GatewayError::Stderr(line),
        Err(e) => GatewayError::Io(e),
    };
    error!(peer = %session.peer(), error = %fault, "lpac fault");
    session.close(SessionResult::Error).await;
}
