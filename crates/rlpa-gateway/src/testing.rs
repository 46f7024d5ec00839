//! Test utilities: loopback device connections and a scripted lpac.
//!
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! let ctx = testing::script_context(r#"echo '{"type":"lpa","payload":{"code":0}}'"#);
//! let mut conn = testing::connect(ctx).await?;
//! conn.device.send(Tag::Management, &[]).await?;
//! let credentials = conn.device.recv().await;
//! ```

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use rlpa_codec::{Frame, FrameDecoder, Tag};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::config::GatewayConfig;
use crate::context::GatewayContext;
use crate::ports::LpacLauncher;
use crate::session::Session;

/// Runs `sh -c <script> lpac <args...>`, so the script sees lpac's
/// arguments as `$1`, `$2`, ...
#[derive(Debug, Clone)]
pub struct ScriptLauncher {
    script: String,
}

impl ScriptLauncher {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl LpacLauncher for ScriptLauncher {
    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(&self.script).arg("lpac").args(args);
        command
    }
}

/// Context backed by a [`ScriptLauncher`] with the default keepalive.
pub fn script_context(script: &str) -> Arc<GatewayContext> {
    script_context_with_keepalive(script, Duration::from_secs(60))
}

pub fn script_context_with_keepalive(script: &str, keepalive: Duration) -> Arc<GatewayContext> {
    let base = GatewayContext::new(
        &GatewayConfig::default(),
        Arc::new(ScriptLauncher::new(script)),
    );
    Arc::new(GatewayContext {
        keepalive,
        exit_grace: Duration::from_secs(2),
        ..base
    })
}

/// Device end of a loopback connection.
#[derive(Debug)]
pub struct Device {
    stream: TcpStream,
    pending: BytesMut,
    decoder: FrameDecoder,
}

impl Device {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            pending: BytesMut::new(),
            decoder: FrameDecoder::new(),
        }
    }

    pub async fn send(&mut self, tag: Tag, value: &[u8]) -> io::Result<()> {
        let bytes = rlpa_codec::encode(tag, value)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        self.stream.write_all(&bytes).await
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await
    }

    /// Next frame from the gateway, `None` once the socket is closed.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            if !self.pending.is_empty() {
                let consumed = self.decoder.decode_step(&self.pending).ok()?;
                self.pending.advance(consumed);
                if self.decoder.is_complete() {
                    return std::mem::take(&mut self.decoder).into_frame();
                }
            }
            let mut buf = [0u8; 1024];
            match self.stream.read(&mut buf).await {
                Ok(0) | Err(_) => return None,
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
            }
        }
    }

    /// Frames up to and including `Close`, or until the socket ends.
    pub async fn recv_until_close(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.recv().await {
            let done = frame.tag == Tag::Close;
            frames.push(frame);
            if done {
                break;
            }
        }
        frames
    }

    /// Shut down the write side, as a device hanging up would.
    pub async fn hang_up(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

/// A session wired to a loopback device.
pub struct TestConnection {
    pub device: Device,
    pub session: Arc<Session>,
    pub task: JoinHandle<()>,
}

/// Open a loopback connection and start its session read loop.
pub async fn connect(ctx: Arc<GatewayContext>) -> io::Result<TestConnection> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (client, (server, peer)) = tokio::try_join!(TcpStream::connect(addr), listener.accept())?;

    let (session, reader) = Session::new(server, peer, ctx);
    let task = tokio::spawn(Arc::clone(&session).run(reader));
    Ok(TestConnection {
        device: Device::new(client),
        session,
        task,
    })
}

/// Value of a frame as text.
pub fn text(frame: &Frame) -> String {
    String::from_utf8_lossy(&frame.value).into_owned()
}

/// Tags of `frames`, in order.
pub fn tags(frames: &[Frame]) -> Vec<Tag> {
    frames.iter().map(|frame| frame.tag).collect()
}
