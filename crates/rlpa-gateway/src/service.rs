//! # Connection Acceptor
//!
//! Accepts device connections and runs one [`Session`] task per socket.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::context::GatewayContext;
use crate::session::Session;

/// Pause after a failed accept so descriptor exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct GatewayService {
    ctx: Arc<GatewayContext>,
}

impl GatewayService {
    pub fn new(ctx: Arc<GatewayContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<GatewayContext> {
        &self.ctx
    }

    /// Accept connections until `shutdown` flips or its sender goes away.
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> io::Result<()> {
        info!(addr = %listener.local_addr()?, "RLPA server listening");
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        self.spawn_session(stream, peer);
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                _ = shutdown.changed() => {
                    info!("RLPA server stopping");
                    return Ok(());
                }
            }
        }
    }

    /// Start the read loop for an accepted connection.
    pub fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) -> (Arc<Session>, JoinHandle<()>) {
        info!(%peer, "Accepted RLPA connection");
        let (session, reader) = Session::new(stream, peer, Arc::clone(&self.ctx));
        let task = tokio::spawn(Arc::clone(&session).run(reader));
        (session, task)
    }
}
