//! # RLPA Server
//!
//! Runs the device listener and the management API in one process.
//!
//! ## Startup Sequence
//!
//! 1. Parse flags and initialize logging
//! 2. Load configuration (defaults, then environment overrides)
//! 3. Bind both listeners
//! 4. Serve until Ctrl+C, then stop both listeners

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rlpa_gateway::{ConfigError, GatewayConfig, GatewayContext, GatewayService};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Gateway between RLPA devices and a local lpac binary
#[derive(Parser, Debug)]
#[command(name = "rlpa-server", version)]
#[command(
    about = "Gateway between RLPA devices and a local lpac binary",
    after_help = "Environment:\n  \
        SOCKET_PORT   device listener port (default 1888)\n  \
        API_PORT      management API port (default 8008)\n  \
        LPAC_FOLDER   directory holding the lpac binary (default ./lpac)\n  \
        RUST_LOG      log filter, overrides --debug"
)]
struct Args {
    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Apply `SOCKET_PORT`, `API_PORT` and `LPAC_FOLDER` on top of `config`.
fn apply_env(
    config: &mut GatewayConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(port) = var("SOCKET_PORT") {
        config.socket.port = parse_port("SOCKET_PORT", &port)?;
    }
    if let Some(port) = var("API_PORT") {
        config.api.port = parse_port("API_PORT", &port)?;
    }
    if let Some(folder) = var("LPAC_FOLDER") {
        config.lpac.folder = PathBuf::from(folder);
    }
    Ok(())
}

fn parse_port(name: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|e| ConfigError::InvalidEnv {
        name: name.to_string(),
        reason: format!("{value:?}: {e}"),
    })
}

fn load_config() -> Result<GatewayConfig> {
    let mut config = GatewayConfig::default();
    apply_env(&mut config, |name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let config = load_config().context("invalid configuration")?;
    info!(
        socket = %config.socket.addr(),
        api = %config.api.addr(),
        lpac = %config.lpac.path().display(),
        "Starting RLPA server"
    );

    let device_listener = TcpListener::bind(config.socket.addr())
        .await
        .with_context(|| format!("failed to bind device listener on {}", config.socket.addr()))?;
    let api_listener = TcpListener::bind(config.api.addr())
        .await
        .with_context(|| format!("failed to bind management API on {}", config.api.addr()))?;

    let ctx = Arc::new(GatewayContext::from_config(&config));
    let service = GatewayService::new(Arc::clone(&ctx));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let device_task = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { service.serve(device_listener, shutdown).await })
    };
    let api_task = tokio::spawn(rlpa_api::serve(
        api_listener,
        ctx.sessions.clone(),
        shutdown_rx,
    ));

    info!("RLPA server is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);

    for (name, task) in [("device listener", device_task), ("management API", api_task)] {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "{name} failed"),
            Err(e) => error!(error = %e, "{name} task panicked"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env(
            &mut config,
            env(&[("SOCKET_PORT", "1999"), ("API_PORT", "9009"), ("LPAC_FOLDER", "/opt/lpac")]),
        )
        .unwrap();

        assert_eq!(config.socket.port, 1999);
        assert_eq!(config.api.port, 9009);
        assert_eq!(config.lpac.folder, PathBuf::from("/opt/lpac"));
    }

    #[test]
    fn test_unset_env_keeps_defaults() {
        let mut config = GatewayConfig::default();
        apply_env(&mut config, env(&[])).unwrap();
        assert_eq!(config.socket.port, 1888);
        assert_eq!(config.api.port, 8008);
    }

    #[test]
    fn test_bad_port_rejected() {
        let mut config = GatewayConfig::default();
        let err = apply_env(&mut config, env(&[("API_PORT", "0x1f40")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref name, .. } if name == "API_PORT"));
    }

    #[test]
    fn test_cli_parses() {
        let args = Args::parse_from(["rlpa-server", "--debug"]);
        assert!(args.debug);
        Args::command().debug_assert();
    }
}
