//! # Driven Ports (Outbound SPI)

use tokio::process::Command;

/// Builds the command for one lpac invocation.
///
/// The bridge configures stdio itself; implementations only choose the
/// program, its arguments and its environment.
pub trait LpacLauncher: Send + Sync {
    fn command(&self, args: &[String]) -> Command;
}
