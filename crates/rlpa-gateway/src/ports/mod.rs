//! # Ports Layer
//!
//! - **Driving Ports (Inbound):** the management API this crate exposes
//! - **Driven Ports (Outbound):** how the lpac child command is built

pub mod inbound;
pub mod outbound;

pub use inbound::{ManagementApi, ManagementError};
pub use outbound::LpacLauncher;
