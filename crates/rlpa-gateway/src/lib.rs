//! # RLPA Gateway
//!
//! Terminates device connections speaking the RLPA frame protocol and
//! drives a local `lpac` subprocess on their behalf, relaying card APDUs
//! between the two.
//!
//! ## Architecture
//!
//! ```text
//!  device ──TCP──► Session ──► WorkMode ──► bridge ──stdio──► lpac
//!    ▲               │  ▲                     │
//!    └── Apdu/Lock ──┘  └──── lpa result ─────┘
//!
//!  HTTP API ──► ManagementApi (SessionManager) ──► Session (shell mode)
//! ```
//!
//! - **Domain:** activation codes, lpac messages, notifications, credentials
//! - **Ports:** [`ManagementApi`] (inbound), [`LpacLauncher`] (outbound)
//! - **Adapters:** [`LpacBinary`] launches the real executable
//! - **Service:** [`GatewayService`] accepts connections
//!
//! ## Invariants
//!
//! - One work mode per session, chosen by the first mode-select frame.
//! - At most one lpac child per session; `ApduLock`/`ApduUnlock` bracket it.
//! - Session teardown runs once and always answers a blocked shell caller.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
mod bridge;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;
pub mod session;
pub mod workmode;

/// Loopback sockets and a scripted lpac.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use adapters::LpacBinary;
pub use config::{ConfigError, CredentialConfig, GatewayConfig, ListenerConfig, LpacConfig};
pub use context::GatewayContext;
pub use domain::{Credential, CredentialRegistry, Notification, Payload, PullInfo, SessionResult, ShellReply};
pub use error::{GatewayError, GatewayResult, LockError, ShellError};
pub use ports::{LpacLauncher, ManagementApi, ManagementError};
pub use service::GatewayService;
pub use session::{Session, SessionManager};
pub use workmode::{ModeKind, WorkMode};
