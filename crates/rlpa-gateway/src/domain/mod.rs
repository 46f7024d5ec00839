//! Domain types: activation codes, lpac messages, notifications,
//! credentials and session outcomes.

pub mod activation_code;
pub mod credentials;
pub mod messages;
pub mod notification;
pub mod outcome;

pub use activation_code::{ActivationCodeError, PullInfo};
pub use credentials::{Credential, CredentialRegistry};
pub use messages::{ApduFunc, LpacMessage, MessageKind, Payload};
pub use notification::Notification;
pub use outcome::{SessionResult, ShellReply};
