//! Adapters for the outbound ports.

pub mod lpac_binary;

pub use lpac_binary::LpacBinary;
