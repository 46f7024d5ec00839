//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[cfg(target_os = "windows")]
const LIB_SUFFIX: &str = ".dll";
#[cfg(target_os = "macos")]
const LIB_SUFFIX: &str = ".dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIB_SUFFIX: &str = ".so";

const EXE_NAME: &str = if cfg!(target_os = "windows") {
    "lpac.exe"
} else {
    "lpac"
};

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Device (RLPA) listener
    pub socket: ListenerConfig,
    /// Management API listener
    pub api: ListenerConfig,
    /// lpac binary and driver libraries
    pub lpac: LpacConfig,
    /// Credential shape
    pub credentials: CredentialConfig,
    /// API lock inactivity timeout in seconds
    pub keepalive_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            socket: ListenerConfig::any(1888),
            api: ListenerConfig::any(8008),
            lpac: LpacConfig::default(),
            credentials: CredentialConfig::default(),
            keepalive_secs: 60,
        }
    }
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.socket.port == self.api.port {
            return Err(ConfigError::DuplicatePorts);
        }

        if self.credentials.id_length == 0 || self.credentials.password_length == 0 {
            return Err(ConfigError::InvalidCredentials(
                "credential lengths cannot be 0".into(),
            ));
        }

        if self.keepalive_secs == 0 {
            return Err(ConfigError::InvalidTimeout(
                "keepalive cannot be 0".into(),
            ));
        }

        Ok(())
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

/// Listener bind address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl ListenerConfig {
    fn any(port: u16) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// lpac subprocess configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LpacConfig {
    /// Directory holding the lpac binary
    pub folder: PathBuf,
    /// Binary file name
    pub exe_name: String,
    /// Passed to the child as APDU_INTERFACE
    pub apdu_interface: String,
    /// Passed to the child as HTTP_INTERFACE
    pub http_interface: String,
    /// How long a child may linger after reporting its result
    pub exit_grace_secs: u64,
}

impl Default for LpacConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("lpac"),
            exe_name: EXE_NAME.to_string(),
            apdu_interface: format!("libapduinterface_stdio{LIB_SUFFIX}"),
            http_interface: format!("libhttpinterface_curl{LIB_SUFFIX}"),
            exit_grace_secs: 5,
        }
    }
}

impl LpacConfig {
    pub fn path(&self) -> PathBuf {
        self.folder.join(&self.exe_name)
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_secs(self.exit_grace_secs)
    }
}

/// Shape of issued management credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Identifier length (letters and digits without look-alikes)
    pub id_length: usize,
    /// Password length (decimal digits)
    pub password_length: usize,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            id_length: 2,
            password_length: 2,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Device and API listeners on the same port
    #[error("duplicate ports configured")]
    DuplicatePorts,
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Environment variable could not be parsed
    #[error("invalid value for {name}: {reason}")]
    InvalidEnv { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket.port, 1888);
        assert_eq!(config.api.port, 8008);
        assert_eq!(config.keepalive(), Duration::from_secs(60));
        assert!(config.lpac.path().ends_with(EXE_NAME));
        assert!(config.lpac.apdu_interface.starts_with("libapduinterface_stdio."));
    }

    #[test]
    fn test_duplicate_ports() {
        let mut config = GatewayConfig::default();
        config.api.port = config.socket.port;
        assert_eq!(config.validate(), Err(ConfigError::DuplicatePorts));
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = GatewayConfig::default();
        config.credentials.password_length = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCredentials(_))
        ));

        let mut config = GatewayConfig::default();
        config.keepalive_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(_))));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"keepalive_secs": 30, "lpac": {"folder": "/opt/lpac"}}"#)
                .unwrap();
        assert_eq!(config.keepalive_secs, 30);
        assert_eq!(config.lpac.path(), PathBuf::from("/opt/lpac").join(EXE_NAME));
        assert_eq!(config.socket.port, 1888);
    }
}
