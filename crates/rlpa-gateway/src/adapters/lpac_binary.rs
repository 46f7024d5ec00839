//! Production launcher for the lpac executable.

use std::path::PathBuf;

use tokio::process::Command;

use crate::config::LpacConfig;
use crate::ports::LpacLauncher;

#[derive(Debug, Clone)]
pub struct LpacBinary {
    path: PathBuf,
    apdu_interface: String,
    http_interface: String,
}

impl LpacBinary {
    pub fn new(config: &LpacConfig) -> Self {
        Self {
            path: config.path(),
            apdu_interface: config.apdu_interface.clone(),
            http_interface: config.http_interface.clone(),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl LpacLauncher for LpacBinary {
    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.path);
        command
            .args(args)
            .env_clear()
            .env("APDU_INTERFACE", &self.apdu_interface)
            .env("HTTP_INTERFACE", &self.http_interface);
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_command_shape() {
        let config = LpacConfig {
            folder: PathBuf::from("/opt/lpac"),
            ..Default::default()
        };
        let launcher = LpacBinary::new(&config);
        let command = launcher.command(&["chip".to_string(), "info".to_string()]);
        let std_command = command.as_std();

        assert_eq!(std_command.get_program(), config.path().as_os_str());
        let args: Vec<&OsStr> = std_command.get_args().collect();
        assert_eq!(args, vec![OsStr::new("chip"), OsStr::new("info")]);

        let envs: Vec<(&OsStr, Option<&OsStr>)> = std_command.get_envs().collect();
        assert!(envs.contains(&(
            OsStr::new("APDU_INTERFACE"),
            Some(OsStr::new(config.apdu_interface.as_str()))
        )));
        assert!(envs.contains(&(
            OsStr::new("HTTP_INTERFACE"),
            Some(OsStr::new(config.http_interface.as_str()))
        )));
    }
}
