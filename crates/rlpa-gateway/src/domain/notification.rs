//! Pending profile notifications as listed by `lpac notification list`.

use serde::Deserialize;

use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub seq_number: u64,
    pub profile_management_operation: String,
    #[serde(default)]
    pub notification_address: String,
    #[serde(default)]
    pub iccid: String,
}

impl Notification {
    /// lpac arguments that process this notification.
    ///
    /// Install/enable/disable notifications are removed after sending (`-r`);
    /// delete notifications are sent as is.
    pub fn process_args(&self) -> GatewayResult<Vec<String>> {
        let mut args = vec![
            "notification".to_string(),
            "process".to_string(),
            self.seq_number.to_string(),
        ];
        match self.profile_management_operation.as_str() {
            "install" | "enable" | "disable" => args.push("-r".to_string()),
            "delete" => {}
            other => return Err(GatewayError::UnsupportedOperation(other.to_string())),
        }
        Ok(args)
    }
}

/// Parse the `data` field of a `notification list` result.
pub fn parse_list(data: serde_json::Value) -> GatewayResult<Vec<Notification>> {
    if data.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(data)?)
}
