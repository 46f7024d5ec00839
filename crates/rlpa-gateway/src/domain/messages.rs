//! lpac stdio line protocol.
//!
//! Every line in either direction is one JSON object:
//!
//! ```text
//! lpac → gateway   {"type":"apdu","payload":{"func":"transmit","param":"80E2..."}}
//! gateway → lpac   {"type":"apdu","payload":{"ecode":0,"data":"9000"}}
//! lpac → gateway   {"type":"lpa","payload":{"code":0,"message":"success","data":...}}
//! ```

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::GatewayResult;

/// A line printed by lpac.
#[derive(Debug, Clone, Deserialize)]
pub struct LpacMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payload: Payload,
}

/// Payload of an lpac message.
///
/// `func`/`param` are set on APDU requests, `code`/`message`/`data` on results.
/// lpac prints `null` for fields it has no value for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub func: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub param: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ecode: i64,
    #[serde(default)]
    pub data: serde_json::Value,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Payload {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind<'a> {
    /// Card access request
    Apdu,
    /// Final result of the operation
    Lpa,
    /// Progress and other informational output
    Other(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApduFunc<'a> {
    Connect,
    LogicChannelOpen,
    Transmit,
    Other(&'a str),
}

impl LpacMessage {
    pub fn kind(&self) -> MessageKind<'_> {
        match self.kind.as_str() {
            "apdu" => MessageKind::Apdu,
            "lpa" => MessageKind::Lpa,
            other => MessageKind::Other(other),
        }
    }

    pub fn apdu_func(&self) -> ApduFunc<'_> {
        match self.payload.func.as_str() {
            "connect" => ApduFunc::Connect,
            "logic_channel_open" => ApduFunc::LogicChannelOpen,
            "transmit" => ApduFunc::Transmit,
            other => ApduFunc::Other(other),
        }
    }
}

#[derive(Serialize)]
struct ApduReply {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: ApduReplyPayload,
}

#[derive(Serialize)]
struct ApduReplyPayload {
    ecode: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

/// Acknowledge `connect` / `logic_channel_open`.
pub fn apdu_ack() -> GatewayResult<String> {
    let reply = ApduReply {
        kind: "apdu",
        payload: ApduReplyPayload {
            ecode: 0,
            data: None,
        },
    };
    Ok(serde_json::to_string(&reply)?)
}

/// Card response bytes received from the device.
pub fn apdu_response(data: &[u8]) -> GatewayResult<String> {
    let reply = ApduReply {
        kind: "apdu",
        payload: ApduReplyPayload {
            ecode: 0,
            data: Some(hex::encode(data)),
        },
    };
    Ok(serde_json::to_string(&reply)?)
}
