//! GSMA SGP.22 LPA activation codes.
//!
//! `LPA:1$<SM-DP+ address>$<matching ID>$<OID>$<confirmation code required>`
//!
//! Devices may drop the `LPA:` or `LPA:1` prefix and, to avoid raw `$`
//! bytes, may send 0x02 for `$` and 0x11 for `_`.

use thiserror::Error;

/// Activation code format marker supported by this gateway.
const FORMAT_MARKER: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationCodeError {
    #[error("LPA Activation Code format error")]
    Format,
}

/// Decoded download parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullInfo {
    pub smdp: String,
    pub matching_id: String,
    pub object_id: String,
    pub confirmation_code_required: bool,
}

/// Add the `LPA:` / `LPA:1` prefix when the device left it out.
pub fn complete(input: &str) -> String {
    if input.starts_with("LPA:1$") {
        input.to_string()
    } else if input.starts_with("1$") {
        format!("LPA:{input}")
    } else if input.starts_with('$') {
        format!("LPA:1{input}")
    } else {
        input.to_string()
    }
}

/// Decode a complete activation code.
pub fn decode(code: &str) -> Result<PullInfo, ActivationCodeError> {
    let body = code
        .trim()
        .strip_prefix("LPA:")
        .ok_or(ActivationCodeError::Format)?;

    let mut parts = body.split('$');
    if parts.next() != Some(FORMAT_MARKER) {
        return Err(ActivationCodeError::Format);
    }

    let mut field = || parts.next().map(str::trim).unwrap_or_default().to_string();
    let info = PullInfo {
        smdp: field(),
        matching_id: field(),
        object_id: field(),
        confirmation_code_required: field() == "1",
    };

    if info.smdp.is_empty() {
        return Err(ActivationCodeError::Format);
    }
    Ok(info)
}

/// Decode the value of a DownloadProfile frame.
pub fn from_device_payload(raw: &[u8]) -> Result<PullInfo, ActivationCodeError> {
    let unescaped: Vec<u8> = raw
        .iter()
        .map(|&b| match b {
            0x02 => b'$',
            0x11 => b'_',
            other => other,
        })
        .collect();
    let text = String::from_utf8(unescaped).map_err(|_| ActivationCodeError::Format)?;
    decode(&complete(text.trim()))
}
