//! Response bodies of the live API.
//!
//! Every endpoint wraps its payload in the same `{code, message, data}`
//! envelope; a non-zero `code` is an error regardless of the HTTP status.

use roomwatch_protocol::RoomId;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ApiError;

/// The common wrapper. Endpoints disagree on `message` vs `msg`, and some
/// send `data: []` alongside an error code, so `data` stays untyped until
/// the code has been checked.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Value,
}

/// Parses `body` and returns the payload of a successful envelope.
pub(crate) fn parse<T: DeserializeOwned>(endpoint: &'static str, body: &str) -> Result<T, ApiError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|source| ApiError::Decode { endpoint, source })?;

    if envelope.code != 0 {
        let message = if envelope.message.is_empty() {
            envelope.msg
        } else {
            envelope.message
        };
        return Err(ApiError::Status {
            endpoint,
            code: envelope.code,
            message,
        });
    }
    if envelope.data.is_null() {
        return Err(ApiError::MissingData { endpoint });
    }
    serde_json::from_value(envelope.data).map_err(|source| ApiError::Decode { endpoint, source })
}

/// `xlive/web-room/v1/index/getDanmuInfo`
#[derive(Debug, Deserialize)]
pub(crate) struct DanmuInfo {
    pub(crate) token: String,
}

/// `room/v1/Room/get_info`
#[derive(Debug, Deserialize)]
pub(crate) struct RoomStatus {
    /// 0 offline, 1 live, 2 looping replays.
    pub(crate) live_status: u8,
}

impl RoomStatus {
    pub(crate) fn is_live(&self) -> bool {
        self.live_status == 1
    }
}

/// One entry of `room/v1/area/getRoomList`.
#[derive(Debug, Deserialize)]
pub(crate) struct AreaRoom {
    pub(crate) roomid: RoomId,
}
