//! Error types for the controller layer.

use roomwatch_protocol::RoomId;

/// Errors reported by the platform collaborators (token, liveness,
/// discovery).
///
/// Controllers never propagate these: a failed call is logged and the
/// affected room or area stays unmonitored until the next trigger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The request never produced a response (DNS, TLS, timeout...).
    #[error("network error: {0}")]
    Network(String),

    /// The platform answered with a non-zero status code.
    #[error("api error {code}: {message}")]
    Api { code: i64, message: String },

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Errors that can occur while talking to a controller or its monitors.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The controller task has shut down; its command channel is closed.
    #[error("{0} controller is unavailable")]
    Unavailable(&'static str),

    /// A monitor could not (re)establish its feed connection.
    #[error("monitor for room {room_id} failed to start: {reason}")]
    MonitorStart { room_id: RoomId, reason: String },
}
