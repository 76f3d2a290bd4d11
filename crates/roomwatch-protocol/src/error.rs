//! Error types for the protocol layer.

/// Errors produced while parsing protocol values from external input
/// (config files, API responses).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The numeric area id is not one of the known content areas.
    #[error("unknown area id {0}")]
    UnknownArea(u32),

    /// The category name does not match any raffle category.
    #[error("unknown raffle category {0:?}")]
    UnknownCategory(String),

    /// A room id must be a positive integer.
    #[error("invalid room id {0}")]
    InvalidRoomId(u64),
}
