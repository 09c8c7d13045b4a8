use thiserror::Error;

/// Custom error types for the session sync core
#[derive(Debug, Error)]
pub enum SyncError {
    /// Booking resolution errors. Each maps to a distinct user-facing
    /// reason so clients can tell "not your booking" from "too early"
    #[error("You must be signed in to join a session")]
    NotSignedIn,

    #[error("This booking belongs to a different student")]
    StudentMismatch,

    #[error("This session is not live right now")]
    SessionNotLive,

    #[error("Booking {0} not found")]
    BookingNotFound(String),

    #[error("No tutor profile found for booking {0}")]
    TutorMissing(String),

    #[error("Tutor {0} has no room configured")]
    TutorNoRoomId(String),

    /// Join-time transport errors, surfaced verbatim to the user
    #[error("Failed to connect to session room: {0}")]
    TransportConnectFailed(String),

    #[error("Transport send failed: {0}")]
    TransportSendFailed(String),

    /// Room and participant errors
    #[error("A tutor is already present in room {0}")]
    TutorAlreadyPresent(String),

    #[error("Participant {0} not authorized for this operation")]
    Unauthorized(String),

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Helper to create Internal errors with context
    pub fn internal(msg: impl Into<String>) -> Self {
        SyncError::Internal(msg.into())
    }

    /// Helper to create transport connect errors
    pub fn connect_failed(msg: impl Into<String>) -> Self {
        SyncError::TransportConnectFailed(msg.into())
    }
}
