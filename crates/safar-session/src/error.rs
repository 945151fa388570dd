//! # Session Error Types
//!
//! Error types for booking session operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Session Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Remote      │  │      Domain             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  BookingRejected│  │  Core (validation,      │ │
//! │  │  Io             │  │  PaymentRejected│  │   rates, lifecycle)     │ │
//! │  │  TomlDe/TomlSer │  │  Remote         │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │   Concurrency   │                                                   │
//! │  │                 │                                                   │
//! │  │  AlreadyInFlight│                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use safar_core::{CoreError, LifecycleError, RateError};
use thiserror::Error;

use crate::api::RemoteError;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session error type covering every failure a wizard step can surface.
#[derive(Debug, Error)]
pub enum SessionError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    TomlSer(#[from] toml::ser::Error),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The booking API refused to create or return the booking.
    #[error("Booking rejected: {0}")]
    BookingRejected(String),

    /// The payment API refused the payment.
    #[error("Payment rejected: {0}")]
    PaymentRejected(String),

    /// The call never produced an answer (network, timeout, bad response).
    #[error("{operation} failed: {message}")]
    Remote { operation: &'static str, message: String },

    // =========================================================================
    // Concurrency Errors
    // =========================================================================
    /// A create or payment call for this session is still outstanding.
    #[error("A {0} request is already in flight")]
    AlreadyInFlight(&'static str),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<LifecycleError> for SessionError {
    fn from(err: LifecycleError) -> Self {
        SessionError::Core(CoreError::Lifecycle(err))
    }
}

impl From<RateError> for SessionError {
    fn from(err: RateError) -> Self {
        SessionError::Core(CoreError::Rate(err))
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::SerializationFailed(err.to_string())
    }
}

impl SessionError {
    /// Maps a remote failure of `operation` onto the session error space.
    pub(crate) fn from_remote(operation: &'static str, err: RemoteError) -> Self {
        match (operation, err) {
            ("payment", RemoteError::Rejected(message)) => SessionError::PaymentRejected(message),
            ("create booking" | "fetch booking", RemoteError::Rejected(message)) => {
                SessionError::BookingRejected(message)
            }
            (_, RemoteError::Rejected(message) | RemoteError::Unavailable(message)) => {
                SessionError::Remote { operation, message }
            }
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Remote { .. } | SessionError::AlreadyInFlight(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_mapping() {
        let err = SessionError::from_remote("payment", RemoteError::Rejected("slip unreadable".into()));
        assert_eq!(err.to_string(), "Payment rejected: slip unreadable");
        assert!(!err.is_retryable());

        let err = SessionError::from_remote("create booking", RemoteError::Rejected("seats sold out".into()));
        assert!(matches!(err, SessionError::BookingRejected(_)));

        let err = SessionError::from_remote("create booking", RemoteError::Unavailable("timeout".into()));
        assert_eq!(err.to_string(), "create booking failed: timeout");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_lifecycle_errors_wrap_core() {
        let err: SessionError = LifecycleError::NoBooking.into();
        assert!(matches!(err, SessionError::Core(CoreError::Lifecycle(LifecycleError::NoBooking))));
    }
}
