//! # Remote Collaborators
//!
//! The booking API, the payment API and the rate feed live outside this
//! crate. The session only talks to them through these traits, so a real
//! HTTP client and an in-memory fake are interchangeable.
//!
//! ```text
//!   BookingSession ──create_booking──► BookingApi ──► BookingRecord
//!                  ──fetch_booking───►
//!                  ──submit_payment──► PaymentApi ──► PaymentReceipt
//!   RateStore      ──fetch_rates─────► RateSource ──► RateTable
//! ```

use async_trait::async_trait;
use thiserror::Error;

use safar_core::booking::{BookingRecord, CreateBookingRequest, PaymentReceipt, PaymentRequest};
use safar_core::rates::RateTable;

/// Failure reported by a remote collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The server answered and said no. Carries the server message.
    #[error("rejected: {0}")]
    Rejected(String),

    /// No usable answer (connection refused, timeout, malformed body).
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Booking creation and reload.
#[async_trait]
pub trait BookingApi: Send + Sync {
    /// Creates the booking. `request.request_id` is the idempotency key.
    async fn create_booking(&self, request: &CreateBookingRequest) -> Result<BookingRecord, RemoteError>;

    /// Reloads a previously created booking.
    async fn fetch_booking(&self, booking_id: &str) -> Result<BookingRecord, RemoteError>;
}

/// Payment submission against a created booking.
#[async_trait]
pub trait PaymentApi: Send + Sync {
    async fn submit_payment(&self, request: &PaymentRequest) -> Result<PaymentReceipt, RemoteError>;
}

/// Source of rate tables (visa, transport, hotels, packages, exchange).
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self) -> Result<RateTable, RemoteError>;
}
