//! # Booking Lifecycle
//!
//! Pure state machine for one booking. It never calls the network; the
//! session drives it with the outcome of each remote call.
//!
//! ## States
//! ```text
//!            review (valid)             create ok
//!   ┌───────┐ ─────────────► ┌───────────┐ ─────────► ┌─────────┐
//!   │ Draft │                │ Reviewing │            │ Created │
//!   └───────┘ ◄───────────── └───────────┘            └────┬────┘
//!                back_to_edit      │ create failed         │ automatic
//!                                  ▼ (stays)               ▼
//!                           ┌───────────┐  hold    ┌────────────────┐
//!                           │   Held    │ ◄─────── │ PaymentPending │
//!                           │           │ ───────► │                │
//!                           └───────────┘  resume  └───────┬────────┘
//!                                                          │ payment ok
//!   Created | PaymentPending ── now ≥ deadline ──► Expired  ▼
//!                                                    ┌───────────┐
//!                                                    │ Confirmed │
//!                                                    └───────────┘
//! ```
//!
//! Expiry is advisory: it is observed against a caller-supplied `now` and
//! never enforced here. A payment the server accepts also confirms an
//! Expired booking. Created, PaymentPending and Held all map to the wire
//! status `underprocess`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, LifecycleError, ValidationReport};
use crate::money::Money;

// =============================================================================
// States
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BookingState {
    #[default]
    Draft,
    Reviewing,
    Created,
    PaymentPending,
    Confirmed,
    Expired,
    Held,
}

impl BookingState {
    /// Status string the booking API stores.
    pub fn wire_status(&self) -> BookingStatus {
        match self {
            BookingState::Draft | BookingState::Reviewing => BookingStatus::Draft,
            BookingState::Created | BookingState::PaymentPending | BookingState::Held => BookingStatus::Underprocess,
            BookingState::Confirmed => BookingStatus::Confirmed,
            BookingState::Expired => BookingStatus::Expired,
        }
    }

    /// Passenger and room inputs may only change before creation.
    pub fn is_editable(&self) -> bool {
        matches!(self, BookingState::Draft | BookingState::Reviewing)
    }

    /// A booking record exists on the server.
    pub fn is_created(&self) -> bool {
        !self.is_editable()
    }
}

/// Booking status as exchanged with the booking API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Draft,
    Underprocess,
    Confirmed,
    Expired,
}

/// Server-assigned facts about a created booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BookingAnchor {
    pub booking_id: String,
    pub reference: String,
    /// Authoritative once the booking exists; later rate changes never touch it.
    pub grand_total: Money,
    #[ts(as = "Option<String>")]
    pub expiry_deadline: Option<DateTime<Utc>>,
}

// =============================================================================
// Lifecycle
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingLifecycle {
    state: BookingState,
    anchor: Option<BookingAnchor>,
}

impl BookingLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BookingState {
        self.state
    }

    pub fn anchor(&self) -> Option<&BookingAnchor> {
        self.anchor.as_ref()
    }

    fn transition(&mut self, allowed: &[BookingState], to: BookingState, action: &str) -> Result<(), LifecycleError> {
        if allowed.contains(&self.state) {
            self.state = to;
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition {
                from: self.state,
                action: action.to_string(),
            })
        }
    }

    fn require(&self, state: BookingState, action: &str) -> Result<(), LifecycleError> {
        if self.state == state {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition {
                from: self.state,
                action: action.to_string(),
            })
        }
    }

    /// Draft → Reviewing. Blocked by any validation issue.
    pub fn review(&mut self, report: &ValidationReport) -> CoreResult<()> {
        self.require(BookingState::Draft, "review")?;
        if !report.is_empty() {
            return Err(CoreError::Invalid(report.clone()));
        }
        self.state = BookingState::Reviewing;
        Ok(())
    }

    /// Reviewing → Draft.
    pub fn back_to_edit(&mut self) -> Result<(), LifecycleError> {
        self.transition(&[BookingState::Reviewing], BookingState::Draft, "edit")
    }

    /// Checked before the create call goes out.
    pub fn ensure_can_create(&self) -> Result<(), LifecycleError> {
        self.require(BookingState::Reviewing, "create booking")
    }

    /// Reviewing → Created → PaymentPending.
    pub fn record_created(&mut self, anchor: BookingAnchor) -> Result<(), LifecycleError> {
        self.transition(&[BookingState::Reviewing], BookingState::Created, "record created booking")?;
        self.anchor = Some(anchor);
        self.state = BookingState::PaymentPending;
        Ok(())
    }

    /// Checked before the payment call goes out.
    pub fn ensure_can_pay(&self) -> Result<&BookingAnchor, LifecycleError> {
        self.require(BookingState::PaymentPending, "submit payment")?;
        self.anchor.as_ref().ok_or(LifecycleError::NoBooking)
    }

    /// PaymentPending → Confirmed, once the payment service has accepted.
    ///
    /// Expiry is advisory: a booking whose countdown ran out while the
    /// payment call was out is still confirmed by the server's acceptance.
    pub fn record_payment(&mut self) -> Result<(), LifecycleError> {
        self.transition(
            &[BookingState::PaymentPending, BookingState::Expired],
            BookingState::Confirmed,
            "confirm payment",
        )
    }

    /// PaymentPending → Held.
    pub fn hold(&mut self) -> Result<(), LifecycleError> {
        self.transition(&[BookingState::PaymentPending], BookingState::Held, "hold")
    }

    /// Held → PaymentPending.
    pub fn resume_payment(&mut self) -> Result<(), LifecycleError> {
        self.transition(&[BookingState::Held], BookingState::PaymentPending, "resume payment")
    }

    /// Flips Created/PaymentPending to Expired once `now` reaches the deadline.
    /// Returns whether the state changed.
    pub fn observe_clock(&mut self, now: DateTime<Utc>) -> bool {
        let expirable = matches!(self.state, BookingState::Created | BookingState::PaymentPending);
        let due = self
            .anchor
            .as_ref()
            .and_then(|a| a.expiry_deadline)
            .is_some_and(|deadline| now >= deadline);
        if expirable && due {
            self.state = BookingState::Expired;
            true
        } else {
            false
        }
    }

    /// Time left before the deadline, for "will expire in" display.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let deadline = self.anchor.as_ref()?.expiry_deadline?;
        Some((deadline - now).max(Duration::zero()))
    }

    /// Rebuilds the lifecycle of a booking reloaded from the server.
    pub fn restore(anchor: BookingAnchor, status: BookingStatus, now: DateTime<Utc>) -> Result<Self, LifecycleError> {
        let state = match status {
            BookingStatus::Underprocess => BookingState::PaymentPending,
            BookingStatus::Confirmed => BookingState::Confirmed,
            BookingStatus::Expired => BookingState::Expired,
            BookingStatus::Draft => return Err(LifecycleError::NoBooking),
        };
        let mut lifecycle = BookingLifecycle {
            state,
            anchor: Some(anchor),
        };
        lifecycle.observe_clock(now);
        Ok(lifecycle)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
