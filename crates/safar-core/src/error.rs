//! # Error Types
//!
//! Domain-specific error types for safar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  safar-core errors (this file)                                          │
//! │  ├── CoreError        - Umbrella for everything below                   │
//! │  ├── ValidationError  - One field of one passenger/payment is wrong     │
//! │  ├── RateError        - No rate matches the current configuration       │
//! │  └── LifecycleError   - Transition not allowed from the current state   │
//! │                                                                         │
//! │  safar-session errors (separate crate)                                  │
//! │  └── SessionError     - Remote failures, in-flight guards, config       │
//! │                                                                         │
//! │  Flow: ValidationError → ValidationReport → CoreError → SessionError    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation and rate errors are local and recoverable: they block the
//! lifecycle and never reach the network.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::lifecycle::BookingState;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// One or more passengers/fields failed validation.
    #[error("{} validation issue(s): {}", .0.len(), .0.summary())]
    Invalid(ValidationReport),

    /// A single validation failure outside the passenger list.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Rate data could not be resolved for the configuration.
    #[error("Rate error: {0}")]
    Rate(#[from] RateError),

    /// Lifecycle transition rejected.
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Age at the reference date does not fit the declared passenger type.
    ///
    /// ```text
    /// Adult  → age ≥ 18
    /// Child  → 2 ≤ age < 18
    /// Infant → age < 2
    /// ```
    #[error("{field}: age {age} is not allowed for {passenger_type}")]
    AgeOutOfRange {
        field: String,
        passenger_type: String,
        age: u32,
    },

    /// A date is in an impossible order (e.g. expiry before issue).
    #[error("{field} has invalid date: {reason}")]
    InvalidDate { field: String, reason: String },

    /// Value is not one of the accepted spellings.
    #[error("{field} has invalid value: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// The configuration has no rooms and no passengers.
    #[error("at least one room or passenger is required")]
    EmptyConfiguration,
}

/// One validation failure, keyed to the passenger slot it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SlotIssue {
    /// `None` for booking-level issues (e.g. empty configuration).
    pub slot_id: Option<u32>,
    pub error: ValidationError,
}

/// Every validation failure of a configuration, for inline display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidationReport {
    pub issues: Vec<SlotIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, slot_id: Option<u32>, error: ValidationError) {
        self.issues.push(SlotIssue { slot_id, error });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Issues for one passenger slot.
    pub fn for_slot(&self, slot_id: u32) -> impl Iterator<Item = &ValidationError> {
        self.issues
            .iter()
            .filter(move |i| i.slot_id == Some(slot_id))
            .map(|i| &i.error)
    }

    /// Converts a non-empty report into an error.
    pub fn into_result(self) -> CoreResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Invalid(self))
        }
    }

    fn summary(&self) -> String {
        self.issues
            .iter()
            .map(|i| match i.slot_id {
                Some(id) => format!("passenger {}: {}", id, i.error),
                None => i.error.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// =============================================================================
// Rate Error
// =============================================================================

/// Rate-resolution failures.
///
/// ## When This Occurs
/// - The party size falls between the pax ranges the visa feed publishes
/// - The resolved visa rate only allows vehicles that are not on sale
/// - The package has no selling price for a selected room type
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RateError {
    #[error("No visa rate for {pax_count} passenger(s) (with transport: {with_transport})")]
    NoVisaRate { pax_count: u32, with_transport: bool },

    #[error("No transport vehicle available for visa rate {visa_rate_id}")]
    NoVehicleAvailable { visa_rate_id: String },

    #[error("Package {package_id} has no selling price for {room_type} rooms")]
    RoomNotOffered { package_id: String, room_type: String },

    #[error("Rate {id} not found in {table}")]
    Missing { table: String, id: String },
}

// =============================================================================
// Lifecycle Error
// =============================================================================

/// Rejected booking lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The requested action is not available from the current state.
    #[error("Cannot {action} while booking is {from:?}")]
    InvalidTransition { from: BookingState, action: String },

    /// The action needs a created booking record.
    #[error("No booking record has been created yet")]
    NoBooking,

    /// Payment has soft warnings the user has not acknowledged.
    #[error("Payment needs confirmation: {0:?}")]
    UnacknowledgedWarnings(Vec<String>),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "passport_number".to_string(),
        };
        assert_eq!(err.to_string(), "passport_number is required");

        let err = ValidationError::AgeOutOfRange {
            field: "date_of_birth".to_string(),
            passenger_type: "infant".to_string(),
            age: 3,
        };
        assert_eq!(err.to_string(), "date_of_birth: age 3 is not allowed for infant");
    }

    #[test]
    fn test_report_into_result() {
        assert!(ValidationReport::new().into_result().is_ok());

        let mut report = ValidationReport::new();
        report.push(Some(2), ValidationError::Required { field: "first_name".into() });
        report.push(None, ValidationError::EmptyConfiguration);
        assert_eq!(report.for_slot(2).count(), 1);

        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("passenger 2: first_name is required"));
    }

    #[test]
    fn test_rate_error_converts_to_core_error() {
        let rate_err = RateError::NoVisaRate {
            pax_count: 9,
            with_transport: true,
        };
        let core_err: CoreError = rate_err.into();
        assert!(matches!(core_err, CoreError::Rate(_)));
    }
}
