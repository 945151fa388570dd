//! # Validation Module
//!
//! Local, recoverable checks that gate the booking lifecycle.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      What blocks what                                   │
//! │                                                                         │
//! │  Passenger completeness ─┐                                              │
//! │  Age vs. passenger type ─┼──► ValidationReport ──► Draft → Reviewing    │
//! │  Empty configuration ────┘    (keyed by slot id)                        │
//! │                                                                         │
//! │  Payment amount / method fields ──► hard errors ─┐                      │
//! │  Missing slip, partial payment  ──► warnings ────┴─► PaymentPending →   │
//! │                                   (need explicit ack)   Confirmed       │
//! │                                                                         │
//! │  Nothing here reaches the network: only a clean configuration is sent. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use chrono::NaiveDate;
//! use safar_core::types::{PassengerSlot, PassengerType};
//! use safar_core::validation::validate_passengers;
//!
//! let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
//! let slots = vec![PassengerSlot::new(1, PassengerType::Adult, None)];
//! let report = validate_passengers(&slots, false, today);
//! assert!(!report.is_empty()); // blank names, passport, dates
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::booking::{PaymentDraft, PaymentMethod};
use crate::error::{ValidationError, ValidationReport};
use crate::money::Money;
use crate::types::{PassengerSlot, PassengerType};
use crate::{ADULT_MIN_AGE, CHILD_MIN_AGE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Passenger Validators
// =============================================================================

fn required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError::Required {
            field: field.to_string(),
        })
    } else {
        Ok(())
    }
}

fn required_date(field: &str, value: Option<NaiveDate>) -> ValidationResult<NaiveDate> {
    value.ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })
}

/// Whole years between `date_of_birth` and `on`.
///
/// ```rust
/// use chrono::NaiveDate;
/// use safar_core::validation::age_on;
///
/// let dob = NaiveDate::from_ymd_opt(2008, 3, 2).unwrap();
/// assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()), Some(17));
/// assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()), Some(18));
/// ```
pub fn age_on(date_of_birth: NaiveDate, on: NaiveDate) -> Option<u32> {
    on.years_since(date_of_birth)
}

/// Checks that an age fits the declared passenger type.
///
/// ## Rules
/// - Adult: 18 or older
/// - Child: 2 up to (not including) 18
/// - Infant: under 2
pub fn validate_age(passenger_type: PassengerType, date_of_birth: NaiveDate, on: NaiveDate) -> ValidationResult<()> {
    let age = age_on(date_of_birth, on).ok_or_else(|| ValidationError::InvalidDate {
        field: "date_of_birth".to_string(),
        reason: "date of birth is in the future".to_string(),
    })?;

    let allowed = match passenger_type {
        PassengerType::Adult => age >= ADULT_MIN_AGE,
        PassengerType::Child => (CHILD_MIN_AGE..ADULT_MIN_AGE).contains(&age),
        PassengerType::Infant => age < CHILD_MIN_AGE,
    };

    if allowed {
        Ok(())
    } else {
        Err(ValidationError::AgeOutOfRange {
            field: "date_of_birth".to_string(),
            passenger_type: passenger_type.to_string(),
            age,
        })
    }
}

/// Validates one passenger, returning every failure (not just the first).
///
/// `require_document` adds the supporting-document reference to the required
/// fields (Umrah flow).
pub fn validate_passenger(slot: &PassengerSlot, require_document: bool, on: NaiveDate) -> Vec<ValidationError> {
    let identity = &slot.identity;
    let mut errors = Vec::new();

    let text_fields = [
        ("first_name", identity.first_name.as_str()),
        ("last_name", identity.last_name.as_str()),
        ("passport_number", identity.passport_number.as_str()),
        ("nationality", identity.nationality.as_str()),
    ];
    errors.extend(text_fields.iter().filter_map(|(f, v)| required(f, v).err()));

    match required_date("date_of_birth", identity.date_of_birth) {
        Ok(dob) => errors.extend(validate_age(slot.passenger_type, dob, on).err()),
        Err(e) => errors.push(e),
    }

    let issue = required_date("passport_issue_date", identity.passport_issue_date);
    let expiry = required_date("passport_expiry_date", identity.passport_expiry_date);
    match (issue, expiry) {
        (Ok(issue), Ok(expiry)) if expiry <= issue => errors.push(ValidationError::InvalidDate {
            field: "passport_expiry_date".to_string(),
            reason: "expiry must be after issue".to_string(),
        }),
        (issue, expiry) => {
            errors.extend(issue.err());
            errors.extend(expiry.err());
        }
    }

    if require_document && identity.document_ref.as_deref().map_or(true, |r| r.trim().is_empty()) {
        errors.push(ValidationError::Required {
            field: "document_ref".to_string(),
        });
    }

    errors
}

/// Validates a whole configuration.
///
/// ## Rules
/// - At least one passenger slot must exist
/// - Every slot must be complete (see [`validate_passenger`])
pub fn validate_passengers(slots: &[PassengerSlot], require_documents: bool, on: NaiveDate) -> ValidationReport {
    let mut report = ValidationReport::new();

    if slots.is_empty() {
        report.push(None, ValidationError::EmptyConfiguration);
    }

    for slot in slots {
        for error in validate_passenger(slot, require_documents, on) {
            report.push(Some(slot.id), error);
        }
    }

    report
}

// =============================================================================
// Payment Validators
// =============================================================================

/// Issues that may be accepted after explicit confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentWarning {
    /// No payment slip was attached.
    MissingSlip,
    /// The amount leaves part of the booking unpaid.
    PartialPayment { outstanding: Money },
}

impl std::fmt::Display for PaymentWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentWarning::MissingSlip => write!(f, "no payment slip attached"),
            PaymentWarning::PartialPayment { outstanding } => {
                write!(f, "{} remains outstanding after this payment", outstanding)
            }
        }
    }
}

/// Hard errors and soft warnings of a payment draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentCheck {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<PaymentWarning>,
}

impl PaymentCheck {
    pub fn is_blocked(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Validates a payment against the booking's grand total.
///
/// ## Rules
/// - Amount must be positive
/// - The fields of the chosen method must be filled in
/// - A missing slip or a partial amount is only a warning
pub fn validate_payment(draft: &PaymentDraft, grand_total: Money) -> PaymentCheck {
    let mut check = PaymentCheck::default();

    if !draft.amount.is_positive() {
        check.errors.push(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    let method_fields: Vec<(&str, &str)> = match &draft.method {
        PaymentMethod::Bank {
            beneficiary_account,
            agent_account,
        } => vec![
            ("beneficiary_account", beneficiary_account.as_str()),
            ("agent_account", agent_account.as_str()),
        ],
        PaymentMethod::Cash {
            depositor_name,
            depositor_contact,
        } => vec![
            ("depositor_name", depositor_name.as_str()),
            ("depositor_contact", depositor_contact.as_str()),
        ],
        PaymentMethod::Transfer {
            sender_name,
            sender_account,
        } => vec![("sender_name", sender_name.as_str()), ("sender_account", sender_account.as_str())],
    };
    check
        .errors
        .extend(method_fields.iter().filter_map(|(f, v)| required(f, v).err()));

    if draft.slip_ref.as_deref().map_or(true, |s| s.trim().is_empty()) {
        check.warnings.push(PaymentWarning::MissingSlip);
    }
    if draft.amount.is_positive() && draft.amount < grand_total {
        check.warnings.push(PaymentWarning::PartialPayment {
            outstanding: grand_total - draft.amount,
        });
    }

    check
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PassengerIdentity;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn complete(passenger_type: PassengerType, dob: NaiveDate) -> PassengerSlot {
        let mut slot = PassengerSlot::new(1, passenger_type, None);
        slot.identity = PassengerIdentity {
            title: "Mr".into(),
            first_name: "Usman".into(),
            last_name: "Tariq".into(),
            passport_number: "AB1234567".into(),
            nationality: "PK".into(),
            date_of_birth: Some(dob),
            passport_issue_date: Some(date(2022, 1, 10)),
            passport_expiry_date: Some(date(2032, 1, 9)),
            document_ref: Some("doc-1".into()),
        };
        slot
    }

    #[test]
    fn test_complete_passenger_passes() {
        let slot = complete(PassengerType::Adult, date(1990, 5, 5));
        assert!(validate_passenger(&slot, true, date(2026, 3, 1)).is_empty());
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let slot = PassengerSlot::new(3, PassengerType::Adult, None);
        let report = validate_passengers(&[slot], true, date(2026, 3, 1));
        // first, last, passport, nationality, dob, issue, expiry, document
        assert_eq!(report.for_slot(3).count(), 8);
    }

    #[test]
    fn test_document_only_required_when_asked() {
        let mut slot = complete(PassengerType::Adult, date(1990, 5, 5));
        slot.identity.document_ref = None;
        assert!(validate_passenger(&slot, false, date(2026, 3, 1)).is_empty());
        assert_eq!(
            validate_passenger(&slot, true, date(2026, 3, 1)),
            vec![ValidationError::Required {
                field: "document_ref".into()
            }]
        );
    }

    #[test]
    fn test_age_bounds() {
        let on = date(2026, 3, 1);
        assert!(validate_age(PassengerType::Adult, date(2008, 3, 1), on).is_ok());
        assert!(validate_age(PassengerType::Adult, date(2008, 3, 2), on).is_err());
        assert!(validate_age(PassengerType::Child, date(2008, 3, 2), on).is_ok());
        assert!(validate_age(PassengerType::Child, date(2024, 3, 1), on).is_ok());
        assert!(validate_age(PassengerType::Child, date(2024, 3, 2), on).is_err());
        assert!(validate_age(PassengerType::Infant, date(2024, 3, 2), on).is_ok());
        assert!(validate_age(PassengerType::Infant, date(2024, 3, 1), on).is_err());
        assert!(matches!(
            validate_age(PassengerType::Infant, date(2026, 4, 1), on),
            Err(ValidationError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_expiry_before_issue() {
        let mut slot = complete(PassengerType::Adult, date(1990, 5, 5));
        slot.identity.passport_expiry_date = Some(date(2021, 1, 1));
        let errors = validate_passenger(&slot, false, date(2026, 3, 1));
        assert!(matches!(errors.as_slice(), [ValidationError::InvalidDate { .. }]));
    }

    #[test]
    fn test_empty_configuration() {
        let report = validate_passengers(&[], false, date(2026, 3, 1));
        assert_eq!(report.issues[0].error, ValidationError::EmptyConfiguration);
    }

    fn draft(amount: i64, slip: Option<&str>) -> PaymentDraft {
        PaymentDraft {
            method: PaymentMethod::Cash {
                depositor_name: "Bilal".into(),
                depositor_contact: "0300-1234567".into(),
            },
            amount: Money::from_major(amount),
            date: date(2026, 3, 2),
            note: None,
            slip_ref: slip.map(str::to_string),
            acknowledge_warnings: false,
        }
    }

    #[test]
    fn test_payment_amount_must_be_positive() {
        let check = validate_payment(&draft(0, Some("slip")), Money::from_major(720));
        assert!(check.is_blocked());
    }

    #[test]
    fn test_payment_warnings_are_soft() {
        let check = validate_payment(&draft(500, None), Money::from_major(720));
        assert!(!check.is_blocked());
        assert_eq!(
            check.warnings,
            vec![
                PaymentWarning::MissingSlip,
                PaymentWarning::PartialPayment {
                    outstanding: Money::from_major(220)
                }
            ]
        );
        assert!(validate_payment(&draft(720, Some("slip-9")), Money::from_major(720))
            .warnings
            .is_empty());
    }

    #[test]
    fn test_method_fields_required() {
        let mut d = draft(720, Some("s"));
        d.method = PaymentMethod::Bank {
            beneficiary_account: "acc-1".into(),
            agent_account: " ".into(),
        };
        let check = validate_payment(&d, Money::from_major(720));
        assert_eq!(
            check.errors,
            vec![ValidationError::Required {
                field: "agent_account".into()
            }]
        );
    }
}
