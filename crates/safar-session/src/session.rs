//! # Booking Session
//!
//! Orchestrator for one booking wizard. Holds the user's inputs, the rate
//! snapshot they are priced against and the booking lifecycle, and talks to
//! the booking and payment APIs.
//!
//! ## Session Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BookingSession                                   │
//! │                                                                         │
//! │  update_*() ──► BookingInputs ──┐                                       │
//! │                                 ├──► recompute() ──► DerivedState       │
//! │  install_rates() ──► Arc<RateSnapshot>                                  │
//! │                                                                         │
//! │  review() ─► create_booking() ─► submit_payment()                       │
//! │                   │                    │                                │
//! │            ┌──────▼──────┐      ┌──────▼──────┐                         │
//! │            │ create guard│      │payment guard│   at most one call      │
//! │            └──────┬──────┘      └──────┬──────┘   of each kind          │
//! │                   ▼                    ▼                                │
//! │              BookingApi            PaymentApi                           │
//! │                                                                         │
//! │  Remote failure: lifecycle state unchanged, error returned.             │
//! │  Once created: the server's grand total is fixed; new rates only        │
//! │  reprice editable bookings.                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session never reads the clock: calls that care about expiry take
//! `now`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use safar_core::booking::{inputs_from_record, CreateBookingRequest, PaymentDraft, PaymentReceipt, PaymentRequest};
use safar_core::invoice::{ServiceSelections, SessionContext};
use safar_core::lifecycle::{BookingAnchor, BookingLifecycle, BookingState};
use safar_core::recompute::TicketPax;
use safar_core::types::{PassengerIdentity, PassengerSlot, PassengerType, RoomSelection};
use safar_core::validation::validate_payment;
use safar_core::{
    recompute, BookingInputs, CoreError, DerivedState, LifecycleError, Money, RateSnapshot, ValidationError,
    ValidationReport,
};

use crate::api::{BookingApi, PaymentApi};
use crate::config::EngineConfig;
use crate::error::{SessionError, SessionResult};

// =============================================================================
// In-Flight Guard
// =============================================================================

/// Marks a remote call as outstanding until dropped.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool, operation: &'static str) -> SessionResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                warn!(operation, "Duplicate request while one is in flight");
                SessionError::AlreadyInFlight(operation)
            })?;
        Ok(InFlightGuard { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// =============================================================================
// Session State
// =============================================================================

struct SessionState {
    inputs: BookingInputs,
    snapshot: Arc<RateSnapshot>,
    derived: DerivedState,
    lifecycle: BookingLifecycle,
    /// Idempotency key reused when a failed create is retried unchanged.
    create_request_id: Option<String>,
}

impl SessionState {
    fn recompute(&mut self, context: &SessionContext) {
        let before = self.derived.grand_total();
        self.derived = recompute(&self.inputs, &self.snapshot, context);
        self.inputs.passengers = self.derived.slots.clone();
        if self.derived.grand_total() != before {
            self.create_request_id = None;
        }
    }
}

// =============================================================================
// Booking Session
// =============================================================================

pub struct BookingSession {
    config: Arc<EngineConfig>,
    context: SessionContext,
    state: RwLock<SessionState>,
    create_in_flight: AtomicBool,
    payment_in_flight: AtomicBool,
}

impl BookingSession {
    /// Opens a blank draft in the configured flow.
    ///
    /// `reference_date` is the date passenger ages are judged on.
    pub fn new(config: EngineConfig, snapshot: Arc<RateSnapshot>, reference_date: NaiveDate) -> Self {
        let mut inputs = BookingInputs::new(config.flow(), reference_date);
        inputs.require_documents = config.require_documents();
        inputs.discount_group_id = config.agency.discount_group_id.clone();
        Self::from_parts(config, inputs, snapshot, BookingLifecycle::new())
    }

    fn from_parts(
        config: EngineConfig,
        inputs: BookingInputs,
        snapshot: Arc<RateSnapshot>,
        lifecycle: BookingLifecycle,
    ) -> Self {
        let context = config.session_context();
        let derived = recompute(&inputs, &snapshot, &context);
        let mut inputs = inputs;
        inputs.passengers = derived.slots.clone();

        BookingSession {
            config: Arc::new(config),
            context,
            state: RwLock::new(SessionState {
                inputs,
                snapshot,
                derived,
                lifecycle,
                create_request_id: None,
            }),
            create_in_flight: AtomicBool::new(false),
            payment_in_flight: AtomicBool::new(false),
        }
    }

    /// Reloads a created booking from the booking API.
    ///
    /// Families and unit prices are rebuilt from the passenger echo; the
    /// grand total is the one stored on the server.
    pub async fn resume(
        config: EngineConfig,
        snapshot: Arc<RateSnapshot>,
        api: &dyn BookingApi,
        booking_id: &str,
        now: DateTime<Utc>,
    ) -> SessionResult<Self> {
        info!(booking_id, "Resuming booking");
        let record = api
            .fetch_booking(booking_id)
            .await
            .map_err(|e| SessionError::from_remote("fetch booking", e))?;

        let mut inputs = inputs_from_record(&record, now.date_naive());
        inputs.require_documents = config.require_documents();
        let lifecycle = BookingLifecycle::restore(record.anchor(None), record.booking_status, now)?;

        let session = Self::from_parts(config, inputs, snapshot, lifecycle);
        {
            let state = session.state.read().await;
            if state.derived.grand_total() != record.grand_total {
                debug!(
                    booking_id,
                    recomputed = %state.derived.grand_total(),
                    stored = %record.grand_total,
                    "Current rates differ from the booked total, keeping the stored total"
                );
            }
            info!(booking_id, reference = %record.reference, state = ?state.lifecycle.state(), "Booking resumed");
        }
        Ok(session)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn state(&self) -> BookingState {
        self.state.read().await.lifecycle.state()
    }

    pub async fn derived(&self) -> DerivedState {
        self.state.read().await.derived.clone()
    }

    pub async fn inputs(&self) -> BookingInputs {
        self.state.read().await.inputs.clone()
    }

    pub async fn rates_version(&self) -> u64 {
        self.state.read().await.snapshot.version
    }

    pub async fn anchor(&self) -> Option<BookingAnchor> {
        self.state.read().await.lifecycle.anchor().cloned()
    }

    /// The server's total once the booking exists, the live total before.
    pub async fn grand_total(&self) -> Money {
        let state = self.state.read().await;
        match state.lifecycle.anchor() {
            Some(anchor) => anchor.grand_total,
            None => state.derived.grand_total(),
        }
    }

    pub async fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.state.read().await.lifecycle.time_remaining(now)
    }

    // =========================================================================
    // Input Mutators
    // =========================================================================

    /// Applies `change` to the inputs of a draft and recomputes.
    async fn edit(
        &self,
        action: &'static str,
        change: impl FnOnce(&mut BookingInputs) -> SessionResult<()>,
    ) -> SessionResult<DerivedState> {
        let mut state = self.state.write().await;
        let current = state.lifecycle.state();
        if current != BookingState::Draft {
            return Err(LifecycleError::InvalidTransition {
                from: current,
                action: action.to_string(),
            }
            .into());
        }

        change(&mut state.inputs)?;
        state.recompute(&self.context);
        debug!(
            action,
            passengers = state.derived.slots.len(),
            grand_total = %state.derived.grand_total(),
            "Inputs updated"
        );
        Ok(state.derived.clone())
    }

    pub async fn update_rooms(&self, rooms: RoomSelection) -> SessionResult<DerivedState> {
        self.edit("change rooms", |inputs| {
            inputs.rooms = rooms;
            Ok(())
        })
        .await
    }

    pub async fn update_no_bed(&self, children: u32, infants: u32) -> SessionResult<DerivedState> {
        self.edit("change passengers without bed", |inputs| {
            inputs.no_bed_children = children;
            inputs.no_bed_infants = infants;
            Ok(())
        })
        .await
    }

    pub async fn update_ticket_pax(&self, pax: TicketPax) -> SessionResult<DerivedState> {
        self.edit("change ticket passengers", |inputs| {
            inputs.ticket_pax = pax;
            Ok(())
        })
        .await
    }

    pub async fn update_identity(&self, slot_id: u32, identity: PassengerIdentity) -> SessionResult<DerivedState> {
        self.edit("edit passenger", |inputs| {
            let slot = find_slot(inputs, slot_id)?;
            slot.identity = identity;
            Ok(())
        })
        .await
    }

    /// Changes the type of a passenger occupying a bed.
    ///
    /// Passengers without a room get their type from the head counts, so
    /// only room-bound slots can be retyped.
    pub async fn update_passenger_type(&self, slot_id: u32, passenger_type: PassengerType) -> SessionResult<DerivedState> {
        self.edit("change passenger type", |inputs| {
            let slot = find_slot(inputs, slot_id)?;
            if slot.room.is_none() {
                return Err(CoreError::Validation(ValidationError::InvalidValue {
                    field: "passenger_type".to_string(),
                    reason: format!("passenger {} has no room; change the head counts instead", slot_id),
                })
                .into());
            }
            slot.passenger_type = passenger_type;
            Ok(())
        })
        .await
    }

    pub async fn update_package(&self, package_id: Option<String>) -> SessionResult<DerivedState> {
        self.edit("change package", |inputs| {
            inputs.package_id = package_id;
            Ok(())
        })
        .await
    }

    pub async fn update_services(&self, services: ServiceSelections) -> SessionResult<DerivedState> {
        self.edit("change services", |inputs| {
            inputs.services = services;
            Ok(())
        })
        .await
    }

    pub async fn update_discount_group(&self, discount_group_id: Option<String>) -> SessionResult<DerivedState> {
        self.edit("change discount group", |inputs| {
            inputs.discount_group_id = discount_group_id;
            Ok(())
        })
        .await
    }

    // =========================================================================
    // Rates
    // =========================================================================

    /// Switches the session to `snapshot` and reprices an editable booking.
    ///
    /// Returns false when the snapshot is older than the one in use. A
    /// created booking keeps the snapshot but not the new prices: its grand
    /// total belongs to the server.
    pub async fn install_rates(&self, snapshot: Arc<RateSnapshot>) -> bool {
        let mut state = self.state.write().await;
        if snapshot.version < state.snapshot.version {
            debug!(
                offered = snapshot.version,
                current = state.snapshot.version,
                "Ignoring stale rate snapshot"
            );
            return false;
        }

        state.snapshot = snapshot;
        if state.lifecycle.state().is_editable() {
            state.recompute(&self.context);
            info!(
                version = state.snapshot.version,
                grand_total = %state.derived.grand_total(),
                "Booking repriced with new rates"
            );
        } else {
            debug!(
                version = state.snapshot.version,
                state = ?state.lifecycle.state(),
                "Booking already created, grand total unchanged"
            );
        }
        true
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Draft → Reviewing. Blocked by validation issues and unresolved rates.
    pub async fn review(&self) -> SessionResult<()> {
        let mut state = self.state.write().await;
        if state.lifecycle.state() == BookingState::Draft {
            if let Some(err) = state.derived.rate_errors.first() {
                return Err(err.clone().into());
            }
        }
        let validation = state.derived.validation.clone();
        state.lifecycle.review(&validation)?;
        info!(grand_total = %state.derived.grand_total(), "Booking under review");
        Ok(())
    }

    /// Reviewing → Draft. Refused while the create call is out.
    pub async fn back_to_edit(&self) -> SessionResult<()> {
        if self.create_in_flight.load(Ordering::Acquire) {
            return Err(SessionError::AlreadyInFlight("create booking"));
        }
        let mut state = self.state.write().await;
        state.lifecycle.back_to_edit()?;
        state.create_request_id = None;
        Ok(())
    }

    /// Sends the reviewed booking to the booking API.
    ///
    /// On success the lifecycle moves to PaymentPending with the server's
    /// id, reference, total and deadline (or `now` plus the configured
    /// window when the server sends no deadline). On failure it stays in
    /// Reviewing and the same request id is reused on retry.
    pub async fn create_booking(&self, api: &dyn BookingApi, now: DateTime<Utc>) -> SessionResult<BookingAnchor> {
        let _guard = InFlightGuard::acquire(&self.create_in_flight, "create booking")?;

        let request = {
            let mut state = self.state.write().await;
            state.lifecycle.ensure_can_create()?;
            if !state.derived.validation.is_empty() {
                return Err(CoreError::Invalid(state.derived.validation.clone()).into());
            }
            if let Some(err) = state.derived.rate_errors.first() {
                return Err(err.clone().into());
            }
            let request_id = state
                .create_request_id
                .get_or_insert_with(|| Uuid::new_v4().to_string())
                .clone();
            CreateBookingRequest::from_derived(
                &state.inputs,
                &state.derived,
                &state.snapshot.rates,
                &self.context,
                request_id,
            )
        };

        info!(
            request_id = %request.request_id,
            passengers = request.passengers.len(),
            grand_total = %request.grand_total,
            "Creating booking"
        );

        let record = api.create_booking(&request).await.map_err(|e| {
            warn!(request_id = %request.request_id, error = %e, "Booking creation failed");
            SessionError::from_remote("create booking", e)
        })?;

        let anchor = record.anchor(Some(now + self.config.expiry_window()));
        if anchor.grand_total != request.grand_total {
            warn!(
                sent = %request.grand_total,
                stored = %anchor.grand_total,
                "Server stored a different grand total, using the server's"
            );
        }

        let mut state = self.state.write().await;
        state.lifecycle.record_created(anchor.clone())?;
        state.create_request_id = None;
        info!(
            booking_id = %anchor.booking_id,
            reference = %anchor.reference,
            expiry = ?anchor.expiry_deadline,
            "Booking created"
        );
        Ok(anchor)
    }

    /// Submits a payment against the created booking.
    ///
    /// Hard validation errors block the call. Soft warnings (no slip,
    /// partial amount) block it until the draft acknowledges them.
    pub async fn submit_payment(
        &self,
        api: &dyn PaymentApi,
        draft: &PaymentDraft,
        now: DateTime<Utc>,
    ) -> SessionResult<PaymentReceipt> {
        let _guard = InFlightGuard::acquire(&self.payment_in_flight, "payment")?;

        let request = {
            let mut state = self.state.write().await;
            if state.lifecycle.observe_clock(now) {
                info!("Booking expired before payment");
            }
            let anchor = state.lifecycle.ensure_can_pay()?;

            let check = validate_payment(draft, anchor.grand_total);
            if check.is_blocked() {
                let mut report = ValidationReport::new();
                for error in check.errors {
                    report.push(None, error);
                }
                return Err(CoreError::Invalid(report).into());
            }
            if !check.warnings.is_empty() && !draft.acknowledge_warnings {
                let warnings = check.warnings.iter().map(ToString::to_string).collect();
                return Err(LifecycleError::UnacknowledgedWarnings(warnings).into());
            }

            PaymentRequest::from_draft(
                anchor,
                self.config.booking_type(),
                draft,
                &self.context,
                Uuid::new_v4().to_string(),
            )
        };

        info!(
            booking_id = %request.booking_id,
            amount = %request.amount,
            "Submitting payment"
        );

        let receipt = api.submit_payment(&request).await.map_err(|e| {
            warn!(booking_id = %request.booking_id, error = %e, "Payment submission failed");
            SessionError::from_remote("payment", e)
        })?;

        if !receipt.accepted {
            let message = receipt
                .message
                .clone()
                .unwrap_or_else(|| "payment was not accepted".to_string());
            warn!(payment_id = %receipt.payment_id, %message, "Payment rejected");
            return Err(SessionError::PaymentRejected(message));
        }

        let mut state = self.state.write().await;
        if state.lifecycle.state() == BookingState::Expired {
            info!(payment_id = %receipt.payment_id, "Countdown ran out during payment, server accepted it");
        }
        state.lifecycle.record_payment()?;
        info!(payment_id = %receipt.payment_id, "Payment accepted, booking confirmed");
        Ok(receipt)
    }

    /// PaymentPending → Held. Refused while a payment call is out.
    pub async fn hold(&self) -> SessionResult<()> {
        let mut state = self.state.write().await;
        if self.payment_in_flight.load(Ordering::Acquire) {
            return Err(SessionError::AlreadyInFlight("payment"));
        }
        state.lifecycle.hold()?;
        info!("Booking put on hold");
        Ok(())
    }

    /// Held → PaymentPending.
    pub async fn resume_payment(&self) -> SessionResult<()> {
        self.state.write().await.lifecycle.resume_payment()?;
        Ok(())
    }

    /// Advisory expiry check. Returns true if the booking just expired.
    pub async fn observe_clock(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state.write().await;
        let expired = state.lifecycle.observe_clock(now);
        if expired {
            info!(booking_id = ?state.lifecycle.anchor().map(|a| &a.booking_id), "Booking expired");
        }
        expired
    }
}

fn find_slot(inputs: &mut BookingInputs, slot_id: u32) -> SessionResult<&mut PassengerSlot> {
    inputs
        .passengers
        .iter_mut()
        .find(|slot| slot.id == slot_id)
        .ok_or_else(|| {
            CoreError::Validation(ValidationError::InvalidValue {
                field: "slot_id".to_string(),
                reason: format!("no passenger {}", slot_id),
            })
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use safar_core::rates::RateTable;
    use safar_core::types::RoomType;

    fn session() -> BookingSession {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        BookingSession::new(EngineConfig::default(), Arc::new(RateSnapshot::default()), date)
    }

    #[test]
    fn test_guard_released_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _guard = InFlightGuard::acquire(&flag, "payment").unwrap();
            assert!(matches!(
                InFlightGuard::acquire(&flag, "payment"),
                Err(SessionError::AlreadyInFlight("payment"))
            ));
        }
        assert!(InFlightGuard::acquire(&flag, "payment").is_ok());
    }

    #[tokio::test]
    async fn test_edits_resync_slots() {
        let session = session();
        let derived = session
            .update_rooms(RoomSelection::new().with(RoomType::Double, 1).with(RoomType::Sharing, 1))
            .await
            .unwrap();
        assert_eq!(derived.slots.len(), 3);

        session.update_passenger_type(3, PassengerType::Child).await.unwrap();
        let derived = session.update_no_bed(0, 1).await.unwrap();
        assert_eq!(derived.slots.len(), 4);
        assert_eq!(derived.slots[2].passenger_type, PassengerType::Child);
        assert_eq!(session.inputs().await.passengers, derived.slots);
    }

    #[tokio::test]
    async fn test_roomless_passengers_cannot_be_retyped() {
        let session = session();
        session.update_no_bed(1, 0).await.unwrap();
        let err = session.update_passenger_type(1, PassengerType::Adult).await.unwrap_err();
        assert!(matches!(err, SessionError::Core(CoreError::Validation(_))));
        assert!(session.update_identity(9, PassengerIdentity::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_review_blocked_by_missing_details() {
        let session = session();
        session.update_rooms(RoomSelection::new().with(RoomType::Double, 1)).await.unwrap();
        let err = session.review().await.unwrap_err();
        assert!(matches!(err, SessionError::Core(CoreError::Invalid(_))));
        assert_eq!(session.state().await, BookingState::Draft);
    }

    #[tokio::test]
    async fn test_stale_snapshot_ignored() {
        let session = session();
        assert!(session.install_rates(Arc::new(RateSnapshot::new(3, RateTable::default()))).await);
        assert!(!session.install_rates(Arc::new(RateSnapshot::new(2, RateTable::default()))).await);
        assert_eq!(session.rates_version().await, 3);
    }

    #[tokio::test]
    async fn test_lifecycle_calls_need_a_booking() {
        let session = session();
        assert!(session.hold().await.is_err());
        assert!(session.back_to_edit().await.is_err());
        assert!(session.anchor().await.is_none());
        assert!(!session.observe_clock(Utc::now()).await);
    }
}
