//! End-to-end booking flows against in-memory booking and payment APIs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tokio::sync::Notify;

use safar_core::booking::{BookingRecord, CreateBookingRequest, PaymentDraft, PaymentMethod, PaymentReceipt, PaymentRequest};
use safar_core::discount::DiscountGroup;
use safar_core::lifecycle::{BookingState, BookingStatus};
use safar_core::rates::{CurrencyMode, PackageRates, PaxComponents, RateTable};
use safar_core::types::{PassengerIdentity, RoomSelection, RoomType};
use safar_core::{CoreError, LifecycleError, Money, RateSnapshot};
use safar_session::{BookingApi, BookingSession, EngineConfig, PaymentApi, RemoteError, SessionError};

// =============================================================================
// Fixtures
// =============================================================================

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
}

fn today() -> NaiveDate {
    now().date_naive()
}

fn snapshot(version: u64, double: i64) -> Arc<RateSnapshot> {
    Arc::new(RateSnapshot::new(
        version,
        RateTable {
            packages: vec![PackageRates {
                id: "pkg-14".into(),
                name: "14 Days Economy".into(),
                room_prices: BTreeMap::from([
                    (RoomType::Sharing, Money::from_major(200)),
                    (RoomType::Double, Money::from_major(double)),
                ]),
                adult: PaxComponents::default(),
                child: PaxComponents::default(),
                infant: PaxComponents::default(),
                currency: CurrencyMode::NativeIsReportingCurrency,
            }],
            discount_groups: vec![DiscountGroup::percentage("gold", 10)],
            ..Default::default()
        },
    ))
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.agency.id = "agency-042".into();
    config.agency.submitted_by = "Bilal".into();
    config.agency.discount_group_id = Some("gold".into());
    config.booking.require_documents = Some(false);
    config
}

fn identity(first_name: &str) -> PassengerIdentity {
    PassengerIdentity {
        first_name: first_name.into(),
        last_name: "Qureshi".into(),
        passport_number: format!("AB{}", first_name.len()),
        nationality: "PK".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1985, 6, 1),
        passport_issue_date: NaiveDate::from_ymd_opt(2021, 1, 10),
        passport_expiry_date: NaiveDate::from_ymd_opt(2031, 1, 9),
        ..Default::default()
    }
}

/// Double ×1 + Sharing ×1, every passenger filled in, under review.
async fn reviewed_session(rates: Arc<RateSnapshot>) -> BookingSession {
    let session = BookingSession::new(config(), rates, today());
    session
        .update_rooms(RoomSelection::new().with(RoomType::Double, 1).with(RoomType::Sharing, 1))
        .await
        .unwrap();
    session.update_package(Some("pkg-14".into())).await.unwrap();
    for (slot_id, name) in [(1, "Ahmed"), (2, "Sara"), (3, "Usman")] {
        session.update_identity(slot_id, identity(name)).await.unwrap();
    }
    session.review().await.unwrap();
    session
}

fn bank_draft(amount: i64, slip: Option<&str>) -> PaymentDraft {
    PaymentDraft {
        method: PaymentMethod::Bank {
            beneficiary_account: "PK36SCBL0000001123456702".into(),
            agent_account: "0042-7788".into(),
        },
        amount: Money::from_major(amount),
        date: today(),
        note: None,
        slip_ref: slip.map(String::from),
        acknowledge_warnings: false,
    }
}

// =============================================================================
// Fake Collaborators
// =============================================================================

#[derive(Default)]
struct FakeBookingApi {
    requests: Mutex<Vec<CreateBookingRequest>>,
    stored: Mutex<Option<BookingRecord>>,
    failures_left: AtomicUsize,
    gate: Option<Arc<Notify>>,
    deadline: Option<DateTime<Utc>>,
}

impl FakeBookingApi {
    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl BookingApi for FakeBookingApi {
    async fn create_booking(&self, request: &CreateBookingRequest) -> Result<BookingRecord, RemoteError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(RemoteError::Unavailable("connection reset".into()));
        }

        let record = BookingRecord {
            booking_id: "bk-1".into(),
            reference: "UMR-0001".into(),
            grand_total: request.grand_total,
            booking_status: BookingStatus::Underprocess,
            expiry_deadline: self.deadline,
            flow: request.flow,
            package_id: request.package_id.clone(),
            passengers: request.passengers.clone(),
            rooms: request.rooms.clone(),
            services: request.services.clone(),
            discount_group_id: request.discount_group_id.clone(),
        };
        *self.stored.lock().unwrap() = Some(record.clone());
        Ok(record)
    }

    async fn fetch_booking(&self, booking_id: &str) -> Result<BookingRecord, RemoteError> {
        self.stored
            .lock()
            .unwrap()
            .clone()
            .filter(|r| r.booking_id == booking_id)
            .ok_or_else(|| RemoteError::Rejected(format!("booking {} not found", booking_id)))
    }
}

#[derive(Default)]
struct FakePaymentApi {
    requests: Mutex<Vec<PaymentRequest>>,
    refuse: bool,
    gate: Option<Arc<Notify>>,
}

impl FakePaymentApi {
    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentApi for FakePaymentApi {
    async fn submit_payment(&self, request: &PaymentRequest) -> Result<PaymentReceipt, RemoteError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(PaymentReceipt {
            payment_id: "pay-1".into(),
            accepted: !self.refuse,
            message: self.refuse.then(|| "slip does not match amount".to_string()),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_create_and_pay() {
    let session = reviewed_session(snapshot(1, 300)).await;
    let api = FakeBookingApi::default();

    let anchor = session.create_booking(&api, now()).await.unwrap();
    assert_eq!(anchor.grand_total, Money::from_major(720));
    assert_eq!(anchor.expiry_deadline, Some(now() + Duration::minutes(120)));
    assert_eq!(session.state().await, BookingState::PaymentPending);

    let sent = api.requests.lock().unwrap()[0].clone();
    assert_eq!(sent.subtotal, Money::from_major(800));
    assert_eq!(sent.discount_amount, Money::from_major(80));
    assert_eq!(sent.agency_id, "agency-042");
    assert!(sent.passengers[0].is_family_head);
    assert_eq!(sent.passengers[1].family_head_id, Some(1));

    let payments = FakePaymentApi::default();
    let receipt = session
        .submit_payment(&payments, &bank_draft(720, Some("slip-1.jpg")), now())
        .await
        .unwrap();
    assert!(receipt.accepted);
    assert_eq!(session.state().await, BookingState::Confirmed);

    let paid = payments.requests.lock().unwrap()[0].clone();
    assert_eq!(paid.booking_id, "bk-1");
    assert_eq!(paid.booking_type, "umrah");
    assert_eq!(paid.submitted_by, "Bilal");
}

#[tokio::test]
async fn test_duplicate_create_rejected_while_in_flight() {
    let session = Arc::new(reviewed_session(snapshot(1, 300)).await);
    let gate = Arc::new(Notify::new());
    let api = Arc::new(FakeBookingApi {
        gate: Some(gate.clone()),
        ..Default::default()
    });

    let first = {
        let session = session.clone();
        let api = api.clone();
        tokio::spawn(async move { session.create_booking(api.as_ref(), now()).await })
    };
    while api.calls() == 0 {
        tokio::task::yield_now().await;
    }

    let second = session.create_booking(api.as_ref(), now()).await;
    assert!(matches!(second, Err(SessionError::AlreadyInFlight("create booking"))));
    assert!(matches!(
        session.back_to_edit().await,
        Err(SessionError::AlreadyInFlight(_))
    ));
    assert_eq!(api.calls(), 1);

    gate.notify_one();
    first.await.unwrap().unwrap();
    assert_eq!(session.state().await, BookingState::PaymentPending);
}

#[tokio::test]
async fn test_failed_create_stays_in_review_and_reuses_request_id() {
    let session = reviewed_session(snapshot(1, 300)).await;
    let api = FakeBookingApi {
        failures_left: AtomicUsize::new(1),
        ..Default::default()
    };

    let err = session.create_booking(&api, now()).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(session.state().await, BookingState::Reviewing);
    assert!(session.anchor().await.is_none());

    session.create_booking(&api, now()).await.unwrap();
    let requests = api.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].request_id, requests[1].request_id);
}

#[tokio::test]
async fn test_rates_reprice_drafts_but_not_created_bookings() {
    let session = reviewed_session(snapshot(1, 300)).await;
    session.back_to_edit().await.unwrap();

    assert!(session.install_rates(snapshot(2, 400)).await);
    // (400 × 2 + 200) less 10%
    assert_eq!(session.grand_total().await, Money::from_major(900));

    session.review().await.unwrap();
    session.create_booking(&FakeBookingApi::default(), now()).await.unwrap();

    assert!(session.install_rates(snapshot(3, 500)).await);
    assert_eq!(session.rates_version().await, 3);
    assert_eq!(session.grand_total().await, Money::from_major(900));
    assert_eq!(session.derived().await.grand_total(), Money::from_major(900));
}

#[tokio::test]
async fn test_edits_refused_after_review() {
    let session = reviewed_session(snapshot(1, 300)).await;
    let err = session.update_package(None).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Core(CoreError::Lifecycle(LifecycleError::InvalidTransition {
            from: BookingState::Reviewing,
            ..
        }))
    ));
}

#[tokio::test]
async fn test_resume_round_trip() {
    let rates = snapshot(1, 300);
    let original = reviewed_session(rates.clone()).await;
    let api = FakeBookingApi::default();
    original.create_booking(&api, now()).await.unwrap();

    let resumed = BookingSession::resume(config(), rates, &api, "bk-1", now() + Duration::minutes(5))
        .await
        .unwrap();

    assert_eq!(resumed.state().await, BookingState::PaymentPending);
    assert_eq!(resumed.grand_total().await, Money::from_major(720));

    let before = original.derived().await;
    let after = resumed.derived().await;
    assert_eq!(after.families, before.families);
    assert_eq!(after.slots, before.slots);
    assert_eq!(after.grand_total(), before.grand_total());

    let missing = BookingSession::resume(config(), snapshot(1, 300), &api, "bk-404", now()).await;
    assert!(matches!(missing, Err(SessionError::BookingRejected(_))));
}

#[tokio::test]
async fn test_payment_warnings_need_acknowledgement() {
    let session = reviewed_session(snapshot(1, 300)).await;
    session.create_booking(&FakeBookingApi::default(), now()).await.unwrap();
    let payments = FakePaymentApi::default();

    let mut draft = bank_draft(500, None);
    let err = session.submit_payment(&payments, &draft, now()).await.unwrap_err();
    match err {
        SessionError::Core(CoreError::Lifecycle(LifecycleError::UnacknowledgedWarnings(warnings))) => {
            assert_eq!(warnings.len(), 2)
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(payments.requests.lock().unwrap().is_empty());

    draft.acknowledge_warnings = true;
    session.submit_payment(&payments, &draft, now()).await.unwrap();
    assert_eq!(session.state().await, BookingState::Confirmed);
}

#[tokio::test]
async fn test_refused_payment_stays_pending() {
    let session = reviewed_session(snapshot(1, 300)).await;
    session.create_booking(&FakeBookingApi::default(), now()).await.unwrap();

    let payments = FakePaymentApi {
        refuse: true,
        ..Default::default()
    };
    let err = session
        .submit_payment(&payments, &bank_draft(720, Some("slip.jpg")), now())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Payment rejected: slip does not match amount");
    assert_eq!(session.state().await, BookingState::PaymentPending);
}

#[tokio::test]
async fn test_expiry_is_advisory_and_deadline_bound() {
    let session = reviewed_session(snapshot(1, 300)).await;
    let api = FakeBookingApi {
        deadline: Some(now() + Duration::minutes(30)),
        ..Default::default()
    };
    session.create_booking(&api, now()).await.unwrap();

    assert_eq!(session.time_remaining(now()).await, Some(Duration::minutes(30)));
    assert!(!session.observe_clock(now() + Duration::minutes(29)).await);

    session.hold().await.unwrap();
    assert!(!session.observe_clock(now() + Duration::minutes(45)).await);
    session.resume_payment().await.unwrap();

    let late = now() + Duration::minutes(45);
    let err = session
        .submit_payment(&FakePaymentApi::default(), &bank_draft(720, Some("slip.jpg")), late)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Core(CoreError::Lifecycle(_))));
    assert_eq!(session.state().await, BookingState::Expired);
}

#[tokio::test]
async fn test_accepted_payment_confirms_despite_countdown_running_out() {
    let session = Arc::new(reviewed_session(snapshot(1, 300)).await);
    let api = FakeBookingApi {
        deadline: Some(now() + Duration::minutes(30)),
        ..Default::default()
    };
    session.create_booking(&api, now()).await.unwrap();

    let gate = Arc::new(Notify::new());
    let payments = Arc::new(FakePaymentApi {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    let payment = {
        let session = session.clone();
        let payments = payments.clone();
        tokio::spawn(async move {
            session
                .submit_payment(payments.as_ref(), &bank_draft(720, Some("slip.jpg")), now())
                .await
        })
    };
    while payments.calls() == 0 {
        tokio::task::yield_now().await;
    }

    assert!(matches!(session.hold().await, Err(SessionError::AlreadyInFlight("payment"))));
    assert!(session.observe_clock(now() + Duration::minutes(31)).await);
    assert_eq!(session.state().await, BookingState::Expired);

    gate.notify_one();
    let receipt = payment.await.unwrap().unwrap();
    assert!(receipt.accepted);
    assert_eq!(session.state().await, BookingState::Confirmed);
}
