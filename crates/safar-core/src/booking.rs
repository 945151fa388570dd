//! # Booking Wire Shapes
//!
//! Requests and responses exchanged with the booking and payment APIs, and
//! the reconstruction of a session from a booking the server echoes back.
//!
//! ## Round Trip
//! ```text
//! BookingInputs + DerivedState ──► CreateBookingRequest ──► booking API
//!                                                              │
//!          recompute ◄── inputs_from_record ◄── BookingRecord ◄─┘
//!
//! Same seats → same families → same grand total.
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::invoice::{slot_charges, ServiceSelections, SessionContext};
use crate::lifecycle::{BookingAnchor, BookingStatus};
use crate::money::Money;
use crate::pricing::PricingEngine;
use crate::rates::RateTable;
use crate::recompute::{BookingInputs, DerivedState, TicketPax};
use crate::types::{FlowKind, PassengerIdentity, PassengerSlot, PassengerType, RoomSeat, RoomSelection, RoomType};

// =============================================================================
// Booking Creation
// =============================================================================

/// One passenger as sent to (and echoed by) the booking API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerRecord {
    pub slot_id: u32,
    pub passenger_type: PassengerType,
    #[serde(flatten)]
    pub identity: PassengerIdentity,
    #[serde(default)]
    pub room_type: Option<RoomType>,
    #[serde(default)]
    pub room_index: Option<u32>,
    #[serde(default)]
    pub seat_index: Option<u32>,
    #[serde(default)]
    pub is_family_head: bool,
    /// Slot id of this passenger's family head.
    #[serde(default)]
    pub family_head_id: Option<u32>,
    /// Reporting-currency amount charged to this passenger.
    #[serde(default)]
    pub unit_price: Money,
}

impl PassengerRecord {
    /// Seat, if all three room fields are present.
    pub fn seat(&self) -> Option<RoomSeat> {
        match (self.room_type, self.room_index, self.seat_index) {
            (Some(room_type), Some(room_index), Some(seat_index)) => Some(RoomSeat {
                room_type,
                room_index,
                seat_index,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomLine {
    pub room_type: RoomType,
    pub quantity: u32,
    /// Per-person price in the reporting currency.
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    /// Client-generated idempotency key.
    pub request_id: String,
    pub flow: FlowKind,
    pub agency_id: String,
    #[serde(default)]
    pub package_id: Option<String>,
    pub passengers: Vec<PassengerRecord>,
    pub rooms: Vec<RoomLine>,
    #[serde(default)]
    pub services: ServiceSelections,
    pub subtotal: Money,
    pub discount_amount: Money,
    #[serde(alias = "total")]
    pub grand_total: Money,
    pub discount_group_id: Option<String>,
    pub booking_status: BookingStatus,
}

impl CreateBookingRequest {
    /// Builds the creation request from the current derived state.
    pub fn from_derived(
        inputs: &BookingInputs,
        derived: &DerivedState,
        rates: &RateTable,
        context: &SessionContext,
        request_id: String,
    ) -> Self {
        let charges = slot_charges(&derived.invoice);

        let passengers = derived
            .slots
            .iter()
            .map(|slot| {
                let head = derived.families.head_of(slot.id);
                PassengerRecord {
                    slot_id: slot.id,
                    passenger_type: slot.passenger_type,
                    identity: slot.identity.clone(),
                    room_type: slot.room.map(|r| r.room_type),
                    room_index: slot.room.map(|r| r.room_index),
                    seat_index: slot.room.map(|r| r.seat_index),
                    is_family_head: head == Some(slot.id),
                    family_head_id: head,
                    unit_price: charges.get(&slot.id).copied().unwrap_or_default(),
                }
            })
            .collect();

        let package = inputs.package_id.as_deref().and_then(|id| rates.package(id).ok());
        let rooms = inputs
            .rooms
            .iter()
            .filter(|entry| entry.quantity > 0)
            .map(|entry| {
                let unit_price = package
                    .and_then(|p| {
                        PricingEngine::new(p)
                            .unit_price(PassengerType::Adult, Some(entry.room_type))
                            .ok()
                            .map(|native| p.currency.to_reporting(native, rates.exchange.rate))
                    })
                    .unwrap_or_default();
                RoomLine {
                    room_type: entry.room_type,
                    quantity: entry.quantity,
                    unit_price,
                }
            })
            .collect();

        CreateBookingRequest {
            request_id,
            flow: inputs.flow,
            agency_id: context.agency_id.clone(),
            package_id: inputs.package_id.clone(),
            passengers,
            rooms,
            services: inputs.services.clone(),
            subtotal: derived.subtotal(),
            discount_amount: derived.discount_amount(),
            grand_total: derived.grand_total(),
            discount_group_id: derived.invoice.discount_group_id.clone(),
            booking_status: BookingStatus::Underprocess,
        }
    }
}

/// A booking as returned by the booking API on creation or reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub booking_id: String,
    #[serde(default)]
    pub reference: String,
    #[serde(alias = "total_amount")]
    pub grand_total: Money,
    pub booking_status: BookingStatus,
    #[serde(default)]
    pub expiry_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub flow: FlowKind,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub passengers: Vec<PassengerRecord>,
    #[serde(default)]
    pub rooms: Vec<RoomLine>,
    #[serde(default)]
    pub services: ServiceSelections,
    #[serde(default)]
    pub discount_group_id: Option<String>,
}

impl BookingRecord {
    /// Lifecycle anchor; `fallback_deadline` applies when the server sent none.
    pub fn anchor(&self, fallback_deadline: Option<DateTime<Utc>>) -> BookingAnchor {
        BookingAnchor {
            booking_id: self.booking_id.clone(),
            reference: self.reference.clone(),
            grand_total: self.grand_total,
            expiry_deadline: self.expiry_deadline.or(fallback_deadline),
        }
    }
}

// =============================================================================
// Resume
// =============================================================================

/// Rebuilds passenger slots from the server's passenger echo, in slot order.
pub fn slots_from_echo(passengers: &[PassengerRecord]) -> Vec<PassengerSlot> {
    let mut records: Vec<&PassengerRecord> = passengers.iter().collect();
    records.sort_by_key(|p| p.slot_id);
    records
        .into_iter()
        .map(|p| PassengerSlot {
            id: p.slot_id,
            passenger_type: p.passenger_type,
            room: p.seat(),
            identity: p.identity.clone(),
        })
        .collect()
}

/// Rebuilds the room selection, keeping the order rooms were sent in.
pub fn selection_from_echo(rooms: &[RoomLine]) -> RoomSelection {
    rooms
        .iter()
        .fold(RoomSelection::new(), |selection, line| selection.with(line.room_type, line.quantity))
}

/// Rebuilds the full inputs of a reloaded booking.
pub fn inputs_from_record(record: &BookingRecord, reference_date: NaiveDate) -> BookingInputs {
    let slots = slots_from_echo(&record.passengers);
    let unroomed = |t: PassengerType| {
        slots
            .iter()
            .filter(|s| s.room.is_none() && s.passenger_type == t)
            .count() as u32
    };

    let mut inputs = BookingInputs::new(record.flow, reference_date);
    match record.flow {
        FlowKind::Umrah => {
            inputs.rooms = selection_from_echo(&record.rooms);
            inputs.no_bed_children = unroomed(PassengerType::Child);
            inputs.no_bed_infants = unroomed(PassengerType::Infant);
        }
        FlowKind::Ticket => {
            inputs.ticket_pax = TicketPax {
                adults: unroomed(PassengerType::Adult),
                children: unroomed(PassengerType::Child),
                infants: unroomed(PassengerType::Infant),
            };
        }
    }
    inputs.package_id = record.package_id.clone();
    inputs.services = record.services.clone();
    inputs.discount_group_id = record.discount_group_id.clone();
    inputs.passengers = slots;
    inputs
}

// =============================================================================
// Payment
// =============================================================================

/// Method-specific payment details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Deposit into the agency's bank account.
    Bank {
        beneficiary_account: String,
        agent_account: String,
    },
    Cash {
        depositor_name: String,
        depositor_contact: String,
    },
    /// Online or inter-bank transfer.
    Transfer {
        sender_name: String,
        sender_account: String,
    },
}

/// What the user filled into the payment form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDraft {
    #[serde(flatten)]
    pub method: PaymentMethod,
    pub amount: Money,
    pub date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
    /// Reference to the uploaded deposit slip.
    #[serde(default)]
    pub slip_ref: Option<String>,
    /// Set once the user confirmed the soft warnings.
    #[serde(default)]
    pub acknowledge_warnings: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub request_id: String,
    pub booking_id: String,
    /// Booking type tag the payments API files the payment under.
    pub booking_type: String,
    #[serde(flatten)]
    pub method: PaymentMethod,
    pub amount: Money,
    pub date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub slip_ref: Option<String>,
    pub submitted_by: String,
}

impl PaymentRequest {
    pub fn from_draft(
        anchor: &BookingAnchor,
        booking_type: &str,
        draft: &PaymentDraft,
        context: &SessionContext,
        request_id: String,
    ) -> Self {
        PaymentRequest {
            request_id,
            booking_id: anchor.booking_id.clone(),
            booking_type: booking_type.to_string(),
            method: draft.method.clone(),
            amount: draft.amount,
            date: draft.date,
            note: draft.note.clone(),
            slip_ref: draft.slip_ref.clone(),
            submitted_by: context.submitted_by.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment_id: String,
    pub accepted: bool,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::DiscountGroup;
    use crate::family::Families;
    use crate::rates::{CurrencyMode, PackageRates, PaxComponents};
    use crate::recompute::{recompute, RateSnapshot};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn snapshot() -> RateSnapshot {
        RateSnapshot::new(
            1,
            RateTable {
                packages: vec![PackageRates {
                    id: "pkg".into(),
                    name: "Economy".into(),
                    room_prices: BTreeMap::from([
                        (RoomType::Triple, Money::from_major(280)),
                        (RoomType::Double, Money::from_major(300)),
                    ]),
                    adult: PaxComponents {
                        visa: Money::from_major(120),
                        ..Default::default()
                    },
                    child: PaxComponents {
                        visa: Money::from_major(90),
                        ..Default::default()
                    },
                    infant: PaxComponents {
                        visa: Money::from_major(40),
                        ..Default::default()
                    },
                    currency: CurrencyMode::NativeIsReportingCurrency,
                }],
                discount_groups: vec![DiscountGroup::fixed("silver", Money::from_major(55))],
                ..Default::default()
            },
        )
    }

    fn inputs() -> BookingInputs {
        let mut inputs = BookingInputs::new(FlowKind::Umrah, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        inputs.rooms = RoomSelection::new()
            .with(RoomType::Double, 1)
            .with(RoomType::Triple, 1)
            .with(RoomType::Private, 1);
        inputs.no_bed_children = 1;
        inputs.no_bed_infants = 1;
        inputs.package_id = Some("pkg".into());
        inputs.discount_group_id = Some("silver".into());
        inputs.passengers = inputs.synchronized_slots();
        // triple occupied by a child and an infant and one adult
        inputs.passengers[2].passenger_type = PassengerType::Child;
        inputs.passengers[3].passenger_type = PassengerType::Infant;
        for slot in inputs.passengers.iter_mut() {
            slot.identity.first_name = format!("P{}", slot.id);
        }
        inputs
    }

    fn echo(request: &CreateBookingRequest) -> BookingRecord {
        // what the server sends back, via JSON
        let json = serde_json::json!({
            "booking_id": "bk-42",
            "reference": "UMR-42",
            "total_amount": request.grand_total,
            "booking_status": "underprocess",
            "flow": request.flow,
            "package_id": request.package_id,
            "passengers": request.passengers,
            "rooms": request.rooms,
            "discount_group_id": request.discount_group_id,
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_request_marks_family_heads() {
        let inputs = inputs();
        let snap = snapshot();
        let derived = recompute(&inputs, &snap, &SessionContext::default());
        let request = CreateBookingRequest::from_derived(&inputs, &derived, &snap.rates, &SessionContext::default(), "r-1".into());

        assert_eq!(request.booking_status, BookingStatus::Underprocess);
        assert_eq!(request.rooms.len(), 3);
        assert_eq!(request.rooms[2].unit_price, Money::from_major(480));

        let triple: Vec<&PassengerRecord> = request
            .passengers
            .iter()
            .filter(|p| p.room_type == Some(RoomType::Triple))
            .collect();
        assert_eq!(triple.len(), 3);
        // slot 5 is the only adult in the triple
        assert!(triple.iter().all(|p| p.family_head_id == Some(5)));
        assert_eq!(triple.iter().filter(|p| p.is_family_head).count(), 1);

        let no_bed = request.passengers.iter().filter(|p| p.room_type.is_none());
        assert!(no_bed.clone().all(|p| p.family_head_id.is_none() && !p.is_family_head));
        assert_eq!(no_bed.count(), 2);

        let charged: Money = request.passengers.iter().map(|p| p.unit_price).sum();
        assert_eq!(charged, request.subtotal);
    }

    #[test]
    fn test_round_trip_resume() {
        let inputs = inputs();
        let snap = snapshot();
        let ctx = SessionContext::default();
        let derived = recompute(&inputs, &snap, &ctx);
        let request = CreateBookingRequest::from_derived(&inputs, &derived, &snap.rates, &ctx, "r-1".into());

        let record = echo(&request);
        assert_eq!(record.grand_total, derived.grand_total());

        let resumed = inputs_from_record(&record, inputs.reference_date);
        let rederived = recompute(&resumed, &snap, &ctx);

        let keys = |f: &Families| f.iter().map(|x| (x.key.clone(), x.head, x.members.clone())).collect::<Vec<_>>();
        assert_eq!(keys(&rederived.families), keys(&derived.families));
        assert_eq!(rederived.slots, derived.slots);
        assert_eq!(rederived.grand_total(), derived.grand_total());
        assert_eq!(resumed.rooms, inputs.rooms);
    }

    #[test]
    fn test_anchor_falls_back_to_local_deadline() {
        let record: BookingRecord = serde_json::from_value(serde_json::json!({
            "booking_id": "bk-1",
            "grand_total": 72000,
            "booking_status": "underprocess"
        }))
        .unwrap();
        let local = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(record.anchor(Some(local)).expiry_deadline, Some(local));
        assert_eq!(record.anchor(None).grand_total, Money::from_major(720));
    }

    #[test]
    fn test_payment_method_wire_shape() {
        let draft = PaymentDraft {
            method: PaymentMethod::Transfer {
                sender_name: "Zainab".into(),
                sender_account: "PK00-1111".into(),
            },
            amount: Money::from_major(720),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            note: None,
            slip_ref: Some("slip-1".into()),
            acknowledge_warnings: false,
        };
        let anchor = BookingAnchor {
            booking_id: "bk-1".into(),
            reference: "UMR-1".into(),
            grand_total: Money::from_major(720),
            expiry_deadline: None,
        };
        let ctx = SessionContext {
            submitted_by: "Hamza".into(),
            ..Default::default()
        };
        let request = PaymentRequest::from_draft(&anchor, "umrah", &draft, &ctx, "p-1".into());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["method"], "transfer");
        assert_eq!(value["sender_account"], "PK00-1111");
        assert_eq!(value["booking_id"], "bk-1");
        assert_eq!(value["submitted_by"], "Hamza");
    }
}
