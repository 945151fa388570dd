//! # Recompute
//!
//! One pure function from booking inputs and a rate snapshot to everything
//! the wizard displays. Callers re-run it after every input change; nothing
//! is updated incrementally.
//!
//! ```text
//! BookingInputs ─┐
//!                ├─► synchronize ─► group_families ─► build_invoice ─► DerivedState
//! RateSnapshot ──┘        │                                  │
//!                         └──► validate_passengers           └──► rate errors
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::allocation::{synchronize, synchronize_unroomed};
use crate::error::{RateError, ValidationReport};
use crate::family::{group_families, Families};
use crate::invoice::{build_invoice, resolve_transport, Invoice, InvoiceInput, ServiceSelections, SessionContext};
use crate::money::Money;
use crate::pricing::PricingEngine;
use crate::rates::RateTable;
use crate::types::{FlowKind, PassengerSlot, PassengerType, RoomSelection};
use crate::validation::validate_passengers;

/// Passenger counts for the flight-ticket flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPax {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

/// Everything the user has entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingInputs {
    pub flow: FlowKind,
    #[serde(default)]
    pub rooms: RoomSelection,
    #[serde(default)]
    pub no_bed_children: u32,
    #[serde(default)]
    pub no_bed_infants: u32,
    #[serde(default)]
    pub ticket_pax: TicketPax,
    /// Last synchronized slot list, with the user's edits applied.
    #[serde(default)]
    pub passengers: Vec<PassengerSlot>,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub services: ServiceSelections,
    #[serde(default)]
    pub discount_group_id: Option<String>,
    #[serde(default)]
    pub require_documents: bool,
    /// Date ages are checked against.
    pub reference_date: NaiveDate,
}

impl BookingInputs {
    pub fn new(flow: FlowKind, reference_date: NaiveDate) -> Self {
        BookingInputs {
            flow,
            rooms: RoomSelection::new(),
            no_bed_children: 0,
            no_bed_infants: 0,
            ticket_pax: TicketPax::default(),
            passengers: Vec::new(),
            package_id: None,
            services: ServiceSelections::default(),
            discount_group_id: None,
            require_documents: flow == FlowKind::Umrah,
            reference_date,
        }
    }

    /// Slots for the current configuration.
    pub fn synchronized_slots(&self) -> Vec<PassengerSlot> {
        match self.flow {
            FlowKind::Umrah => synchronize(&self.rooms, self.no_bed_children, self.no_bed_infants, &self.passengers),
            FlowKind::Ticket => synchronize_unroomed(
                self.ticket_pax.adults,
                self.ticket_pax.children,
                self.ticket_pax.infants,
                &self.passengers,
            ),
        }
    }
}

/// A versioned, immutable rate table. Replaced whole, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub version: u64,
    pub rates: RateTable,
}

impl RateSnapshot {
    pub fn new(version: u64, rates: RateTable) -> Self {
        RateSnapshot { version, rates }
    }
}

/// Output of [`recompute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedState {
    pub slots: Vec<PassengerSlot>,
    pub families: Families,
    pub invoice: Invoice,
    /// Blocking rate-resolution problems.
    pub rate_errors: Vec<RateError>,
    pub validation: ValidationReport,
    /// Snapshot version every number above was computed from.
    pub rates_version: u64,
}

impl DerivedState {
    pub fn subtotal(&self) -> Money {
        self.invoice.subtotal
    }

    pub fn discount_amount(&self) -> Money {
        self.invoice.discount_amount
    }

    pub fn grand_total(&self) -> Money {
        self.invoice.net_total
    }

    /// Valid passengers and fully resolved rates.
    pub fn is_bookable(&self) -> bool {
        self.validation.is_empty() && self.rate_errors.is_empty()
    }
}

/// Derives slots, families, prices and validation from the inputs.
pub fn recompute(inputs: &BookingInputs, snapshot: &RateSnapshot, context: &SessionContext) -> DerivedState {
    let rates = &snapshot.rates;
    let slots = inputs.synchronized_slots();
    let families = group_families(&slots);
    let discount = inputs
        .discount_group_id
        .as_deref()
        .and_then(|id| rates.discount_group(id));

    let invoice = build_invoice(&InvoiceInput {
        context,
        slots: &slots,
        rates,
        package_id: inputs.package_id.as_deref(),
        selections: &inputs.services,
        discount,
    });

    let rate_errors = rate_errors(inputs, rates, &slots);
    let validation = validate_passengers(&slots, inputs.require_documents, inputs.reference_date);

    DerivedState {
        slots,
        families,
        invoice,
        rate_errors,
        validation,
        rates_version: snapshot.version,
    }
}

fn rate_errors(inputs: &BookingInputs, rates: &RateTable, slots: &[PassengerSlot]) -> Vec<RateError> {
    let mut errors = Vec::new();
    let missing = |table: &str, id: &str| RateError::Missing {
        table: table.to_string(),
        id: id.to_string(),
    };

    if let Some(id) = inputs.package_id.as_deref() {
        match rates.package(id) {
            Ok(package) => errors.extend(PricingEngine::new(package).subtotal(slots).err()),
            Err(e) => errors.push(e),
        }
    }

    let services = &inputs.services;
    let visa_pax = slots
        .iter()
        .filter(|s| s.passenger_type != PassengerType::Infant)
        .count() as u32;
    let visa = match &services.visa {
        Some(selection) => match rates.resolve_visa_rate(visa_pax, selection.with_transport) {
            Ok(visa) => Some(visa),
            Err(e) => {
                errors.push(e);
                None
            }
        },
        None => None,
    };

    for selection in &services.transport {
        if resolve_transport(rates, visa, selection).is_none() {
            let known = match selection.transport_rate_id.as_deref() {
                Some(id) => rates.transport(id).is_some(),
                None => true,
            };
            let error = match visa {
                Some(v) if known => RateError::NoVehicleAvailable {
                    visa_rate_id: v.id.clone(),
                },
                _ => missing(
                    "transport_rates",
                    selection
                        .transport_rate_id
                        .as_deref()
                        .or(selection.vehicle_type.as_deref())
                        .unwrap_or_default(),
                ),
            };
            errors.push(error);
        }
    }

    for stay in &services.hotels {
        if rates.hotel(&stay.hotel_rate_id).is_none() {
            errors.push(missing("hotel_rates", &stay.hotel_rate_id));
        }
    }
    if let Some(id) = services.flight_fare_id.as_deref() {
        if rates.flight(id).is_none() {
            errors.push(missing("flight_fares", id));
        }
    }
    for stay in &services.food {
        if rates.food(&stay.food_rate_id).is_none() {
            errors.push(missing("food_rates", &stay.food_rate_id));
        }
    }
    for id in &services.ziarat_ids {
        if rates.ziarat(id).is_none() {
            errors.push(missing("ziarat_rates", id));
        }
    }

    errors
}

// =============================================================================
// Unit Tests
// =============================================================================
