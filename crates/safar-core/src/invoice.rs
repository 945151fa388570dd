//! # Invoice Builder
//!
//! Assembles the multi-currency price breakdown of a booking.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │ header        agency · submitter · currencies · exchange rate           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │ passengers    one row per (type, room type): count × unit price         │
//! │ sections      accommodation · transport · visa · tickets · food · ziarat│
//! │               each line: unit (native) × qty → net native → net report │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │ subtotal      Σ net reporting of every line                             │
//! │ discount      applied once to the whole subtotal                        │
//! │ net total     = grand total of the discount engine                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Missing rate data never aborts the build: the line is emitted at zero with
//! `missing_rate` set so the UI can flag it.
//!
//! ## Family apportionment
//! Families are a display concern. [`apportion_families`] splits the booking
//! discount across families pro-rata to their reporting subtotal (largest
//! remainder, minor units). Charges that belong to no family (no-bed
//! passengers, booking-level services) land in the `unassigned` share, so the
//! shares always sum to the booking's net total. [`build_family_invoice`]
//! cuts the booking invoice down to one family's lines and share.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::discount::{apply_discount, DiscountGroup};
use crate::family::{Families, Family};
use crate::money::{ExchangeRate, Money};
use crate::pricing::{ticket_unit_price, PricingEngine};
use crate::rates::{CostComponent, CurrencyMode, PackageRates, RateTable, TransportRate, VisaRate};
use crate::types::{PassengerSlot, PassengerType, RoomType};

// =============================================================================
// Context & Selections
// =============================================================================

/// Who is producing the invoice, passed in explicitly by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionContext {
    pub agency_id: String,
    #[serde(default)]
    pub agency_name: String,
    /// Name of the person submitting the booking or payment.
    #[serde(default)]
    pub submitted_by: String,
    pub reporting_currency: String,
    pub native_currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HotelStay {
    pub hotel_rate_id: String,
    #[ts(as = "String")]
    pub check_in: NaiveDate,
    #[ts(as = "String")]
    pub check_out: NaiveDate,
    pub rooms: u32,
}

impl HotelStay {
    pub fn nights(&self) -> u32 {
        (self.check_out - self.check_in).num_days().max(0) as u32
    }
}

/// A vehicle booking. Either a concrete rate id, or a vehicle type resolved
/// against the visa rate's allowed vehicles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransportSelection {
    #[serde(default)]
    pub transport_rate_id: Option<String>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    pub vehicles: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FoodStay {
    pub food_rate_id: String,
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
}

impl FoodStay {
    /// Days are counted like hotel nights (`to` exclusive).
    pub fn days(&self) -> u32 {
        (self.to - self.from).num_days().max(0) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VisaSelection {
    pub with_transport: bool,
}

/// Services chosen for a custom booking (and the ticket for both flows).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ServiceSelections {
    #[serde(default)]
    pub hotels: Vec<HotelStay>,
    #[serde(default)]
    pub transport: Vec<TransportSelection>,
    #[serde(default)]
    pub visa: Option<VisaSelection>,
    #[serde(default)]
    pub flight_fare_id: Option<String>,
    #[serde(default)]
    pub food: Vec<FoodStay>,
    #[serde(default)]
    pub ziarat_ids: Vec<String>,
}

impl ServiceSelections {
    pub fn is_empty(&self) -> bool {
        self.hotels.is_empty()
            && self.transport.is_empty()
            && self.visa.is_none()
            && self.flight_fare_id.is_none()
            && self.food.is_empty()
            && self.ziarat_ids.is_empty()
    }
}

/// Everything the builder reads.
#[derive(Debug, Clone, Copy)]
pub struct InvoiceInput<'a> {
    pub context: &'a SessionContext,
    pub slots: &'a [PassengerSlot],
    pub rates: &'a RateTable,
    /// Package priced per passenger, if this is a package booking.
    pub package_id: Option<&'a str>,
    pub selections: &'a ServiceSelections,
    pub discount: Option<&'a DiscountGroup>,
}

// =============================================================================
// Invoice
// =============================================================================

/// One priced line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceBreakdownLine {
    pub label: String,
    pub unit_price_native: Money,
    pub quantity: u32,
    pub currency: CurrencyMode,
    pub net_native: Money,
    pub net_reporting: Money,
    #[serde(default)]
    pub missing_rate: bool,
    /// Passengers this line is charged to; empty for booking-level charges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slot_ids: Vec<u32>,
}

impl PriceBreakdownLine {
    pub fn priced(
        label: impl Into<String>,
        unit_price_native: Money,
        quantity: u32,
        currency: CurrencyMode,
        rate: ExchangeRate,
    ) -> Self {
        let net_native = unit_price_native * quantity;
        PriceBreakdownLine {
            label: label.into(),
            unit_price_native,
            quantity,
            currency,
            net_native,
            net_reporting: currency.to_reporting(net_native, rate),
            missing_rate: false,
            slot_ids: Vec::new(),
        }
    }

    pub fn placeholder(label: impl Into<String>, quantity: u32, currency: CurrencyMode) -> Self {
        PriceBreakdownLine {
            label: label.into(),
            unit_price_native: Money::zero(),
            quantity,
            currency,
            net_native: Money::zero(),
            net_reporting: Money::zero(),
            missing_rate: true,
            slot_ids: Vec::new(),
        }
    }

    fn charged_to(mut self, slot_ids: Vec<u32>) -> Self {
        self.slot_ids = slot_ids;
        self
    }
}

/// Passenger row of a package booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PassengerRow {
    pub passenger_type: PassengerType,
    pub room_type: Option<RoomType>,
    pub line: PriceBreakdownLine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceSection {
    pub component: CostComponent,
    pub title: String,
    /// Service-level currency mode; lines may override it per record.
    pub currency: CurrencyMode,
    pub lines: Vec<PriceBreakdownLine>,
    pub net_native: Money,
    pub net_reporting: Money,
}

impl InvoiceSection {
    fn new(component: CostComponent, currency: CurrencyMode, lines: Vec<PriceBreakdownLine>) -> Self {
        InvoiceSection {
            component,
            title: component.label().to_string(),
            currency,
            net_native: lines.iter().map(|l| l.net_native).sum(),
            net_reporting: lines.iter().map(|l| l.net_reporting).sum(),
            lines,
        }
    }

    pub fn has_missing_rates(&self) -> bool {
        self.lines.iter().any(|l| l.missing_rate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceHeader {
    pub agency_id: String,
    pub agency_name: String,
    pub submitted_by: String,
    pub reporting_currency: String,
    pub native_currency: String,
    pub exchange_rate: ExchangeRate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Invoice {
    pub header: InvoiceHeader,
    pub passenger_rows: Vec<PassengerRow>,
    pub sections: Vec<InvoiceSection>,
    /// Σ net native of all lines still in their native currency.
    pub native_total: Money,
    pub subtotal: Money,
    pub discount_group_id: Option<String>,
    pub discount_amount: Money,
    pub net_total: Money,
}

impl Invoice {
    pub fn lines(&self) -> impl Iterator<Item = &PriceBreakdownLine> {
        self.passenger_rows
            .iter()
            .map(|r| &r.line)
            .chain(self.sections.iter().flat_map(|s| s.lines.iter()))
    }

    pub fn has_missing_rates(&self) -> bool {
        self.lines().any(|l| l.missing_rate)
    }

    pub fn section(&self, component: CostComponent) -> Option<&InvoiceSection> {
        self.sections.iter().find(|s| s.component == component)
    }
}

// =============================================================================
// Build
// =============================================================================

/// Builds the invoice for a whole booking.
pub fn build_invoice(input: &InvoiceInput<'_>) -> Invoice {
    let rates = input.rates;
    let exchange = &rates.exchange;

    let passenger_rows = match input.package_id {
        Some(id) => passenger_rows(input.slots, rates.package(id).ok(), exchange.rate),
        None => Vec::new(),
    };

    let counts = PaxCounts::of(input.slots);
    let visa_rate = input
        .selections
        .visa
        .as_ref()
        .and_then(|v| rates.resolve_visa_rate(counts.visa_pax(), v.with_transport).ok());

    let mut sections = Vec::new();
    let mut push = |component: CostComponent, lines: Vec<PriceBreakdownLine>| {
        if !lines.is_empty() {
            sections.push(InvoiceSection::new(component, exchange.mode_for(component), lines));
        }
    };
    push(CostComponent::Accommodation, accommodation_lines(rates, input.selections));
    push(CostComponent::Transport, transport_lines(rates, visa_rate, input.selections));
    if input.selections.visa.is_some() {
        push(CostComponent::Visa, visa_lines(rates, visa_rate, input.slots));
    }
    if let Some(fare_id) = input.selections.flight_fare_id.as_deref() {
        push(CostComponent::Ticket, ticket_lines(rates, fare_id, input.slots));
    }
    push(CostComponent::Food, food_lines(rates, input.selections, input.slots));
    push(CostComponent::Ziarat, ziarat_lines(rates, input.selections, input.slots));

    let all_lines = passenger_rows
        .iter()
        .map(|r| &r.line)
        .chain(sections.iter().flat_map(|s| s.lines.iter()));
    let (native_total, subtotal) = totals(all_lines);

    let outcome = apply_discount(subtotal, input.discount);
    let context = input.context;

    Invoice {
        header: InvoiceHeader {
            agency_id: context.agency_id.clone(),
            agency_name: context.agency_name.clone(),
            submitted_by: context.submitted_by.clone(),
            reporting_currency: context.reporting_currency.clone(),
            native_currency: context.native_currency.clone(),
            exchange_rate: exchange.rate,
        },
        passenger_rows,
        sections,
        native_total,
        subtotal,
        discount_group_id: input.discount.map(|g| g.id.clone()),
        discount_amount: outcome.discount_amount,
        net_total: outcome.grand_total,
    }
}

/// (native total, reporting subtotal). Lines already in the reporting
/// currency add nothing to the native total.
fn totals<'a>(lines: impl Iterator<Item = &'a PriceBreakdownLine>) -> (Money, Money) {
    lines.fold((Money::zero(), Money::zero()), |(native, reporting), line| {
        let native = match line.currency {
            CurrencyMode::NativeRequiresConversion => native + line.net_native,
            CurrencyMode::NativeIsReportingCurrency => native,
        };
        (native, reporting + line.net_reporting)
    })
}

struct PaxCounts {
    adults: u32,
    children: u32,
    infants: u32,
}

impl PaxCounts {
    fn of(slots: &[PassengerSlot]) -> Self {
        let count = |t: PassengerType| slots.iter().filter(|s| s.passenger_type == t).count() as u32;
        PaxCounts {
            adults: count(PassengerType::Adult),
            children: count(PassengerType::Child),
            infants: count(PassengerType::Infant),
        }
    }

    /// Infants do not count toward visa pax ranges.
    fn visa_pax(&self) -> u32 {
        self.adults + self.children
    }
}

fn slot_ids_of(slots: &[PassengerSlot], passenger_type: PassengerType) -> Vec<u32> {
    slots
        .iter()
        .filter(|s| s.passenger_type == passenger_type)
        .map(|s| s.id)
        .collect()
}

fn passenger_rows(slots: &[PassengerSlot], package: Option<&PackageRates>, rate: ExchangeRate) -> Vec<PassengerRow> {
    // (type, room) in order of first appearance
    let mut groups: Vec<(PassengerType, Option<RoomType>, Vec<u32>)> = Vec::new();
    for slot in slots {
        let key = (slot.passenger_type, slot.room_type());
        match groups.iter_mut().find(|(t, r, _)| (*t, *r) == key) {
            Some((_, _, ids)) => ids.push(slot.id),
            None => groups.push((key.0, key.1, vec![slot.id])),
        }
    }

    let currency = package.map(|p| p.currency).unwrap_or_default();
    groups
        .into_iter()
        .map(|(passenger_type, room_type, ids)| {
            let label = match room_type {
                Some(room) => format!("{} ({})", passenger_type, room),
                None => format!("{} (no bed)", passenger_type),
            };
            let quantity = ids.len() as u32;
            let price = package.and_then(|p| PricingEngine::new(p).unit_price(passenger_type, room_type).ok());
            let line = match price {
                Some(unit) => PriceBreakdownLine::priced(label, unit, quantity, currency, rate),
                None => PriceBreakdownLine::placeholder(label, quantity, currency),
            };
            PassengerRow {
                passenger_type,
                room_type,
                line: line.charged_to(ids),
            }
        })
        .collect()
}

fn accommodation_lines(rates: &RateTable, selections: &ServiceSelections) -> Vec<PriceBreakdownLine> {
    let exchange = &rates.exchange;
    selections
        .hotels
        .iter()
        .map(|stay| {
            let quantity = stay.rooms * stay.nights();
            match rates.hotel(&stay.hotel_rate_id) {
                Some(hotel) => {
                    let label = format!(
                        "{} {} {} to {}",
                        hotel.hotel_name, hotel.room_type, stay.check_in, stay.check_out
                    );
                    let mode = exchange.resolve_mode(CostComponent::Accommodation, hotel.currency);
                    PriceBreakdownLine::priced(label, hotel.price_per_night, quantity, mode, exchange.rate)
                }
                None => PriceBreakdownLine::placeholder(
                    format!("Hotel {} {} to {}", stay.hotel_rate_id, stay.check_in, stay.check_out),
                    quantity,
                    exchange.mode_for(CostComponent::Accommodation),
                ),
            }
        })
        .collect()
}

/// Resolves the transport rate for one selection.
///
/// An explicit rate id is still subject to the resolved visa rate's vehicle
/// list.
pub fn resolve_transport<'a>(
    rates: &'a RateTable,
    visa: Option<&VisaRate>,
    selection: &TransportSelection,
) -> Option<&'a TransportRate> {
    if let Some(id) = selection.transport_rate_id.as_deref() {
        return rates
            .transport(id)
            .filter(|transport| visa.map_or(true, |v| v.allows(transport)));
    }
    match visa {
        Some(visa) => rates.resolve_vehicle(visa, selection.vehicle_type.as_deref()).ok(),
        None => rates.transport_rates.iter().find(|t| {
            t.is_active
                && selection
                    .vehicle_type
                    .as_deref()
                    .map_or(true, |wanted| t.vehicle_type.eq_ignore_ascii_case(wanted))
        }),
    }
}

fn transport_lines(
    rates: &RateTable,
    visa: Option<&VisaRate>,
    selections: &ServiceSelections,
) -> Vec<PriceBreakdownLine> {
    let exchange = &rates.exchange;
    selections
        .transport
        .iter()
        .map(|selection| match resolve_transport(rates, visa, selection) {
            Some(rate) => {
                let label = if rate.sector.is_empty() {
                    rate.vehicle_type.clone()
                } else {
                    format!("{} {}", rate.vehicle_type, rate.sector)
                };
                let mode = exchange.resolve_mode(CostComponent::Transport, rate.currency);
                PriceBreakdownLine::priced(label, rate.price, selection.vehicles, mode, exchange.rate)
            }
            None => PriceBreakdownLine::placeholder(
                selection
                    .vehicle_type
                    .clone()
                    .or_else(|| selection.transport_rate_id.clone())
                    .unwrap_or_else(|| "Transport".to_string()),
                selection.vehicles,
                exchange.mode_for(CostComponent::Transport),
            ),
        })
        .collect()
}

fn visa_lines(rates: &RateTable, visa: Option<&VisaRate>, slots: &[PassengerSlot]) -> Vec<PriceBreakdownLine> {
    let exchange = &rates.exchange;
    PassengerType::ALL
        .iter()
        .filter_map(|&pt| {
            let ids = slot_ids_of(slots, pt);
            if ids.is_empty() {
                return None;
            }
            let label = format!("Visa ({})", pt);
            let quantity = ids.len() as u32;
            let line = match visa {
                Some(rate) => {
                    let mode = exchange.resolve_mode(CostComponent::Visa, rate.currency);
                    PriceBreakdownLine::priced(label, rate.selling().for_type(pt), quantity, mode, exchange.rate)
                }
                None => PriceBreakdownLine::placeholder(label, quantity, exchange.mode_for(CostComponent::Visa)),
            };
            Some(line.charged_to(ids))
        })
        .collect()
}

fn ticket_lines(rates: &RateTable, fare_id: &str, slots: &[PassengerSlot]) -> Vec<PriceBreakdownLine> {
    let fare = rates.flight(fare_id);
    PassengerType::ALL
        .iter()
        .filter_map(|&pt| {
            let ids = slot_ids_of(slots, pt);
            if ids.is_empty() {
                return None;
            }
            let quantity = ids.len() as u32;
            let line = match fare {
                Some(fare) => PriceBreakdownLine::priced(
                    format!("{} {} ({})", fare.airline, fare.route, pt),
                    ticket_unit_price(fare, pt),
                    quantity,
                    CurrencyMode::NativeIsReportingCurrency,
                    ExchangeRate::identity(),
                ),
                None => PriceBreakdownLine::placeholder(
                    format!("Ticket {} ({})", fare_id, pt),
                    quantity,
                    CurrencyMode::NativeIsReportingCurrency,
                ),
            };
            Some(line.charged_to(ids))
        })
        .collect()
}

fn food_lines(rates: &RateTable, selections: &ServiceSelections, slots: &[PassengerSlot]) -> Vec<PriceBreakdownLine> {
    let exchange = &rates.exchange;
    let mut lines = Vec::new();
    for stay in &selections.food {
        let food = rates.food(&stay.food_rate_id);
        let days = stay.days();
        for &pt in PassengerType::ALL.iter() {
            let ids = slot_ids_of(slots, pt);
            if ids.is_empty() {
                continue;
            }
            let quantity = days * ids.len() as u32;
            let line = match food {
                Some(food) => {
                    let label = format!("Food {} {} to {} ({})", food.city, stay.from, stay.to, pt);
                    let mode = exchange.resolve_mode(CostComponent::Food, food.currency);
                    PriceBreakdownLine::priced(label, food.per_day.for_type(pt), quantity, mode, exchange.rate)
                }
                None => PriceBreakdownLine::placeholder(
                    format!("Food {} {} to {} ({})", stay.food_rate_id, stay.from, stay.to, pt),
                    quantity,
                    exchange.mode_for(CostComponent::Food),
                ),
            };
            lines.push(line.charged_to(ids));
        }
    }
    lines
}

fn ziarat_lines(rates: &RateTable, selections: &ServiceSelections, slots: &[PassengerSlot]) -> Vec<PriceBreakdownLine> {
    let exchange = &rates.exchange;
    let mut lines = Vec::new();
    for ziarat_id in &selections.ziarat_ids {
        let ziarat = rates.ziarat(ziarat_id);
        for &pt in PassengerType::ALL.iter() {
            let ids = slot_ids_of(slots, pt);
            if ids.is_empty() {
                continue;
            }
            let quantity = ids.len() as u32;
            let line = match ziarat {
                Some(z) => {
                    let label = format!("{} {} ({})", z.name, z.city, pt);
                    let mode = exchange.resolve_mode(CostComponent::Ziarat, z.currency);
                    PriceBreakdownLine::priced(label, z.per_person.for_type(pt), quantity, mode, exchange.rate)
                }
                None => PriceBreakdownLine::placeholder(
                    format!("Ziarat {} ({})", ziarat_id, pt),
                    quantity,
                    exchange.mode_for(CostComponent::Ziarat),
                ),
            };
            lines.push(line.charged_to(ids));
        }
    }
    lines
}

// =============================================================================
// Family Apportionment
// =============================================================================

/// A family's (or the unassigned bucket's) share of the booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ApportionedShare {
    pub key: String,
    pub head: Option<u32>,
    pub subtotal: Money,
    pub discount: Money,
    pub net: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Apportionment {
    pub families: Vec<ApportionedShare>,
    pub unassigned: ApportionedShare,
}

impl Apportionment {
    pub fn total_net(&self) -> Money {
        self.families.iter().map(|f| f.net).sum::<Money>() + self.unassigned.net
    }
}

pub const UNASSIGNED_KEY: &str = "unassigned";

/// Reporting-currency amount charged to each passenger.
///
/// Each line's net is split evenly (largest remainder) across the slots it
/// is charged to; booking-level lines are not included.
pub fn slot_charges(invoice: &Invoice) -> BTreeMap<u32, Money> {
    let mut charges = BTreeMap::new();
    for line in invoice.lines().filter(|l| !l.slot_ids.is_empty()) {
        let shares = line.net_reporting.apportion(&vec![Money::from_minor(1); line.slot_ids.len()]);
        for (slot_id, share) in line.slot_ids.iter().zip(shares) {
            *charges.entry(*slot_id).or_insert_with(Money::zero) += share;
        }
    }
    charges
}

/// Splits the invoice's subtotal and discount across families.
pub fn apportion_families(invoice: &Invoice, families: &Families) -> Apportionment {
    let charges = slot_charges(invoice);
    let family_subtotals: Vec<Money> = families
        .iter()
        .map(|f| f.members.iter().filter_map(|id| charges.get(id)).sum())
        .collect();

    let assigned: Money = family_subtotals.iter().sum();
    let unassigned_subtotal = invoice.subtotal - assigned;

    // Capped by the zero floor, so not always the nominal discount.
    let effective_discount = invoice.subtotal - invoice.net_total;
    let mut weights = family_subtotals.clone();
    weights.push(unassigned_subtotal);
    let mut discounts = effective_discount.apportion(&weights);
    let unassigned_discount = discounts.pop().unwrap_or_default();

    let families = families
        .iter()
        .zip(family_subtotals.into_iter().zip(discounts))
        .map(|(family, (subtotal, discount))| ApportionedShare {
            key: family.key.clone(),
            head: Some(family.head),
            subtotal,
            discount,
            net: subtotal - discount,
        })
        .collect();

    Apportionment {
        families,
        unassigned: ApportionedShare {
            key: UNASSIGNED_KEY.to_string(),
            head: None,
            subtotal: unassigned_subtotal,
            discount: unassigned_discount,
            net: unassigned_subtotal - unassigned_discount,
        },
    }
}

/// Builds the invoice of one family out of the booking invoice.
///
/// Keeps only the lines charged to the family's members, each cut down to
/// the members' even share (the split [`slot_charges`] uses), and carries the
/// family's apportioned discount. Booking-level lines stay with the booking.
/// Returns `None` for an unknown family key.
pub fn build_family_invoice(invoice: &Invoice, families: &Families, family_key: &str) -> Option<Invoice> {
    let family = families.get(family_key)?;
    let share = apportion_families(invoice, families)
        .families
        .into_iter()
        .find(|s| s.key == family_key)?;

    let passenger_rows: Vec<PassengerRow> = invoice
        .passenger_rows
        .iter()
        .filter_map(|row| {
            family_share_of(&row.line, family).map(|line| PassengerRow {
                passenger_type: row.passenger_type,
                room_type: row.room_type,
                line,
            })
        })
        .collect();

    let sections: Vec<InvoiceSection> = invoice
        .sections
        .iter()
        .filter_map(|section| {
            let lines: Vec<PriceBreakdownLine> =
                section.lines.iter().filter_map(|l| family_share_of(l, family)).collect();
            (!lines.is_empty()).then(|| InvoiceSection::new(section.component, section.currency, lines))
        })
        .collect();

    let (native_total, _) = totals(
        passenger_rows
            .iter()
            .map(|r| &r.line)
            .chain(sections.iter().flat_map(|s| s.lines.iter())),
    );

    Some(Invoice {
        header: invoice.header.clone(),
        passenger_rows,
        sections,
        native_total,
        subtotal: share.subtotal,
        discount_group_id: invoice.discount_group_id.clone(),
        discount_amount: share.discount,
        net_total: share.net,
    })
}

/// The part of a line charged to a family's members.
fn family_share_of(line: &PriceBreakdownLine, family: &Family) -> Option<PriceBreakdownLine> {
    if line.slot_ids.is_empty() {
        return None;
    }
    let even = vec![Money::from_minor(1); line.slot_ids.len()];
    let native_shares = line.net_native.apportion(&even);
    let reporting_shares = line.net_reporting.apportion(&even);

    let mut slot_ids = Vec::new();
    let mut net_native = Money::zero();
    let mut net_reporting = Money::zero();
    for ((slot_id, native), reporting) in line.slot_ids.iter().zip(native_shares).zip(reporting_shares) {
        if family.contains(*slot_id) {
            slot_ids.push(*slot_id);
            net_native += native;
            net_reporting += reporting;
        }
    }
    if slot_ids.is_empty() {
        return None;
    }

    // Food lines count passenger-days, so scale rather than count members.
    let quantity = line.quantity * slot_ids.len() as u32 / line.slot_ids.len() as u32;
    Some(PriceBreakdownLine {
        label: line.label.clone(),
        unit_price_native: line.unit_price_native,
        quantity,
        currency: line.currency,
        net_native,
        net_reporting,
        missing_rate: line.missing_rate,
        slot_ids,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
