//! # Pricing Engine
//!
//! Per-passenger unit prices against a package, aggregated into a quote.
//!
//! ## Unit Price Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  passenger   room            unit price                                 │
//! │  ─────────   ─────────────   ───────────────────────────────────────    │
//! │  infant      (any)           infant visa + ticket + transport + food    │
//! │  adult/child sharing..double package selling price for the room type    │
//! │  adult/child private         base + (double − base) × 2                 │
//! │  adult/child none (no bed)   base price of that passenger type          │
//! │                                                                         │
//! │  base(type) = visa + ticket + transport + food at non-room rates        │
//! │  private uses base(adult): the occupant pays both beds of a double.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use std::collections::BTreeMap;
//! use safar_core::money::Money;
//! use safar_core::pricing::PricingEngine;
//! use safar_core::rates::{CurrencyMode, PackageRates, PaxComponents};
//! use safar_core::types::{PassengerType, RoomType};
//!
//! let package = PackageRates {
//!     id: "p".into(),
//!     name: "Economy 15 nights".into(),
//!     room_prices: BTreeMap::from([(RoomType::Double, Money::from_major(250))]),
//!     adult: PaxComponents { visa: Money::from_major(100), ..Default::default() },
//!     child: PaxComponents::default(),
//!     infant: PaxComponents::default(),
//!     currency: CurrencyMode::NativeIsReportingCurrency,
//! };
//! let engine = PricingEngine::new(&package);
//! let private = engine.unit_price(PassengerType::Adult, Some(RoomType::Private)).unwrap();
//! assert_eq!(private, Money::from_major(400));
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::discount::{apply_discount, DiscountGroup};
use crate::error::RateError;
use crate::money::{ExchangeRate, Money};
use crate::rates::{CurrencyMode, ExchangeSettings, FlightFare, PackageRates};
use crate::types::{PassengerSlot, PassengerType, RoomType};

// =============================================================================
// Pricing Engine
// =============================================================================

/// Prices passengers against one package.
#[derive(Debug, Clone, Copy)]
pub struct PricingEngine<'a> {
    package: &'a PackageRates,
}

impl<'a> PricingEngine<'a> {
    pub fn new(package: &'a PackageRates) -> Self {
        PricingEngine { package }
    }

    pub fn package(&self) -> &'a PackageRates {
        self.package
    }

    /// Non-room-specific price for a passenger type.
    pub fn base_price(&self, passenger_type: PassengerType) -> Money {
        self.package.components(passenger_type).total()
    }

    /// A private room is a double sold to one occupant.
    pub fn private_price(&self) -> Result<Money, RateError> {
        let base = self.base_price(PassengerType::Adult);
        let double = self.package.room_price(RoomType::Double)?;
        Ok(base + (double - base) * 2i64)
    }

    /// Native-currency unit price for one passenger.
    pub fn unit_price(&self, passenger_type: PassengerType, room_type: Option<RoomType>) -> Result<Money, RateError> {
        match (passenger_type, room_type) {
            (PassengerType::Infant, _) => Ok(self.base_price(PassengerType::Infant)),
            (_, None) => Ok(self.base_price(passenger_type)),
            (_, Some(RoomType::Private)) => self.private_price(),
            (_, Some(room)) => self.package.room_price(room),
        }
    }

    pub fn slot_price(&self, slot: &PassengerSlot) -> Result<Money, RateError> {
        self.unit_price(slot.passenger_type, slot.room_type())
    }

    /// Σ unit prices over all slots (native currency).
    pub fn subtotal(&self, slots: &[PassengerSlot]) -> Result<Money, RateError> {
        slots.iter().map(|s| self.slot_price(s)).sum()
    }

    /// Full quote: subtotal in both currencies, discount, grand total.
    pub fn quote(
        &self,
        slots: &[PassengerSlot],
        exchange: &ExchangeSettings,
        discount: Option<&DiscountGroup>,
    ) -> Result<PriceQuote, RateError> {
        let subtotal_native = self.subtotal(slots)?;
        Ok(PriceQuote::new(subtotal_native, self.package.currency, exchange.rate, discount))
    }
}

/// Ticket fares are always in the reporting currency.
pub fn ticket_unit_price(fare: &FlightFare, passenger_type: PassengerType) -> Money {
    fare.fares.for_type(passenger_type)
}

/// Quote for the flight-ticket flow.
pub fn ticket_quote(slots: &[PassengerSlot], fare: &FlightFare, discount: Option<&DiscountGroup>) -> PriceQuote {
    let subtotal: Money = slots.iter().map(|s| ticket_unit_price(fare, s.passenger_type)).sum();
    PriceQuote::new(subtotal, CurrencyMode::NativeIsReportingCurrency, ExchangeRate::identity(), discount)
}

// =============================================================================
// Price Quote
// =============================================================================

/// Subtotal → discount → grand total, for one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceQuote {
    pub subtotal_native: Money,
    pub currency: CurrencyMode,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub grand_total: Money,
}

impl PriceQuote {
    /// The discount applies to the reporting-currency subtotal.
    pub fn new(
        subtotal_native: Money,
        currency: CurrencyMode,
        rate: ExchangeRate,
        discount: Option<&DiscountGroup>,
    ) -> Self {
        let subtotal = currency.to_reporting(subtotal_native, rate);
        let outcome = apply_discount(subtotal, discount);
        PriceQuote {
            subtotal_native,
            currency,
            subtotal,
            discount_amount: outcome.discount_amount,
            grand_total: outcome.grand_total,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::synchronize;
    use crate::rates::PaxComponents;
    use crate::types::RoomSelection;
    use std::collections::BTreeMap;

    fn components(visa: i64, ticket: i64, transport: i64, food: i64) -> PaxComponents {
        PaxComponents {
            visa: Money::from_major(visa),
            ticket: Money::from_major(ticket),
            transport: Money::from_major(transport),
            food: Money::from_major(food),
        }
    }

    fn package() -> PackageRates {
        PackageRates {
            id: "pkg-21".into(),
            name: "21 Days Economy".into(),
            room_prices: BTreeMap::from([
                (RoomType::Sharing, Money::from_major(200)),
                (RoomType::Quad, Money::from_major(260)),
                (RoomType::Double, Money::from_major(300)),
            ]),
            adult: components(40, 40, 10, 10),
            child: components(30, 30, 10, 10),
            infant: components(10, 15, 0, 0),
            currency: CurrencyMode::NativeIsReportingCurrency,
        }
    }

    #[test]
    fn test_private_room_price() {
        let mut pkg = package();
        pkg.adult = components(100, 0, 0, 0);
        pkg.room_prices.insert(RoomType::Double, Money::from_major(250));
        let engine = PricingEngine::new(&pkg);
        assert_eq!(engine.private_price().unwrap(), Money::from_major(400));
        assert_eq!(
            engine.unit_price(PassengerType::Child, Some(RoomType::Private)).unwrap(),
            Money::from_major(400)
        );
    }

    #[test]
    fn test_unit_price_rules() {
        let pkg = package();
        let engine = PricingEngine::new(&pkg);
        assert_eq!(engine.unit_price(PassengerType::Infant, Some(RoomType::Double)).unwrap(), Money::from_major(25));
        assert_eq!(engine.unit_price(PassengerType::Infant, None).unwrap(), Money::from_major(25));
        assert_eq!(engine.unit_price(PassengerType::Child, Some(RoomType::Quad)).unwrap(), Money::from_major(260));
        assert_eq!(engine.unit_price(PassengerType::Child, None).unwrap(), Money::from_major(80));
        assert_eq!(engine.unit_price(PassengerType::Adult, None).unwrap(), Money::from_major(100));
    }

    #[test]
    fn test_room_not_offered() {
        let pkg = package();
        let engine = PricingEngine::new(&pkg);
        assert!(matches!(
            engine.unit_price(PassengerType::Adult, Some(RoomType::Quint)),
            Err(RateError::RoomNotOffered { .. })
        ));
    }

    #[test]
    fn test_end_to_end_quote() {
        let pkg = package();
        let engine = PricingEngine::new(&pkg);
        let selection = RoomSelection::new()
            .with(RoomType::Double, 1)
            .with(RoomType::Sharing, 1);
        let mut slots = synchronize(&selection, 0, 0, &[]);
        assert_eq!(slots.len(), 3);
        slots[2].passenger_type = PassengerType::Child;

        let group = DiscountGroup::percentage("agency", 10);
        let quote = engine.quote(&slots, &ExchangeSettings::default(), Some(&group)).unwrap();
        assert_eq!(quote.subtotal, Money::from_major(800));
        assert_eq!(quote.discount_amount, Money::from_major(80));
        assert_eq!(quote.grand_total, Money::from_major(720));
    }

    #[test]
    fn test_quote_converts_before_discount() {
        let mut pkg = package();
        pkg.currency = CurrencyMode::NativeRequiresConversion;
        let engine = PricingEngine::new(&pkg);
        let slots = synchronize(&RoomSelection::new().with(RoomType::Double, 1), 0, 0, &[]);
        let exchange = ExchangeSettings {
            rate: ExchangeRate::from_scaled(750_000),
            ..Default::default()
        };
        let fixed = DiscountGroup::fixed("g", Money::from_major(1000));

        let quote = engine.quote(&slots, &exchange, Some(&fixed)).unwrap();
        assert_eq!(quote.subtotal_native, Money::from_major(600));
        assert_eq!(quote.subtotal, Money::from_major(45_000));
        assert_eq!(quote.grand_total, Money::from_major(44_000));
    }

    #[test]
    fn test_ticket_quote() {
        let fare = FlightFare {
            id: "pk-741".into(),
            airline: "PIA".into(),
            route: "LHE-JED".into(),
            fares: crate::rates::PaxRates {
                adult: Money::from_major(900),
                child: Money::from_major(700),
                infant: Money::from_major(150),
            },
        };
        let slots = crate::allocation::synchronize_unroomed(2, 1, 1, &[]);
        let quote = ticket_quote(&slots, &fare, None);
        assert_eq!(quote.grand_total, Money::from_major(2650));
    }
}
