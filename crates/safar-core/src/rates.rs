//! # Rate Table
//!
//! Immutable snapshot of the price reference data the engine prices against.
//!
//! ## Contents
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          RateTable snapshot                             │
//! │                                                                         │
//! │  visa_rates       pax range × with/without transport → per-pax selling  │
//! │  transport_rates  vehicle type × sector → per-vehicle price             │
//! │  hotel_rates      hotel × room type → per-room per-night price          │
//! │  flight_fares     airline × route → per-pax fare (reporting currency)   │
//! │  food_rates       city → per-pax per-day price                          │
//! │  ziarat_rates     city × tour → per-pax price                           │
//! │  packages         room selling prices + per-pax component rates        │
//! │  exchange         single rate + per-component currency mode             │
//! │  discount_groups  agency discount rules                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All amounts are [`Money`] in minor units of the record's native currency.
//! The engine never mutates a snapshot; a newer snapshot replaces it whole.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::discount::DiscountGroup;
use crate::error::RateError;
use crate::money::{ExchangeRate, Money};
use crate::types::{PassengerType, RoomType};

// =============================================================================
// Currency Handling
// =============================================================================

/// How a component's configured rate relates to the reporting currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyMode {
    /// The rate is already in the reporting currency.
    #[default]
    NativeIsReportingCurrency,
    /// The rate must be multiplied by the exchange rate.
    NativeRequiresConversion,
}

impl CurrencyMode {
    /// Maps the feed's "is already in reporting currency" flag.
    pub fn from_reporting_flag(already_reporting: bool) -> Self {
        if already_reporting {
            CurrencyMode::NativeIsReportingCurrency
        } else {
            CurrencyMode::NativeRequiresConversion
        }
    }

    pub fn to_reporting(&self, native: Money, rate: ExchangeRate) -> Money {
        match self {
            CurrencyMode::NativeIsReportingCurrency => native,
            CurrencyMode::NativeRequiresConversion => rate.convert(native),
        }
    }
}

/// The feed publishes booleans; snapshots written by us use the enum name.
#[derive(Deserialize)]
#[serde(untagged)]
enum CurrencyFlag {
    Flag(bool),
    Mode(CurrencyMode),
}

fn currency_flag<'de, D>(deserializer: D) -> Result<CurrencyMode, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match CurrencyFlag::deserialize(deserializer)? {
        CurrencyFlag::Flag(already_reporting) => CurrencyMode::from_reporting_flag(already_reporting),
        CurrencyFlag::Mode(mode) => mode,
    })
}

fn optional_currency_flag<'de, D>(deserializer: D) -> Result<Option<CurrencyMode>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<CurrencyFlag>::deserialize(deserializer)?.map(|flag| match flag {
        CurrencyFlag::Flag(already_reporting) => CurrencyMode::from_reporting_flag(already_reporting),
        CurrencyFlag::Mode(mode) => mode,
    }))
}

/// Cost components that carry an independent currency mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CostComponent {
    /// Umrah package selling prices (room prices with components baked in).
    Package,
    Accommodation,
    Transport,
    Visa,
    Ticket,
    Food,
    Ziarat,
}

impl CostComponent {
    pub fn label(&self) -> &'static str {
        match self {
            CostComponent::Package => "Package",
            CostComponent::Accommodation => "Accommodation",
            CostComponent::Transport => "Transport",
            CostComponent::Visa => "Visa",
            CostComponent::Ticket => "Tickets",
            CostComponent::Food => "Food",
            CostComponent::Ziarat => "Ziarat",
        }
    }
}

/// Exchange-rate settings: one rate, one currency mode per service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeSettings {
    pub rate: ExchangeRate,
    #[serde(default, deserialize_with = "currency_flag")]
    pub visa: CurrencyMode,
    #[serde(default, deserialize_with = "currency_flag")]
    pub accommodation: CurrencyMode,
    #[serde(default, deserialize_with = "currency_flag")]
    pub transport: CurrencyMode,
    #[serde(default, deserialize_with = "currency_flag")]
    pub food: CurrencyMode,
    #[serde(default, deserialize_with = "currency_flag")]
    pub ziarat: CurrencyMode,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        ExchangeSettings {
            rate: ExchangeRate::identity(),
            visa: CurrencyMode::default(),
            accommodation: CurrencyMode::default(),
            transport: CurrencyMode::default(),
            food: CurrencyMode::default(),
            ziarat: CurrencyMode::default(),
        }
    }
}

impl ExchangeSettings {
    /// Service-level currency mode. Tickets are always in the reporting
    /// currency; packages carry their own mode on the record.
    pub fn mode_for(&self, component: CostComponent) -> CurrencyMode {
        match component {
            CostComponent::Visa => self.visa,
            CostComponent::Accommodation => self.accommodation,
            CostComponent::Transport => self.transport,
            CostComponent::Food => self.food,
            CostComponent::Ziarat => self.ziarat,
            CostComponent::Ticket | CostComponent::Package => CurrencyMode::NativeIsReportingCurrency,
        }
    }

    /// Record-level override wins over the service flag (tickets excepted).
    pub fn resolve_mode(&self, component: CostComponent, record: Option<CurrencyMode>) -> CurrencyMode {
        match (component, record) {
            (CostComponent::Ticket, _) => CurrencyMode::NativeIsReportingCurrency,
            (_, Some(mode)) => mode,
            (_, None) => self.mode_for(component),
        }
    }
}

// =============================================================================
// Per-passenger rates
// =============================================================================

/// One amount per passenger type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaxRates {
    pub adult: Money,
    pub child: Money,
    pub infant: Money,
}

impl PaxRates {
    pub fn for_type(&self, passenger_type: PassengerType) -> Money {
        match passenger_type {
            PassengerType::Adult => self.adult,
            PassengerType::Child => self.child,
            PassengerType::Infant => self.infant,
        }
    }
}

// =============================================================================
// Rate Records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisaRate {
    pub id: String,
    pub person_from: u32,
    pub person_to: u32,
    pub with_transport: bool,
    pub adult_selling: Money,
    pub child_selling: Money,
    pub infant_selling: Money,
    /// Vehicle types this visa rate may be sold with.
    #[serde(default)]
    pub vehicle_types: Vec<String>,
    #[serde(default, deserialize_with = "optional_currency_flag")]
    pub currency: Option<CurrencyMode>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl VisaRate {
    pub fn selling(&self) -> PaxRates {
        PaxRates {
            adult: self.adult_selling,
            child: self.child_selling,
            infant: self.infant_selling,
        }
    }

    pub fn covers(&self, pax_count: u32) -> bool {
        self.person_from <= pax_count && pax_count <= self.person_to
    }

    /// Whether this visa rate may be combined with a vehicle. An empty
    /// vehicle list allows any vehicle.
    pub fn allows(&self, transport: &TransportRate) -> bool {
        self.vehicle_types.is_empty()
            || self
                .vehicle_types
                .iter()
                .any(|v| v.eq_ignore_ascii_case(&transport.vehicle_type))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportRate {
    pub id: String,
    pub vehicle_type: String,
    /// Route, e.g. "JED-MAK-MED-JED".
    #[serde(default)]
    pub sector: String,
    /// Price per vehicle for the whole sector.
    pub price: Money,
    #[serde(default)]
    pub seats: u32,
    #[serde(default, deserialize_with = "optional_currency_flag")]
    pub currency: Option<CurrencyMode>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelRate {
    pub id: String,
    pub hotel_name: String,
    pub city: String,
    pub room_type: RoomType,
    /// Per room per night (per bed for sharing).
    pub price_per_night: Money,
    #[serde(default, deserialize_with = "optional_currency_flag")]
    pub currency: Option<CurrencyMode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightFare {
    pub id: String,
    pub airline: String,
    pub route: String,
    pub fares: PaxRates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodRate {
    pub id: String,
    pub city: String,
    pub per_day: PaxRates,
    #[serde(default, deserialize_with = "optional_currency_flag")]
    pub currency: Option<CurrencyMode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZiaratRate {
    pub id: String,
    pub city: String,
    pub name: String,
    pub per_person: PaxRates,
    #[serde(default, deserialize_with = "optional_currency_flag")]
    pub currency: Option<CurrencyMode>,
}

/// Non-room-specific component selling rates for one passenger type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaxComponents {
    pub visa: Money,
    pub ticket: Money,
    pub transport: Money,
    pub food: Money,
}

impl PaxComponents {
    /// visa + ticket + transport + food
    pub fn total(&self) -> Money {
        self.visa + self.ticket + self.transport + self.food
    }
}

/// An Umrah package: per-person room selling prices plus the component rates
/// used for room-less passengers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRates {
    pub id: String,
    pub name: String,
    /// Per-person selling price by room type. `private` is never listed; it
    /// is derived from `double`.
    pub room_prices: BTreeMap<RoomType, Money>,
    pub adult: PaxComponents,
    pub child: PaxComponents,
    pub infant: PaxComponents,
    #[serde(default, deserialize_with = "currency_flag")]
    pub currency: CurrencyMode,
}

impl PackageRates {
    pub fn components(&self, passenger_type: PassengerType) -> &PaxComponents {
        match passenger_type {
            PassengerType::Adult => &self.adult,
            PassengerType::Child => &self.child,
            PassengerType::Infant => &self.infant,
        }
    }

    pub fn room_price(&self, room_type: RoomType) -> Result<Money, RateError> {
        self.room_prices
            .get(&room_type)
            .copied()
            .ok_or_else(|| RateError::RoomNotOffered {
                package_id: self.id.clone(),
                room_type: room_type.to_string(),
            })
    }
}

fn default_active() -> bool {
    true
}

// =============================================================================
// Rate Table
// =============================================================================

/// Complete, read-only rate snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    #[serde(default)]
    pub visa_rates: Vec<VisaRate>,
    #[serde(default)]
    pub transport_rates: Vec<TransportRate>,
    #[serde(default)]
    pub hotel_rates: Vec<HotelRate>,
    #[serde(default)]
    pub flight_fares: Vec<FlightFare>,
    #[serde(default)]
    pub food_rates: Vec<FoodRate>,
    #[serde(default)]
    pub ziarat_rates: Vec<ZiaratRate>,
    #[serde(default)]
    pub packages: Vec<PackageRates>,
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub discount_groups: Vec<DiscountGroup>,
}

impl RateTable {
    /// Finds the visa rate for a party size and transport requirement.
    ///
    /// Only active rates are considered; the first match in feed order wins.
    pub fn resolve_visa_rate(&self, pax_count: u32, with_transport: bool) -> Result<&VisaRate, RateError> {
        self.visa_rates
            .iter()
            .find(|v| v.is_active && v.with_transport == with_transport && v.covers(pax_count))
            .ok_or(RateError::NoVisaRate {
                pax_count,
                with_transport,
            })
    }

    /// Picks a transport rate the visa rate allows.
    ///
    /// `requested` is honoured when the visa rate allows it; otherwise the
    /// first active allowed vehicle is returned. A visa rate with an empty
    /// vehicle list allows any active vehicle.
    pub fn resolve_vehicle(&self, visa: &VisaRate, requested: Option<&str>) -> Result<&TransportRate, RateError> {
        let allowed = |t: &&TransportRate| t.is_active && visa.allows(t);

        if let Some(wanted) = requested {
            if let Some(rate) = self
                .transport_rates
                .iter()
                .filter(allowed)
                .find(|t| t.vehicle_type.eq_ignore_ascii_case(wanted) || t.id == wanted)
            {
                return Ok(rate);
            }
        }

        self.transport_rates
            .iter()
            .find(allowed)
            .ok_or_else(|| RateError::NoVehicleAvailable {
                visa_rate_id: visa.id.clone(),
            })
    }

    pub fn package(&self, id: &str) -> Result<&PackageRates, RateError> {
        self.packages.iter().find(|p| p.id == id).ok_or_else(|| missing("packages", id))
    }

    pub fn hotel(&self, id: &str) -> Option<&HotelRate> {
        self.hotel_rates.iter().find(|h| h.id == id)
    }

    pub fn transport(&self, id: &str) -> Option<&TransportRate> {
        self.transport_rates.iter().find(|t| t.id == id)
    }

    pub fn flight(&self, id: &str) -> Option<&FlightFare> {
        self.flight_fares.iter().find(|f| f.id == id)
    }

    pub fn food(&self, id: &str) -> Option<&FoodRate> {
        self.food_rates.iter().find(|f| f.id == id)
    }

    pub fn ziarat(&self, id: &str) -> Option<&ZiaratRate> {
        self.ziarat_rates.iter().find(|z| z.id == id)
    }

    pub fn discount_group(&self, id: &str) -> Option<&DiscountGroup> {
        DiscountGroup::resolve_for(&self.discount_groups, id)
    }
}

fn missing(table: &str, id: &str) -> RateError {
    RateError::Missing {
        table: table.to_string(),
        id: id.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn visa(id: &str, from: u32, to: u32, with_transport: bool, vehicles: &[&str]) -> VisaRate {
        VisaRate {
            id: id.to_string(),
            person_from: from,
            person_to: to,
            with_transport,
            adult_selling: Money::from_major(500),
            child_selling: Money::from_major(400),
            infant_selling: Money::from_major(100),
            vehicle_types: vehicles.iter().map(|v| v.to_string()).collect(),
            currency: None,
            is_active: true,
        }
    }

    fn vehicle(id: &str, kind: &str, active: bool) -> TransportRate {
        TransportRate {
            id: id.to_string(),
            vehicle_type: kind.to_string(),
            sector: "JED-MAK-MED-JED".to_string(),
            price: Money::from_major(1200),
            seats: 4,
            currency: None,
            is_active: active,
        }
    }

    #[test]
    fn test_resolve_visa_rate_by_range_and_transport() {
        let table = RateTable {
            visa_rates: vec![
                visa("v1", 1, 4, true, &[]),
                visa("v2", 5, 9, true, &[]),
                visa("v3", 1, 9, false, &[]),
            ],
            ..Default::default()
        };
        assert_eq!(table.resolve_visa_rate(3, true).unwrap().id, "v1");
        assert_eq!(table.resolve_visa_rate(5, true).unwrap().id, "v2");
        assert_eq!(table.resolve_visa_rate(5, false).unwrap().id, "v3");
        assert_eq!(
            table.resolve_visa_rate(12, true),
            Err(RateError::NoVisaRate {
                pax_count: 12,
                with_transport: true
            })
        );
    }

    #[test]
    fn test_resolve_vehicle_respects_allowed_set() {
        let table = RateTable {
            transport_rates: vec![vehicle("t1", "Sedan", true), vehicle("t2", "GMC", true), vehicle("t3", "Coaster", false)],
            ..Default::default()
        };
        let only_gmc = visa("v", 1, 4, true, &["gmc"]);
        assert_eq!(table.resolve_vehicle(&only_gmc, Some("Sedan")).unwrap().id, "t2");
        assert_eq!(table.resolve_vehicle(&only_gmc, None).unwrap().id, "t2");

        let any = visa("v", 1, 4, true, &[]);
        assert_eq!(table.resolve_vehicle(&any, Some("sedan")).unwrap().id, "t1");

        let coaster_only = visa("vc", 10, 20, true, &["Coaster"]);
        assert!(matches!(
            table.resolve_vehicle(&coaster_only, None),
            Err(RateError::NoVehicleAvailable { .. })
        ));
    }

    #[test]
    fn test_exchange_flags_from_feed_booleans() {
        let json = r#"{"rate": 743500, "visa": false, "accommodation": false, "transport": true, "food": "native_requires_conversion"}"#;
        let settings: ExchangeSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.visa, CurrencyMode::NativeRequiresConversion);
        assert_eq!(settings.transport, CurrencyMode::NativeIsReportingCurrency);
        assert_eq!(settings.food, CurrencyMode::NativeRequiresConversion);
        assert_eq!(settings.ziarat, CurrencyMode::NativeIsReportingCurrency);
        assert_eq!(
            settings.resolve_mode(CostComponent::Ticket, Some(CurrencyMode::NativeRequiresConversion)),
            CurrencyMode::NativeIsReportingCurrency
        );
        assert_eq!(
            settings.resolve_mode(CostComponent::Transport, Some(CurrencyMode::NativeRequiresConversion)),
            CurrencyMode::NativeRequiresConversion
        );
    }

    #[test]
    fn test_currency_mode_conversion() {
        let rate = ExchangeRate::from_scaled(750_000);
        let native = Money::from_major(10);
        assert_eq!(CurrencyMode::NativeIsReportingCurrency.to_reporting(native, rate), native);
        assert_eq!(CurrencyMode::NativeRequiresConversion.to_reporting(native, rate), Money::from_major(750));
    }
}
