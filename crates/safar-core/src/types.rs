//! # Domain Types
//!
//! Core booking types shared by every engine module.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ RoomSelection   │   │ PassengerSlot   │   │   RoomSeat      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  [(type, qty)]  │──►│  id             │──►│  room_type      │       │
//! │  │  in pick order  │   │  passenger_type │   │  room_index     │       │
//! │  └─────────────────┘   │  room: Option   │   │  seat_index     │       │
//! │                        │  identity       │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │ PassengerType   │   │   RoomType      │                             │
//! │  │  Adult          │   │  sharing=1 quint=5 quad=4                     │
//! │  │  Child          │   │  triple=3 double=2 private=1                  │
//! │  │  Infant         │   └─────────────────┘                             │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Passenger Type
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PassengerType {
    #[default]
    Adult,
    Child,
    Infant,
}

impl PassengerType {
    pub const ALL: [PassengerType; 3] = [PassengerType::Adult, PassengerType::Child, PassengerType::Infant];

    pub fn as_str(&self) -> &'static str {
        match self {
            PassengerType::Adult => "adult",
            PassengerType::Child => "child",
            PassengerType::Infant => "infant",
        }
    }
}

impl fmt::Display for PassengerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Room Type
// =============================================================================

/// A category of accommodation with a fixed bed capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    /// One bed in a shared (gender-segregated) room. At most one per booking.
    Sharing,
    Quint,
    Quad,
    Triple,
    Double,
    /// Single occupant, billed as a full double room.
    Private,
}

impl RoomType {
    pub const ALL: [RoomType; 6] = [
        RoomType::Sharing,
        RoomType::Quint,
        RoomType::Quad,
        RoomType::Triple,
        RoomType::Double,
        RoomType::Private,
    ];

    /// Beds per room instance.
    pub const fn capacity(&self) -> u32 {
        match self {
            RoomType::Sharing => 1,
            RoomType::Quint => 5,
            RoomType::Quad => 4,
            RoomType::Triple => 3,
            RoomType::Double => 2,
            RoomType::Private => 1,
        }
    }

    /// Upper bound on the quantity a booking may select, if any.
    pub const fn max_quantity(&self) -> Option<u32> {
        match self {
            RoomType::Sharing => Some(1),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Sharing => "sharing",
            RoomType::Quint => "quint",
            RoomType::Quad => "quad",
            RoomType::Triple => "triple",
            RoomType::Double => "double",
            RoomType::Private => "private",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sharing" => Ok(RoomType::Sharing),
            "quint" => Ok(RoomType::Quint),
            "quad" => Ok(RoomType::Quad),
            "triple" => Ok(RoomType::Triple),
            "double" => Ok(RoomType::Double),
            "private" | "single" => Ok(RoomType::Private),
            other => Err(ValidationError::InvalidValue {
                field: "room_type".to_string(),
                reason: format!("unknown room type '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Room Selection
// =============================================================================

/// One entry of a [`RoomSelection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomQuantity {
    pub room_type: RoomType,
    pub quantity: u32,
}

/// Room type → quantity, kept in the order the user picked room types.
///
/// That order is the order slots are generated in, so it is part of the
/// value (two selections with the same quantities in a different order are
/// different selections).
///
/// Deserializing goes through [`RoomSelection::set`], so the sharing cap and
/// one-entry-per-type hold for selections read from the wire as well.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(from = "SelectionEntries")]
#[ts(export)]
pub struct RoomSelection {
    entries: Vec<RoomQuantity>,
}

#[derive(Deserialize)]
struct SelectionEntries {
    #[serde(default)]
    entries: Vec<RoomQuantity>,
}

impl From<SelectionEntries> for RoomSelection {
    fn from(raw: SelectionEntries) -> Self {
        raw.entries
            .into_iter()
            .fold(RoomSelection::new(), |selection, e| selection.with(e.room_type, e.quantity))
    }
}

impl RoomSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quantity for a room type, clamping to its maximum.
    ///
    /// A new room type is appended; an existing one keeps its position.
    pub fn set(&mut self, room_type: RoomType, quantity: u32) {
        let quantity = match room_type.max_quantity() {
            Some(max) => quantity.min(max),
            None => quantity,
        };
        match self.entries.iter_mut().find(|e| e.room_type == room_type) {
            Some(entry) => entry.quantity = quantity,
            None => self.entries.push(RoomQuantity { room_type, quantity }),
        }
    }

    /// Builder form of [`RoomSelection::set`].
    pub fn with(mut self, room_type: RoomType, quantity: u32) -> Self {
        self.set(room_type, quantity);
        self
    }

    pub fn quantity(&self, room_type: RoomType) -> u32 {
        self.entries
            .iter()
            .find(|e| e.room_type == room_type)
            .map(|e| e.quantity)
            .unwrap_or(0)
    }

    /// Entries in selection order (including zero quantities).
    pub fn iter(&self) -> impl Iterator<Item = &RoomQuantity> {
        self.entries.iter()
    }

    pub fn total_rooms(&self) -> u32 {
        self.entries.iter().map(|e| e.quantity).sum()
    }

    pub fn total_beds(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.quantity * e.room_type.capacity())
            .sum()
    }
}

// =============================================================================
// Passenger Slot
// =============================================================================

/// Which room instance and which bed a slot occupies.
///
/// Room type, room index and seat index are one value: a slot either has all
/// three or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomSeat {
    pub room_type: RoomType,
    /// 1-based room instance within its room type.
    pub room_index: u32,
    /// 1-based bed within the room.
    pub seat_index: u32,
}

impl RoomSeat {
    /// Key shared by every occupant of the same room instance.
    pub fn family_key(&self) -> String {
        format!("{}_{}", self.room_type, self.room_index)
    }
}

/// Free-form identity data entered by the agent.
///
/// Only completeness is checked by the engine (see [`crate::validation`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PassengerIdentity {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub passport_number: String,
    #[serde(default)]
    pub nationality: String,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub passport_issue_date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub passport_expiry_date: Option<NaiveDate>,
    /// Reference to an uploaded supporting document (passport scan, photo).
    #[serde(default)]
    pub document_ref: Option<String>,
}

impl PassengerIdentity {
    pub fn full_name(&self) -> String {
        [self.title.trim(), self.first_name.trim(), self.last_name.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_blank(&self) -> bool {
        *self == PassengerIdentity::default()
    }
}

/// One passenger's position within the booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PassengerSlot {
    /// 1-based position; reassigned on every resync.
    pub id: u32,
    pub passenger_type: PassengerType,
    /// `None` for passengers without a bed (no-bed children/infants, tickets).
    pub room: Option<RoomSeat>,
    #[serde(default)]
    pub identity: PassengerIdentity,
}

impl PassengerSlot {
    pub fn new(id: u32, passenger_type: PassengerType, room: Option<RoomSeat>) -> Self {
        PassengerSlot {
            id,
            passenger_type,
            room,
            identity: PassengerIdentity::default(),
        }
    }

    pub fn room_type(&self) -> Option<RoomType> {
        self.room.map(|r| r.room_type)
    }

    pub fn family_key(&self) -> Option<String> {
        self.room.as_ref().map(RoomSeat::family_key)
    }
}

// =============================================================================
// Booking Flow
// =============================================================================

/// Which wizard produced the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Umrah package/custom booking: rooms, supporting documents required.
    #[default]
    Umrah,
    /// Flight ticket booking: no rooms, no documents.
    Ticket,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Umrah => "umrah",
            FlowKind::Ticket => "ticket",
        }
    }
}

impl FromStr for FlowKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "umrah" | "package" | "custom" => Ok(FlowKind::Umrah),
            "ticket" | "flight" => Ok(FlowKind::Ticket),
            other => Err(ValidationError::InvalidValue {
                field: "flow".to_string(),
                reason: format!("unknown flow '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
