//! # safar-core: Booking Allocation & Pricing Engine
//!
//! This crate holds every rule of the Umrah and flight-ticket booking wizards
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Safar Booking Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Booking Wizard UI                            │   │
//! │  │    Rooms ──► Passengers ──► Review ──► Payment ──► Invoice      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          safar-session (BookingSession, API traits)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ safar-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   allocation ─► family ─► pricing ─► discount ─► invoice       │   │
//! │  │        ▲                     ▲                                  │   │
//! │  │      types                 rates        lifecycle  validation   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CLOCK • NO NETWORK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Passenger slots, room types, room selections
//! - [`money`] - Money and exchange rates with integer arithmetic
//! - [`rates`] - Rate table snapshot and rate resolution
//! - [`allocation`] - Room selection → passenger slots
//! - [`family`] - Families and heads of family, derived from slots
//! - [`pricing`] - Per-passenger unit prices and quotes
//! - [`discount`] - Agency discount groups
//! - [`invoice`] - Multi-currency breakdown and family apportionment
//! - [`lifecycle`] - Booking state machine with advisory expiry
//! - [`recompute`] - Inputs + rates → everything derived
//! - [`booking`] - Booking/payment wire shapes and resume
//! - [`validation`] - Passenger and payment checks
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same inputs, same outputs; `now` is always passed in
//! 2. **No I/O**: network and storage live in `safar-session`
//! 3. **Integer Money**: all amounts are minor units (i64)
//! 4. **Derived, not stored**: slots and families are recomputed, never patched
//!
//! ## Example Usage
//!
//! ```rust
//! use safar_core::allocation::synchronize;
//! use safar_core::family::group_families;
//! use safar_core::types::{RoomSelection, RoomType};
//!
//! let selection = RoomSelection::new()
//!     .with(RoomType::Double, 1)
//!     .with(RoomType::Sharing, 1);
//! let slots = synchronize(&selection, 0, 0, &[]);
//! assert_eq!(slots.len(), 3);
//!
//! let families = group_families(&slots);
//! assert_eq!(families.head_of(2), Some(1));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod booking;
pub mod discount;
pub mod error;
pub mod family;
pub mod invoice;
pub mod lifecycle;
pub mod money;
pub mod pricing;
pub mod rates;
pub mod recompute;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, LifecycleError, RateError, ValidationError, ValidationReport};
pub use money::{ExchangeRate, Money};
pub use recompute::{recompute, BookingInputs, DerivedState, RateSnapshot};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Minimum age (whole years) of an Adult passenger.
pub const ADULT_MIN_AGE: u32 = 18;

/// Minimum age of a Child passenger; anyone younger is an Infant.
pub const CHILD_MIN_AGE: u32 = 2;

/// Minutes a created booking stays payable when the server sends no deadline.
pub const DEFAULT_EXPIRY_MINUTES: i64 = 120;
