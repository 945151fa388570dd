//! # safar-session: Booking Session for Safar
//!
//! This crate runs a booking wizard against the remote booking, payment and
//! rate services. Every price, slot and family comes from `safar-core`;
//! this layer adds state, concurrency, configuration and logging.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Session Architecture                             │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  BookingSession (one per wizard)                 │  │
//! │  │                                                                  │  │
//! │  │  Inputs + Arc<RateSnapshot> + BookingLifecycle                   │  │
//! │  │  In-flight guards for create and payment                         │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │   RateStore    │  │   BookingApi   │  │      PaymentApi        │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Versioned      │  │ create / fetch │  │ submit payment         │    │
//! │  │ snapshots from │  │ booking        │  │                        │    │
//! │  │ a RateSource   │  │                │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`api`] - Traits for the remote collaborators
//! - [`config`] - Engine configuration (agency, currency, booking)
//! - [`error`] - Session error types
//! - [`session`] - `BookingSession` orchestrator
//! - [`store`] - Shared, versioned rate snapshots
//!
//! ## Usage
//!
//! ```rust,ignore
//! use safar_session::{BookingSession, EngineConfig, RateStore};
//!
//! let config = EngineConfig::load_or_default(None);
//! let store = RateStore::new(config.fallback_rate());
//! let snapshot = store.refresh(&rate_feed).await?;
//!
//! let session = BookingSession::new(config, snapshot, today);
//! session.update_rooms(selection).await?;
//! session.review().await?;
//! let anchor = session.create_booking(&booking_api, Utc::now()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{BookingApi, PaymentApi, RateSource, RemoteError};
pub use config::EngineConfig;
pub use error::{SessionError, SessionResult};
pub use session::BookingSession;
pub use store::RateStore;
