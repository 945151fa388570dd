//! # Engine Configuration
//!
//! Configuration management for the booking session.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SAFAR_AGENCY_ID=agency-042                                         │
//! │     SAFAR_FLOW=ticket                                                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/safar/booking.toml (Linux)                               │
//! │     ~/Library/Application Support/com.safar.safar/booking.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Umrah flow, PKR reporting, SAR native, 120 minute expiry           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # booking.toml
//! [agency]
//! id = "agency-042"
//! name = "Al Noor Travels"
//! discount_group_id = "gold"
//! submitted_by = "Bilal"
//!
//! [currency]
//! reporting = "PKR"
//! native = "SAR"
//! fallback_rate = 74.35
//!
//! [booking]
//! flow = "umrah"
//! expiry_minutes = 120
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use safar_core::invoice::SessionContext;
use safar_core::{ExchangeRate, FlowKind, DEFAULT_EXPIRY_MINUTES};

use crate::error::{SessionError, SessionResult};

// =============================================================================
// Agency Configuration
// =============================================================================

/// The agency placing bookings through this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgencyConfig {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Discount group the agency belongs to, if any.
    #[serde(default)]
    pub discount_group_id: Option<String>,

    /// Name recorded as the submitter of bookings and payments.
    #[serde(default = "default_submitted_by")]
    pub submitted_by: String,
}

fn default_submitted_by() -> String {
    "agent".to_string()
}

impl Default for AgencyConfig {
    fn default() -> Self {
        AgencyConfig {
            id: "default-agency".to_string(),
            name: String::new(),
            discount_group_id: None,
            submitted_by: default_submitted_by(),
        }
    }
}

// =============================================================================
// Currency Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Currency every total is reported in.
    #[serde(default = "default_reporting")]
    pub reporting: String,

    /// Currency most service rates are published in.
    #[serde(default = "default_native")]
    pub native: String,

    /// Used when a rate feed arrives without a usable exchange rate.
    #[serde(default)]
    pub fallback_rate: Option<f64>,
}

fn default_reporting() -> String {
    "PKR".to_string()
}

fn default_native() -> String {
    "SAR".to_string()
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        CurrencyConfig {
            reporting: default_reporting(),
            native: default_native(),
            fallback_rate: None,
        }
    }
}

// =============================================================================
// Booking Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSettings {
    #[serde(default)]
    pub flow: FlowKind,

    /// Local expiry window when the server sends no deadline.
    #[serde(default = "default_expiry_minutes")]
    pub expiry_minutes: i64,

    /// Overrides the flow default (Umrah requires documents, tickets don't).
    #[serde(default)]
    pub require_documents: Option<bool>,

    /// Tag sent with payments. Defaults to the flow name.
    #[serde(default)]
    pub booking_type: Option<String>,
}

fn default_expiry_minutes() -> i64 {
    DEFAULT_EXPIRY_MINUTES
}

impl Default for BookingSettings {
    fn default() -> Self {
        BookingSettings {
            flow: FlowKind::default(),
            expiry_minutes: default_expiry_minutes(),
            require_documents: None,
            booking_type: None,
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub agency: AgencyConfig,

    #[serde(default)]
    pub currency: CurrencyConfig,

    #[serde(default)]
    pub booking: BookingSettings,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (booking.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SessionResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SessionResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SessionError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SessionResult<()> {
        if self.agency.id.trim().is_empty() {
            return Err(SessionError::InvalidConfig("agency.id must not be empty".into()));
        }

        for (field, code) in [("currency.reporting", &self.currency.reporting), ("currency.native", &self.currency.native)] {
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(SessionError::InvalidConfig(format!(
                    "{} must be a 3-letter ISO code, got: '{}'",
                    field, code
                )));
            }
        }

        if let Some(rate) = self.currency.fallback_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(SessionError::InvalidConfig(format!(
                    "currency.fallback_rate must be positive, got: {}",
                    rate
                )));
            }
        }

        if self.booking.expiry_minutes <= 0 {
            return Err(SessionError::InvalidConfig(
                "booking.expiry_minutes must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `SAFAR_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("SAFAR_AGENCY_ID") {
            debug!(agency_id = %id, "Overriding agency ID from environment");
            self.agency.id = id;
        }

        if let Some(name) = lookup("SAFAR_AGENCY_NAME") {
            self.agency.name = name;
        }

        if let Some(group) = lookup("SAFAR_DISCOUNT_GROUP") {
            self.agency.discount_group_id = Some(group).filter(|g| !g.is_empty());
        }

        if let Some(name) = lookup("SAFAR_SUBMITTED_BY") {
            self.agency.submitted_by = name;
        }

        if let Some(code) = lookup("SAFAR_REPORTING_CURRENCY") {
            self.currency.reporting = code.to_uppercase();
        }

        if let Some(code) = lookup("SAFAR_NATIVE_CURRENCY") {
            self.currency.native = code.to_uppercase();
        }

        if let Some(rate) = lookup("SAFAR_FALLBACK_RATE") {
            match rate.parse::<f64>() {
                Ok(r) => {
                    debug!(rate = r, "Overriding fallback exchange rate from environment");
                    self.currency.fallback_rate = Some(r);
                }
                Err(_) => warn!(rate = %rate, "Unparseable fallback rate in environment"),
            }
        }

        if let Some(flow) = lookup("SAFAR_FLOW") {
            match flow.parse::<FlowKind>() {
                Ok(parsed) => {
                    debug!(flow = %flow, "Overriding booking flow from environment");
                    self.booking.flow = parsed;
                }
                Err(_) => warn!(flow = %flow, "Unknown booking flow in environment"),
            }
        }

        if let Some(minutes) = lookup("SAFAR_EXPIRY_MINUTES") {
            if let Ok(m) = minutes.parse::<i64>() {
                self.booking.expiry_minutes = m;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "safar", "safar").map(|dirs| dirs.config_dir().join("booking.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Agency and currency facts every invoice and request carries.
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            agency_id: self.agency.id.clone(),
            agency_name: self.agency.name.clone(),
            submitted_by: self.agency.submitted_by.clone(),
            reporting_currency: self.currency.reporting.clone(),
            native_currency: self.currency.native.clone(),
        }
    }

    pub fn flow(&self) -> FlowKind {
        self.booking.flow
    }

    pub fn require_documents(&self) -> bool {
        self.booking
            .require_documents
            .unwrap_or(self.booking.flow == FlowKind::Umrah)
    }

    pub fn booking_type(&self) -> &str {
        self.booking
            .booking_type
            .as_deref()
            .unwrap_or_else(|| self.booking.flow.as_str())
    }

    pub fn expiry_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.booking.expiry_minutes)
    }

    pub fn fallback_rate(&self) -> Option<ExchangeRate> {
        self.currency.fallback_rate.map(ExchangeRate::from_decimal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.flow(), FlowKind::Umrah);
        assert!(config.require_documents());
        assert_eq!(config.booking_type(), "umrah");
        assert_eq!(config.expiry_window(), chrono::Duration::minutes(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.agency.id = "  ".to_string();
        assert!(config.validate().is_err());

        config.agency.id = "agency-1".to_string();
        config.currency.reporting = "pkr".to_string();
        assert!(config.validate().is_err());

        config.currency.reporting = "PKR".to_string();
        config.currency.fallback_rate = Some(0.0);
        assert!(config.validate().is_err());

        config.currency.fallback_rate = Some(74.35);
        config.booking.expiry_minutes = 0;
        assert!(config.validate().is_err());

        config.booking.expiry_minutes = 30;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [agency]
            id = "agency-042"

            [booking]
            flow = "ticket"
            "#,
        )
        .unwrap();
        assert_eq!(config.agency.id, "agency-042");
        assert_eq!(config.agency.submitted_by, "agent");
        assert_eq!(config.currency.native, "SAR");
        assert_eq!(config.flow(), FlowKind::Ticket);
        assert!(!config.require_documents());
        assert_eq!(config.booking_type(), "ticket");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("SAFAR_AGENCY_ID", "agency-7"),
            ("SAFAR_FLOW", "flight"),
            ("SAFAR_REPORTING_CURRENCY", "usd"),
            ("SAFAR_FALLBACK_RATE", "not-a-number"),
            ("SAFAR_DISCOUNT_GROUP", "silver"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.agency.id, "agency-7");
        assert_eq!(config.flow(), FlowKind::Ticket);
        assert_eq!(config.currency.reporting, "USD");
        assert_eq!(config.currency.fallback_rate, None);
        assert_eq!(config.agency.discount_group_id.as_deref(), Some("silver"));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("safar-{}.toml", uuid::Uuid::new_v4()));
        let mut config = EngineConfig::default();
        config.agency.id = "agency-save".to_string();
        config.currency.fallback_rate = Some(74.35);
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[agency]"));
        assert!(contents.contains("[currency]"));

        let loaded: EngineConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.agency.id, "agency-save");
        assert_eq!(loaded.fallback_rate(), Some(ExchangeRate::from_scaled(743_500)));
        std::fs::remove_file(path).unwrap();
    }
}
