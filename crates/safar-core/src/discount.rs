//! # Discount Engine
//!
//! Applies an agency's discount group to a booking subtotal.
//!
//! ```text
//! subtotal ──► DiscountGroup? ──► discount_amount ──► grand_total = max(0, subtotal − discount)
//!                 │
//!                 ├── None        → 0
//!                 ├── Percentage  → round(subtotal × value / 100)   (whole major units)
//!                 └── Fixed       → value                            (reporting currency)
//! ```
//!
//! Resolving *which* group applies to an agency is the caller's job; this
//! module only receives the resolved group.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Discount Group
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

/// An agency discount rule.
///
/// On the wire a percentage `discount_value` is a percent (0–100, fractions
/// allowed) and a fixed one is reporting-currency minor units. In memory a
/// percentage is held in basis points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(from = "DiscountGroupRecord", into = "DiscountGroupRecord")]
#[ts(export)]
pub struct DiscountGroup {
    pub id: String,
    pub name: String,
    pub discount_type: DiscountType,
    /// Percentage: basis points (1000 = 10%). Fixed: reporting-currency minor units.
    #[ts(as = "f64")]
    pub discount_value: i64,
}

/// Feed shape of a [`DiscountGroup`].
#[derive(Serialize, Deserialize)]
struct DiscountGroupRecord {
    id: String,
    #[serde(default)]
    name: String,
    discount_type: DiscountType,
    discount_value: f64,
}

impl From<DiscountGroupRecord> for DiscountGroup {
    fn from(record: DiscountGroupRecord) -> Self {
        let discount_value = match record.discount_type {
            DiscountType::Percentage => (record.discount_value * 100.0).round() as i64,
            DiscountType::Fixed => record.discount_value.round() as i64,
        };
        DiscountGroup {
            id: record.id,
            name: record.name,
            discount_type: record.discount_type,
            discount_value,
        }
    }
}

impl From<DiscountGroup> for DiscountGroupRecord {
    fn from(group: DiscountGroup) -> Self {
        let discount_value = match group.discount_type {
            DiscountType::Percentage => group.discount_value as f64 / 100.0,
            DiscountType::Fixed => group.discount_value as f64,
        };
        DiscountGroupRecord {
            id: group.id,
            name: group.name,
            discount_type: group.discount_type,
            discount_value,
        }
    }
}

impl DiscountGroup {
    pub fn percentage(id: &str, percent: u32) -> Self {
        DiscountGroup {
            id: id.to_string(),
            name: String::new(),
            discount_type: DiscountType::Percentage,
            discount_value: percent as i64 * 100,
        }
    }

    pub fn fixed(id: &str, amount: Money) -> Self {
        DiscountGroup {
            id: id.to_string(),
            name: String::new(),
            discount_type: DiscountType::Fixed,
            discount_value: amount.minor(),
        }
    }

    /// Looks up a group by identifier.
    pub fn resolve_for<'a>(groups: &'a [DiscountGroup], group_id: &str) -> Option<&'a DiscountGroup> {
        groups.iter().find(|g| g.id == group_id)
    }

    /// Percentage must be 0–100%, fixed must be non-negative.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let ok = match self.discount_type {
            DiscountType::Percentage => (0..=10_000).contains(&self.discount_value),
            DiscountType::Fixed => self.discount_value >= 0,
        };
        if ok {
            Ok(())
        } else {
            Err(ValidationError::InvalidValue {
                field: "discount_value".to_string(),
                reason: format!("{} out of range for {:?}", self.discount_value, self.discount_type),
            })
        }
    }

    /// Raw discount amount for a subtotal, before the zero floor.
    pub fn amount_for(&self, subtotal: Money) -> Money {
        match self.discount_type {
            DiscountType::Percentage => {
                let bps = self.discount_value.clamp(0, 10_000) as u32;
                subtotal.percentage_whole(bps)
            }
            DiscountType::Fixed => Money::from_minor(self.discount_value.max(0)),
        }
    }
}

// =============================================================================
// Apply
// =============================================================================

/// Result of applying a discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountOutcome {
    pub discount_amount: Money,
    pub grand_total: Money,
}

/// Applies a resolved discount group (or none) to a subtotal.
///
/// ```rust
/// use safar_core::discount::{apply_discount, DiscountGroup};
/// use safar_core::money::Money;
///
/// let group = DiscountGroup::percentage("agency-gold", 10);
/// let outcome = apply_discount(Money::from_major(800), Some(&group));
/// assert_eq!(outcome.discount_amount, Money::from_major(80));
/// assert_eq!(outcome.grand_total, Money::from_major(720));
/// ```
pub fn apply_discount(subtotal: Money, group: Option<&DiscountGroup>) -> DiscountOutcome {
    let discount_amount = group.map(|g| g.amount_for(subtotal)).unwrap_or_default();
    DiscountOutcome {
        discount_amount,
        grand_total: subtotal.saturating_sub_floor(discount_amount),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
