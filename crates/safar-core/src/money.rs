//! # Money Module
//!
//! Provides the `Money` type for monetary values and the `ExchangeRate`
//! used to move native-currency rates into the reporting currency.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Rates arrive in two currencies (e.g. SAR hotel rates, PKR packages).  │
//! │  Converting with floats drifts:                                         │
//! │    412.5 × 74.35 = 30669.375000000004  ❌                              │
//! │                                                                         │
//! │  OUR SOLUTION: integer minor units + fixed-point exchange rate         │
//! │    41250 × 743500 / 10000 = 3066937.5 → 3066938 minor units            │
//! │    The single rounding step is explicit and happens once per line.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use safar_core::money::{ExchangeRate, Money};
//!
//! let visa = Money::from_major(450);            // 450.00 SAR
//! let rate = ExchangeRate::from_scaled(743_500); // 74.35
//! assert_eq!(rate.convert(visa), Money::from_major(33_457) + Money::from_minor(50));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// Minor units per major unit (paisa per rupee, halala per riyal).
pub const MINOR_PER_MAJOR: i64 = 100;

/// Scale of [`ExchangeRate`] (four implied decimal places).
pub const RATE_SCALE: i64 = 10_000;

/// Integer division rounding half away from zero.
fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// `Money` does not carry a currency code. Which currency an amount is in is
/// decided by the component it belongs to (see [`crate::rates::CurrencyMode`]);
/// the invoice keeps native and reporting amounts in separate fields so the two
/// never mix silently.
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  RateTable.* ──► PricingEngine.unit_price ──► subtotal                  │
/// │                                                  │                      │
/// │                       DiscountEngine ◄───────────┘                      │
/// │                             │                                           │
/// │                             ▼                                           │
/// │  InvoiceBuilder ──► native / reporting totals ──► Booking.grand_total   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use safar_core::money::Money;
    ///
    /// let fare = Money::from_minor(12_550);
    /// assert_eq!(fare.minor(), 12_550);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from whole major units.
    ///
    /// Rate feeds publish whole rupees/riyals, so this is the usual
    /// constructor for rate data.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the whole major-unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the minor-unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity (persons, nights, rooms, vehicles).
    ///
    /// ```rust
    /// use safar_core::money::Money;
    ///
    /// let per_night = Money::from_major(180);
    /// assert_eq!(per_night.multiply_quantity(4), Money::from_major(720));
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `percent` of this amount, rounded half-up to a whole major unit.
    ///
    /// `percent_bps` is in basis points: 1000 = 10%. Agency discounts are
    /// quoted and charged in whole rupees, so the rounding happens on the
    /// major unit, not on paisa.
    ///
    /// ```rust
    /// use safar_core::money::Money;
    ///
    /// let subtotal = Money::from_major(800);
    /// assert_eq!(subtotal.percentage_whole(1000), Money::from_major(80));
    ///
    /// // 12.5% of 1,001 = 125.125 → 125
    /// assert_eq!(Money::from_major(1001).percentage_whole(1250), Money::from_major(125));
    /// ```
    pub fn percentage_whole(&self, percent_bps: u32) -> Money {
        let denominator = (RATE_SCALE * MINOR_PER_MAJOR) as i128;
        let major = div_round_half_up(self.0 as i128 * percent_bps as i128, denominator);
        Money::from_major(major as i64)
    }

    /// Returns `self - other`, floored at zero.
    #[inline]
    pub fn saturating_sub_floor(self, other: Money) -> Money {
        if other >= self {
            Money::zero()
        } else {
            self - other
        }
    }

    /// Splits `self` across `weights` proportionally, in minor units.
    ///
    /// Uses the largest-remainder method so the parts always sum back to
    /// `self` exactly. Ties go to the earlier weight. All-zero weights give
    /// everything to the first part.
    ///
    /// ```rust
    /// use safar_core::money::Money;
    ///
    /// let parts = Money::from_minor(100).apportion(&[Money::from_minor(1); 3]);
    /// let minors: Vec<i64> = parts.iter().map(|m| m.minor()).collect();
    /// assert_eq!(minors, vec![34, 33, 33]);
    /// ```
    pub fn apportion(&self, weights: &[Money]) -> Vec<Money> {
        if weights.is_empty() {
            return Vec::new();
        }
        let total_weight: i128 = weights.iter().map(|w| w.0.max(0) as i128).sum();
        if total_weight == 0 {
            let mut parts = vec![Money::zero(); weights.len()];
            parts[0] = *self;
            return parts;
        }

        let amount = self.0 as i128;
        let mut parts: Vec<i128> = Vec::with_capacity(weights.len());
        let mut remainders: Vec<(usize, i128)> = Vec::with_capacity(weights.len());
        for (idx, weight) in weights.iter().enumerate() {
            let product = amount * weight.0.max(0) as i128;
            parts.push(product / total_weight);
            remainders.push((idx, product % total_weight));
        }

        let mut leftover = amount - parts.iter().sum::<i128>();
        remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        for (idx, _) in remainders {
            if leftover == 0 {
                break;
            }
            parts[idx] += leftover.signum();
            leftover -= leftover.signum();
        }

        parts.into_iter().map(|p| Money(p as i64)).collect()
    }
}

/// Shows the amount with two decimals and no currency symbol; the currency
/// code is rendered by whoever knows which currency the amount is in.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        Money(self.0 * qty as i64)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Native → reporting exchange rate with four implied decimals.
///
/// 743_500 = 74.35 reporting units per native unit. Stored as an integer
/// for the same reason `Money` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExchangeRate(i64);

impl ExchangeRate {
    #[inline]
    pub const fn from_scaled(scaled: i64) -> Self {
        ExchangeRate(scaled)
    }

    /// Builds a rate from the decimal published by the settings feed.
    pub fn from_decimal(rate: f64) -> Self {
        ExchangeRate((rate * RATE_SCALE as f64).round() as i64)
    }

    /// Identity rate (1.0000).
    #[inline]
    pub const fn identity() -> Self {
        ExchangeRate(RATE_SCALE)
    }

    #[inline]
    pub const fn scaled(&self) -> i64 {
        self.0
    }

    /// Display-only decimal value.
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / RATE_SCALE as f64
    }

    /// Converts a native amount to the reporting currency, rounding half-up
    /// to the nearest minor unit.
    pub fn convert(&self, native: Money) -> Money {
        let converted = div_round_half_up(native.minor() as i128 * self.0 as i128, RATE_SCALE as i128);
        Money::from_minor(converted as i64)
    }
}

impl Default for ExchangeRate {
    fn default() -> Self {
        ExchangeRate::identity()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major_and_parts() {
        let money = Money::from_major(1250) + Money::from_minor(75);
        assert_eq!(money.minor(), 125_075);
        assert_eq!(money.major(), 1250);
        assert_eq!(money.minor_part(), 75);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(109_900).to_string(), "1099.00");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_percentage_rounds_to_whole_major() {
        assert_eq!(Money::from_major(800).percentage_whole(1000), Money::from_major(80));
        // 2.5% of 1,020 = 25.5 → 26
        assert_eq!(Money::from_major(1020).percentage_whole(250), Money::from_major(26));
        // 2.5% of 1,000 = 25
        assert_eq!(Money::from_major(1000).percentage_whole(250), Money::from_major(25));
        assert_eq!(Money::zero().percentage_whole(5000), Money::zero());
    }

    #[test]
    fn test_saturating_sub_floor() {
        let a = Money::from_major(100);
        assert_eq!(a.saturating_sub_floor(Money::from_major(30)), Money::from_major(70));
        assert_eq!(a.saturating_sub_floor(Money::from_major(300)), Money::zero());
    }

    #[test]
    fn test_exchange_conversion() {
        let rate = ExchangeRate::from_decimal(74.35);
        assert_eq!(rate.scaled(), 743_500);
        assert_eq!(rate.convert(Money::from_major(100)), Money::from_major(7435));
        // 0.01 × 74.35 = 0.7435 → 0.74
        assert_eq!(rate.convert(Money::from_minor(1)), Money::from_minor(74));
        assert_eq!(ExchangeRate::identity().convert(Money::from_minor(999)), Money::from_minor(999));
    }

    #[test]
    fn test_apportion_sums_back() {
        let total = Money::from_minor(1000);
        let weights = [Money::from_minor(300), Money::from_minor(300), Money::from_minor(400)];
        let parts = total.apportion(&weights);
        assert_eq!(parts.iter().sum::<Money>(), total);
        assert_eq!(parts[2], Money::from_minor(400));

        let odd = Money::from_minor(7).apportion(&[Money::from_minor(1), Money::from_minor(1)]);
        assert_eq!(odd, vec![Money::from_minor(4), Money::from_minor(3)]);
    }

    #[test]
    fn test_apportion_zero_weights() {
        let parts = Money::from_minor(50).apportion(&[Money::zero(), Money::zero()]);
        assert_eq!(parts, vec![Money::from_minor(50), Money::zero()]);
        assert!(Money::from_minor(50).apportion(&[]).is_empty());
    }
}
