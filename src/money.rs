//! Money Module
//!
//! Every monetary value in the marketplace is a `rust_decimal::Decimal`.
//! All rounding and percentage arithmetic MUST go through this module so the
//! scales stay consistent between the calculator, the ledger and the stores.
//!
//! ## Scales
//! - Order amounts and top-level splits: 3 fractional digits ([`AMOUNT_SCALE`])
//! - Referral cuts: 6 fractional digits ([`REFERRAL_SCALE`])
//! - Reported balances: 2 fractional digits ([`BALANCE_SCALE`])
//!
//! ## Usage
//! ```rust
//! use g2g_settlement::money::{parse_amount, percent_of, AMOUNT_SCALE};
//! use rust_decimal::Decimal;
//!
//! let gross = parse_amount("100.5", AMOUNT_SCALE).unwrap();
//! let cut = percent_of(gross, Decimal::from(5)).unwrap();
//! assert_eq!(cut, Decimal::new(5025, 3));
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

/// Fractional digits kept on order amounts and top-level splits
pub const AMOUNT_SCALE: u32 = 3;

/// Fractional digits kept on referral (breakdown) cuts
pub const REFERRAL_SCALE: u32 = 6;

/// Fractional digits of a reported balance
pub const BALANCE_SCALE: u32 = 2;

// ============================================================================
// Error Types
// ============================================================================

/// Money conversion errors
#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl From<MoneyError> for crate::error::MarketError {
    fn from(e: MoneyError) -> Self {
        crate::error::MarketError::Validation(e.to_string())
    }
}

// ============================================================================
// Parse: Client → Decimal
// ============================================================================

/// Parse a client-provided amount string.
///
/// Rejects signs, exponents, separators, ambiguous dots (".5", "5.") and
/// anything with more than `max_scale` fractional digits. No silent
/// truncation.
pub fn parse_amount(amount_str: &str, max_scale: u32) -> Result<Decimal, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let parts: Vec<&str> = amount_str.split('.').collect();
    let (whole, frac) = match parts.len() {
        1 => (parts[0], ""),
        2 => {
            if parts[0].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if parts[1].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            (parts[0], parts[1])
        }
        _ => return Err(MoneyError::InvalidFormat("multiple decimal points".into())),
    };

    if !whole.chars().all(|c| c.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in whole part: {}",
            whole
        )));
    }
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in fractional part: {}",
            frac
        )));
    }

    if frac.len() > max_scale as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: max_scale,
        });
    }

    let amount = Decimal::from_str(amount_str).map_err(|_| MoneyError::Overflow)?;
    if amount.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(amount)
}

/// Validate an already-typed amount: strictly positive, within `max_scale`.
pub fn validate_amount(amount: Decimal, max_scale: u32) -> Result<Decimal, MoneyError> {
    if amount.is_sign_negative() || amount.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }
    let normalized = amount.normalize();
    if normalized.scale() > max_scale {
        return Err(MoneyError::PrecisionOverflow {
            provided: normalized.scale(),
            max: max_scale,
        });
    }
    Ok(amount)
}

// ============================================================================
// Arithmetic
// ============================================================================

/// `amount × rate / 100` without rounding.
pub fn percent_of(amount: Decimal, rate: Decimal) -> Result<Decimal, MoneyError> {
    amount
        .checked_mul(rate)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(MoneyError::Overflow)
}

/// `amount × (1 − rate/100)` without rounding.
pub fn remove_percent(amount: Decimal, rate: Decimal) -> Result<Decimal, MoneyError> {
    let kept = Decimal::ONE_HUNDRED
        .checked_sub(rate)
        .ok_or(MoneyError::Overflow)?;
    percent_of(amount, kept)
}

/// Banker's rounding, as applied to stored amounts.
#[inline]
pub fn round_to(amount: Decimal, scale: u32) -> Decimal {
    amount.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven)
}

/// Rounding toward zero: a split never exceeds its exact share.
#[inline]
pub fn truncate_to(amount: Decimal, scale: u32) -> Decimal {
    amount.round_dp_with_strategy(scale, RoundingStrategy::ToZero)
}

/// Reported balance (2 dp).
#[inline]
pub fn round_balance(amount: Decimal) -> Decimal {
    round_to(amount, BALANCE_SCALE)
}

// ============================================================================
// Format: Decimal → Client
// ============================================================================

/// Fixed-width display string, e.g. `format_amount(1.5, 3) == "1.500"`.
pub fn format_amount(amount: Decimal, display_decimals: u32) -> String {
    format!(
        "{:.prec$}",
        round_to(amount, display_decimals),
        prec = display_decimals as usize
    )
}
