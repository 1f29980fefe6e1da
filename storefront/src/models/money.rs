// storefront/src/models/money.rs

use crate::errors::{AppError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Converts a price to minor units (cents), rounding half away from zero.
pub fn to_minor_units(price: Decimal) -> Result<i64> {
  (price * Decimal::ONE_HUNDRED)
    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    .to_i64()
    .ok_or_else(|| AppError::Validation(format!("Price {} is out of range", price)))
}

/// `unit_amount` (already in minor units) times `quantity`, without overflowing.
pub fn line_total_minor_units(unit_amount: i64, quantity: i32) -> Result<i64> {
  unit_amount
    .checked_mul(i64::from(quantity))
    .ok_or_else(|| AppError::Validation(format!("Line total for {} x {} is out of range", quantity, unit_amount)))
}

/// Sum of `(unit_amount, quantity)` lines in minor units.
pub fn total_minor_units(lines: impl IntoIterator<Item = (i64, i32)>) -> Result<i64> {
  lines.into_iter().try_fold(0i64, |total, (unit_amount, quantity)| {
    total
      .checked_add(line_total_minor_units(unit_amount, quantity)?)
      .ok_or_else(|| AppError::Validation("Order total is out of range".to_string()))
  })
}
