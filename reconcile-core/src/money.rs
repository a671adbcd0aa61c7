//! Money and decimal primitives.
//!
//! `rust_decimal::Decimal` gives value equality that ignores trailing-zero
//! representation differences (`1.50 == 1.5`) while `Display`/`to_string`
//! preserves the stored scale, with exact base-10 arithmetic and no
//! floating-point rounding.

use rust_decimal::Decimal;

pub type Money = Decimal;
