//! Amounts are integers in the smallest currency unit (paise, cents).

use crate::error::{DomainError, DomainResult};

pub type Money = u64;

/// `price * quantity`, refusing to wrap.
pub fn line_total(price: Money, quantity: u32) -> DomainResult<Money> {
    price
        .checked_mul(u64::from(quantity))
        .ok_or_else(|| DomainError::validation("line total overflows"))
}
