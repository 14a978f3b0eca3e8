use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Money, line_total};

/// `total_amount = subtotal + shipping_charge - discount`, always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub shipping_charge: Money,
    pub discount: Money,
    pub total_amount: Money,
}

impl PriceBreakdown {
    /// `lines` are `(unit price, quantity)` pairs.
    ///
    /// A discount larger than subtotal plus shipping is rejected rather than
    /// clamped, so the identity above holds exactly for every order.
    pub fn compute<I>(lines: I, shipping_charge: Money, discount: Money) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (Money, u32)>,
    {
        let overflow = || DomainError::validation("order total overflows");

        let mut subtotal: Money = 0;
        for (price, quantity) in lines {
            subtotal = subtotal
                .checked_add(line_total(price, quantity)?)
                .ok_or_else(overflow)?;
        }

        let gross = subtotal.checked_add(shipping_charge).ok_or_else(overflow)?;
        let total_amount = gross
            .checked_sub(discount)
            .ok_or_else(|| DomainError::validation("discount exceeds order value"))?;

        Ok(Self {
            subtotal,
            shipping_charge,
            discount,
            total_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_includes_shipping_and_discount() {
        let b = PriceBreakdown::compute([(1_500, 2), (999, 1)], 50, 100).unwrap();
        assert_eq!(b.subtotal, 3_999);
        assert_eq!(b.total_amount, 3_949);
    }

    #[test]
    fn oversized_discount_is_rejected() {
        match PriceBreakdown::compute([(100, 1)], 0, 101).unwrap_err() {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error"),
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            #[test]
            fn total_arithmetic_is_exact(
                lines in prop::collection::vec((0u64..100_000, 1u32..20), 1..10),
                shipping in 0u64..10_000,
                discount_ratio in 0u64..=100,
            ) {
                let subtotal: u64 = lines.iter().map(|(p, q)| p * u64::from(*q)).sum();
                let discount = (subtotal + shipping) * discount_ratio / 100;

                let b = PriceBreakdown::compute(lines, shipping, discount).unwrap();

                prop_assert_eq!(b.subtotal, subtotal);
                prop_assert_eq!(b.total_amount + b.discount, b.subtotal + b.shipping_charge);
            }
        }
    }
}
