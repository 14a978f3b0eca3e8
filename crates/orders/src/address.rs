use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, ValueObject};

/// Delivery address frozen onto the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
}

impl ValueObject for ShippingAddress {}

impl ShippingAddress {
    /// Fill a blank country.
    pub fn with_default_country(mut self, country: &str) -> Self {
        if self.country.trim().is_empty() {
            self.country = country.to_string();
        }
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        let required = [
            ("name", &self.name),
            ("phone", &self.phone),
            ("address line", &self.address_line),
            ("city", &self.city),
            ("state", &self.state),
            ("pincode", &self.pincode),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "shipping {field} is required"
                )));
            }
        }
        Ok(())
    }
}
