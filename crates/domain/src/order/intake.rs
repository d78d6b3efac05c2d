//! Checkout form submitted with an order.

use common::{DeliveryDetails, PaymentMethod};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::{DomainError, Result};

fn validate_payment_method(value: &str) -> std::result::Result<(), ValidationError> {
    if value.parse::<PaymentMethod>().is_ok() {
        Ok(())
    } else {
        let mut err = ValidationError::new("payment_method");
        err.message = Some("must be one of cod, upi, card".into());
        Err(err)
    }
}

pub(crate) fn validate_not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("must not be empty".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Delivery, contact and payment fields for `create_order`.
///
/// Fields are kept as raw strings so that missing and malformed values are
/// reported together, per field, instead of failing deserialization on the
/// first one.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct OrderIntake {
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 15))]
    pub phone: String,
    #[validate(custom = "validate_not_blank")]
    pub address: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 10))]
    pub pincode: String,
    #[validate(custom = "validate_payment_method")]
    pub payment_method: String,
    #[validate(length(max = 255))]
    pub transaction_id: Option<String>,
}

/// An intake that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIntake {
    pub delivery: DeliveryDetails,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
}

impl OrderIntake {
    /// Checks every field, collecting all violations into one error.
    pub fn into_validated(self) -> Result<ValidatedIntake> {
        self.validate()?;
        let payment_method: PaymentMethod = self
            .payment_method
            .parse()
            .map_err(|e| DomainError::invalid("payment_method", format!("{e}")))?;

        Ok(ValidatedIntake {
            delivery: DeliveryDetails {
                full_name: self.full_name,
                email: self.email,
                phone: self.phone,
                address: self.address,
                city: self.city,
                state: self.state,
                pincode: self.pincode,
            },
            payment_method,
            transaction_id: self.transaction_id.filter(|t| !t.is_empty()),
        })
    }
}
