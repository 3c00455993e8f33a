use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ValidationError;

/// Absolute tolerance for currency comparisons (one cent).
pub const TOTAL_TOLERANCE: f64 = 0.01;

/// Monetary breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: f64,
    pub discount: f64,
    pub shipping_charges: f64,
    pub total: f64,
}

impl Totals {
    pub fn expected_total(&self) -> f64 {
        self.subtotal - self.discount + self.shipping_charges
    }

    /// Checks `subtotal - discount + shipping_charges == total` within
    /// [`TOTAL_TOLERANCE`]. Amounts must also be non-negative and finite.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [
            ("subtotal", self.subtotal),
            ("discount", self.discount),
            ("shippingCharges", self.shipping_charges),
            ("total", self.total),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::Invalid(format!(
                    "{name} must be a non-negative amount"
                )));
            }
        }

        let expected = self.expected_total();
        if (expected - self.total).abs() > TOTAL_TOLERANCE {
            return Err(ValidationError::TotalMismatch {
                expected,
                received: self.total,
            });
        }
        Ok(())
    }
}
