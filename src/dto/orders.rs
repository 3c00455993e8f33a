use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    domain::{
        Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress, Totals,
        TransitionMetadata,
    },
    error::ValidationError,
    models::AuditEntry,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub subtotal: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub discount_code: String,
    #[serde(default)]
    pub shipping_charges: f64,
    pub total: f64,
    #[serde(default)]
    pub points_used: i64,
    #[serde(default)]
    pub points_earned: i64,
    pub payment_method: PaymentMethod,
    /// Defaults to the signed-in account's email.
    pub customer_email: Option<String>,
}

impl CreateOrderRequest {
    pub fn totals(&self) -> Totals {
        Totals {
            subtotal: self.subtotal,
            discount: self.discount,
            shipping_charges: self.shipping_charges,
            total: self.total,
        }
    }

    /// Everything that can be checked without touching storage.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::MissingField("items"));
        }
        for item in &self.items {
            item.validate()?;
        }
        self.shipping_address.validate()?;
        if let Some(email) = &self.customer_email {
            if !email.contains('@') {
                return Err(ValidationError::Invalid("customerEmail is not a valid email".into()));
            }
        }
        if self.points_used < 0 || self.points_earned < 0 {
            return Err(ValidationError::Invalid("points must be non-negative".into()));
        }
        self.totals().validate()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[serde(flatten)]
    pub metadata: TransitionMetadata,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderHistory {
    pub items: Vec<AuditEntry>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request() -> serde_json::Value {
        json!({
            "items": [{
                "productId": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
                "productName": "Scrub Set",
                "color": "Wine",
                "size": "L",
                "quantity": 2,
                "price": 500.0
            }],
            "shippingAddress": {
                "fullName": "Hamza Ali",
                "addressLine1": "House 4, Street 9",
                "city": "Islamabad",
                "state": "ICT",
                "postalCode": "44000",
                "country": "Pakistan",
                "phoneNumber": "03001234567"
            },
            "subtotal": 1000.0,
            "discount": 100.0,
            "shippingCharges": 50.0,
            "total": 950.0,
            "paymentMethod": "cash-on-delivery"
        })
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let req: CreateOrderRequest = serde_json::from_value(request()).unwrap();
        assert_eq!(req.discount_code, "");
        assert_eq!(req.points_used, 0);
        assert!(req.shipping_address.address_line2.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn mismatched_total_is_rejected_before_anything_else_happens() {
        let mut body = request();
        body["total"] = json!(951.0);
        let req: CreateOrderRequest = serde_json::from_value(body).unwrap();
        assert!(matches!(
            req.validate(),
            Err(ValidationError::TotalMismatch { .. })
        ));
    }

    #[test]
    fn empty_cart_is_rejected() {
        let mut body = request();
        body["items"] = json!([]);
        let req: CreateOrderRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.validate(), Err(ValidationError::MissingField("items")));
    }

    #[test]
    fn unknown_payment_method_fails_to_parse() {
        let mut body = request();
        body["paymentMethod"] = json!("crypto");
        assert!(serde_json::from_value::<CreateOrderRequest>(body).is_err());
    }

    #[test]
    fn status_request_carries_metadata() {
        let req: UpdateOrderStatusRequest = serde_json::from_value(json!({
            "status": "shipped",
            "trackingNumber": "TCS-1",
        }))
        .unwrap();
        assert_eq!(req.status, OrderStatus::Shipped);
        assert_eq!(req.metadata.tracking_number.as_deref(), Some("TCS-1"));
        assert!(!req.metadata.force);
    }
}
