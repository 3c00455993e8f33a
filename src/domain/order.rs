use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    status::{OrderStatus, PaymentMethod, PaymentStatus, TransitionPolicy},
    totals::Totals,
};
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub color: String,
    pub size: String,
    pub quantity: i32,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub url: String,
    pub storage_id: String,
    pub uploaded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    #[serde(flatten)]
    pub totals: Totals,
    pub discount_code: String,
    pub points_used: i64,
    pub points_earned: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_receipt: Option<PaymentReceipt>,
    pub order_status: OrderStatus,
    pub is_first_order: bool,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub customer_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional data carried by a status change.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionMetadata {
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    /// Admin override for moves the strict policy rejects.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move order from {from} to {to}")]
pub struct IllegalTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl Order {
    /// `ORD-` followed by the last eight hex digits of the id.
    pub fn reference(&self) -> String {
        let simple = self.id.simple().to_string();
        format!("ORD-{}", simple[simple.len() - 8..].to_uppercase())
    }

    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|item| i64::from(item.quantity)).sum()
    }

    /// Moves the order to `target`, stamping the timestamp and reason
    /// fields that belong to it. Returns the previous status.
    pub fn transition(
        &mut self,
        target: OrderStatus,
        meta: &TransitionMetadata,
        policy: TransitionPolicy,
        now: DateTime<Utc>,
    ) -> Result<OrderStatus, IllegalTransition> {
        let from = self.order_status;
        if !meta.force && !from.can_transition_to(target, policy) {
            return Err(IllegalTransition { from, to: target });
        }

        // timestamps never precede creation, even with a skewed clock
        let now = now.max(self.created_at);

        if let Some(tracking) = meta.tracking_number.as_deref().map(str::trim) {
            if !tracking.is_empty() {
                self.tracking_number = Some(tracking.to_string());
            }
        }
        if let Some(eta) = meta.estimated_delivery {
            self.estimated_delivery = Some(eta);
        }

        // terminal stamps only describe the status they belong to
        if target != OrderStatus::Delivered {
            self.delivered_at = None;
        }
        if target != OrderStatus::Cancelled {
            self.cancelled_at = None;
            self.cancellation_reason = None;
        }

        match target {
            OrderStatus::Delivered => self.delivered_at = Some(now),
            OrderStatus::Cancelled => {
                self.cancelled_at = Some(now);
                self.cancellation_reason = meta
                    .cancellation_reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|reason| !reason.is_empty())
                    .map(str::to_string);
            }
            _ => {}
        }

        self.order_status = target;
        self.updated_at = now;
        Ok(from)
    }
}

impl ShippingAddress {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("shippingAddress.fullName", &self.full_name),
            ("shippingAddress.addressLine1", &self.address_line1),
            ("shippingAddress.city", &self.city),
            ("shippingAddress.state", &self.state),
            ("shippingAddress.postalCode", &self.postal_code),
            ("shippingAddress.country", &self.country),
            ("shippingAddress.phoneNumber", &self.phone_number),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(name));
            }
        }
        Ok(())
    }
}

impl OrderItem {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.product_name.trim().is_empty() {
            return Err(ValidationError::MissingField("items.productName"));
        }
        if self.color.trim().is_empty() {
            return Err(ValidationError::MissingField("items.color"));
        }
        if self.size.trim().is_empty() {
            return Err(ValidationError::MissingField("items.size"));
        }
        if self.quantity < 1 {
            return Err(ValidationError::Invalid(format!(
                "quantity for {} must be at least 1",
                self.product_name
            )));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ValidationError::Invalid(format!(
                "price for {} must be non-negative",
                self.product_name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::Duration;

    use super::*;

    pub(crate) fn sample_order() -> Order {
        let created_at = Utc::now() - Duration::hours(1);
        Order {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            items: vec![
                OrderItem {
                    product_id: Uuid::new_v4(),
                    product_name: "Classic Scrub Top".into(),
                    color: "Navy".into(),
                    size: "M".into(),
                    quantity: 2,
                    price: 400.0,
                },
                OrderItem {
                    product_id: Uuid::new_v4(),
                    product_name: "Stethoscope Tag".into(),
                    color: "Silver".into(),
                    size: "One Size".into(),
                    quantity: 1,
                    price: 200.0,
                },
            ],
            shipping_address: ShippingAddress {
                full_name: "Ayesha Khan".into(),
                address_line1: "12 Jail Road".into(),
                address_line2: None,
                city: "Lahore".into(),
                state: "Punjab".into(),
                postal_code: "54000".into(),
                country: "Pakistan".into(),
                phone_number: "+92 300 0000000".into(),
            },
            totals: Totals {
                subtotal: 1000.0,
                discount: 100.0,
                shipping_charges: 50.0,
                total: 950.0,
            },
            discount_code: String::new(),
            points_used: 0,
            points_earned: 95,
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            payment_receipt: None,
            order_status: OrderStatus::Pending,
            is_first_order: true,
            tracking_number: None,
            estimated_delivery: None,
            delivered_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            customer_email: "ayesha@example.com".into(),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn reference_uses_last_eight_hex_digits() {
        let mut order = sample_order();
        order.id = Uuid::parse_str("6f9619ff-8b86-d011-b42d-00c04fc964ff").unwrap();
        assert_eq!(order.reference(), "ORD-4FC964FF");
    }

    #[test]
    fn cancel_is_reachable_from_every_open_status() {
        for from in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
        ] {
            let mut order = sample_order();
            order.order_status = from;
            let meta = TransitionMetadata {
                cancellation_reason: Some("customer request".into()),
                ..Default::default()
            };
            let previous = order
                .transition(OrderStatus::Cancelled, &meta, TransitionPolicy::Strict, Utc::now())
                .expect("cancel allowed");
            assert_eq!(previous, from);
            assert_eq!(order.order_status, OrderStatus::Cancelled);
            assert!(order.cancelled_at.unwrap() >= order.created_at);
            assert_eq!(order.cancellation_reason.as_deref(), Some("customer request"));
        }
    }

    #[test]
    fn cancelled_at_never_precedes_creation() {
        let mut order = sample_order();
        let skewed = order.created_at - Duration::minutes(10);
        order
            .transition(OrderStatus::Cancelled, &TransitionMetadata::default(), TransitionPolicy::Strict, skewed)
            .unwrap();
        assert_eq!(order.cancelled_at, Some(order.created_at));
    }

    #[test]
    fn delivered_sets_delivered_at() {
        let mut order = sample_order();
        order.order_status = OrderStatus::Shipped;
        let now = Utc::now();
        order
            .transition(OrderStatus::Delivered, &TransitionMetadata::default(), TransitionPolicy::Strict, now)
            .unwrap();
        assert_eq!(order.delivered_at, Some(now));
        assert_eq!(order.updated_at, now);
    }

    #[test]
    fn shipped_records_trimmed_tracking_number() {
        let mut order = sample_order();
        let meta = TransitionMetadata {
            tracking_number: Some("  TCS-123456  ".into()),
            ..Default::default()
        };
        order
            .transition(OrderStatus::Shipped, &meta, TransitionPolicy::Strict, Utc::now())
            .unwrap();
        assert_eq!(order.tracking_number.as_deref(), Some("TCS-123456"));
    }

    #[test]
    fn backward_move_needs_force() {
        let mut order = sample_order();
        order.order_status = OrderStatus::Delivered;
        let err = order
            .transition(OrderStatus::Pending, &TransitionMetadata::default(), TransitionPolicy::Strict, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            IllegalTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending
            }
        );
        assert_eq!(order.order_status, OrderStatus::Delivered);

        let forced = TransitionMetadata {
            force: true,
            ..Default::default()
        };
        order
            .transition(OrderStatus::Pending, &forced, TransitionPolicy::Strict, Utc::now())
            .unwrap();
        assert_eq!(order.order_status, OrderStatus::Pending);
    }

    #[test]
    fn forced_reopen_clears_terminal_stamps() {
        let forced = TransitionMetadata {
            force: true,
            ..Default::default()
        };

        let mut cancelled = sample_order();
        let meta = TransitionMetadata {
            cancellation_reason: Some("out of stock".into()),
            ..Default::default()
        };
        cancelled
            .transition(OrderStatus::Cancelled, &meta, TransitionPolicy::Strict, Utc::now())
            .unwrap();
        cancelled
            .transition(OrderStatus::Pending, &forced, TransitionPolicy::Strict, Utc::now())
            .unwrap();
        assert_eq!(cancelled.order_status, OrderStatus::Pending);
        assert_eq!(cancelled.cancelled_at, None);
        assert_eq!(cancelled.cancellation_reason, None);

        let mut delivered = sample_order();
        delivered.order_status = OrderStatus::Shipped;
        delivered
            .transition(OrderStatus::Delivered, &TransitionMetadata::default(), TransitionPolicy::Strict, Utc::now())
            .unwrap();
        delivered
            .transition(OrderStatus::Processing, &forced, TransitionPolicy::Strict, Utc::now())
            .unwrap();
        assert_eq!(delivered.delivered_at, None);
    }

    #[test]
    fn item_count_handles_huge_quantities() {
        let mut order = sample_order();
        for item in &mut order.items {
            item.quantity = i32::MAX;
            assert!(item.validate().is_ok());
        }
        assert_eq!(order.item_count(), 2 * i64::from(i32::MAX));
    }

    #[test]
    fn address_requires_all_mandatory_fields() {
        let mut address = sample_order().shipping_address;
        assert!(address.validate().is_ok());
        address.city = "  ".into();
        assert_eq!(
            address.validate(),
            Err(ValidationError::MissingField("shippingAddress.city"))
        );
    }

    #[test]
    fn item_quantity_must_be_positive() {
        let mut item = sample_order().items.remove(0);
        item.quantity = 0;
        assert!(matches!(item.validate(), Err(ValidationError::Invalid(_))));
    }
}
