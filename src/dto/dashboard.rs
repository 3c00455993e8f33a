use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Order;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_orders: i64,
    /// Sum of totals over orders that were not cancelled.
    pub revenue: f64,
    pub orders_by_status: Vec<StatusCount>,
    pub orders_by_payment_status: Vec<StatusCount>,
    pub total_users: i64,
    pub total_products: i64,
    pub recent_orders: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryAdjustRequest {
    pub delta: i32,
}
