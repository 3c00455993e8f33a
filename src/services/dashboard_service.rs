use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    domain::{OrderStatus, PaymentStatus},
    dto::{
        dashboard::{DashboardSummary, InventoryAdjustRequest, StatusCount},
        products::ProductList,
    },
    entity::{
        Orders, Products, Users,
        orders::Column as OrderCol,
        products::{ActiveModel as ProductActive, Column as ProdCol},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::LowStockQuery,
    services::{order_service::order_from_entity, product_service::product_from_entity},
    state::AppState,
};

const RECENT_ORDERS: u64 = 5;
const DEFAULT_LOW_STOCK: i32 = 5;

pub async fn summary(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<DashboardSummary>> {
    ensure_admin(user)?;

    let by_status: Vec<(String, i64)> = Orders::find()
        .select_only()
        .column(OrderCol::OrderStatus)
        .column_as(Expr::col(OrderCol::Id).count(), "count")
        .group_by(OrderCol::OrderStatus)
        .into_tuple()
        .all(&state.orm)
        .await?;
    let by_payment: Vec<(String, i64)> = Orders::find()
        .select_only()
        .column(OrderCol::PaymentStatus)
        .column_as(Expr::col(OrderCol::Id).count(), "count")
        .group_by(OrderCol::PaymentStatus)
        .into_tuple()
        .all(&state.orm)
        .await?;

    let revenue: Option<f64> = Orders::find()
        .select_only()
        .column_as(Expr::col(OrderCol::Total).sum(), "revenue")
        .filter(OrderCol::OrderStatus.ne(OrderStatus::Cancelled.as_str()))
        .into_tuple::<Option<f64>>()
        .one(&state.orm)
        .await?
        .flatten();

    let recent_orders = Orders::find()
        .order_by_desc(OrderCol::CreatedAt)
        .limit(RECENT_ORDERS)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let total_users = Users::find().count(&state.orm).await? as i64;
    let total_products = Products::find().count(&state.orm).await? as i64;

    let orders_by_status = fill_counts(OrderStatus::ALL.map(|s| s.as_str()), &by_status);
    let orders_by_payment_status = fill_counts(PaymentStatus::ALL.map(|s| s.as_str()), &by_payment);
    let total_orders = orders_by_status.iter().map(|c| c.count).sum();

    Ok(ApiResponse::success(
        "Dashboard summary",
        DashboardSummary {
            total_orders,
            revenue: round_cents(revenue.unwrap_or(0.0)),
            orders_by_status,
            orders_by_payment_status,
            total_users,
            total_products,
            recent_orders,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK);
    let (page, limit, offset) = query.pagination().normalize();

    let finder = Products::find()
        .filter(ProdCol::Stock.lte(threshold))
        .order_by_asc(ProdCol::Stock)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Low stock",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let new_stock = product
        .stock
        .checked_add(payload.delta)
        .filter(|stock| *stock >= 0)
        .ok_or_else(|| AppError::BadRequest("stock cannot be negative".into()))?;

    let mut active: ProductActive = product.into();
    active.stock = Set(new_stock);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(product = %updated.id, delta = payload.delta, stock = new_stock, "inventory adjusted");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "inventory_adjust",
        "products",
        updated.id,
        serde_json::json!({ "delta": payload.delta, "stock": new_stock }),
    )
    .await;

    Ok(ApiResponse::success(
        "Inventory updated",
        product_from_entity(updated)?,
        Some(Meta::empty()),
    ))
}

/// One entry per known label, in label order, zero when absent from `rows`.
/// Rows with unknown labels are dropped.
fn fill_counts<const N: usize>(labels: [&str; N], rows: &[(String, i64)]) -> Vec<StatusCount> {
    labels
        .into_iter()
        .map(|label| StatusCount {
            status: label.to_string(),
            count: rows
                .iter()
                .filter(|(status, _)| status == label)
                .map(|(_, count)| *count)
                .sum(),
        })
        .collect()
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
