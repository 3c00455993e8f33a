use anyhow::{Context, anyhow};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit,
    domain::{
        Order, OrderStatus, PaymentMethod, PaymentReceipt, PaymentStatus, loyalty::settle_points,
    },
    dto::orders::{
        CreateOrderRequest, OrderHistory, OrderList, UpdateOrderStatusRequest,
        UpdatePaymentStatusRequest,
    },
    entity::{
        AuditLogs, Orders, Users,
        audit_logs::{Column as AuditCol, Model as AuditModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Model as OrderModel},
        users::ActiveModel as UserActive,
    },
    error::{AppError, AppResult, ValidationError},
    middleware::auth::{AuthUser, ensure_admin},
    models::AuditEntry,
    response::{ApiResponse, Meta},
    routes::{
        params::{OrderListQuery, SortOrder},
        upload::ImageUpload,
    },
    state::AppState,
    storage,
};

const RECEIPT_FOLDER: &str = "payment-receipts";

pub async fn create_order(
    state: &AppState,
    user: Option<&AuthUser>,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    // nothing is written unless the request is complete and the totals add up
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let now = Utc::now();

    let (user_id, customer_email, is_first_order) = match user {
        Some(user) => {
            let account = Users::find_by_id(user.user_id)
                .lock(LockType::Update)
                .one(&txn)
                .await?
                .ok_or(AppError::NotFound)?;

            let prior = Orders::find()
                .filter(OrderCol::UserId.eq(account.id))
                .count(&txn)
                .await?;

            let balance = settle_points(
                account.loyalty_points,
                payload.points_used,
                payload.points_earned,
            )?;
            let email = payload
                .customer_email
                .clone()
                .unwrap_or_else(|| account.email.clone());

            let mut active: UserActive = account.into();
            active.loyalty_points = Set(balance);
            active.updated_at = Set(now.into());
            active.update(&txn).await?;

            (Some(user.user_id), email, prior == 0)
        }
        None => {
            if payload.points_used > 0 {
                return Err(ValidationError::Invalid(
                    "guest orders cannot redeem loyalty points".into(),
                )
                .into());
            }
            let email = payload
                .customer_email
                .clone()
                .ok_or(ValidationError::MissingField("customerEmail"))?;
            let prior = Orders::find()
                .filter(OrderCol::UserId.is_null())
                .filter(OrderCol::CustomerEmail.eq(email.as_str()))
                .count(&txn)
                .await?;
            (None, email, prior == 0)
        }
    };

    let order = Order {
        id: Uuid::new_v4(),
        user_id,
        totals: payload.totals(),
        items: payload.items,
        shipping_address: payload.shipping_address,
        discount_code: payload.discount_code.trim().to_string(),
        points_used: payload.points_used,
        points_earned: payload.points_earned,
        payment_method: payload.payment_method,
        payment_status: PaymentStatus::Pending,
        payment_receipt: None,
        order_status: OrderStatus::Pending,
        is_first_order,
        tracking_number: None,
        estimated_delivery: None,
        delivered_at: None,
        cancelled_at: None,
        cancellation_reason: None,
        customer_email,
        created_at: now,
        updated_at: now,
    };

    order_to_active(&order)?.insert(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        order = %order.reference(),
        total = order.totals.total,
        first_order = order.is_first_order,
        "order created"
    );
    audit::record(
        &state.pool,
        user_id,
        "order_create",
        "orders",
        order.id,
        serde_json::json!({ "total": order.totals.total, "items": order.item_count() }),
    )
    .await;

    state.notifier.order_created(&order).await;

    Ok(ApiResponse::success(
        "Order created successfully",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    list_orders(state, condition, query, "Ok").await
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    list_orders(state, Condition::all(), query, "Orders").await
}

async fn list_orders(
    state: &AppState,
    mut condition: Condition,
    query: OrderListQuery,
    message: &str,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::OrderStatus.eq(status.as_str()));
    }
    if let Some(payment_status) = query.payment_status {
        condition = condition.add(OrderCol::PaymentStatus.eq(payment_status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        message,
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = find_visible(state, user, id).await?;
    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

/// Applies a status change under a row lock, records it, then notifies the
/// customer. Notification failures never undo the change.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let model = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut order = order_from_entity(model)?;

    let from = order.transition(
        payload.status,
        &payload.metadata,
        state.config.transition_policy,
        Utc::now(),
    )?;

    order_to_active(&order)?.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        order = %order.reference(),
        from = %from,
        to = %order.order_status,
        forced = payload.metadata.force,
        "order status changed"
    );
    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        "orders",
        order.id,
        serde_json::json!({
            "from": from,
            "to": order.order_status,
            "force": payload.metadata.force,
            "trackingNumber": order.tracking_number,
            "cancellationReason": order.cancellation_reason,
        }),
    )
    .await;

    state.notifier.order_status_changed(&order).await;

    Ok(ApiResponse::success(
        "Order status updated",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn update_payment_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let model = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let previous = model.payment_status.clone();

    let mut active: OrderActive = model.into();
    active.payment_status = Set(payload.payment_status.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = order_from_entity(active.update(&txn).await?)?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_payment_update",
        "orders",
        order.id,
        serde_json::json!({ "from": previous, "to": order.payment_status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment status updated",
        order,
        Some(Meta::empty()),
    ))
}

/// Stores a bank-transfer receipt, replacing any earlier one.
pub async fn upload_receipt(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    upload: ImageUpload,
) -> AppResult<ApiResponse<Order>> {
    let order = find_visible(state, user, id).await?;
    if order.payment_method != PaymentMethod::BankTransfer {
        return Err(AppError::BadRequest(
            "Payment receipts are only accepted for bank transfer orders".into(),
        ));
    }

    let path = storage::spool(&state.config.images.temp_dir, &upload.file_name, &upload.bytes)
        .await
        .context("failed to spool receipt")?;
    let image = state.images.upload_file(&path, RECEIPT_FOLDER).await?;

    let saved = save_receipt(state, id, &image).await;
    let (order, replaced) = match saved {
        Ok(result) => result,
        Err(err) => {
            storage::delete_quietly(state.images.as_ref(), &image.storage_id).await;
            return Err(err);
        }
    };
    if let Some(old) = replaced {
        storage::delete_quietly(state.images.as_ref(), &old.storage_id).await;
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_receipt_upload",
        "orders",
        order.id,
        serde_json::json!({ "storageId": image.storage_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment receipt uploaded",
        order,
        Some(Meta::empty()),
    ))
}

async fn save_receipt(
    state: &AppState,
    id: Uuid,
    image: &storage::UploadedImage,
) -> AppResult<(Order, Option<PaymentReceipt>)> {
    let txn = state.orm.begin().await?;
    let model = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut order = order_from_entity(model)?;

    let replaced = order.payment_receipt.replace(PaymentReceipt {
        url: image.url.clone(),
        storage_id: image.storage_id.clone(),
        uploaded: true,
    });
    order.updated_at = Utc::now();

    order_to_active(&order)?.update(&txn).await?;
    txn.commit().await?;
    Ok((order, replaced))
}

/// Recorded status and payment changes, oldest first.
pub async fn order_history(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderHistory>> {
    let order = find_visible(state, user, id).await?;

    let items = AuditLogs::find()
        .filter(AuditCol::Resource.eq("orders"))
        .filter(AuditCol::ResourceId.eq(order.id))
        .order_by_asc(AuditCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(audit_entry_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Order history",
        OrderHistory { items },
        Some(Meta::empty()),
    ))
}

/// Owners see their own orders, admins see all; anything else is reported
/// as missing.
async fn find_visible(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<Order> {
    let model = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if !user.is_admin() && model.user_id != Some(user.user_id) {
        return Err(AppError::NotFound);
    }
    order_from_entity(model)
}

pub(crate) fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let payment_receipt = model
        .payment_receipt
        .map(serde_json::from_value)
        .transpose()
        .context("corrupt payment receipt")?;

    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        items: serde_json::from_value(model.items).context("corrupt order items")?,
        shipping_address: serde_json::from_value(model.shipping_address)
            .context("corrupt shipping address")?,
        totals: crate::domain::Totals {
            subtotal: model.subtotal,
            discount: model.discount,
            shipping_charges: model.shipping_charges,
            total: model.total,
        },
        discount_code: model.discount_code,
        points_used: model.points_used,
        points_earned: model.points_earned,
        payment_method: model
            .payment_method
            .parse()
            .map_err(|_| anyhow!("unknown payment method {}", model.payment_method))?,
        payment_status: model
            .payment_status
            .parse()
            .map_err(|_| anyhow!("unknown payment status {}", model.payment_status))?,
        payment_receipt,
        order_status: model
            .order_status
            .parse()
            .map_err(|_| anyhow!("unknown order status {}", model.order_status))?,
        is_first_order: model.is_first_order,
        tracking_number: model.tracking_number,
        estimated_delivery: model.estimated_delivery.map(|dt| dt.with_timezone(&Utc)),
        delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        cancelled_at: model.cancelled_at.map(|dt| dt.with_timezone(&Utc)),
        cancellation_reason: model.cancellation_reason,
        customer_email: model.customer_email,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_to_active(order: &Order) -> AppResult<OrderActive> {
    let receipt = order
        .payment_receipt
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .context("failed to encode payment receipt")?;

    Ok(OrderActive {
        id: Set(order.id),
        user_id: Set(order.user_id),
        items: Set(serde_json::to_value(&order.items).context("failed to encode items")?),
        shipping_address: Set(serde_json::to_value(&order.shipping_address)
            .context("failed to encode shipping address")?),
        subtotal: Set(order.totals.subtotal),
        discount: Set(order.totals.discount),
        discount_code: Set(order.discount_code.clone()),
        shipping_charges: Set(order.totals.shipping_charges),
        total: Set(order.totals.total),
        points_used: Set(order.points_used),
        points_earned: Set(order.points_earned),
        payment_method: Set(order.payment_method.as_str().to_string()),
        payment_status: Set(order.payment_status.as_str().to_string()),
        payment_receipt: Set(receipt),
        order_status: Set(order.order_status.as_str().to_string()),
        is_first_order: Set(order.is_first_order),
        tracking_number: Set(order.tracking_number.clone()),
        estimated_delivery: Set(order.estimated_delivery.map(Into::into)),
        delivered_at: Set(order.delivered_at.map(Into::into)),
        cancelled_at: Set(order.cancelled_at.map(Into::into)),
        cancellation_reason: Set(order.cancellation_reason.clone()),
        customer_email: Set(order.customer_email.clone()),
        created_at: Set(order.created_at.into()),
        updated_at: Set(order.updated_at.into()),
    })
}

fn audit_entry_from_entity(model: AuditModel) -> AuditEntry {
    AuditEntry {
        id: model.id,
        user_id: model.user_id,
        action: model.action,
        metadata: model.metadata,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::tests::sample_order;

    #[test]
    fn entity_conversion_keeps_every_field() {
        let mut order = sample_order();
        order.payment_method = PaymentMethod::BankTransfer;
        order.payment_receipt = Some(PaymentReceipt {
            url: "https://cdn.test/payment-receipts/1.png".into(),
            storage_id: "payment-receipts/1".into(),
            uploaded: true,
        });
        order.tracking_number = Some("LEO-778".into());

        let active = order_to_active(&order).unwrap();
        let model = OrderModel {
            id: active.id.unwrap(),
            user_id: active.user_id.unwrap(),
            items: active.items.unwrap(),
            shipping_address: active.shipping_address.unwrap(),
            subtotal: active.subtotal.unwrap(),
            discount: active.discount.unwrap(),
            discount_code: active.discount_code.unwrap(),
            shipping_charges: active.shipping_charges.unwrap(),
            total: active.total.unwrap(),
            points_used: active.points_used.unwrap(),
            points_earned: active.points_earned.unwrap(),
            payment_method: active.payment_method.unwrap(),
            payment_status: active.payment_status.unwrap(),
            payment_receipt: active.payment_receipt.unwrap(),
            order_status: active.order_status.unwrap(),
            is_first_order: active.is_first_order.unwrap(),
            tracking_number: active.tracking_number.unwrap(),
            estimated_delivery: active.estimated_delivery.unwrap(),
            delivered_at: active.delivered_at.unwrap(),
            cancelled_at: active.cancelled_at.unwrap(),
            cancellation_reason: active.cancellation_reason.unwrap(),
            customer_email: active.customer_email.unwrap(),
            created_at: active.created_at.unwrap(),
            updated_at: active.updated_at.unwrap(),
        };
        assert_eq!(model.payment_method, "bank-transfer");
        assert_eq!(model.order_status, "pending");
        assert_eq!(order_from_entity(model).unwrap(), order);
    }

    #[test]
    fn unknown_stored_status_is_an_internal_error() {
        let order = sample_order();
        let active = order_to_active(&order).unwrap();
        let model = OrderModel {
            id: active.id.unwrap(),
            user_id: active.user_id.unwrap(),
            items: active.items.unwrap(),
            shipping_address: active.shipping_address.unwrap(),
            subtotal: 0.0,
            discount: 0.0,
            discount_code: String::new(),
            shipping_charges: 0.0,
            total: 0.0,
            points_used: 0,
            points_earned: 0,
            payment_method: "card".into(),
            payment_status: "pending".into(),
            payment_receipt: None,
            order_status: "lost".into(),
            is_first_order: false,
            tracking_number: None,
            estimated_delivery: None,
            delivered_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            customer_email: order.customer_email.clone(),
            created_at: active.created_at.unwrap(),
            updated_at: active.updated_at.unwrap(),
        };
        assert!(matches!(order_from_entity(model), Err(AppError::Internal(_))));
    }
}
