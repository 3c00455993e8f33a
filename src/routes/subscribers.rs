use axum::{
    Json, Router,
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::{
        contact::ContactRequest,
        subscribers::{SubscribeRequest, SubscriberList},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Subscriber,
    notifications::BulkSendReport,
    response::ApiResponse,
    routes::{
        params::PageQuery,
        upload::{UploadLimits, read_form},
    },
    services::{contact_service, subscriber_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscribers))
        .route("/subscribe", post(subscribe))
        .route("/send-bulk-email", post(send_bulk_email))
}

pub fn contact_router() -> Router<AppState> {
    Router::new().route("/", post(contact))
}

#[utoipa::path(
    post,
    path = "/api/subscribers/subscribe",
    request_body = SubscribeRequest,
    responses(
        (status = 201, description = "Subscribed, welcome email sent", body = ApiResponse<Subscriber>),
        (status = 409, description = "Email already subscribed"),
        (status = 502, description = "Subscribed, but the welcome email failed"),
    ),
    tag = "Subscribers"
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribeRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Subscriber>>)> {
    let resp = subscriber_service::subscribe(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/subscribers",
    params(PageQuery),
    responses(
        (status = 200, description = "Subscribers (admin only)", body = ApiResponse<SubscriberList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Subscribers"
)]
pub async fn list_subscribers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<SubscriberList>>> {
    let resp = subscriber_service::list(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/subscribers/send-bulk-email",
    request_body(
        content_type = "multipart/form-data",
        description = "`subject`, `message` and up to 10 images of at most 5MB each"
    ),
    responses(
        (status = 200, description = "Per-recipient outcome", body = ApiResponse<BulkSendReport>),
        (status = 400, description = "Missing fields, bad images or no subscribers"),
        (status = 502, description = "No email could be delivered"),
    ),
    security(("bearer_auth" = [])),
    tag = "Subscribers"
)]
pub async fn send_bulk_email(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<BulkSendReport>>> {
    let form = read_form(multipart, UploadLimits::BULK).await?;
    let resp = subscriber_service::send_bulk(&state, &user, form).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/contact",
    request_body = ContactRequest,
    responses(
        (status = 200, description = "Message forwarded and acknowledged"),
        (status = 400, description = "Missing or invalid field"),
        (status = 502, description = "Email delivery failed"),
    ),
    tag = "Contact"
)]
pub async fn contact(
    State(state): State<AppState>,
    Json(payload): Json<ContactRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = contact_service::submit(&state, payload).await?;
    Ok(Json(resp))
}
