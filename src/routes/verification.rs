use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::verification::{ResolveVerificationRequest, VerificationList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::StudentVerification,
    response::ApiResponse,
    routes::{
        params::PageQuery,
        upload::{UploadLimits, read_form},
    },
    services::verification_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests).post(submit_request))
        .route("/me", get(my_requests))
        .route("/{id}", patch(resolve_request))
}

#[utoipa::path(
    post,
    path = "/api/student-verification",
    request_body(
        content_type = "multipart/form-data",
        description = "Fields `fullName`, `institution`, `studentIdNumber` and a student id image"
    ),
    responses(
        (status = 201, description = "Request submitted, admin notified", body = ApiResponse<StudentVerification>),
        (status = 409, description = "A request is already pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Student Verification"
)]
pub async fn submit_request(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<StudentVerification>>)> {
    let form = read_form(multipart, UploadLimits::SINGLE).await?;
    let resp = verification_service::submit(&state, &user, form).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/student-verification",
    params(PageQuery),
    responses(
        (status = 200, description = "Verification requests (admin only)", body = ApiResponse<VerificationList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Student Verification"
)]
pub async fn list_requests(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<ApiResponse<VerificationList>>> {
    let resp = verification_service::list(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/student-verification/me",
    responses(
        (status = 200, description = "Requests of the signed-in user", body = ApiResponse<VerificationList>),
    ),
    security(("bearer_auth" = [])),
    tag = "Student Verification"
)]
pub async fn my_requests(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<VerificationList>>> {
    let resp = verification_service::mine(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/student-verification/{id}",
    params(("id" = Uuid, Path, description = "Verification request ID")),
    request_body = ResolveVerificationRequest,
    responses(
        (status = 200, description = "Request resolved, student notified", body = ApiResponse<StudentVerification>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Request already resolved"),
    ),
    security(("bearer_auth" = [])),
    tag = "Student Verification"
)]
pub async fn resolve_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveVerificationRequest>,
) -> AppResult<Json<ApiResponse<StudentVerification>>> {
    let resp = verification_service::resolve(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
