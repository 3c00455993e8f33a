//! Storefront imagery: hero banners and color tiles.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::content::{ColorTileList, HeroImageList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{ColorTile, HeroImage},
    response::ApiResponse,
    routes::upload::{UploadLimits, read_form},
    services::{color_tile_service, hero_image_service},
    state::AppState,
};

pub fn hero_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_hero_images).post(create_hero_image))
        .route("/{id}", delete(delete_hero_image))
}

pub fn color_tile_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_color_tiles).post(create_color_tile))
        .route("/{id}", delete(delete_color_tile).put(update_color_tile))
}

#[utoipa::path(
    get,
    path = "/api/hero-images",
    responses((status = 200, description = "Hero images by display order", body = ApiResponse<HeroImageList>)),
    tag = "Content"
)]
pub async fn list_hero_images(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<HeroImageList>>> {
    let resp = hero_image_service::list(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/hero-images",
    request_body(
        content_type = "multipart/form-data",
        description = "Image plus optional `title`, `linkUrl`, `displayOrder`"
    ),
    responses(
        (status = 201, description = "Hero image uploaded", body = ApiResponse<HeroImage>),
        (status = 502, description = "Image storage failed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn create_hero_image(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<HeroImage>>)> {
    let form = read_form(multipart, UploadLimits::SINGLE).await?;
    let resp = hero_image_service::create(&state, &user, form).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    delete,
    path = "/api/hero-images/{id}",
    params(("id" = Uuid, Path, description = "Hero image ID")),
    responses(
        (status = 200, description = "Hero image deleted"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn delete_hero_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = hero_image_service::delete(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/color-tiles",
    responses((status = 200, description = "Color tiles", body = ApiResponse<ColorTileList>)),
    tag = "Content"
)]
pub async fn list_color_tiles(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<ColorTileList>>> {
    let resp = color_tile_service::list(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/color-tiles",
    request_body(content_type = "multipart/form-data", description = "`colorName` and an image"),
    responses(
        (status = 201, description = "Color tile created", body = ApiResponse<ColorTile>),
        (status = 400, description = "Missing name or image"),
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn create_color_tile(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<ColorTile>>)> {
    let form = read_form(multipart, UploadLimits::SINGLE).await?;
    let resp = color_tile_service::create(&state, &user, form).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/color-tiles/{id}",
    params(("id" = Uuid, Path, description = "Color tile ID")),
    request_body(content_type = "multipart/form-data", description = "New `colorName` and/or image"),
    responses(
        (status = 200, description = "Color tile updated", body = ApiResponse<ColorTile>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn update_color_tile(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<ColorTile>>> {
    let form = read_form(multipart, UploadLimits::SINGLE).await?;
    let resp = color_tile_service::update(&state, &user, id, form).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/color-tiles/{id}",
    params(("id" = Uuid, Path, description = "Color tile ID")),
    responses(
        (status = 200, description = "Color tile deleted"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Content"
)]
pub async fn delete_color_tile(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = color_tile_service::delete(&state, &user, id).await?;
    Ok(Json(resp))
}
