use anyhow::Context;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit,
    dto::content::ColorTileList,
    entity::color_tiles::{ActiveModel, Column, Entity as ColorTiles, Model as ColorTileModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::ColorTile,
    response::{ApiResponse, Meta},
    routes::upload::{ImageUpload, UploadForm},
    state::AppState,
    storage::{self, UploadedImage},
};

const TILE_FOLDER: &str = "color-tiles";

pub async fn list(state: &AppState) -> AppResult<ApiResponse<ColorTileList>> {
    let items = ColorTiles::find()
        .order_by_asc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(color_tile_from_entity)
        .collect();
    Ok(ApiResponse::success("Color tiles", ColorTileList { items }, None))
}

pub async fn create(
    state: &AppState,
    user: &AuthUser,
    form: UploadForm,
) -> AppResult<ApiResponse<ColorTile>> {
    ensure_admin(user)?;
    let color_name = form.require("colorName")?.to_string();
    let (_, upload) = form.single_image()?;
    let image = upload_tile(state, &upload).await?;

    let now = Utc::now();
    let inserted = ActiveModel {
        id: Set(Uuid::new_v4()),
        color_name: Set(color_name),
        image_url: Set(image.url.clone()),
        storage_id: Set(image.storage_id.clone()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await;
    let model = match inserted {
        Ok(model) => model,
        Err(err) => {
            storage::delete_quietly(state.images.as_ref(), &image.storage_id).await;
            return Err(err.into());
        }
    };

    audit::record(
        &state.pool,
        Some(user.user_id),
        "color_tile_create",
        "color_tiles",
        model.id,
        serde_json::json!({ "colorName": model.color_name }),
    )
    .await;

    Ok(ApiResponse::success(
        "Color tile created",
        color_tile_from_entity(model),
        Some(Meta::empty()),
    ))
}

/// Renames the tile and/or swaps its image; the old image is removed once
/// the new one is saved.
pub async fn update(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    form: UploadForm,
) -> AppResult<ApiResponse<ColorTile>> {
    ensure_admin(user)?;
    let existing = ColorTiles::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let color_name = form.text("colorName").map(str::to_string);
    let replacement = match form.images.into_iter().next() {
        Some(upload) => Some(upload_tile(state, &upload).await?),
        None => None,
    };
    if color_name.is_none() && replacement.is_none() {
        return Err(AppError::BadRequest("Nothing to update".into()));
    }

    let old_storage_id = existing.storage_id.clone();
    let mut active: ActiveModel = existing.into();
    if let Some(name) = color_name {
        active.color_name = Set(name);
    }
    if let Some(image) = &replacement {
        active.image_url = Set(image.url.clone());
        active.storage_id = Set(image.storage_id.clone());
    }
    active.updated_at = Set(Utc::now().into());

    let model = match active.update(&state.orm).await {
        Ok(model) => model,
        Err(err) => {
            if let Some(image) = &replacement {
                storage::delete_quietly(state.images.as_ref(), &image.storage_id).await;
            }
            return Err(err.into());
        }
    };
    if replacement.is_some() {
        storage::delete_quietly(state.images.as_ref(), &old_storage_id).await;
    }

    Ok(ApiResponse::success(
        "Color tile updated",
        color_tile_from_entity(model),
        Some(Meta::empty()),
    ))
}

pub async fn delete(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let model = ColorTiles::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    ColorTiles::delete_by_id(id).exec(&state.orm).await?;
    storage::delete_quietly(state.images.as_ref(), &model.storage_id).await;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "color_tile_delete",
        "color_tiles",
        id,
        serde_json::json!({ "colorName": model.color_name }),
    )
    .await;

    Ok(ApiResponse::success(
        "Color tile deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn upload_tile(state: &AppState, upload: &ImageUpload) -> AppResult<UploadedImage> {
    let path = storage::spool(&state.config.images.temp_dir, &upload.file_name, &upload.bytes)
        .await
        .context("failed to spool color tile")?;
    Ok(state.images.upload_file(&path, TILE_FOLDER).await?)
}

fn color_tile_from_entity(model: ColorTileModel) -> ColorTile {
    ColorTile {
        id: model.id,
        color_name: model.color_name,
        image_url: model.image_url,
        storage_id: model.storage_id,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
