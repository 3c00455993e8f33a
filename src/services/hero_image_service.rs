use anyhow::Context;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit,
    dto::content::HeroImageList,
    entity::hero_images::{ActiveModel, Column, Entity as HeroImages, Model as HeroImageModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::HeroImage,
    response::{ApiResponse, Meta},
    routes::upload::UploadForm,
    state::AppState,
    storage,
};

const HERO_FOLDER: &str = "hero-images";

pub async fn list(state: &AppState) -> AppResult<ApiResponse<HeroImageList>> {
    let items = HeroImages::find()
        .order_by_asc(Column::DisplayOrder)
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(hero_image_from_entity)
        .collect();
    Ok(ApiResponse::success("Hero images", HeroImageList { items }, None))
}

pub async fn create(
    state: &AppState,
    user: &AuthUser,
    form: UploadForm,
) -> AppResult<ApiResponse<HeroImage>> {
    ensure_admin(user)?;
    let title = form.text("title").map(str::to_string);
    let link_url = form.text("linkUrl").map(str::to_string);
    let display_order = match form.text("displayOrder") {
        Some(raw) => raw
            .parse::<i32>()
            .map_err(|_| AppError::BadRequest("displayOrder must be a number".into()))?,
        None => 0,
    };
    let (_, upload) = form.single_image()?;

    let path = storage::spool(&state.config.images.temp_dir, &upload.file_name, &upload.bytes)
        .await
        .context("failed to spool hero image")?;
    let image = state.images.upload_file(&path, HERO_FOLDER).await?;

    let inserted = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title),
        link_url: Set(link_url),
        image_url: Set(image.url.clone()),
        storage_id: Set(image.storage_id.clone()),
        display_order: Set(display_order),
        created_at: Set(Utc::now().into()),
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
        "hero_image_create",
        "hero_images",
        model.id,
        serde_json::json!({ "storageId": model.storage_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Hero image uploaded",
        hero_image_from_entity(model),
        Some(Meta::empty()),
    ))
}

pub async fn delete(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let model = HeroImages::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    HeroImages::delete_by_id(id).exec(&state.orm).await?;
    storage::delete_quietly(state.images.as_ref(), &model.storage_id).await;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "hero_image_delete",
        "hero_images",
        id,
        serde_json::json!({ "storageId": model.storage_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Hero image deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn hero_image_from_entity(model: HeroImageModel) -> HeroImage {
    HeroImage {
        id: model.id,
        title: model.title,
        link_url: model.link_url,
        image_url: model.image_url,
        storage_id: model.storage_id,
        display_order: model.display_order,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
