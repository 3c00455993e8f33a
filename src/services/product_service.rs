use anyhow::Context;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::dto::products::{CreateProductRequest, ProductList, UpdateProductRequest};
use crate::{
    audit,
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult, ValidationError},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::{
        params::{ProductQuery, ProductSortBy, SortOrder},
        upload::ImageUpload,
    },
    state::AppState,
    storage::{self, UploadedImage},
};

const PRODUCT_FOLDER: &str = "products";

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(category) = query.category.as_ref().filter(|c| !c.is_empty()) {
        condition = condition.add(Expr::col(Column::Category).ilike(category.clone()));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let model = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product_from_entity(model)?, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    check_fields(Some(&payload.name), Some(payload.price), Some(payload.stock))?;

    let now = Utc::now();
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        price: Set(payload.price),
        category: Set(payload.category),
        colors: Set(serde_json::json!(payload.colors)),
        sizes: Set(serde_json::json!(payload.sizes)),
        images: Set(serde_json::json!([])),
        stock: Set(payload.stock),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_create",
        "products",
        product.id,
        serde_json::json!({ "name": product.name }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    check_fields(payload.name.as_deref(), payload.price, payload.stock)?;

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(category) = payload.category {
        active.category = Set(Some(category));
    }
    if let Some(colors) = payload.colors {
        active.colors = Set(serde_json::json!(colors));
    }
    if let Some(sizes) = payload.sizes {
        active.sizes = Set(serde_json::json!(sizes));
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_update",
        "products",
        product.id,
        serde_json::json!({}),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product)?,
        Some(Meta::empty()),
    ))
}

pub async fn add_product_image(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    upload: ImageUpload,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut images = decode_images(&existing)?;

    let path = storage::spool(&state.config.images.temp_dir, &upload.file_name, &upload.bytes)
        .await
        .context("failed to spool product image")?;
    let image = state.images.upload_file(&path, PRODUCT_FOLDER).await?;
    images.push(image);

    let mut active: ActiveModel = existing.into();
    active.images = Set(serde_json::to_value(&images).context("failed to encode images")?);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Image added",
        product_from_entity(product)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let images = decode_images(&existing)?;

    Products::delete_by_id(id).exec(&state.orm).await?;
    for image in &images {
        storage::delete_quietly(state.images.as_ref(), &image.storage_id).await;
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        "products",
        id,
        serde_json::json!({ "images": images.len() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn check_fields(name: Option<&str>, price: Option<f64>, stock: Option<i32>) -> Result<(), ValidationError> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(ValidationError::MissingField("name"));
    }
    if price.is_some_and(|p| !p.is_finite() || p < 0.0) {
        return Err(ValidationError::Invalid("price must be non-negative".into()));
    }
    if stock.is_some_and(|s| s < 0) {
        return Err(ValidationError::Invalid("stock cannot be negative".into()));
    }
    Ok(())
}

fn decode_images(model: &ProductModel) -> AppResult<Vec<UploadedImage>> {
    Ok(serde_json::from_value(model.images.clone()).context("corrupt product images")?)
}

pub(crate) fn product_from_entity(model: ProductModel) -> AppResult<Product> {
    let images = decode_images(&model)?;
    Ok(Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        category: model.category,
        colors: serde_json::from_value(model.colors).context("corrupt product colors")?,
        sizes: serde_json::from_value(model.sizes).context("corrupt product sizes")?,
        images,
        stock: model.stock,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_checks() {
        assert!(check_fields(Some("Lab Coat"), Some(2500.0), Some(4)).is_ok());
        assert!(check_fields(None, None, None).is_ok());
        assert_eq!(
            check_fields(Some("  "), None, None),
            Err(ValidationError::MissingField("name"))
        );
        assert!(check_fields(None, Some(-1.0), None).is_err());
        assert!(check_fields(None, Some(f64::NAN), None).is_err());
        assert!(check_fields(None, None, Some(-3)).is_err());
    }
}
