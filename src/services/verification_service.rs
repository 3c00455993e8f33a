use anyhow::{Context, anyhow};
use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::verification::{ResolveVerificationRequest, VerificationList},
    entity::{
        StudentVerifications, Users,
        student_verifications::{ActiveModel, Column, Model as VerificationModel},
        users::ActiveModel as UserActive,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{StudentVerification, VerificationStatus},
    notifications::templates::VerificationNotice,
    response::{ApiResponse, Meta},
    routes::{params::PageQuery, upload::UploadForm},
    state::AppState,
    storage,
};

const DOCUMENT_FOLDER: &str = "student-verifications";

pub async fn submit(
    state: &AppState,
    user: &AuthUser,
    form: UploadForm,
) -> AppResult<ApiResponse<StudentVerification>> {
    let full_name = form.require("fullName")?.to_string();
    let institution = form.require("institution")?.to_string();
    let student_id_number = form.require("studentIdNumber")?.to_string();
    let (_, document) = form.single_image()?;

    let account = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if account.is_student_verified {
        return Err(AppError::BadRequest("Student status is already verified".into()));
    }
    let pending = StudentVerifications::find()
        .filter(Column::UserId.eq(user.user_id))
        .filter(Column::Status.eq(VerificationStatus::Pending.as_str()))
        .count(&state.orm)
        .await?;
    if pending > 0 {
        return Err(AppError::Conflict(
            "A verification request is already awaiting review".into(),
        ));
    }

    let path = storage::spool(&state.config.images.temp_dir, &document.file_name, &document.bytes)
        .await
        .context("failed to spool verification document")?;
    let image = state.images.upload_file(&path, DOCUMENT_FOLDER).await?;

    let now = Utc::now();
    let inserted = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        full_name: Set(full_name),
        institution: Set(institution),
        student_id_number: Set(student_id_number),
        document_url: Set(image.url.clone()),
        document_storage_id: Set(image.storage_id.clone()),
        status: Set(VerificationStatus::Pending.as_str().to_string()),
        review_note: Set(None),
        reviewed_at: Set(None),
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

    state
        .notifier
        .verification_submitted(&notice(&model, &account.email))
        .await;

    Ok(ApiResponse::success(
        "Verification request submitted",
        verification_from_entity(model)?,
        Some(Meta::empty()),
    ))
}

pub async fn list(
    state: &AppState,
    user: &AuthUser,
    query: PageQuery,
) -> AppResult<ApiResponse<VerificationList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status = VerificationStatus::parse(status)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown status {status}")))?;
        condition = condition.add(Column::Status.eq(status.as_str()));
    }

    let finder = StudentVerifications::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(verification_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Verification requests",
        VerificationList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn mine(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<VerificationList>> {
    let items = StudentVerifications::find()
        .filter(Column::UserId.eq(user.user_id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(verification_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "OK",
        VerificationList { items },
        Some(Meta::empty()),
    ))
}

/// Approves or rejects a pending request and mirrors the outcome on the
/// user's `is_student_verified` flag.
pub async fn resolve(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ResolveVerificationRequest,
) -> AppResult<ApiResponse<StudentVerification>> {
    ensure_admin(user)?;
    let note = payload
        .note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    let status = if payload.approved {
        VerificationStatus::Approved
    } else {
        VerificationStatus::Rejected
    };

    let txn = state.orm.begin().await?;
    let request = StudentVerifications::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    if request.status != VerificationStatus::Pending.as_str() {
        return Err(AppError::Conflict(format!(
            "Request was already {}",
            request.status
        )));
    }
    let student = Users::find_by_id(request.user_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();
    let mut active: ActiveModel = request.into();
    active.status = Set(status.as_str().to_string());
    active.review_note = Set(note.clone());
    active.reviewed_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let model = active.update(&txn).await?;

    let student_email = student.email.clone();
    let mut student: UserActive = student.into();
    student.is_student_verified = Set(payload.approved);
    student.updated_at = Set(now.into());
    student.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(request = %model.id, status = status.as_str(), "student verification resolved");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "student_verification_resolve",
        "student_verifications",
        model.id,
        serde_json::json!({ "status": status, "note": note }),
    )
    .await;

    state
        .notifier
        .verification_resolved(&notice(&model, &student_email), payload.approved, note.as_deref())
        .await;

    Ok(ApiResponse::success(
        "Verification updated",
        verification_from_entity(model)?,
        Some(Meta::empty()),
    ))
}

fn notice<'a>(model: &'a VerificationModel, email: &'a str) -> VerificationNotice<'a> {
    VerificationNotice {
        student_name: &model.full_name,
        student_email: email,
        institution: &model.institution,
        student_id_number: &model.student_id_number,
        document_url: &model.document_url,
    }
}

fn verification_from_entity(model: VerificationModel) -> AppResult<StudentVerification> {
    let status = VerificationStatus::parse(&model.status)
        .ok_or_else(|| anyhow!("unknown verification status {}", model.status))?;
    Ok(StudentVerification {
        id: model.id,
        user_id: model.user_id,
        full_name: model.full_name,
        institution: model.institution,
        student_id_number: model.student_id_number,
        document_url: model.document_url,
        status,
        review_note: model.review_note,
        reviewed_at: model.reviewed_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    })
}
