use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    dto::subscribers::{SubscribeRequest, SubscriberList},
    entity::subscribers::{ActiveModel, Column, Entity as Subscribers, Model as SubscriberModel},
    error::{AppError, AppResult, ValidationError},
    middleware::auth::{AuthUser, ensure_admin},
    models::Subscriber,
    notifications::{BulkSendReport, TransportError},
    response::{ApiResponse, Meta},
    routes::{params::PageQuery, upload::UploadForm},
    state::AppState,
};

/// Stores the address, then sends the welcome email. A failed welcome is
/// reported to the caller but the subscription is kept.
pub async fn subscribe(
    state: &AppState,
    payload: SubscribeRequest,
) -> AppResult<ApiResponse<Subscriber>> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::MissingField("email").into());
    }
    if !email.contains('@') {
        return Err(ValidationError::Invalid("email is not valid".into()).into());
    }

    let existing = Subscribers::find()
        .filter(Column::Email.eq(email.as_str()))
        .count(&state.orm)
        .await?;
    if existing > 0 {
        return Err(AppError::Conflict("Email already subscribed".into()));
    }

    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    tracing::info!(subscriber = %model.id, "new subscriber");

    state.notifier.welcome(&model.email).await?;

    Ok(ApiResponse::success(
        "Subscribed successfully",
        subscriber_from_entity(model),
        Some(Meta::empty()),
    ))
}

pub async fn list(
    state: &AppState,
    user: &AuthUser,
    query: PageQuery,
) -> AppResult<ApiResponse<SubscriberList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let finder = Subscribers::find().order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(subscriber_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Subscribers",
        SubscriberList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn send_bulk(
    state: &AppState,
    user: &AuthUser,
    form: UploadForm,
) -> AppResult<ApiResponse<BulkSendReport>> {
    ensure_admin(user)?;
    let subject = form.require("subject")?.to_string();
    let message = form.require("message")?.to_string();
    let images: Vec<_> = form
        .images
        .into_iter()
        .enumerate()
        .map(|(i, upload)| upload.into_attachment(i))
        .collect();

    let recipients: Vec<String> = Subscribers::find()
        .order_by_asc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|s| s.email)
        .collect();
    if recipients.is_empty() {
        return Err(AppError::BadRequest("No subscribers found".into()));
    }

    let report = state
        .notifier
        .bulk(&recipients, &subject, &message, &images)
        .await;
    ensure_any_delivered(&report)?;

    Ok(ApiResponse::success(
        format!("Email sent to {} subscribers", report.success_count),
        report,
        Some(Meta::empty()),
    ))
}

/// A bulk send where every recipient failed is reported as a delivery error.
fn ensure_any_delivered(report: &BulkSendReport) -> Result<(), TransportError> {
    match report.failures.first() {
        Some(first) if report.success_count == 0 => Err(TransportError::new(
            "bulk",
            format!(
                "all {} sends failed, first error: {}",
                report.failures.len(),
                first.error
            ),
        )),
        _ => Ok(()),
    }
}

fn subscriber_from_entity(model: SubscriberModel) -> Subscriber {
    Subscriber {
        id: model.id,
        email: model.email,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::BulkFailure;

    fn failure(email: &str) -> BulkFailure {
        BulkFailure {
            email: email.into(),
            error: "brevo: rejected".into(),
        }
    }

    #[test]
    fn partial_failure_still_succeeds() {
        let report = BulkSendReport {
            success_count: 2,
            failures: vec![failure("b@example.com")],
        };
        assert!(ensure_any_delivered(&report).is_ok());
    }

    #[test]
    fn total_failure_is_an_error() {
        let report = BulkSendReport {
            success_count: 0,
            failures: vec![failure("a@example.com"), failure("b@example.com")],
        };
        let err = ensure_any_delivered(&report).unwrap_err();
        assert!(err.message.starts_with("all 2 sends failed"));
    }
}
