use crate::{
    dto::contact::ContactRequest,
    error::AppResult,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn submit(state: &AppState, payload: ContactRequest) -> AppResult<ApiResponse<serde_json::Value>> {
    payload.validate()?;
    state
        .notifier
        .contact_form(
            payload.name.trim(),
            payload.email.trim(),
            payload.message.trim(),
        )
        .await?;

    Ok(ApiResponse::success(
        "Message sent successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
