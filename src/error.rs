use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    domain::{IllegalTransition, otp::OtpRejection},
    notifications::TransportError,
    response::ApiResponse,
    storage::StorageError,
};

const HIDDEN_ERROR: &str = "Something went wrong";

/// Underlying text of a 500, attached to the response instead of its body.
#[derive(Debug, Clone)]
pub struct InternalDetail {
    pub message: String,
    pub error: String,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Total amount mismatch. Expected: {expected}, Got: {received}")]
    TotalMismatch { expected: f64, received: f64 },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Email delivery failed")]
    Transport(#[from] TransportError),

    #[error("Image storage failed")]
    Storage(#[from] StorageError),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl From<IllegalTransition> for AppError {
    fn from(err: IllegalTransition) -> Self {
        AppError::Conflict(err.to_string())
    }
}

impl From<OtpRejection> for AppError {
    fn from(err: OtpRejection) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Transport(_) | AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "unhandled error");
            let detail = match &self {
                AppError::DbError(err) => err.to_string(),
                AppError::OrmError(err) => err.to_string(),
                AppError::Internal(err) => format!("{err:#}"),
                _ => message.clone(),
            };
            let body = ApiResponse::failure(
                message.clone(),
                Some(ErrorData {
                    error: HIDDEN_ERROR.to_string(),
                }),
            );
            let mut response = (status, Json(body)).into_response();
            response.extensions_mut().insert(InternalDetail {
                message,
                error: detail,
            });
            return response;
        }

        let error = match &self {
            AppError::Transport(err) => err.to_string(),
            AppError::Storage(err) => err.to_string(),
            _ => message.clone(),
        };
        let body = ApiResponse::failure(message, Some(ErrorData { error }));
        (status, Json(body)).into_response()
    }
}

/// Response mapper for development builds: rewrites 500 bodies to carry the
/// underlying error text. Not installed in production.
pub async fn expose_internal_detail(response: Response) -> Response {
    let Some(detail) = response.extensions().get::<InternalDetail>().cloned() else {
        return response;
    };
    let body = ApiResponse::failure(
        detail.message,
        Some(ErrorData {
            error: detail.error,
        }),
    );
    (response.status(), Json(body)).into_response()
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn internal_errors_are_hidden_by_default() {
        let response = AppError::Internal(anyhow::anyhow!("pool exhausted")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["data"]["error"], HIDDEN_ERROR);
        assert!(!body.to_string().contains("pool exhausted"));
    }

    #[tokio::test]
    async fn development_mapper_restores_detail() {
        let response = AppError::Internal(anyhow::anyhow!("pool exhausted")).into_response();
        let response = expose_internal_detail(response).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["data"]["error"], "pool exhausted");
    }

    #[tokio::test]
    async fn client_errors_pass_through_the_mapper() {
        let response = AppError::Conflict("Email already subscribed".into()).into_response();
        let response = expose_internal_detail(response).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["data"]["error"], "Conflict: Email already subscribed");
    }
}
