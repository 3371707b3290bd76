//! error.rs
//!
//! Ошибки HTTP-слоя и их отображение в ответы axum.

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::EventDto;
use crate::store::StoreError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// `Json<T>`, но отказ разбора отдаётся как `ApiError` с JSON-телом.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Error)]
pub enum ApiError {
    /// Записи нет. Отдаём 404 без тела.
    #[error("not found")]
    NotFound,

    /// Конфликт версий: в теле текущее состояние строки.
    #[error("conflict")]
    Conflict(Box<EventDto>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn client_code(&self) -> &'static str {
        match self {
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { current } => ApiError::Conflict(Box::new(EventDto::from(&*current))),
            StoreError::UnknownCategory(id) => {
                ApiError::Validation(format!("event category {id} does not exist"))
            }
            StoreError::Integrity(msg) => {
                tracing::error!("store integrity violation: {}", msg);
                ApiError::Internal("Integrity violation".to_string())
            }
            StoreError::Database(e) => {
                // Текст ошибки базы клиенту не отдаём
                tracing::error!("database error: {:?}", e);
                ApiError::Internal("Database error".to_string())
            }
        }
    }
}

// Битый JSON, чужой Content-Type, нет обязательного поля - всё 400
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotFound => return StatusCode::NOT_FOUND.into_response(),
            ApiError::Conflict(current) => return (StatusCode::CONFLICT, Json(*current)).into_response(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "error": self.client_code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
