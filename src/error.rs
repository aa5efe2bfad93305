use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("Plan rejected by provider: {0}")]
    PlanRejected(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Provider auth error: {0}")]
    ProviderAuthError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::ProviderError(format!("request to provider timed out: {err}"))
        } else if err.is_decode() {
            AppError::ProviderError(format!("malformed provider response: {err}"))
        } else {
            AppError::ProviderError(format!("provider request failed: {err}"))
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ProviderError(format!("malformed provider response: {err}"))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized(format!("invalid access token: {err}"))
    }
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::PlanNotFound(_) => "PLAN_NOT_FOUND",
            AppError::PlanRejected(_) => "PLAN_REJECTED",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidSignature => "INVALID_SIGNATURE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ProviderAuthError(_) => "PROVIDER_AUTH_ERROR",
            AppError::ProviderError(_) => "PROVIDER_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ConfigError(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PlanNotFound(_)
            | AppError::ValidationError(_)
            | AppError::InvalidSignature => StatusCode::BAD_REQUEST,
            AppError::PlanRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ProviderAuthError(_) | AppError::ProviderError(_) => StatusCode::BAD_GATEWAY,
            AppError::DatabaseError(_) | AppError::ConfigError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Unauthorized(msg) | AppError::ValidationError(msg) => {
                log::warn!("{self}");
                msg.clone()
            }
            AppError::PlanNotFound(msg) | AppError::PlanRejected(msg) | AppError::NotFound(msg) => {
                log::warn!("{self}");
                msg.clone()
            }
            AppError::InvalidSignature => {
                log::warn!("Rejected webhook with invalid signature");
                "Invalid webhook signature".to_string()
            }
            AppError::ProviderAuthError(msg) | AppError::ProviderError(msg) => {
                log::error!("{self}");
                msg.clone()
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                "Database error".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": message,
            "code": self.code(),
        }))
    }
}
