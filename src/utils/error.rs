use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use zoho_crm_oauth::AuthError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Grant code repetido (callback duplicado ou recarregado)
    #[error("Authorization code already used")]
    CodeAlreadyUsed,

    #[error("Zoho rejected the request: {0}")]
    ProviderRejected(String),

    #[error("Zoho unreachable: {0}")]
    ProviderUnavailable(String),

    #[error("Storage error: {0}")]
    StoreError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::CodeAlreadyUsed => AppError::CodeAlreadyUsed,
            AuthError::ConfigError(msg) => AppError::ConfigError(msg),
            AuthError::StoreError(msg) => AppError::StoreError(msg),
            AuthError::NotAuthorized => AppError::ProviderRejected(err.to_string()),
            ref e if e.is_provider_rejected() => AppError::ProviderRejected(e.to_string()),
            ref e if e.is_transport() => AppError::ProviderUnavailable(e.to_string()),
            other => AppError::InternalError(other.to_string()),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ConfigError(_) => StatusCode::BAD_REQUEST,
            AppError::CodeAlreadyUsed => StatusCode::CONFLICT,
            AppError::ProviderRejected(_) => StatusCode::BAD_REQUEST,
            AppError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = json!({
            "error": self.to_string(),
            "status": status.as_u16()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_status_mapping() {
        assert_eq!(AppError::from(AuthError::CodeAlreadyUsed).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(AuthError::provider_rejected("invalid_code", None)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(AuthError::transport_error(503, "down")).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(AuthError::store_error("disco cheio")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(AuthError::config_error("client_id não configurado")).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
