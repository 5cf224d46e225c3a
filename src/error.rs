use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::bank::BankFileError;
use crate::domain::DomainError;
use crate::utils::rif::RifError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Business rule rejected the request (422)
    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failure that is logged but never shown to the client
    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found"))
    }

    /// Maps a MySQL duplicate-key failure to `Conflict`, anything else stays a DB error.
    pub fn from_insert(e: sqlx::Error, conflict_message: &str) -> Self {
        if is_duplicate_key(&e) {
            AppError::Conflict(conflict_message.to_string())
        } else {
            AppError::Database(e)
        }
    }
}

/// MySQL 1062 (SQLSTATE 23000): duplicate entry for a unique key.
pub fn is_duplicate_key(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// MySQL 1451/1452 (SQLSTATE 23000): the row is still referenced, or points nowhere.
pub fn is_foreign_key(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.is_foreign_key_violation(),
        _ => false,
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<BankFileError> for AppError {
    fn from(e: BankFileError) -> Self {
        match e {
            BankFileError::UnknownBank(_) => AppError::BadRequest(e.to_string()),
            _ => AppError::Validation(e.to_string()),
        }
    }
}

impl From<RifError> for AppError {
    fn from(e: RifError) -> Self {
        AppError::Validation(format!("Invalid RIF: {e}"))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "Internal Server Error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({ "message": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn renders_message_with_status() {
        let err = AppError::not_found("Employee");
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["message"], "Employee not found");
    }

    #[actix_web::test]
    async fn database_errors_are_not_leaked() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["message"], "Internal Server Error");
    }

    #[test]
    fn domain_errors_become_unprocessable() {
        let err: AppError = DomainError::NegativeNet("EMP-1".into()).into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn rif_and_bank_errors_map_to_client_statuses() {
        let err: AppError = RifError::CheckDigit.into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: AppError = BankFileError::UnknownBank("9999".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
