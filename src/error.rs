//! Unified application error model and mapping helpers.
//! This module provides the error enum shared by the loader, cache, normalizer,
//! chart builder and both hosts (HTTP and CLI), along with the HTTP mapping.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Store file missing or unreadable, or the named table is absent.
    #[error("{code}: {message}")]
    DataSource { code: String, message: String },
    /// Required column missing, or a value that cannot be coerced to its role.
    #[error("{code}: {message}")]
    Schema { code: String, message: String },
    #[error("{code}: {message}")]
    UserInput { code: String, message: String },
    #[error("{code}: {message}")]
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::DataSource { code, .. }
            | AppError::Schema { code, .. }
            | AppError::UserInput { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::DataSource { message, .. }
            | AppError::Schema { message, .. }
            | AppError::UserInput { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn data_source<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::DataSource { code: code.into(), message: msg.into() } }
    pub fn schema<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Schema { code: code.into(), message: msg.into() } }
    pub fn user<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    pub fn is_data_source(&self) -> bool { matches!(self, AppError::DataSource { .. }) }
    pub fn is_schema(&self) -> bool { matches!(self, AppError::Schema { .. }) }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::DataSource { .. } => 503,
            AppError::Schema { .. } => 422,
            AppError::UserInput { .. } => 400,
            AppError::Internal { .. } => 500,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<duckdb::Error> for AppError {
    fn from(err: duckdb::Error) -> Self {
        // Anything surfacing from the store after it was opened is a failed query
        AppError::DataSource { code: "query_failed".into(), message: err.to_string() }
    }
}

impl From<polars::error::PolarsError> for AppError {
    fn from(err: polars::error::PolarsError) -> Self {
        match err {
            polars::error::PolarsError::ColumnNotFound(msg) => AppError::Schema { code: "missing_column".into(), message: msg.to_string() },
            polars::error::PolarsError::SchemaMismatch(msg) => AppError::Schema { code: "schema_mismatch".into(), message: msg.to_string() },
            other => AppError::Internal { code: "frame_error".into(), message: other.to_string() },
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless downcasted elsewhere
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(other) => AppError::Internal { code: "internal_error".into(), message: other.to_string() },
        }
    }
}
