use crate::db::errors::DbError;
use crate::policy::validator::{TypeValidationError, ValidationError};
use crate::types::{Operation, Permission};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// User lacks required permissions for the operation
    #[error("Insufficient permissions to {action} {resource}")]
    InsufficientPermissions {
        required: Permission,
        action: Operation,
        resource: String,
    },

    /// Worker model definition is structurally invalid
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Worker model type-specific data is missing or inconsistent with its type
    #[error(transparent)]
    TypeValidation(#[from] TypeValidationError),

    /// Non-restricted models of non-admin callers must reference a provisioning pattern
    #[error("worker model pattern is required for non-restricted models")]
    MissingPatternReference,

    /// Unknown value for the `state` list filter
    #[error("invalid state filter '{value}'")]
    InvalidStateFilter { value: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Stable machine-readable error code
    pub code: String,
    pub message: String,
    /// Offending request field, when the error concerns one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::Validation(_)
            | Error::TypeValidation(_)
            | Error::MissingPatternReference
            | Error::InvalidStateFilter { .. }
            | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code clients can match on
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthenticated { .. } => "unauthenticated",
            Error::InsufficientPermissions { .. } => "forbidden",
            Error::Validation(_) => "invalid_worker_model",
            Error::TypeValidation(_) => "invalid_worker_model_type_data",
            Error::MissingPatternReference => "missing_pattern",
            Error::InvalidStateFilter { .. } => "invalid_state_filter",
            Error::BadRequest { .. } => "bad_request",
            Error::NotFound { .. } | Error::Database(DbError::NotFound) => "not_found",
            Error::Database(DbError::UniqueViolation { .. }) => "already_exists",
            Error::Database(DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. }) => "invalid_reference",
            Error::Internal { .. } | Error::Database(DbError::Other(_)) | Error::Other(_) => "internal",
        }
    }

    pub fn field(&self) -> Option<&'static str> {
        match self {
            Error::Validation(err) => Some(err.field()),
            Error::TypeValidation(err) => Some(err.field()),
            Error::MissingPatternReference => Some("pattern_name"),
            Error::InvalidStateFilter { .. } => Some("state"),
            _ => None,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::InsufficientPermissions { action, resource, .. } => {
                format!("Insufficient permissions to {action} {resource}")
            }
            Error::Validation(err) => err.to_string(),
            Error::TypeValidation(err) => err.to_string(),
            Error::MissingPatternReference | Error::InvalidStateFilter { .. } => self.to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} {id} not found")
            }
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation {
                    table, conflicting_value, ..
                } => match (table.as_deref(), conflicting_value) {
                    (Some("worker_models"), Some(name)) => {
                        format!("A worker model named '{name}' already exists in this group")
                    }
                    (Some("worker_models"), None) => "A worker model with this name already exists in this group".to_string(),
                    (Some("groups"), _) => "A group with this name already exists".to_string(),
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::Validation(_)
            | Error::TypeValidation(_)
            | Error::MissingPatternReference
            | Error::InvalidStateFilter { .. }
            | Error::BadRequest { .. }
            | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.user_message(),
            field: self.field().map(str::to_string),
        };

        (self.status_code(), Json(body)).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::worker_models::WorkerModelType;
    use crate::types::Resource;

    #[test]
    fn test_policy_errors_are_client_errors() {
        let err = Error::from(ValidationError::MissingName);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.field(), Some("name"));

        let err = Error::from(TypeValidationError::MissingField {
            model_type: WorkerModelType::Docker,
            field: "docker.image",
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "invalid_worker_model_type_data");
        assert_eq!(err.field(), Some("docker.image"));

        assert_eq!(Error::MissingPatternReference.field(), Some("pattern_name"));
        assert_eq!(Error::MissingPatternReference.code(), "missing_pattern");
    }

    #[test]
    fn test_forbidden_and_not_found_are_distinct() {
        let forbidden = Error::InsufficientPermissions {
            required: Permission::Allow(Resource::Groups, Operation::ReadAll),
            action: Operation::ReadOwn,
            resource: "group 'g1'".to_string(),
        };
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(forbidden.user_message(), "Insufficient permissions to read group 'g1'");

        let missing = Error::NotFound {
            resource: "Group".to_string(),
            id: "g1".to_string(),
        };
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing.code(), "not_found");
    }

    #[test]
    fn test_duplicate_worker_model_message() {
        let err = Error::Database(DbError::UniqueViolation {
            constraint: Some("worker_models_group_id_name_key".to_string()),
            table: Some("worker_models".to_string()),
            message: "duplicate key value".to_string(),
            conflicting_value: Some("docker-debian".to_string()),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.user_message(), "A worker model named 'docker-debian' already exists in this group");
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = Error::Other(anyhow::anyhow!("connection refused at 10.0.0.3:5432"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "Internal server error");
    }
}
