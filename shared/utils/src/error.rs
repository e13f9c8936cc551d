use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum HealthMateError {
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Busy: {message}")]
    Busy { message: String },

    #[error("Upstream service failure: {service} - {message}")]
    UpstreamFailure { service: String, message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl HealthMateError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy {
            message: message.into(),
        }
    }

    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamFailure {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classification reported to API clients. Persistence failures are
    /// deliberately indistinguishable from other internal errors.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Busy { .. } => "BUSY",
            Self::UpstreamFailure { .. } => "UPSTREAM_FAILURE",
            Self::Persistence { .. } => "INTERNAL_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Busy { .. } => 409,
            Self::UpstreamFailure { .. } => 502,
            Self::Persistence { .. } => 500,
            Self::Validation { .. } => 400,
            Self::Authentication { .. } => 401,
            Self::Internal { .. } => 500,
        }
    }
}

pub type HealthMateResult<T> = Result<T, HealthMateError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl From<HealthMateError> for ErrorResponse {
    fn from(error: HealthMateError) -> Self {
        // Internal details stay in the logs
        let message = match &error {
            HealthMateError::Persistence { .. } | HealthMateError::Internal { .. } => "An unexpected internal error occurred".to_string(),
            other => other.to_string(),
        };
        Self {
            success: false,
            error: error.error_code().to_string(),
            code: error.error_code().to_string(),
            message,
            details: None,
        }
    }
}

impl From<validator::ValidationErrors> for HealthMateError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_else(|| "request".to_string());
        Self::validation(field, errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_is_reported_as_internal() {
        let error = HealthMateError::persistence("connection reset by peer");
        assert_eq!(error.error_code(), "INTERNAL_ERROR");
        assert_eq!(error.http_status_code(), 500);

        let body = ErrorResponse::from(error);
        assert!(!body.message.contains("connection reset"));
        assert!(!body.success);
    }

    #[test]
    fn test_classification_codes() {
        assert_eq!(HealthMateError::not_found("report").http_status_code(), 404);
        assert_eq!(HealthMateError::upstream("gemini", "503").error_code(), "UPSTREAM_FAILURE");
        assert_eq!(HealthMateError::upstream("gemini", "503").http_status_code(), 502);
    }
}
