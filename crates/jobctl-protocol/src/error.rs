//! Structured error body returned by the jobs service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code the service uses for entities that do not exist.
pub const RESOURCE_DOES_NOT_EXIST: &str = "RESOURCE_DOES_NOT_EXIST";

/// Error code for rejected request parameters.
pub const INVALID_PARAMETER_VALUE: &str = "INVALID_PARAMETER_VALUE";

/// Error code for an unexpected failure inside the service.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Backend error with the HTTP status it arrived with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// HTTP status code (not part of the JSON body).
    #[serde(skip)]
    pub status_code: u16,
    /// Machine-readable error code.
    #[serde(default)]
    pub error_code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status_code: u16, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            error_code: error_code.into(),
            message: message.into(),
        }
    }

    /// A 404 for a missing entity.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, RESOURCE_DOES_NOT_EXIST, message)
    }

    /// A 400 for a rejected parameter.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(400, INVALID_PARAMETER_VALUE, message)
    }

    /// Whether the error says the addressed entity does not exist.
    pub fn is_missing(&self) -> bool {
        self.status_code == 404 || self.error_code == RESOURCE_DOES_NOT_EXIST
    }

    /// Decode an error body, keeping the raw text when it is not JSON.
    pub fn from_body(status_code: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiError>(body) {
            Ok(mut err) => {
                err.status_code = status_code;
                err
            }
            Err(_) => Self::new(status_code, "", body.trim()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.error_code.is_empty() {
            write!(f, "{} (status {})", self.message, self.status_code)
        } else {
            write!(f, "{}: {} (status {})", self.error_code, self.message, self.status_code)
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_body() {
        let err = ApiError::from_body(
            400,
            r#"{"error_code":"INVALID_PARAMETER_VALUE","message":"Job 123 does not exist."}"#,
        );
        assert_eq!(err.status_code, 400);
        assert_eq!(err.error_code, INVALID_PARAMETER_VALUE);
        assert_eq!(err.message, "Job 123 does not exist.");
        assert!(!err.is_missing());
    }

    #[test]
    fn test_from_plain_body() {
        let err = ApiError::from_body(502, "bad gateway\n");
        assert_eq!(err.message, "bad gateway");
        assert!(err.error_code.is_empty());
    }

    #[test]
    fn test_missing_by_status_or_code() {
        assert!(ApiError::new(404, "", "gone").is_missing());
        assert!(ApiError::new(400, RESOURCE_DOES_NOT_EXIST, "gone").is_missing());
        assert!(!ApiError::invalid_parameter("nope").is_missing());
    }

    #[test]
    fn test_display() {
        let err = ApiError::not_found("Job 7 does not exist.");
        assert_eq!(
            err.to_string(),
            "RESOURCE_DOES_NOT_EXIST: Job 7 does not exist. (status 404)"
        );
    }
}
