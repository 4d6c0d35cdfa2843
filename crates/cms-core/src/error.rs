//! Core error types for cms-rs.
//!
//! [`CmsError`] covers the failures an admin request can surface: missing
//! objects, refused permissions, bad input, form validation, and storage or
//! configuration faults. Each variant maps to an HTTP status code and the enum
//! converts directly into an axum response.

use std::collections::BTreeMap;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// A form validation failure with optional per-field messages.
///
/// # Examples
///
/// ```
/// use cms_core::error::ValidationError;
///
/// let err = ValidationError::new("Invalid submission.")
///     .field("title", "This field is required.");
/// assert_eq!(err.field_errors["title"], vec!["This field is required."]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    /// The form-level message.
    pub message: String,
    /// Per-field messages, keyed by field name.
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    /// Creates a validation error with a form-level message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    /// Adds a message for the given field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.push(name, message);
        self
    }

    /// Adds a message for the given field in place.
    pub fn push(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.field_errors
            .entry(name.into())
            .or_default()
            .push(message.into());
    }

    /// Returns `true` when neither a message nor field errors are present.
    pub fn is_empty(&self) -> bool {
        self.message.is_empty() && self.field_errors.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            return write!(f, "{}", self.message);
        }
        let mut first = true;
        for (field, errors) in &self.field_errors {
            for error in errors {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {error}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for cms-rs.
#[derive(Error, Debug)]
pub enum CmsError {
    // ── HTTP errors ──────────────────────────────────────────────────

    /// HTTP 400 Bad Request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// HTTP 401 Unauthorized.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP 403 Forbidden.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// HTTP 404 Not Found.
    #[error("Not found: {0}")]
    NotFound(String),

    // ── Storage errors ───────────────────────────────────────────────

    /// A lookup expected a row but found none.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// A generic database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// The database could not be opened or a background task failed.
    #[error("Operational error: {0}")]
    OperationalError(String),

    // ── Validation ───────────────────────────────────────────────────

    /// One or more form fields failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    // ── Configuration / rendering ────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A template failed to render.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// A value could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CmsError {
    /// Returns the HTTP status code associated with this error.
    ///
    /// - `BadRequest`, `ValidationError` -> 400
    /// - `Unauthorized` -> 401
    /// - `PermissionDenied` -> 403
    /// - `NotFound`, `DoesNotExist` -> 404
    /// - everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::ValidationError(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::PermissionDenied(_) => 403,
            Self::NotFound(_) | Self::DoesNotExist(_) => 404,
            Self::DatabaseError(_)
            | Self::OperationalError(_)
            | Self::ConfigurationError(_)
            | Self::TemplateError(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => 500,
        }
    }

    /// The message shown to API clients, without the category prefix.
    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::PermissionDenied(msg)
            | Self::NotFound(msg)
            | Self::DoesNotExist(msg) => msg.clone(),
            Self::ValidationError(err) => err.to_string(),
            // Internal details stay in the logs.
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<rusqlite::Error> for CmsError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Self::DoesNotExist("No rows returned".into()),
            other => Self::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CmsError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<ValidationError> for CmsError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationError(err)
    }
}

impl IntoResponse for CmsError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        let mut body = serde_json::json!({ "error": self.public_message() });
        if let Self::ValidationError(err) = &self {
            body["field_errors"] = serde_json::json!(err.field_errors);
        }
        (status, axum::Json(body)).into_response()
    }
}

/// A convenience type alias for `Result<T, CmsError>`.
pub type CmsResult<T> = Result<T, CmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_message() {
        let err = ValidationError::new("Please correct the errors below.");
        assert_eq!(err.to_string(), "Please correct the errors below.");
    }

    #[test]
    fn test_validation_error_display_field_errors() {
        let err = ValidationError::default()
            .field("title", "This field is required.")
            .field("url_title", "Enter a valid slug.");
        assert_eq!(
            err.to_string(),
            "title: This field is required.; url_title: Enter a valid slug."
        );
    }

    #[test]
    fn test_validation_error_is_empty() {
        assert!(ValidationError::default().is_empty());
        assert!(!ValidationError::default().field("a", "b").is_empty());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CmsError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(CmsError::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(CmsError::PermissionDenied("x".into()).status_code(), 403);
        assert_eq!(CmsError::NotFound("x".into()).status_code(), 404);
        assert_eq!(CmsError::DoesNotExist("x".into()).status_code(), 404);
        assert_eq!(CmsError::DatabaseError("x".into()).status_code(), 500);
        assert_eq!(
            CmsError::ValidationError(ValidationError::new("x")).status_code(),
            400
        );
        assert_eq!(CmsError::TemplateError("x".into()).status_code(), 500);
    }

    #[test]
    fn test_rusqlite_no_rows_is_does_not_exist() {
        let err: CmsError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, CmsError::DoesNotExist(_)));
    }

    #[test]
    fn test_into_response_status() {
        let resp = CmsError::PermissionDenied("nope".into()).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let resp = CmsError::DatabaseError("disk".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_public_message_hides_internals() {
        let err = CmsError::DatabaseError("table pages_page is locked".into());
        assert_eq!(err.public_message(), "Internal server error");
        let err = CmsError::NotFound("You must specify a page content type.".into());
        assert_eq!(err.public_message(), "You must specify a page content type.");
    }
}
