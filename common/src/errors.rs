//! Application error type and HTTP mapping.
//!
//! Client errors become 400 responses carrying only the message. Every
//! other kind becomes a 500 whose body is sanitized unless detail exposure
//! is switched on; the full error is always logged server side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Result alias used across services.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid or missing request input.
    #[error("{0}")]
    Validation(String),

    /// The target database could not be reached.
    #[error("database connection failed: {0}")]
    DatabaseConnection(String),

    /// A statement against the target database failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(String),

    /// The chat model provider failed or returned an unusable reply.
    #[error("language model request failed: {0}")]
    Llm(String),

    /// The agent could not produce a final answer.
    #[error("agent execution failed: {0}")]
    Agent(String),

    /// The service is misconfigured.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::DatabaseConnection(_) => "CONNECTION_ERROR",
            AppError::DatabaseQuery(_) => "DATABASE_ERROR",
            AppError::Llm(_) => "LLM_ERROR",
            AppError::Agent(_) => "AGENT_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to any client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::DatabaseConnection(_) => "Unable to connect to the database".to_string(),
            AppError::DatabaseQuery(_) => "Database query failed".to_string(),
            AppError::Llm(_) => "Language model request failed".to_string(),
            AppError::Agent(_) => "Unable to answer the query".to_string(),
            AppError::Config(_) => "Service is not configured correctly".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// An error on its way to the client, with the context needed to render it.
#[derive(Debug)]
pub struct ErrorReport {
    error: AppError,
    request_id: Option<String>,
    expose_details: bool,
    secrets: Vec<String>,
}

impl ErrorReport {
    pub fn new(error: AppError) -> Self {
        Self {
            error,
            request_id: None,
            expose_details: false,
            secrets: Vec::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Return the raw error text instead of the sanitized message.
    pub fn expose_details(mut self, expose: bool) -> Self {
        self.expose_details = expose;
        self
    }

    /// Values scrubbed from the body before it is sent.
    pub fn redact(mut self, secrets: Vec<String>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn error(&self) -> &AppError {
        &self.error
    }

    /// Builds the JSON body for this report.
    pub fn body(&self) -> ApiResponse<()> {
        if self.error.is_client_error() {
            return ApiResponse::err(redact(&self.error.public_message(), &self.secrets));
        }

        let (message, details) = if self.expose_details {
            (self.error.to_string(), format!("{:?}", self.error))
        } else {
            let details = match &self.request_id {
                Some(id) => format!("{} (request {})", self.error.code(), id),
                None => self.error.code().to_string(),
            };
            (self.error.public_message(), details)
        };

        ApiResponse::err_with_details(
            redact(&message, &self.secrets),
            redact(&details, &self.secrets),
        )
    }
}

impl From<AppError> for ErrorReport {
    fn from(error: AppError) -> Self {
        Self::new(error)
    }
}

impl IntoResponse for ErrorReport {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let request_id = self.request_id.as_deref().unwrap_or("-");
        let logged = redact(&self.error.to_string(), &self.secrets);

        if status.is_server_error() {
            tracing::error!(
                request_id,
                code = self.error.code(),
                error = %logged,
                "请求处理失败"
            );
        } else {
            tracing::warn!(request_id, code = self.error.code(), error = %logged, "请求被拒绝");
        }

        (status, Json(self.body())).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ErrorReport::new(self).into_response()
    }
}

/// Replaces every occurrence of each non-empty secret with `***`.
pub fn redact(text: &str, secrets: &[String]) -> String {
    secrets
        .iter()
        .filter(|s| !s.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), "***"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::DatabaseConnection("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Agent("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_client_error_body_has_no_details() {
        let report = ErrorReport::new(AppError::Validation("Query parameter is required".into()))
            .with_request_id("req-1");
        let body = serde_json::to_value(report.body()).unwrap();
        assert_eq!(
            body,
            json!({"success": false, "error": "Query parameter is required"})
        );
    }

    #[test]
    fn test_server_error_is_sanitized_by_default() {
        let report = ErrorReport::new(AppError::DatabaseConnection(
            "Access denied for user 'root'@'localhost' (using password: YES)".into(),
        ))
        .with_request_id("req-7");
        let body = serde_json::to_value(report.body()).unwrap();
        assert_eq!(body["error"], json!("Unable to connect to the database"));
        assert_eq!(body["details"], json!("CONNECTION_ERROR (request req-7)"));
    }

    #[test]
    fn test_exposed_details_are_redacted() {
        let report = ErrorReport::new(AppError::Llm("bad key sk-live-123".into()))
            .expose_details(true)
            .redact(vec!["sk-live-123".into(), String::new()]);
        let body = serde_json::to_value(report.body()).unwrap();
        let error = body["error"].as_str().unwrap();
        let details = body["details"].as_str().unwrap();
        assert!(error.contains("language model request failed"));
        assert!(!error.contains("sk-live-123"));
        assert!(!details.contains("sk-live-123"));
        assert!(details.contains("Llm"));
    }

    #[test]
    fn test_redact_ignores_empty_secrets() {
        assert_eq!(redact("abc", &[String::new()]), "abc");
        assert_eq!(redact("root:root@db", &["root".into()]), "***:***@db");
    }

    #[tokio::test]
    async fn test_into_response_status() {
        let response = AppError::Agent("loop".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
