//! API response wrapper types.
//!
//! Provides a unified response format for all API endpoints:
//! `{"success": true, "result": ...}` on success and
//! `{"success": false, "error": "...", "details": "..."}` on failure.

use serde::Serialize;
use utoipa::ToSchema;

/// Standard API response wrapper.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,

    /// Response payload (present on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,

    /// Error message (present on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Diagnostic detail (present on server-side failures).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response with a result.
    pub fn ok(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            details: None,
        }
    }
}

impl ApiResponse<()> {
    /// Creates an error response.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message.into()),
            details: None,
        }
    }

    /// Creates an error response with diagnostic details.
    pub fn err_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message.into()),
            details: Some(details.into()),
        }
    }
}
