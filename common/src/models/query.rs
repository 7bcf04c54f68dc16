//! Natural-language query models.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::errors::AppError;

/// Message returned when the `query` parameter is missing or blank.
pub const QUERY_REQUIRED: &str = "Query parameter is required";

/// Query-string parameters of `GET /api/query`.
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QueryParams {
    /// Natural-language question about the fund data.
    #[serde(default)]
    #[validate(length(min = 1, message = "Query parameter is required"))]
    pub query: String,
}

impl QueryParams {
    /// Validates the parameters and returns the question.
    ///
    /// Blank questions are rejected like missing ones.
    pub fn into_query(self) -> Result<String, AppError> {
        self.validate().map_err(|errors| {
            let message = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| QUERY_REQUIRED.to_string());
            AppError::Validation(message)
        })?;

        if self.query.trim().is_empty() {
            return Err(AppError::Validation(QUERY_REQUIRED.to_string()));
        }
        Ok(self.query)
    }
}

/// Textual answer produced for a query.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryAnswer {
    /// Answer text with surrounding whitespace removed.
    pub text: String,
}

impl QueryAnswer {
    pub fn new(raw: &str) -> Self {
        Self {
            text: raw.trim().to_string(),
        }
    }
}
