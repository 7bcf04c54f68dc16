//! Shared data models.

pub mod query;

pub use query::{QueryAnswer, QueryParams, QUERY_REQUIRED};
