//! Application state for query service.

use std::sync::Arc;

use common::config::AppConfig;
use common::errors::AppResult;

use crate::database::SqlxConnector;
use crate::llm::OpenAiChatModel;
use crate::service::QueryService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub query_service: Arc<QueryService>,
}

impl AppState {
    /// Creates the state with the sqlx connector and the hosted model.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let connector = Arc::new(SqlxConnector::new(config.database.clone()));
        let model = Arc::new(OpenAiChatModel::new(&config.llm)?);
        let service = QueryService::new(connector, model, config.agent.clone());
        Ok(Self::with_service(config, service))
    }

    pub fn with_service(config: AppConfig, service: QueryService) -> Self {
        Self {
            config: Arc::new(config),
            query_service: Arc::new(service),
        }
    }
}
