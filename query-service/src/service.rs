//! 自然语言查询服务

use std::sync::Arc;
use std::time::Instant;

use common::config::AgentConfig;
use common::errors::AppResult;
use common::models::QueryAnswer;
use tracing::info;

use crate::agent::SqlAgent;
use crate::database::DatabaseConnector;
use crate::llm::ChatModel;
use crate::prompts::financial_analyst_prefix;
use crate::toolkit::SqlToolkit;

/// Answers natural-language questions about the fund database.
///
/// Every call opens its own database handle and builds a fresh agent, so
/// concurrent requests share nothing but the model client.
pub struct QueryService {
    connector: Arc<dyn DatabaseConnector>,
    model: Arc<dyn ChatModel>,
    agent_config: AgentConfig,
    prefix: String,
}

impl QueryService {
    pub fn new(
        connector: Arc<dyn DatabaseConnector>,
        model: Arc<dyn ChatModel>,
        agent_config: AgentConfig,
    ) -> Self {
        Self {
            connector,
            model,
            agent_config,
            prefix: financial_analyst_prefix(),
        }
    }

    /// Answers one question; the database handle is closed afterwards
    /// whether or not the agent succeeded.
    pub async fn handle_query(&self, query: &str) -> AppResult<QueryAnswer> {
        let start = Instant::now();
        let db = self.connector.connect().await?;

        let toolkit = SqlToolkit::new(db.clone(), self.model.clone(), self.agent_config.read_only);
        let agent = SqlAgent::new(self.model.clone(), toolkit, &self.prefix, &self.agent_config);

        let outcome = agent.run(query).await;
        db.close().await;

        let answer = QueryAnswer::new(&outcome?);
        info!(
            model = self.model.model_name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "查询处理完成"
        );
        Ok(answer)
    }
}
