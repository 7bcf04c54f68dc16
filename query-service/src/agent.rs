//! SQL agent: a tool-calling loop over the SQL toolkit.

use std::sync::Arc;

use common::config::AgentConfig;
use common::errors::{AppError, AppResult};
use tracing::{debug, info, warn};

use crate::llm::{ChatMessage, ChatModel, ChatReply};
use crate::prompts::system_prompt;
use crate::toolkit::SqlToolkit;

/// Answers one question by letting the model drive the toolkit.
pub struct SqlAgent {
    model: Arc<dyn ChatModel>,
    toolkit: SqlToolkit,
    system_prompt: String,
    max_iterations: usize,
}

impl SqlAgent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        toolkit: SqlToolkit,
        prefix: &str,
        config: &AgentConfig,
    ) -> Self {
        let system_prompt = system_prompt(prefix, toolkit.dialect().as_str(), config.top_k);
        Self {
            model,
            toolkit,
            system_prompt,
            max_iterations: config.max_iterations,
        }
    }

    /// Runs the loop until the model gives a final answer.
    pub async fn run(&self, question: &str) -> AppResult<String> {
        let schemas = self.toolkit.schemas();
        let mut messages = vec![
            ChatMessage::System(self.system_prompt.clone()),
            ChatMessage::User(question.to_string()),
        ];

        for iteration in 1..=self.max_iterations {
            let reply = self.model.complete(&messages, &schemas).await?;

            match reply {
                ChatReply::Content(answer) => {
                    if answer.trim().is_empty() {
                        return Err(AppError::Agent("model returned an empty answer".into()));
                    }
                    info!(iterations = iteration, chars = answer.len(), "智能体生成最终答案");
                    return Ok(answer);
                }
                ChatReply::ToolCalls { content, calls } => {
                    debug!(
                        iteration,
                        tools = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                        "模型请求调用工具"
                    );

                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        let output = self.toolkit.call(call).await;
                        info!(iteration, tool = %call.name, chars = output.len(), "工具调用完成");
                        results.push(ChatMessage::Tool {
                            tool_call_id: call.id.clone(),
                            content: output,
                        });
                    }

                    messages.push(ChatMessage::Assistant {
                        content,
                        tool_calls: calls,
                    });
                    messages.extend(results);
                }
            }
        }

        warn!(max_iterations = self.max_iterations, "智能体超过最大迭代次数");
        Err(AppError::Agent(format!(
            "no final answer after {} iterations",
            self.max_iterations
        )))
    }
}
