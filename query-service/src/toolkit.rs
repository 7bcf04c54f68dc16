//! SQL toolkit exposed to the agent.
//!
//! Four tools bound to one database handle:
//!
//! - `sql_db_list_tables` lists the tables
//! - `sql_db_schema` describes tables with sample rows
//! - `sql_db_query` runs a statement
//! - `sql_db_query_checker` asks the model to review a statement
//!
//! Tool failures never abort the agent. [`SqlToolkit::call`] turns them into
//! an `Error: ...` result the model can read and react to.

use std::sync::Arc;

use async_trait::async_trait;
use common::errors::AppError;
use common::utils::SqlValidator;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::database::{Dialect, SqlDatabase};
use crate::llm::{ChatMessage, ChatModel, ChatReply, ToolCall, ToolSchema};
use crate::prompts::query_checker_prompt;

/// Longest cell rendered in query results.
pub const MAX_CELL_CHARS: usize = 100;

pub const LIST_TABLES_TOOL: &str = "sql_db_list_tables";
pub const SCHEMA_TOOL: &str = "sql_db_schema";
pub const QUERY_TOOL: &str = "sql_db_query";
pub const QUERY_CHECKER_TOOL: &str = "sql_db_query_checker";

/// Errors raised while executing a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The statement was refused before reaching the database.
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Failed(#[from] AppError),
}

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments.
    fn parameters(&self) -> Value;

    async fn execute(&self, args: Value) -> Result<String, ToolError>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Reads a string argument. A bare JSON string is accepted in place of
/// the arguments object.
fn string_arg(args: &Value, key: &str) -> Result<String, ToolError> {
    let value = match args {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get(key).and_then(Value::as_str),
        _ => None,
    };
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidArguments(format!("`{}` must be a non-empty string", key)))
}

fn single_string_schema(key: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            (key): { "type": "string", "description": description }
        },
        "required": [key]
    })
}

// === sql_db_list_tables ===

pub struct ListTablesTool {
    db: Arc<dyn SqlDatabase>,
}

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> &str {
        LIST_TABLES_TOOL
    }

    fn description(&self) -> &str {
        "Input is an empty string, output is a comma-separated list of tables in the database."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "tool_input": { "type": "string", "description": "An empty string" }
            }
        })
    }

    async fn execute(&self, _args: Value) -> Result<String, ToolError> {
        let tables = self.db.list_tables().await?;
        Ok(tables.join(", "))
    }
}

// === sql_db_schema ===

pub struct SchemaTool {
    db: Arc<dyn SqlDatabase>,
}

#[async_trait]
impl Tool for SchemaTool {
    fn name(&self) -> &str {
        SCHEMA_TOOL
    }

    fn description(&self) -> &str {
        "Input to this tool is a comma-separated list of tables, output is the schema and sample rows for those tables. \
         Be sure that the tables actually exist by calling sql_db_list_tables first! \
         Example Input: table1, table2, table3"
    }

    fn parameters(&self) -> Value {
        single_string_schema(
            "table_names",
            "A comma-separated list of the table names for which to return the schema.",
        )
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let requested = string_arg(&args, "table_names")?;
        let existing = self.db.list_tables().await?;

        let mut resolved = Vec::new();
        let mut missing = Vec::new();
        for name in requested.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match existing.iter().find(|t| t.eq_ignore_ascii_case(name)) {
                Some(table) if !resolved.contains(table) => resolved.push(table.clone()),
                Some(_) => {}
                None => missing.push(name.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(ToolError::Rejected(format!(
                "table_names {{{}}} not found in database",
                missing.join(", ")
            )));
        }
        if resolved.is_empty() {
            return Err(ToolError::InvalidArguments("no table names given".into()));
        }

        Ok(self.db.table_info(&resolved).await?)
    }
}

// === sql_db_query ===

pub struct QueryTool {
    db: Arc<dyn SqlDatabase>,
    read_only: bool,
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        QUERY_TOOL
    }

    fn description(&self) -> &str {
        "Input to this tool is a detailed and correct SQL query, output is a result from the database. \
         If the query is not correct, an error message will be returned. \
         If an error is returned, rewrite the query, check the query, and try again. \
         If you encounter an issue with Unknown column 'xxxx' in 'field list', \
         use sql_db_schema to query the correct table fields."
    }

    fn parameters(&self) -> Value {
        single_string_schema("query", "A detailed and correct SQL query.")
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let sql = string_arg(&args, "query")?;

        if self.read_only {
            SqlValidator::validate_read_only(&sql).map_err(|e| ToolError::Rejected(e.to_string()))?;
        }

        let output = self.db.run(&sql).await?;
        debug!(rows = output.rows.len(), "查询执行完成");
        Ok(output.to_markdown(MAX_CELL_CHARS))
    }
}

// === sql_db_query_checker ===

pub struct QueryCheckerTool {
    model: Arc<dyn ChatModel>,
    dialect: Dialect,
}

#[async_trait]
impl Tool for QueryCheckerTool {
    fn name(&self) -> &str {
        QUERY_CHECKER_TOOL
    }

    fn description(&self) -> &str {
        "Use this tool to double check if your query is correct before executing it. \
         Always use this tool before executing a query with sql_db_query!"
    }

    fn parameters(&self) -> Value {
        single_string_schema("query", "The SQL query to be checked.")
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let sql = string_arg(&args, "query")?;
        let messages = [
            ChatMessage::System(query_checker_prompt(self.dialect.as_str())),
            ChatMessage::User(sql),
        ];

        match self.model.complete(&messages, &[]).await? {
            ChatReply::Content(text) => Ok(strip_code_fence(&text)),
            ChatReply::ToolCalls { .. } => Err(ToolError::Failed(AppError::Llm(
                "query checker replied with tool calls".into(),
            ))),
        }
    }
}

/// Removes a surrounding ```sql fence if the model added one anyway.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = inner
        .strip_prefix("sql")
        .or_else(|| inner.strip_prefix("SQL"))
        .unwrap_or(inner);
    inner.trim().to_string()
}

/// The set of SQL tools bound to one database.
pub struct SqlToolkit {
    dialect: Dialect,
    tools: Vec<Arc<dyn Tool>>,
}

impl SqlToolkit {
    pub fn new(db: Arc<dyn SqlDatabase>, model: Arc<dyn ChatModel>, read_only: bool) -> Self {
        let dialect = db.dialect();
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(ListTablesTool { db: db.clone() }),
            Arc::new(SchemaTool { db: db.clone() }),
            Arc::new(QueryTool { db, read_only }),
            Arc::new(QueryCheckerTool { model, dialect }),
        ];
        Self { dialect, tools }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Schemas of every tool, in registration order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Runs a tool call and returns the text handed back to the model.
    pub async fn call(&self, call: &ToolCall) -> String {
        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, "模型请求了未知工具");
            return format!(
                "Error: {} is not a valid tool, try one of [{}].",
                call.name,
                self.tools
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        };

        match tool.execute(call.arguments.clone()).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "工具执行失败");
                format!("Error: {}", e)
            }
        }
    }
}
