//! Test doubles for the model and database seams.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use serde_json::Value;

use crate::database::{DatabaseConnector, Dialect, QueryOutput, SqlDatabase};
use crate::llm::{ChatMessage, ChatModel, ChatReply, ToolCall, ToolSchema};

/// Replays a fixed sequence of replies and records every request.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<AppResult<ChatReply>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<AppResult<ChatReply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage], _tools: &[ToolSchema]) -> AppResult<ChatReply> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Llm("script exhausted".into())))
    }
}

/// Always answers with the same text.
pub struct EchoModel {
    answer: String,
}

impl EchoModel {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
        }
    }
}

#[async_trait]
impl ChatModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, _messages: &[ChatMessage], _tools: &[ToolSchema]) -> AppResult<ChatReply> {
        Ok(ChatReply::Content(self.answer.clone()))
    }
}

/// Answers every question with its own text, after one tool round trip.
pub struct MirrorModel;

#[async_trait]
impl ChatModel for MirrorModel {
    fn model_name(&self) -> &str {
        "mirror"
    }

    async fn complete(&self, messages: &[ChatMessage], _tools: &[ToolSchema]) -> AppResult<ChatReply> {
        let question = messages
            .iter()
            .find_map(|m| match m {
                ChatMessage::User(text) => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default();

        if messages.iter().any(|m| matches!(m, ChatMessage::Tool { .. })) {
            return Ok(ChatReply::Content(format!("answer to {}", question)));
        }
        Ok(ChatReply::ToolCalls {
            content: None,
            calls: vec![tool_call("call_0", "sql_db_list_tables", Value::Null)],
        })
    }
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments,
    }
}

/// In-memory stand-in for the fund database.
pub struct FakeDatabase {
    tables: Vec<(String, String, QueryOutput)>,
    executed: Mutex<Vec<String>>,
    closed: Arc<AtomicUsize>,
}

impl FakeDatabase {
    pub fn funds() -> Self {
        let funds = QueryOutput {
            columns: vec!["scheme_name".into(), "return_1y".into()],
            rows: vec![
                vec!["Fund X Growth".into(), "12.34".into()],
                vec!["Fund Y Direct".into(), "8.50".into()],
            ],
        };
        let history = QueryOutput {
            columns: vec!["fund_id".into(), "nav".into()],
            rows: vec![vec!["1".into(), "101.25".into()]],
        };
        Self {
            tables: vec![
                (
                    "funds".into(),
                    "CREATE TABLE funds (scheme_name TEXT, return_1y REAL)".into(),
                    funds,
                ),
                (
                    "nav_history".into(),
                    "CREATE TABLE nav_history (fund_id INTEGER, nav REAL)".into(),
                    history,
                ),
            ],
            executed: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_close_counter(mut self, closed: Arc<AtomicUsize>) -> Self {
        self.closed = closed;
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlDatabase for FakeDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn sample_rows(&self) -> u32 {
        3
    }

    async fn list_tables(&self) -> AppResult<Vec<String>> {
        Ok(self.tables.iter().map(|(name, _, _)| name.clone()).collect())
    }

    async fn create_statement(&self, table: &str) -> AppResult<String> {
        self.tables
            .iter()
            .find(|(name, _, _)| name == table)
            .map(|(_, ddl, _)| ddl.clone())
            .ok_or_else(|| AppError::DatabaseQuery(format!("Table '{}' doesn't exist", table)))
    }

    async fn run(&self, sql: &str) -> AppResult<QueryOutput> {
        if sql.contains("broken") {
            return Err(AppError::DatabaseQuery("Unknown column 'broken' in 'field list'".into()));
        }
        self.executed.lock().unwrap().push(sql.to_string());

        let output = self
            .tables
            .iter()
            .find(|(name, _, _)| sql.contains(&format!("`{}`", name)) || sql.contains(name.as_str()))
            .map(|(_, _, output)| output.clone())
            .unwrap_or_default();
        Ok(output)
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out [`FakeDatabase`]s, or fails when built with an error.
pub struct FakeConnector {
    failure: Option<String>,
    pub connects: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self {
            failure: None,
            connects: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }
}

#[async_trait]
impl DatabaseConnector for FakeConnector {
    async fn connect(&self) -> AppResult<Arc<dyn SqlDatabase>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(AppError::DatabaseConnection(message.clone()));
        }
        Ok(Arc::new(FakeDatabase::funds().with_close_counter(self.closes.clone())))
    }
}
