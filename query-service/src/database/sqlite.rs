//! SQLite backend, used for local development and tests.

use async_trait::async_trait;
use common::config::DatabaseConfig;
use common::errors::{AppError, AppResult};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

use super::{Dialect, QueryOutput, SqlDatabase};

const LIST_TABLES: &str = r#"
    SELECT name FROM sqlite_master
    WHERE type = 'table'
    AND name NOT LIKE 'sqlite_%'
    ORDER BY name
"#;

const CREATE_STATEMENT: &str = "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?";

/// Fund database in a SQLite file or in memory.
pub struct SqliteDatabase {
    pool: SqlitePool,
    sample_rows: u32,
}

impl SqliteDatabase {
    pub async fn connect(url: &str, config: &DatabaseConfig) -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.connect_timeout())
            .connect(url)
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
        Ok(Self::from_pool(pool, config.sample_rows))
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: SqlitePool, sample_rows: u32) -> Self {
        Self { pool, sample_rows }
    }
}

#[async_trait]
impl SqlDatabase for SqliteDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn sample_rows(&self) -> u32 {
        self.sample_rows
    }

    async fn list_tables(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(LIST_TABLES)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))
    }

    async fn create_statement(&self, table: &str) -> AppResult<String> {
        sqlx::query_scalar::<_, String>(CREATE_STATEMENT)
            .bind(table)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?
            .ok_or_else(|| AppError::DatabaseQuery(format!("no such table: {}", table)))
    }

    async fn run(&self, sql: &str) -> AppResult<QueryOutput> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| render_cell(row, i)).collect())
            .collect();

        Ok(QueryOutput { columns, rows })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn render_cell(row: &SqliteRow, index: usize) -> String {
    let raw = match row.try_get_raw(index) {
        Ok(raw) => raw,
        Err(e) => return format!("<{}>", e),
    };
    if raw.is_null() {
        return "NULL".to_string();
    }
    // the value's storage class, not the declared column type
    let storage = raw.type_info().name().to_ascii_uppercase();

    let rendered = match storage.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index).map(|v| v.to_string()),
        "REAL" => row.try_get_unchecked::<f64, _>(index).map(|v| v.to_string()),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
        _ => row.try_get_unchecked::<String, _>(index),
    };

    rendered.unwrap_or_else(|e| format!("<{}>", e))
}
