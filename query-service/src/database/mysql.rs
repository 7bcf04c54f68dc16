//! MySQL backend.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use common::config::DatabaseConfig;
use common::errors::{AppError, AppResult};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, MySqlPool, Row, TypeInfo, ValueRef};

use super::{Dialect, QueryOutput, SqlDatabase};

const LIST_TABLES: &str = r#"
    SELECT CONVERT(TABLE_NAME USING utf8mb4) AS table_name
    FROM information_schema.TABLES
    WHERE TABLE_SCHEMA = DATABASE()
    AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME
"#;

/// Fund database on a MySQL server.
pub struct MySqlDatabase {
    pool: MySqlPool,
    sample_rows: u32,
}

impl MySqlDatabase {
    /// Connects with the structured settings of `config`.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .database(&config.database);
        Self::connect_with(options, config).await
    }

    /// Connects with an explicit `mysql://` URL.
    pub async fn connect_url(url: &str, config: &DatabaseConfig) -> AppResult<Self> {
        let options = MySqlConnectOptions::from_str(url)
            .map_err(|_| AppError::Config("DATABASE_URL is not a valid MySQL URL".into()))?;
        Self::connect_with(options, config).await
    }

    async fn connect_with(options: MySqlConnectOptions, config: &DatabaseConfig) -> AppResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;

        Ok(Self {
            pool,
            sample_rows: config.sample_rows,
        })
    }
}

#[async_trait]
impl SqlDatabase for MySqlDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn sample_rows(&self) -> u32 {
        self.sample_rows
    }

    async fn list_tables(&self) -> AppResult<Vec<String>> {
        let rows = sqlx::query(LIST_TABLES)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("table_name")
                    .map_err(|e| AppError::DatabaseQuery(e.to_string()))
            })
            .collect()
    }

    async fn create_statement(&self, table: &str) -> AppResult<String> {
        let sql = format!("SHOW CREATE TABLE {}", Dialect::MySql.quote_identifier(table));
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;

        let statement: String = row
            .try_get_unchecked(1)
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
        Ok(strip_table_options(&statement))
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

/// Drops `ENGINE=...` and similar options after the column list.
fn strip_table_options(statement: &str) -> String {
    match statement.rfind(')') {
        Some(end) => statement[..=end].to_string(),
        None => statement.to_string(),
    }
}

fn is_integer_type(name: &str) -> bool {
    let base = name.trim_end_matches(" UNSIGNED");
    matches!(base, "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT")
}

/// How a binary-protocol value of a given MySQL type is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Boolean,
    Signed,
    Unsigned,
    Year,
    Float,
    Double,
    Date,
    DateTime,
    Timestamp,
    Time,
    Text,
}

fn cell_kind(type_name: &str) -> CellKind {
    match type_name {
        "BOOLEAN" => CellKind::Boolean,
        t if is_integer_type(t) && t.ends_with("UNSIGNED") => CellKind::Unsigned,
        t if is_integer_type(t) => CellKind::Signed,
        // sent as a two-byte integer by prepared statements
        "YEAR" => CellKind::Year,
        "FLOAT" => CellKind::Float,
        "DOUBLE" => CellKind::Double,
        "DATE" => CellKind::Date,
        "DATETIME" => CellKind::DateTime,
        "TIMESTAMP" => CellKind::Timestamp,
        "TIME" => CellKind::Time,
        // DECIMAL and textual types arrive as text
        _ => CellKind::Text,
    }
}

fn render_cell(row: &MySqlRow, index: usize) -> String {
    let raw = match row.try_get_raw(index) {
        Ok(raw) => raw,
        Err(e) => return format!("<{}>", e),
    };
    if raw.is_null() {
        return "NULL".to_string();
    }
    let kind = cell_kind(&raw.type_info().name().to_ascii_uppercase());

    let rendered = match kind {
        CellKind::Boolean => row.try_get::<bool, _>(index).map(|v| v.to_string()),
        CellKind::Unsigned => row.try_get_unchecked::<u64, _>(index).map(|v| v.to_string()),
        CellKind::Signed => row.try_get_unchecked::<i64, _>(index).map(|v| v.to_string()),
        CellKind::Year => row.try_get_unchecked::<u16, _>(index).map(|v| v.to_string()),
        CellKind::Float => row.try_get::<f32, _>(index).map(|v| v.to_string()),
        CellKind::Double => row.try_get::<f64, _>(index).map(|v| v.to_string()),
        CellKind::Date => row.try_get::<NaiveDate, _>(index).map(|v| v.to_string()),
        CellKind::DateTime => row.try_get::<NaiveDateTime, _>(index).map(|v| v.to_string()),
        CellKind::Timestamp => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|v| v.naive_utc().to_string()),
        CellKind::Time => row.try_get::<NaiveTime, _>(index).map(|v| v.to_string()),
        CellKind::Text => row.try_get_unchecked::<String, _>(index),
    };

    rendered.unwrap_or_else(|_| {
        row.try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_else(|e| format!("<{}>", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_table_options() {
        let statement = "CREATE TABLE `funds` (\n  `id` int NOT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";
        assert_eq!(
            strip_table_options(statement),
            "CREATE TABLE `funds` (\n  `id` int NOT NULL,\n  PRIMARY KEY (`id`)\n)"
        );
    }

    #[test]
    fn test_integer_types() {
        assert!(is_integer_type("BIGINT UNSIGNED"));
        assert!(is_integer_type("TINYINT"));
        assert!(!is_integer_type("DECIMAL"));
        assert!(!is_integer_type("INTERVAL"));
    }

    #[test]
    fn test_cell_kind_dispatch() {
        assert_eq!(cell_kind("YEAR"), CellKind::Year);
        assert_eq!(cell_kind("INT UNSIGNED"), CellKind::Unsigned);
        assert_eq!(cell_kind("BIGINT"), CellKind::Signed);
        assert_eq!(cell_kind("BOOLEAN"), CellKind::Boolean);
        assert_eq!(cell_kind("DATE"), CellKind::Date);
        assert_eq!(cell_kind("TIMESTAMP"), CellKind::Timestamp);
        assert_eq!(cell_kind("DOUBLE"), CellKind::Double);
        assert_eq!(cell_kind("DECIMAL"), CellKind::Text);
        assert_eq!(cell_kind("VARCHAR"), CellKind::Text);
    }
}
