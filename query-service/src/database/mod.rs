//! Target database access.
//!
//! [`SqlDatabase`] is what the toolkit sees of the fund database;
//! [`DatabaseConnector`] opens one per request. MySQL is the production
//! backend, SQLite serves local development and tests.

mod mysql;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use common::config::DatabaseConfig;
use common::errors::{AppError, AppResult};

pub use mysql::MySqlDatabase;
pub use sqlite::SqliteDatabase;

/// SQL flavour of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Quotes an identifier for this dialect.
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rows returned by a statement, rendered as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryOutput {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header line plus one tab-separated line per row.
    pub fn to_tsv(&self) -> String {
        let mut out = self.columns.join("\t");
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out
    }

    /// Markdown table with every cell cut to `max_cell_chars` characters.
    pub fn to_markdown(&self, max_cell_chars: usize) -> String {
        if self.is_empty() {
            return "Query returned no rows.".to_string();
        }

        let escape = |cell: &str| truncate(cell, max_cell_chars).replace('|', "\\|");

        let mut out = String::new();
        out.push_str(
            &(self
                .columns
                .iter()
                .map(|c| format!("| {} ", escape(c)))
                .collect::<String>()
                + "|\n"),
        );
        out.push_str(&(self.columns.iter().map(|_| "|---").collect::<String>() + "|\n"));
        for row in &self.rows {
            out.push_str(
                &(row
                    .iter()
                    .map(|v| format!("| {} ", escape(v)))
                    .collect::<String>()
                    + "|\n"),
            );
        }

        let noun = if self.rows.len() == 1 { "row" } else { "rows" };
        out.push_str(&format!("({} {})", self.rows.len(), noun));
        out
    }
}

/// Cuts `value` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let kept: String = value.chars().take(max_chars).collect();
    format!("{}...", kept)
}

/// The fund database as seen by the agent toolkit.
#[async_trait]
pub trait SqlDatabase: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Number of sample rows included in [`SqlDatabase::table_info`].
    fn sample_rows(&self) -> u32;

    /// Names of the base tables, sorted.
    async fn list_tables(&self) -> AppResult<Vec<String>>;

    /// `CREATE TABLE` statement for one table.
    async fn create_statement(&self, table: &str) -> AppResult<String>;

    /// Runs a statement and renders every cell as text.
    async fn run(&self, sql: &str) -> AppResult<QueryOutput>;

    /// Releases the connection pool.
    async fn close(&self) {}

    /// Schema description for `tables`: each `CREATE TABLE` statement
    /// followed by a comment block with sample rows.
    async fn table_info(&self, tables: &[String]) -> AppResult<String> {
        let mut sections = Vec::with_capacity(tables.len());
        let sample_rows = self.sample_rows();

        for table in tables {
            let mut section = self.create_statement(table).await?.trim().to_string();

            if sample_rows > 0 {
                let sql = format!(
                    "SELECT * FROM {} LIMIT {}",
                    self.dialect().quote_identifier(table),
                    sample_rows
                );
                match self.run(&sql).await {
                    Ok(sample) => section.push_str(&format!(
                        "\n\n/*\n{} rows from {} table:\n{}*/",
                        sample_rows,
                        table,
                        sample.to_tsv()
                    )),
                    Err(e) => {
                        tracing::warn!(table = %table, error = %e, "读取样例数据失败");
                    }
                }
            }

            sections.push(section);
        }

        Ok(sections.join("\n\n"))
    }
}

/// Opens a database handle for one request.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    async fn connect(&self) -> AppResult<Arc<dyn SqlDatabase>>;
}

/// Connector backed by sqlx pools built from [`DatabaseConfig`].
pub struct SqlxConnector {
    config: DatabaseConfig,
}

impl SqlxConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DatabaseConnector for SqlxConnector {
    async fn connect(&self) -> AppResult<Arc<dyn SqlDatabase>> {
        let db: Arc<dyn SqlDatabase> = match self.config.url.as_deref() {
            Some(url) if url.starts_with("sqlite:") => {
                Arc::new(SqliteDatabase::connect(url, &self.config).await?)
            }
            Some(url) if url.starts_with("mysql:") || url.starts_with("mariadb:") => {
                Arc::new(MySqlDatabase::connect_url(url, &self.config).await?)
            }
            Some(_) => {
                return Err(AppError::Config(
                    "DATABASE_URL must use the mysql: or sqlite: scheme".into(),
                ))
            }
            None => Arc::new(MySqlDatabase::connect(&self.config).await?),
        };

        tracing::debug!(dialect = %db.dialect(), "数据库连接已建立");
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output() -> QueryOutput {
        QueryOutput {
            columns: vec!["scheme_name".into(), "return_1y".into()],
            rows: vec![
                vec!["Fund X Growth".into(), "12.34".into()],
                vec!["Fund Y | Direct".into(), "NULL".into()],
            ],
        }
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::MySql.quote_identifier("nav`history"), "`nav``history`");
        assert_eq!(Dialect::Sqlite.quote_identifier("funds"), "\"funds\"");
    }

    #[test]
    fn test_tsv_layout() {
        assert_eq!(
            output().to_tsv(),
            "scheme_name\treturn_1y\nFund X Growth\t12.34\nFund Y | Direct\tNULL\n"
        );
    }

    #[test]
    fn test_markdown_escapes_and_counts() {
        let rendered = output().to_markdown(100);
        assert!(rendered.starts_with("| scheme_name | return_1y |\n|---|---|\n"));
        assert!(rendered.contains("| Fund Y \\| Direct | NULL |"));
        assert!(rendered.ends_with("(2 rows)"));
    }

    #[test]
    fn test_markdown_empty() {
        assert_eq!(QueryOutput::default().to_markdown(100), "Query returned no rows.");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("₹₹₹", 3), "₹₹₹");
    }

    #[tokio::test]
    async fn test_unknown_url_scheme_is_config_error() {
        let connector = SqlxConnector::new(DatabaseConfig {
            url: Some("postgres://user:secret@db/funds".into()),
            ..DatabaseConfig::default()
        });
        match connector.connect().await {
            Err(AppError::Config(msg)) => assert!(!msg.contains("secret")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("postgres URLs are not supported"),
        }
    }

    #[tokio::test]
    async fn test_sqlite_url_selects_sqlite_backend() {
        let connector = SqlxConnector::new(DatabaseConfig {
            url: Some("sqlite::memory:".into()),
            ..DatabaseConfig::default()
        });
        let db = match connector.connect().await {
            Ok(db) => db,
            Err(e) => panic!("in-memory sqlite should open: {}", e),
        };
        assert_eq!(db.dialect(), Dialect::Sqlite);
        let output = db.run("SELECT 1 AS one").await.unwrap();
        assert_eq!(output.rows, vec![vec!["1".to_string()]]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_unreachable_mysql_is_connection_error() {
        let connector = SqlxConnector::new(DatabaseConfig {
            host: "127.0.0.1".into(),
            port: 1,
            connect_timeout_secs: 2,
            ..DatabaseConfig::default()
        });
        let err = match connector.connect().await {
            Err(e) => e,
            Ok(_) => panic!("nothing listens on port 1"),
        };
        assert!(matches!(err, AppError::DatabaseConnection(_)));
    }
}
