//! SQL statement validator.
//!
//! Keeps model-generated SQL read-only when the guard is enabled.

use crate::errors::AppError;

/// Validates SQL statements before they reach the database.
pub struct SqlValidator;

/// Statement kinds allowed to start a read-only statement.
const READ_ONLY_LEADING: [&str; 6] = ["SELECT", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "WITH"];

/// Keywords that modify data, schema or privileges.
const FORBIDDEN_KEYWORDS: [&str; 14] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "TRUNCATE", "ALTER", "CREATE", "GRANT", "REVOKE",
    "RENAME", "LOCK", "CALL", "LOAD", "HANDLER",
];

impl SqlValidator {
    /// Checks that `sql` is a single read-only statement.
    ///
    /// # Errors
    /// Returns `AppError::Validation` naming the offending construct.
    pub fn validate_read_only(sql: &str) -> Result<(), AppError> {
        let stripped = strip_literals_and_comments(sql);
        let body = stripped.trim().trim_end_matches(';').trim();

        if body.is_empty() {
            return Err(AppError::Validation("empty SQL statement".into()));
        }
        if body.contains(';') {
            return Err(AppError::Validation(
                "multiple statements are not allowed".into(),
            ));
        }

        let tokens: Vec<String> = body
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
            .map(|t| t.to_ascii_uppercase())
            .collect();

        let leading = tokens.first().map(String::as_str).unwrap_or_default();
        if !READ_ONLY_LEADING.contains(&leading) {
            return Err(AppError::Validation(format!(
                "only read-only statements are allowed, got {}",
                leading
            )));
        }

        if let Some(keyword) = tokens
            .iter()
            .find(|t| FORBIDDEN_KEYWORDS.contains(&t.as_str()))
        {
            return Err(AppError::Validation(format!(
                "forbidden operation: {}",
                keyword
            )));
        }

        if let Some(target) = tokens
            .windows(2)
            .find(|w| w[0] == "INTO" && (w[1] == "OUTFILE" || w[1] == "DUMPFILE"))
            .map(|w| w[1].as_str())
        {
            return Err(AppError::Validation(format!(
                "forbidden operation: INTO {}",
                target
            )));
        }

        Ok(())
    }
}

/// Blanks out quoted literals, quoted identifiers and comments so keywords
/// inside them are not mistaken for statements.
///
/// The body of a MySQL executable comment (`/*! ... */`, `/*M! ... */`) is
/// executed by the server, so it is kept and scanned like ordinary SQL.
fn strip_literals_and_comments(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut in_executable_comment = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '\'' | '"' | '`' => {
                out.push(' ');
                i = skip_quoted(&chars, i + 1, c);
            }
            '-' if next == Some('-') => {
                out.push(' ');
                i = skip_line(&chars, i);
            }
            '#' => {
                out.push(' ');
                i = skip_line(&chars, i);
            }
            '/' if next == Some('*') => {
                out.push(' ');
                let bang = match chars.get(i + 2).copied() {
                    Some('!') => Some(i + 3),
                    Some('M') if chars.get(i + 3) == Some(&'!') => Some(i + 4),
                    _ => None,
                };
                match bang {
                    Some(mut j) if !in_executable_comment => {
                        // optional server version, e.g. /*!50000
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        in_executable_comment = true;
                        i = j;
                    }
                    _ => i = skip_block_comment(&chars, i + 2),
                }
            }
            '*' if in_executable_comment && next == Some('/') => {
                out.push(' ');
                in_executable_comment = false;
                i += 2;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Returns the index just past the closing `quote`. Backslash escapes apply
/// to string literals only, never to backtick identifiers.
fn skip_quoted(chars: &[char], mut i: usize, quote: char) -> usize {
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && quote != '`' {
            i += 2;
            continue;
        }
        if c == quote {
            // doubled quote is an escaped quote
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    i
}

fn skip_line(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i] != '\n' {
        i += 1;
    }
    i
}

fn skip_block_comment(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() {
        if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
            return i + 2;
        }
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_allowed() {
        assert!(SqlValidator::validate_read_only("SELECT * FROM fund_returns").is_ok());
        assert!(SqlValidator::validate_read_only("select nav from nav_history limit 3;").is_ok());
    }

    #[test]
    fn test_with_and_show_are_allowed() {
        assert!(SqlValidator::validate_read_only(
            "WITH r AS (SELECT fund_id, return_1y FROM fund_returns) SELECT * FROM r"
        )
        .is_ok());
        assert!(SqlValidator::validate_read_only("SHOW TABLES").is_ok());
    }

    #[test]
    fn test_drop_is_forbidden() {
        assert!(SqlValidator::validate_read_only("DROP TABLE funds").is_err());
    }

    #[test]
    fn test_stacked_statement_is_forbidden() {
        let err = SqlValidator::validate_read_only("SELECT 1; DELETE FROM funds").unwrap_err();
        assert!(err.to_string().contains("multiple statements"));
    }

    #[test]
    fn test_keyword_inside_literal_is_ignored() {
        assert!(SqlValidator::validate_read_only(
            "SELECT * FROM funds WHERE scheme_name = 'Update Growth; Fund'"
        )
        .is_ok());
        assert!(SqlValidator::validate_read_only("SELECT 1 -- drop everything").is_ok());
    }

    #[test]
    fn test_forbidden_keyword_in_subquery() {
        let err = SqlValidator::validate_read_only("SELECT * FROM (INSERT INTO x VALUES (1)) t")
            .unwrap_err();
        assert!(err.to_string().contains("INSERT"));
    }

    #[test]
    fn test_replace_function_is_allowed() {
        assert!(SqlValidator::validate_read_only(
            "SELECT REPLACE(scheme_name, 'Direct', '') FROM funds"
        )
        .is_ok());
    }

    #[test]
    fn test_file_export_is_forbidden() {
        let err = SqlValidator::validate_read_only("SELECT * FROM funds INTO OUTFILE '/tmp/x'")
            .unwrap_err();
        assert!(err.to_string().contains("INTO OUTFILE"));
        let err = SqlValidator::validate_read_only("SELECT * FROM funds INTO DUMPFILE '/tmp/x'")
            .unwrap_err();
        assert!(err.to_string().contains("INTO DUMPFILE"));
    }

    #[test]
    fn test_executable_comment_is_scanned() {
        let err = SqlValidator::validate_read_only(
            "SELECT * FROM funds /*!50000 INTO OUTFILE '/tmp/x' */",
        )
        .unwrap_err();
        assert!(err.to_string().contains("INTO OUTFILE"));
        assert!(SqlValidator::validate_read_only("SELECT 1 /*!40001 ; DROP TABLE funds */").is_err());
        assert!(SqlValidator::validate_read_only("SELECT /*M! SQL_NO_CACHE */ 1").is_ok());
        assert!(SqlValidator::validate_read_only("SELECT /* DROP */ 1").is_ok());
    }

    #[test]
    fn test_backslash_does_not_escape_backtick() {
        let err = SqlValidator::validate_read_only(
            "SELECT `a\\`, 1 INTO OUTFILE '/tmp/y' -- `",
        )
        .unwrap_err();
        assert!(err.to_string().contains("INTO OUTFILE"));
        assert!(SqlValidator::validate_read_only(
            "SELECT * FROM funds WHERE scheme_name = 'it\\'s DELETE'"
        )
        .is_ok());
    }
}
