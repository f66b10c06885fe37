//! SQL sanitization: literal stripping, operation classification, and
//! primary-table extraction.
//!
//! Sanitization exists for low-cardinality grouping and for safety: two
//! calls that differ only in bound values must produce the same statement
//! text, and literal values must never reach the telemetry backend. The
//! scanner is deliberately forgiving; malformed or unterminated input is
//! absorbed rather than rejected, and classification degrades to `Unknown`
//! instead of failing.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use once_cell::sync::Lazy;
use regex::Regex;

/// SQL operation verbs recognized for classification.
///
/// DDL, multi-statement batches, and vendor-specific syntax all classify
/// as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlOperation {
    Select,
    Insert,
    Update,
    Delete,
    /// Stored-procedure invocation.
    Call,
    Merge,
    Unknown,
}

impl SqlOperation {
    /// Returns the verb as recorded in the operation attribute and used in
    /// span names.
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlOperation::Select => "SELECT",
            SqlOperation::Insert => "INSERT",
            SqlOperation::Update => "UPDATE",
            SqlOperation::Delete => "DELETE",
            SqlOperation::Call => "CALL",
            SqlOperation::Merge => "MERGE",
            SqlOperation::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SqlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of sanitizing one raw statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedStatement {
    /// The statement with every literal value replaced by a `?` placeholder.
    pub statement: String,
    /// Verb classified from the first significant keyword.
    pub operation: SqlOperation,
    /// First table referenced by the operation, lowercased. `None` is a
    /// valid result; stored-procedure calls never yield one.
    pub main_table: Option<String>,
}

impl SanitizedStatement {
    fn empty() -> Self {
        Self {
            statement: String::new(),
            operation: SqlOperation::Unknown,
            main_table: None,
        }
    }

    /// Generates a span name from the classified parts.
    ///
    /// Format: "{OPERATION} {table}" or "{OPERATION}".
    pub fn span_name(&self) -> String {
        match &self.main_table {
            Some(table) => format!("{} {}", self.operation.as_str(), table),
            None => self.operation.as_str().to_string(),
        }
    }
}

// Table-extraction patterns, compiled once. These run over the sanitized
// text, so literal values can no longer produce false matches.
static FROM_TABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bFROM\s+[`"\[]?(\w+(?:\.\w+)*)"#).unwrap());

static INSERT_TABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bINSERT\s+INTO\s+[`"\[]?(\w+(?:\.\w+)*)"#).unwrap());

static UPDATE_TABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bUPDATE\s+[`"\[]?(\w+(?:\.\w+)*)"#).unwrap());

static MERGE_TABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bMERGE\s+INTO\s+[`"\[]?(\w+(?:\.\w+)*)"#).unwrap());

/// Sanitizes a raw SQL statement.
///
/// Pure function of the input text: identical input always yields identical
/// output, and no input can make it fail. Absent or blank input yields an
/// empty statement classified `Unknown` with no table.
pub fn sanitize(raw: Option<&str>) -> SanitizedStatement {
    let raw = match raw {
        Some(text) if !text.trim().is_empty() => text,
        _ => return SanitizedStatement::empty(),
    };

    let (statement, first_keyword) = strip_literals(raw);
    let operation = classify(first_keyword.as_deref());
    let main_table = extract_table(operation, &statement);

    SanitizedStatement {
        statement,
        operation,
        main_table,
    }
}

/// Single pass over the statement replacing literal tokens with `?`.
///
/// Also records the first bare word outside comments and strings, which is
/// the classification keyword. Comments are copied through verbatim;
/// unterminated strings and comments are absorbed to end-of-input.
fn strip_literals(raw: &str) -> (String, Option<String>) {
    let mut out = String::with_capacity(raw.len());
    let mut first_keyword: Option<String> = None;
    let mut last_was_placeholder = false;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                consume_quoted(&mut chars, c);
                push_placeholder(&mut out, &mut last_was_placeholder);
            }
            '-' if chars.peek() == Some(&'-') => {
                out.push(c);
                for c in chars.by_ref() {
                    out.push(c);
                    if c == '\n' {
                        break;
                    }
                }
                last_was_placeholder = false;
            }
            '/' if chars.peek() == Some(&'*') => {
                out.push(c);
                let mut prev = '\0';
                for c in chars.by_ref() {
                    out.push(c);
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                last_was_placeholder = false;
            }
            // Positional parameter markers ($1, $2, ...) are already
            // placeholders; keep them intact.
            '$' if chars.peek().is_some_and(|n| n.is_ascii_digit()) => {
                out.push(c);
                while let Some(&next) = chars.peek() {
                    if !next.is_ascii_digit() {
                        break;
                    }
                    out.push(next);
                    chars.next();
                }
                last_was_placeholder = false;
            }
            c if c.is_ascii_digit()
                || (c == '.' && chars.peek().is_some_and(|n| n.is_ascii_digit())) =>
            {
                consume_number(&mut chars, c);
                push_placeholder(&mut out, &mut last_was_placeholder);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                word.push(c);
                while let Some(&next) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || next == '_' || next == '$') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                out.push_str(&word);
                if first_keyword.is_none() {
                    first_keyword = Some(word);
                }
                last_was_placeholder = false;
            }
            c => {
                out.push(c);
                last_was_placeholder = false;
            }
        }
    }

    (out, first_keyword)
}

/// Consumes a quoted literal, honoring doubled-quote and backslash escapes.
/// An unterminated literal swallows the rest of the input.
fn consume_quoted(chars: &mut Peekable<Chars<'_>>, quote: char) {
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        if c == quote {
            if chars.peek() == Some(&quote) {
                chars.next();
                continue;
            }
            return;
        }
    }
}

/// Consumes the remainder of a numeric literal: digits, decimal point,
/// exponent (with its sign), and trailing alphanumerics so hex and suffixed
/// forms collapse into a single placeholder.
fn consume_number(chars: &mut Peekable<Chars<'_>>, start: char) {
    let mut prev = start;
    while let Some(&next) = chars.peek() {
        let exponent_sign = (next == '+' || next == '-') && (prev == 'e' || prev == 'E');
        if next.is_ascii_alphanumeric() || next == '.' || next == '_' || exponent_sign {
            prev = next;
            chars.next();
        } else {
            break;
        }
    }
}

/// Placeholders emitted back-to-back come from one apparent literal and
/// collapse into a single marker.
fn push_placeholder(out: &mut String, last_was_placeholder: &mut bool) {
    if !*last_was_placeholder {
        out.push('?');
    }
    *last_was_placeholder = true;
}

fn classify(keyword: Option<&str>) -> SqlOperation {
    let Some(word) = keyword else {
        return SqlOperation::Unknown;
    };
    match word.to_ascii_uppercase().as_str() {
        "SELECT" => SqlOperation::Select,
        "INSERT" => SqlOperation::Insert,
        "UPDATE" => SqlOperation::Update,
        "DELETE" => SqlOperation::Delete,
        "CALL" => SqlOperation::Call,
        "MERGE" => SqlOperation::Merge,
        _ => SqlOperation::Unknown,
    }
}

fn extract_table(operation: SqlOperation, statement: &str) -> Option<String> {
    let regex = match operation {
        SqlOperation::Select | SqlOperation::Delete => &*FROM_TABLE_REGEX,
        SqlOperation::Insert => &*INSERT_TABLE_REGEX,
        SqlOperation::Update => &*UPDATE_TABLE_REGEX,
        SqlOperation::Merge => &*MERGE_TABLE_REGEX,
        // A procedure name is not a table.
        SqlOperation::Call | SqlOperation::Unknown => return None,
    };

    regex
        .captures(statement)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_is_deterministic() {
        let input = "SELECT * FROM orders WHERE id = 42 AND name = 'a'";
        assert_eq!(sanitize(Some(input)), sanitize(Some(input)));
    }

    #[test]
    fn select_strips_literals_and_finds_table() {
        let result = sanitize(Some("SELECT * FROM orders WHERE id = 42"));
        assert_eq!(result.operation, SqlOperation::Select);
        assert_eq!(result.main_table.as_deref(), Some("orders"));
        assert_eq!(result.statement, "SELECT * FROM orders WHERE id = ?");
        assert!(!result.statement.contains("42"));
    }

    #[test]
    fn insert_finds_target_table() {
        let result = sanitize(Some("INSERT INTO customers(id,name) VALUES(?,?)"));
        assert_eq!(result.operation, SqlOperation::Insert);
        assert_eq!(result.main_table.as_deref(), Some("customers"));
    }

    #[test]
    fn update_and_delete_find_their_tables() {
        let update = sanitize(Some("UPDATE students SET name = 'x' WHERE id = 3"));
        assert_eq!(update.operation, SqlOperation::Update);
        assert_eq!(update.main_table.as_deref(), Some("students"));
        assert_eq!(update.statement, "UPDATE students SET name = ? WHERE id = ?");

        let delete = sanitize(Some("delete from assignments where id = 9"));
        assert_eq!(delete.operation, SqlOperation::Delete);
        assert_eq!(delete.main_table.as_deref(), Some("assignments"));
    }

    #[test]
    fn call_never_yields_a_table() {
        let result = sanitize(Some("CALL update_balance(?)"));
        assert_eq!(result.operation, SqlOperation::Call);
        assert_eq!(result.main_table, None);
    }

    #[test]
    fn merge_finds_its_target() {
        let result = sanitize(Some("MERGE INTO inventory USING staged ON inventory.id = staged.id"));
        assert_eq!(result.operation, SqlOperation::Merge);
        assert_eq!(result.main_table.as_deref(), Some("inventory"));
    }

    #[test]
    fn qualified_names_are_kept_whole() {
        let result = sanitize(Some("SELECT id FROM public.orders WHERE id = 1"));
        assert_eq!(result.main_table.as_deref(), Some("public.orders"));
    }

    #[test]
    fn ddl_classifies_unknown() {
        let result = sanitize(Some("CREATE TABLE users (id INTEGER PRIMARY KEY)"));
        assert_eq!(result.operation, SqlOperation::Unknown);
        assert_eq!(result.main_table, None);
    }

    #[test]
    fn absent_and_blank_input_yield_empty_results() {
        assert_eq!(sanitize(None), SanitizedStatement::empty());
        assert_eq!(sanitize(Some("")), SanitizedStatement::empty());
        assert_eq!(sanitize(Some("   \n")), SanitizedStatement::empty());
    }

    #[test]
    fn doubled_quote_escapes_stay_one_literal() {
        let result = sanitize(Some("SELECT * FROM users WHERE name = 'O''Brien'"));
        assert_eq!(result.statement, "SELECT * FROM users WHERE name = ?");
    }

    #[test]
    fn double_quoted_literals_are_stripped() {
        let result = sanitize(Some(r#"SELECT "abc" FROM t"#));
        assert_eq!(result.statement, "SELECT ? FROM t");
        assert_eq!(result.main_table.as_deref(), Some("t"));
    }

    #[test]
    fn unterminated_literal_is_absorbed() {
        let result = sanitize(Some("SELECT * FROM t WHERE name = 'oops"));
        assert_eq!(result.statement, "SELECT * FROM t WHERE name = ?");
    }

    #[test]
    fn comments_pass_through_verbatim() {
        let line = sanitize(Some("SELECT * FROM t -- limit 42\nWHERE id = 7"));
        assert_eq!(line.statement, "SELECT * FROM t -- limit 42\nWHERE id = ?");

        let block = sanitize(Some("SELECT /* keep 42 */ * FROM t"));
        assert_eq!(block.statement, "SELECT /* keep 42 */ * FROM t");
    }

    #[test]
    fn keyword_inside_comment_does_not_classify() {
        let result = sanitize(Some("/* DELETE */ SELECT * FROM t"));
        assert_eq!(result.operation, SqlOperation::Select);
    }

    #[test]
    fn numeric_forms_collapse_to_one_placeholder() {
        let result = sanitize(Some("SELECT * FROM t WHERE a = 1.5e-3 AND b = 0x1F"));
        assert_eq!(result.statement, "SELECT * FROM t WHERE a = ? AND b = ?");
    }

    #[test]
    fn positional_markers_are_preserved() {
        let result = sanitize(Some("INSERT INTO grades (sid, score) VALUES ($1, $2)"));
        assert_eq!(
            result.statement,
            "INSERT INTO grades (sid, score) VALUES ($1, $2)"
        );
    }

    #[test]
    fn span_name_includes_table_when_known() {
        assert_eq!(
            sanitize(Some("SELECT * FROM users WHERE id = 1")).span_name(),
            "SELECT users"
        );
        assert_eq!(sanitize(Some("CALL refresh_totals()")).span_name(), "CALL");
    }
}
