//! OpenTelemetry semantic convention keys for database client spans.
//!
//! These names are a stable contract with exporters and backends; renaming
//! any of them is a breaking change.

/// Database system identifier ("postgresql", "mysql", "sqlite", ...).
pub const DB_SYSTEM: &str = "db.system";

/// Username the connection authenticated as.
pub const DB_USER: &str = "db.user";

/// Logical database name.
pub const DB_NAME: &str = "db.name";

/// Redacted connection string (host/port only, no credentials).
pub const DB_CONNECTION_STRING: &str = "db.connection_string";

/// Sanitized SQL statement, with all literal values replaced.
pub const DB_STATEMENT: &str = "db.statement";

/// SQL operation verb (SELECT, INSERT, UPDATE, DELETE, CALL, MERGE).
pub const DB_OPERATION: &str = "db.operation";

/// Primary table referenced by the statement. Absent for stored-procedure
/// calls: a procedure name is not a table.
pub const DB_SQL_TABLE: &str = "db.sql.table";

/// Captured bind-parameter values, rendered as a bracketed positional list.
/// Only emitted when parameter capture is enabled.
pub const DB_STATEMENT_VALUES: &str = "db.statement.values";
