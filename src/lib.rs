//! # sql-client-tracing
//!
//! OpenTelemetry-compatible call interception and attribute extraction for
//! SQL database clients.
//!
//! The crate intercepts outbound database calls and turns each one into a
//! structured, low-cardinality telemetry record (system, user, sanitized
//! statement, operation verb, primary table, and optionally the bound
//! parameter values) without ever altering the call's own outcome.
//! Telemetry here is strictly best-effort: a malformed statement, a closed
//! connection, or a missing attribute degrades the record, never the call.
//!
//! ## Features
//!
//! - **Re-entrancy safe**: a per-context, per-call-class depth guard keeps
//!   driver internals that re-enter instrumented code from producing
//!   duplicate or recursive telemetry
//! - **Parameter capture**: positional bind values accumulated across
//!   preparatory calls, cleared when the outermost call completes
//! - **SQL sanitization**: literals stripped, operation classified, and the
//!   primary table extracted defensively, with no failure mode
//! - **Client agnostic**: the extractor reads requests through the
//!   [`SqlClientRequest`] capability trait, never concrete client types
//! - **SeaORM adapter included**: [`TracedConnection`] is a drop-in
//!   replacement for `DatabaseConnection`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sea_orm::Database;
//! use sql_client_tracing::TracedConnection;
//!
//! // Wrap your existing connection
//! let db = Database::connect("postgres://localhost/mydb").await?;
//! let traced_db = TracedConnection::wrap(db);
//!
//! // Use it exactly like a normal DatabaseConnection
//! let users = Users::find().all(&traced_db).await?;
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use sql_client_tracing::TracingConfig;
//!
//! let config = TracingConfig::default()
//!     .with_parameter_capture(true) // Include bound values (default: false)
//!     .with_table_attribute_key("db.collection.name");
//! ```
//!
//! ## Span Attributes
//!
//! The following attribute keys are a stable contract with consumers:
//!
//! | Attribute | Description |
//! |-----------|-------------|
//! | `db.system` | Database system ("postgresql", "mysql", "sqlite", ...) |
//! | `db.user` | User the connection authenticated as |
//! | `db.name` | Logical database name |
//! | `db.connection_string` | Redacted connection string (host/port only) |
//! | `db.statement` | Sanitized SQL, literal values replaced by `?` |
//! | `db.operation` | Operation verb (SELECT, INSERT, ..., CALL, MERGE) |
//! | `db.sql.table` | Primary table, absent for stored-procedure calls |
//! | `db.statement.values` | Captured parameters (only when enabled) |

mod config;
mod connection;
mod depth;
mod extract;
mod interceptor;
mod params;
mod request;
mod sanitizer;
pub mod semconv;

pub use config::TracingConfig;
pub use connection::{TracedConnection, TracingExt};
pub use depth::{CallClass, CallDepth};
pub use extract::{AttributeSet, SqlClientAttributesExtractor, SqlClientRequest};
pub use interceptor::{ActiveCall, StatementInterceptor, Tracer};
pub use params::{CapturedParams, ParamStore, ParamValue};
pub use request::{DbInfo, DbRequest};
pub use sanitizer::{sanitize, SanitizedStatement, SqlOperation};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        DbInfo, SqlClientRequest, TracedConnection, TracingConfig, TracingExt,
    };
}
