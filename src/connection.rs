//! Traced database connection wrapper for SeaORM.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    ExecResult, IsolationLevel, QueryResult, Statement, StreamTrait, TransactionError,
    TransactionTrait, Value,
};
use tracing::{field, Instrument, Span};

use crate::config::TracingConfig;
use crate::depth::{CallClass, CallDepth};
use crate::extract::SqlClientAttributesExtractor;
use crate::params::{ParamStore, ParamValue};
use crate::request::{DbInfo, DbRequest};
use crate::semconv;

/// A traced wrapper around SeaORM's `DatabaseConnection`.
///
/// Implements `ConnectionTrait`, `StreamTrait`, and `TransactionTrait`,
/// making it a drop-in replacement for `DatabaseConnection`. Every call is
/// run through the interception pipeline: bound statement values are
/// captured, the statement is sanitized, and the resulting attribute set
/// is recorded on a `tracing` span that wraps the inner call.
///
/// # Span Nesting
///
/// Spans created here become children of the current span context, so
/// database calls nest under HTTP request spans when tracing middleware is
/// active in the host application.
///
/// # Attribute keys
///
/// Span fields are declared for the default attribute keys. A custom
/// `table_attribute_key` still flows into attribute sets produced by the
/// extractor, but the span layer records the table under `db.sql.table`.
///
/// # Example
///
/// ```rust,ignore
/// use sea_orm::Database;
/// use sql_client_tracing::TracedConnection;
///
/// let db = Database::connect("postgres://localhost/mydb").await?;
/// let traced = TracedConnection::wrap(db);
///
/// // All queries are now intercepted and traced
/// let users = Users::find().all(&traced).await?;
/// ```
#[derive(Debug)]
pub struct TracedConnection {
    inner: DatabaseConnection,
    db_info: Arc<DbInfo>,
    extractor: Arc<SqlClientAttributesExtractor>,
}

impl TracedConnection {
    /// Create a new traced connection with the given configuration.
    pub fn new(connection: DatabaseConnection, config: TracingConfig) -> Self {
        let system = db_system(connection.get_database_backend());
        Self {
            db_info: Arc::new(DbInfo::new().with_system(system)),
            extractor: Arc::new(SqlClientAttributesExtractor::new(config)),
            inner: connection,
        }
    }

    /// Create a new traced connection with default configuration.
    pub fn wrap(connection: DatabaseConnection) -> Self {
        Self::new(connection, TracingConfig::default())
    }

    /// Attach connection metadata (user, logical name, redacted connection
    /// string). When no system is supplied, the one derived from the
    /// backend is kept.
    pub fn with_db_info(mut self, db_info: DbInfo) -> Self {
        let db_info = if db_info.system.is_none() {
            db_info.with_system(db_system(self.inner.get_database_backend()))
        } else {
            db_info
        };
        self.db_info = Arc::new(db_info);
        self
    }

    /// Get a reference to the underlying `DatabaseConnection`.
    pub fn inner(&self) -> &DatabaseConnection {
        &self.inner
    }

    /// Get the extraction configuration.
    pub fn config(&self) -> &TracingConfig {
        self.extractor.config()
    }

    /// Get the connection metadata used for attribute extraction.
    pub fn db_info(&self) -> &DbInfo {
        &self.db_info
    }

    /// Consume the wrapper and return the inner `DatabaseConnection`.
    pub fn into_inner(self) -> DatabaseConnection {
        self.inner
    }

    /// The synchronous interception phase for one statement call.
    ///
    /// Guard enter, value capture, assembly, extraction, and guard exit
    /// (with the store cleared at depth zero) all happen here, before the
    /// inner future is awaited. Only the returned span crosses the await
    /// point; execution-context state never does.
    fn intercept_statement(&self, stmt: &Statement) -> Span {
        let depth = CallDepth::for_class(CallClass::Statement);
        let span = if depth.get_and_increment() == 0 {
            if let Some(values) = &stmt.values {
                for (index, value) in values.0.iter().enumerate() {
                    ParamStore::bind(index + 1, value.into());
                }
            }
            let db_info = Some(self.db_info.as_ref().clone());
            match DbRequest::assemble(db_info, Some(stmt.sql.clone())) {
                Some(request) => self.start_span(&request),
                None => Span::none(),
            }
        } else {
            Span::none()
        };
        if depth.decrement_and_get() == 0 {
            ParamStore::clear();
        }
        span
    }

    /// Create the statement span and record the extracted attribute set.
    fn start_span(&self, request: &DbRequest) -> Span {
        let attributes = self.extractor.extract(request);

        let otel_name = match (
            attributes.get(semconv::DB_OPERATION),
            attributes.get(self.extractor.config().table_attribute_key.as_ref()),
        ) {
            (Some(operation), Some(table)) => format!("{operation} {table}"),
            (Some(operation), None) => operation.to_string(),
            _ => "db.query".to_string(),
        };

        let span = tracing::info_span!(
            "db.query",
            otel.name = %otel_name,
            db.system = field::Empty,
            db.user = field::Empty,
            db.name = field::Empty,
            db.connection_string = field::Empty,
            db.statement = field::Empty,
            db.operation = field::Empty,
            db.sql.table = field::Empty,
            db.statement.values = field::Empty,
            db.rows_affected = field::Empty,
            otel.status_code = field::Empty,
            error.message = field::Empty,
        );

        for (key, value) in attributes.iter() {
            span.record(key, value);
        }

        span
    }

    /// Record the outcome of a database call in its span. The call's own
    /// result is never altered.
    fn record_result<T, E: std::fmt::Display>(
        &self,
        span: &Span,
        result: &Result<T, E>,
        rows: Option<u64>,
    ) {
        if let Some(rows) = rows {
            span.record("db.rows_affected", rows);
        }
        match result {
            Ok(_) => {
                span.record("otel.status_code", "OK");
            }
            Err(e) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.message", e.to_string().as_str());
                tracing::error!(
                    parent: span,
                    error = %e,
                    "database call failed"
                );
            }
        }
    }

    /// Transaction lifecycle span, guarded under its own call class so
    /// statement interception is unaffected.
    fn intercept_transaction(&self, operation: &'static str) -> Span {
        let depth = CallDepth::for_class(CallClass::Transaction);
        let span = if depth.get_and_increment() == 0 {
            let span = tracing::info_span!(
                "db.transaction",
                otel.name = operation,
                db.system = field::Empty,
                db.operation = operation,
                otel.status_code = field::Empty,
                error.message = field::Empty,
            );
            if let Some(system) = &self.db_info.system {
                span.record("db.system", system.as_str());
            }
            span
        } else {
            Span::none()
        };
        depth.decrement_and_get();
        span
    }
}

fn db_system(backend: DbBackend) -> &'static str {
    match backend {
        DbBackend::Postgres => "postgresql",
        DbBackend::MySql => "mysql",
        DbBackend::Sqlite => "sqlite",
    }
}

impl From<&Value> for ParamValue {
    fn from(value: &Value) -> Self {
        match value {
            v if *v == v.as_null() => ParamValue::Null,
            Value::Bool(Some(v)) => ParamValue::Bool(*v),
            Value::TinyInt(Some(v)) => ParamValue::Int((*v).into()),
            Value::SmallInt(Some(v)) => ParamValue::Int((*v).into()),
            Value::Int(Some(v)) => ParamValue::Int((*v).into()),
            Value::BigInt(Some(v)) => ParamValue::Int(*v),
            Value::TinyUnsigned(Some(v)) => ParamValue::UInt((*v).into()),
            Value::SmallUnsigned(Some(v)) => ParamValue::UInt((*v).into()),
            Value::Unsigned(Some(v)) => ParamValue::UInt((*v).into()),
            Value::BigUnsigned(Some(v)) => ParamValue::UInt(*v),
            Value::Float(Some(v)) => ParamValue::Float((*v).into()),
            Value::Double(Some(v)) => ParamValue::Float(*v),
            Value::Char(Some(v)) => ParamValue::Text(v.to_string()),
            Value::String(Some(v)) => ParamValue::Text(v.as_str().to_owned()),
            other => ParamValue::Other(format!("{other:?}")),
        }
    }
}

impl From<DatabaseConnection> for TracedConnection {
    fn from(connection: DatabaseConnection) -> Self {
        Self::wrap(connection)
    }
}

impl AsRef<DatabaseConnection> for TracedConnection {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.inner
    }
}

#[async_trait]
impl ConnectionTrait for TracedConnection {
    fn get_database_backend(&self) -> DbBackend {
        self.inner.get_database_backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        let span = self.intercept_statement(&stmt);

        let result = self.inner.execute(stmt).instrument(span.clone()).await;

        let rows = result.as_ref().ok().map(|r| r.rows_affected());
        self.record_result(&span, &result, rows);

        result
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        let stmt = Statement::from_string(self.get_database_backend(), sql);
        let span = self.intercept_statement(&stmt);

        let result = self
            .inner
            .execute_unprepared(sql)
            .instrument(span.clone())
            .await;

        let rows = result.as_ref().ok().map(|r| r.rows_affected());
        self.record_result(&span, &result, rows);

        result
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        let span = self.intercept_statement(&stmt);

        let result = self.inner.query_one(stmt).instrument(span.clone()).await;

        let rows = result
            .as_ref()
            .ok()
            .map(|row| if row.is_some() { 1 } else { 0 });
        self.record_result(&span, &result, rows);

        result
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        let span = self.intercept_statement(&stmt);

        let result = self.inner.query_all(stmt).instrument(span.clone()).await;

        let rows = result.as_ref().ok().map(|rows| rows.len() as u64);
        self.record_result(&span, &result, rows);

        result
    }

    fn support_returning(&self) -> bool {
        self.inner.support_returning()
    }

    fn is_mock_connection(&self) -> bool {
        self.inner.is_mock_connection()
    }
}

#[async_trait]
impl StreamTrait for TracedConnection {
    type Stream<'a> = <DatabaseConnection as StreamTrait>::Stream<'a>;

    fn stream<'a>(
        &'a self,
        stmt: Statement,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream<'a>, DbErr>> + 'a + Send>> {
        let span = self.intercept_statement(&stmt);

        Box::pin(async move {
            let result = self.inner.stream(stmt).instrument(span.clone()).await;
            // Row counts are unknowable for streams.
            self.record_result(&span, &result, None);
            result
        })
    }
}

#[async_trait]
impl TransactionTrait for TracedConnection {
    async fn begin(&self) -> Result<DatabaseTransaction, DbErr> {
        let span = self.intercept_transaction("BEGIN");

        let result = self.inner.begin().instrument(span.clone()).await;

        self.record_result(&span, &result, None);
        result
    }

    async fn begin_with_config(
        &self,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<DatabaseTransaction, DbErr> {
        let span = self.intercept_transaction("BEGIN");

        let result = self
            .inner
            .begin_with_config(isolation_level, access_mode)
            .instrument(span.clone())
            .await;

        self.record_result(&span, &result, None);
        result
    }

    async fn transaction<F, T, E>(&self, callback: F) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        let span = self.intercept_transaction("TRANSACTION");

        let result = self
            .inner
            .transaction(callback)
            .instrument(span.clone())
            .await;

        match &result {
            Ok(_) => {
                span.record("otel.status_code", "OK");
            }
            Err(e) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.message", format!("{e:?}").as_str());
            }
        }

        result
    }

    async fn transaction_with_config<F, T, E>(
        &self,
        callback: F,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        let span = self.intercept_transaction("TRANSACTION");

        let result = self
            .inner
            .transaction_with_config(callback, isolation_level, access_mode)
            .instrument(span.clone())
            .await;

        match &result {
            Ok(_) => {
                span.record("otel.status_code", "OK");
            }
            Err(e) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.message", format!("{e:?}").as_str());
            }
        }

        result
    }
}

/// Extension trait for easy wrapping of database connections.
pub trait TracingExt {
    /// Wrap this connection with interception and tracing.
    fn with_tracing(self) -> TracedConnection;

    /// Wrap this connection with a custom extraction configuration.
    fn with_tracing_config(self, config: TracingConfig) -> TracedConnection;
}

impl TracingExt for DatabaseConnection {
    fn with_tracing(self) -> TracedConnection {
        TracedConnection::wrap(self)
    }

    fn with_tracing_config(self, config: TracingConfig) -> TracedConnection {
        TracedConnection::new(self, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn mock_connection() -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres).into_connection()
    }

    #[test]
    fn wrap_derives_the_system_from_the_backend() {
        let traced = TracedConnection::wrap(mock_connection());
        assert_eq!(traced.db_info().system.as_deref(), Some("postgresql"));
    }

    #[test]
    fn with_db_info_keeps_the_derived_system() {
        let traced = TracedConnection::wrap(mock_connection())
            .with_db_info(DbInfo::new().with_user("app").with_name("orders_db"));

        assert_eq!(traced.db_info().system.as_deref(), Some("postgresql"));
        assert_eq!(traced.db_info().user.as_deref(), Some("app"));
    }

    #[test]
    fn with_db_info_respects_an_explicit_system() {
        let traced = TracedConnection::wrap(mock_connection())
            .with_db_info(DbInfo::new().with_system("cockroachdb"));

        assert_eq!(traced.db_info().system.as_deref(), Some("cockroachdb"));
    }

    #[test]
    fn values_convert_to_captured_forms() {
        assert_eq!(ParamValue::from(&Value::Int(Some(5))), ParamValue::Int(5));
        assert_eq!(
            ParamValue::from(&Value::String(Some(Box::new("abc".to_owned())))),
            ParamValue::Text("abc".into())
        );
        assert_eq!(
            ParamValue::from(&Value::Bool(Some(true))),
            ParamValue::Bool(true)
        );
        assert_eq!(ParamValue::from(&Value::Int(None)), ParamValue::Null);
    }
}
