//! The immutable request record assembled for each intercepted call.

use crate::extract::SqlClientRequest;
use crate::params::{CapturedParams, ParamStore};

/// Connection metadata, derived once per connection and supplied from the
/// outside. Every field is optional; absent fields are simply never
/// emitted. The connection string is expected pre-redacted to host/port
/// form; this crate does not parse or scrub connection URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbInfo {
    pub system: Option<String>,
    pub user: Option<String>,
    pub name: Option<String>,
    pub connection_string: Option<String>,
}

impl DbInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database system identifier (e.g. "postgresql").
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the user the connection authenticated as.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the logical database name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the redacted connection string (host/port only, no credentials).
    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }
}

/// Everything known about one logical database call, frozen at assembly
/// time. Constructed at most once per top-level interception; nested
/// re-entrant calls never produce a second request for the same operation.
#[derive(Debug, Clone, PartialEq)]
pub struct DbRequest {
    db_info: DbInfo,
    statement: Option<String>,
    params: CapturedParams,
}

impl DbRequest {
    pub fn new(db_info: DbInfo, statement: Option<String>, params: CapturedParams) -> Self {
        Self {
            db_info,
            statement,
            params,
        }
    }

    /// Assembles a request from resolved connection context, the raw
    /// statement, and a defensive snapshot of the parameters captured so
    /// far on this execution context.
    ///
    /// Returns `None` when the connection context could not be resolved
    /// (connection closed or otherwise unavailable). That is the signal to
    /// skip interception for this call, not a failure.
    pub fn assemble(db_info: Option<DbInfo>, statement: Option<String>) -> Option<Self> {
        Some(Self::new(db_info?, statement, ParamStore::snapshot()))
    }

    pub fn db_info(&self) -> &DbInfo {
        &self.db_info
    }

    pub fn statement(&self) -> Option<&str> {
        self.statement.as_deref()
    }

    pub fn params(&self) -> &CapturedParams {
        &self.params
    }
}

impl SqlClientRequest for DbRequest {
    fn system(&self) -> Option<&str> {
        self.db_info.system.as_deref()
    }

    fn user(&self) -> Option<&str> {
        self.db_info.user.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.db_info.name.as_deref()
    }

    fn connection_string(&self) -> Option<&str> {
        self.db_info.connection_string.as_deref()
    }

    fn raw_statement(&self) -> Option<&str> {
        self.statement.as_deref()
    }

    fn param_values(&self) -> Option<String> {
        self.params.render()
    }
}
