//! Configuration for attribute extraction.

use std::borrow::Cow;

use crate::semconv;

/// Options recognized by the attribute extractor.
///
/// # Example
///
/// ```rust
/// use sql_client_tracing::TracingConfig;
///
/// let config = TracingConfig::default()
///     .with_parameter_capture(true)
///     .with_table_attribute_key("db.collection.name");
/// ```
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Whether captured bind-parameter values are included in the
    /// attribute set.
    /// Default: `false` (parameters may contain sensitive data)
    pub capture_parameters: bool,

    /// The attribute key the primary table is written under.
    /// Default: `db.sql.table`
    pub table_attribute_key: Cow<'static, str>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            capture_parameters: false,
            table_attribute_key: Cow::Borrowed(semconv::DB_SQL_TABLE),
        }
    }
}

impl TracingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable parameter-value capture.
    ///
    /// **Security Warning**: bound parameters often contain user input and
    /// potentially sensitive data. Only enable in development or controlled
    /// environments.
    pub fn with_parameter_capture(mut self, enabled: bool) -> Self {
        self.capture_parameters = enabled;
        self
    }

    /// Set the semantic key the primary-table attribute is written under.
    pub fn with_table_attribute_key(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.table_attribute_key = key.into();
        self
    }
}
