//! Mapping of a request record into the canonical telemetry attribute set.

use std::borrow::Cow;

use crate::config::TracingConfig;
use crate::sanitizer::{sanitize, SqlOperation};
use crate::semconv;

/// Capability interface a database-client adapter implements so the
/// extractor can read request fields without depending on concrete client
/// types.
///
/// Every method defaults to `None`; an adapter implements only what its
/// client can actually supply. `param_values` returns the already-rendered
/// positional list (see [`CapturedParams::render`]), or `None` when nothing
/// was captured.
///
/// [`CapturedParams::render`]: crate::CapturedParams::render
pub trait SqlClientRequest {
    fn system(&self) -> Option<&str> {
        None
    }

    fn user(&self) -> Option<&str> {
        None
    }

    fn name(&self) -> Option<&str> {
        None
    }

    fn connection_string(&self) -> Option<&str> {
        None
    }

    fn raw_statement(&self) -> Option<&str> {
        None
    }

    fn param_values(&self) -> Option<String> {
        None
    }
}

/// Insertion-ordered set of telemetry attributes. Built once per request
/// and handed off; never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet(Vec<(Cow<'static, str>, String)>);

impl AttributeSet {
    fn set(&mut self, key: impl Into<Cow<'static, str>>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builds the attribute set for a SQL client request.
///
/// Each extraction step is independent: a source that cannot supply one
/// attribute never prevents the others from being emitted, and absent
/// fields are omitted outright rather than recorded as empty placeholders.
#[derive(Debug, Clone, Default)]
pub struct SqlClientAttributesExtractor {
    config: TracingConfig,
}

impl SqlClientAttributesExtractor {
    pub fn new(config: TracingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TracingConfig {
        &self.config
    }

    pub fn extract<R: SqlClientRequest>(&self, request: &R) -> AttributeSet {
        let mut attributes = AttributeSet::default();

        if let Some(system) = request.system() {
            attributes.set(semconv::DB_SYSTEM, system);
        }
        if let Some(user) = request.user() {
            attributes.set(semconv::DB_USER, user);
        }
        if let Some(name) = request.name() {
            attributes.set(semconv::DB_NAME, name);
        }
        if let Some(connection_string) = request.connection_string() {
            attributes.set(semconv::DB_CONNECTION_STRING, connection_string);
        }

        let sanitized = sanitize(request.raw_statement());
        if request.raw_statement().is_some() {
            attributes.set(semconv::DB_STATEMENT, sanitized.statement);
            attributes.set(semconv::DB_OPERATION, sanitized.operation.as_str());
        }

        if self.config.capture_parameters {
            if let Some(values) = request.param_values() {
                if !values.is_empty() {
                    attributes.set(semconv::DB_STATEMENT_VALUES, values);
                }
            }
        }

        // A procedure name is not a table, so CALL suppresses the table
        // attribute even when an identifier slipped through extraction.
        if sanitized.operation != SqlOperation::Call {
            if let Some(table) = sanitized.main_table {
                attributes.set(self.config.table_attribute_key.clone(), table);
            }
        }

        attributes
    }
}
