//! # Módulo de Resposta
//!
//! `ResponseContext` wraps one completed call: status, headers, body,
//! elapsed time and, in load mode, every call result of the run.
//!
//! The body is parsed once, on construction. Checks are registered by name
//! and evaluated immediately, but a failing check only surfaces when the
//! caller asks for it:
//!
//! ```ignore
//! let response = execution.then().await?
//!     .test_status("is ok", |status| status == 200)?
//!     .test_body("has id", |body| body["id"] == 7)?
//!     .schema(SCHEMA)?;
//!
//! response.assert_all(true)?;
//! ```

mod ledger;
mod load_stats;
mod parsers;
mod path;

pub use ledger::{AssertionLedger, Verdict};
pub use load_stats::{LoadResponse, LoadStatistics, LoadValueType, LOST_STATUS};
pub use parsers::{xml_to_value, ParseFn, ParserRegistry};

use chrono::{DateTime, Utc};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::{AssertionError, ConfigError, Result};
use crate::setup::{HeaderType, NameValues};

static NULL_BODY: Value = Value::Null;

/// Raw material for a `ResponseContext`.
#[derive(Debug, Clone, Default)]
pub struct ResponseParts {
    pub status: u16,
    pub headers: NameValues,
    pub body: Vec<u8>,
    pub elapsed: Duration,
    pub load_responses: Vec<LoadResponse>,
}

#[derive(Debug, Clone)]
pub struct ResponseContext {
    status: u16,
    headers: NameValues,
    body: String,
    elapsed: Duration,
    parsed: Option<Value>,
    load_responses: Vec<LoadResponse>,
    load_statistics: Option<LoadStatistics>,
    ledger: AssertionLedger,
    schema_valid: bool,
    schema_errors: Vec<String>,
    received_at: DateTime<Utc>,
}

impl ResponseContext {
    /// Builds the outcome with the process-wide parser registry.
    pub fn new(parts: ResponseParts) -> Result<Self> {
        Self::from_parts(parts, &ParserRegistry::global())
    }

    /// Parses the body with `parsers` and reduces the load results.
    /// A non-empty body of an unknown content type is a configuration error.
    pub fn from_parts(parts: ResponseParts, parsers: &ParserRegistry) -> Result<Self> {
        let body = String::from_utf8_lossy(&parts.body).into_owned();
        let content_type = parts
            .headers
            .get_joined(HeaderType::ContentType.as_str())
            .unwrap_or_default();

        let parsed = parsers.parse(&content_type, &body)?;
        let load_statistics = LoadStatistics::compute(&parts.load_responses);

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
            elapsed: parts.elapsed,
            parsed,
            load_responses: parts.load_responses,
            load_statistics,
            ledger: AssertionLedger::new(),
            schema_valid: true,
            schema_errors: Vec::new(),
            received_at: Utc::now(),
        })
    }

    // ------------------------------------------------------------------------
    // Named checks
    // ------------------------------------------------------------------------

    /// Check against the parsed body (`Value::Null` when the body was empty).
    pub fn test_body<V, F>(mut self, name: &str, check: F) -> Result<Self>
    where
        V: Verdict,
        F: FnOnce(&Value) -> V,
    {
        let body = self.parsed.as_ref().unwrap_or(&NULL_BODY);
        self.ledger.record(name, || check(body))?;
        Ok(self)
    }

    /// Check against a header's values joined by ", " (empty when absent).
    pub fn test_header<V, F>(mut self, name: &str, key: &str, check: F) -> Result<Self>
    where
        V: Verdict,
        F: FnOnce(&str) -> V,
    {
        let value = self.header(key.trim()).unwrap_or_default();
        self.ledger.record(name, || check(&value))?;
        Ok(self)
    }

    pub fn test_status<V, F>(mut self, name: &str, check: F) -> Result<Self>
    where
        V: Verdict,
        F: FnOnce(u16) -> V,
    {
        let status = self.status;
        self.ledger.record(name, || check(status))?;
        Ok(self)
    }

    /// Check against the elapsed time of the primary call, in milliseconds.
    pub fn test_elapsed_time<V, F>(mut self, name: &str, check: F) -> Result<Self>
    where
        V: Verdict,
        F: FnOnce(f64) -> V,
    {
        let millis = self.elapsed_ms();
        self.ledger.record(name, || check(millis))?;
        Ok(self)
    }

    /// Check against one load statistic (`"Average-TTL-Ms"`, ...). Reads `0.0`
    /// without a load run or for an unknown key.
    pub fn test_load<V, F>(mut self, name: &str, key: &str, check: F) -> Result<Self>
    where
        V: Verdict,
        F: FnOnce(f64) -> V,
    {
        let value = self.load_value(key);
        self.ledger.record(name, || check(value))?;
        Ok(self)
    }

    // ------------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------------

    /// Validates the body against `schema`. Never fails on a non-conforming
    /// body; that is reported by `assert_schema`. A malformed schema fails
    /// right away.
    pub fn schema(mut self, schema: &str) -> Result<Self> {
        let schema: Value = serde_json::from_str(schema).map_err(|e| ConfigError::InvalidSchema {
            reason: e.to_string(),
        })?;
        let compiled = JSONSchema::compile(&schema).map_err(|e| ConfigError::InvalidSchema {
            reason: e.to_string(),
        })?;

        let errors = match self.json_document() {
            Ok(document) => schema_violations(&compiled, &document),
            Err(reason) => vec![reason],
        };

        self.schema_valid = errors.is_empty();
        self.schema_errors = errors;
        debug!(valid = self.schema_valid, errors = self.schema_errors.len(), "schema validated");
        Ok(self)
    }

    // Only documents starting with '{' or '[' are validated.
    fn json_document(&self) -> std::result::Result<Value, String> {
        let trimmed = self.body.trim_start();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return Err("body is not a JSON object or array".to_string());
        }
        serde_json::from_str(trimmed).map_err(|e| format!("body is not valid JSON: {}", e))
    }

    // ------------------------------------------------------------------------
    // Asserts
    // ------------------------------------------------------------------------

    /// Fails if `name` was registered and did not pass. Unknown names pass.
    pub fn assert(&self, name: &str) -> Result<&Self> {
        match self.ledger.get(name) {
            Some(false) => Err(AssertionError::Failed {
                name: name.to_string(),
            }
            .into()),
            _ => Ok(self),
        }
    }

    /// Fails if the last `schema(..)` call found the body invalid.
    pub fn assert_schema(&self) -> Result<()> {
        if self.schema_valid {
            Ok(())
        } else {
            Err(AssertionError::Schema {
                errors: self.schema_errors.clone(),
            }
            .into())
        }
    }

    /// Fails on the first failed check in registration order, then on the
    /// schema when `include_schema` is set.
    pub fn assert_all(&self, include_schema: bool) -> Result<()> {
        if let Some(name) = self.ledger.first_failure() {
            return Err(AssertionError::Failed {
                name: name.to_string(),
            }
            .into());
        }

        if include_schema {
            self.assert_schema()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------------

    /// Runs `accessor` over the parsed body. A panic or a miss gives `None`.
    pub fn retrieve<R, F>(&self, accessor: F) -> Option<R>
    where
        F: FnOnce(&Value) -> Option<R>,
    {
        let body = self.parsed.as_ref().unwrap_or(&NULL_BODY);
        panic::catch_unwind(AssertUnwindSafe(|| accessor(body)))
            .ok()
            .flatten()
    }

    /// Value at `path` (`$.products[1].name`), `None` if any segment is missing.
    pub fn retrieve_path(&self, path: &str) -> Option<Value> {
        self.parsed.as_ref().and_then(|body| path::navigate(body, path))
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    pub fn debug(self) -> Self {
        debug!(
            status = self.status,
            duration_ms = self.elapsed_ms(),
            headers = %self.headers,
            body = %self.body,
            "response context"
        );
        for (name, passed) in self.ledger.iter() {
            debug!(rule = name, passed, "assertion");
        }
        for error in &self.schema_errors {
            debug!(error = %error, "schema error");
        }
        if let Some(stats) = &self.load_statistics {
            for (kind, amount) in stats.entries() {
                debug!(key = kind.key(), value = amount, "{}", kind.display_name());
            }
        }
        self
    }

    /// One event per check (info when passed, warn when failed), one for the
    /// schema and, after a load run, one carrying the statistics report.
    pub fn write_assertions(self) -> Self {
        for (name, passed) in self.ledger.iter() {
            if passed {
                info!(rule = name, "passed");
            } else {
                warn!(rule = name, "failed");
            }
        }

        if self.schema_valid {
            info!("schema validation passed");
        } else {
            warn!(errors = ?self.schema_errors, "schema validation failed");
        }

        if let Some(stats) = &self.load_statistics {
            info!(statistics = %stats.to_json(), "load statistics");
        }
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn headers(&self) -> &NameValues {
        &self.headers
    }

    /// Values of `key` (case-insensitive) joined by ", ".
    pub fn header(&self, key: &str) -> Option<String> {
        self.headers.get_joined(key)
    }

    pub fn content_type(&self) -> Option<String> {
        self.header(HeaderType::ContentType.as_str())
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1_000.0
    }

    pub fn parsed_body(&self) -> Option<&Value> {
        self.parsed.as_ref()
    }

    pub fn load_responses(&self) -> &[LoadResponse] {
        &self.load_responses
    }

    pub fn load_statistics(&self) -> Option<&LoadStatistics> {
        self.load_statistics.as_ref()
    }

    pub fn load_value(&self, key: &str) -> f64 {
        self.load_statistics
            .as_ref()
            .map_or(0.0, |stats| stats.value(key))
    }

    pub fn is_schema_valid(&self) -> bool {
        self.schema_valid
    }

    pub fn schema_errors(&self) -> &[String] {
        &self.schema_errors
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn assertions(&self) -> &AssertionLedger {
        &self.ledger
    }
}

fn schema_violations(schema: &JSONSchema, document: &Value) -> Vec<String> {
    match schema.validate(document) {
        Ok(()) => Vec::new(),
        Err(errors) => errors.map(|e| describe_schema_error(&e)).collect(),
    }
}

fn describe_schema_error(error: &jsonschema::ValidationError<'_>) -> String {
    let path = error.instance_path.to_string();
    if path.is_empty() {
        error.to_string()
    } else {
        format!("{}: {}", path, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use serde_json::json;

    const PRODUCT_SCHEMA: &str = r#"{
        "type": "object",
        "required": ["id", "name"],
        "properties": {
            "id": {"type": "integer"},
            "name": {"type": "string"}
        }
    }"#;

    fn json_response(status: u16, body: &str) -> ResponseContext {
        let mut headers = NameValues::new();
        headers.add("Content-Type", "application/json; charset=utf-8");
        headers.add("X-Request-Id", "a1");
        headers.add("x-request-id", "b2");

        ResponseContext::from_parts(
            ResponseParts {
                status,
                headers,
                body: body.as_bytes().to_vec(),
                elapsed: Duration::from_millis(120),
                load_responses: Vec::new(),
            },
            &ParserRegistry::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_registration_never_fails_assert_does() {
        let response = json_response(200, r#"{"id": 7, "name": "pen"}"#)
            .test_status("is ok", |status| status == 200)
            .unwrap()
            .test_body("wrong name", |body| body["name"] == "ink")
            .unwrap();

        assert!(response.assert("is ok").is_ok());

        let err = response.assert("wrong name").unwrap_err();
        assert!(matches!(err, Error::Assertion(AssertionError::Failed { ref name }) if name == "wrong name"));
        assert_eq!(err.to_string(), "(wrong name) Test Failed");
    }

    #[test]
    fn test_unknown_name_is_noop() {
        let response = json_response(200, "{}");
        assert!(response.assert("never registered").is_ok());
    }

    #[test]
    fn test_duplicate_name_fails_immediately() {
        let err = json_response(200, "{}")
            .test_status("same", |_| true)
            .unwrap()
            .test_elapsed_time("same", |_| true)
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::DuplicateAssertion { .. })));
    }

    #[test]
    fn test_predicate_failure_is_recorded_false() {
        let response = json_response(200, r#"{"items": []}"#)
            .test_body("index out of range", |body| {
                body["items"].as_array().unwrap()[3] == 1
            })
            .unwrap()
            .test_body("missing field", |body| body["nope"]["deeper"].as_i64().map(|v| v > 0))
            .unwrap();

        assert_eq!(response.assertions().get("index out of range"), Some(false));
        assert_eq!(response.assertions().get("missing field"), Some(false));
    }

    #[test]
    fn test_assert_all_reports_first_failure_in_order() {
        let response = json_response(201, r#"{"id": 7}"#)
            .test_status("created", |status| status == 201)
            .unwrap()
            .test_body("has name", |body| body.get("name").is_some())
            .unwrap()
            .test_elapsed_time("fast", |ms| ms < 1.0)
            .unwrap();

        let err = response.assert_all(false).unwrap_err();
        assert_eq!(err.to_string(), "(has name) Test Failed");

        let passing = json_response(200, "{}").test_status("ok", |s| s == 200).unwrap();
        assert!(passing.assert_all(true).is_ok());
    }

    #[test]
    fn test_header_checks_are_case_insensitive_and_joined() {
        let response = json_response(200, "{}")
            .test_header("joined", "X-REQUEST-ID", |value| value == "a1, b2")
            .unwrap()
            .test_header("absent", "X-Missing", |value| value.is_empty())
            .unwrap();

        assert!(response.assert_all(false).is_ok());
        assert_eq!(response.header("x-request-id").as_deref(), Some("a1, b2"));
    }

    #[test]
    fn test_elapsed_time_in_milliseconds() {
        let response = json_response(200, "{}")
            .test_elapsed_time("took 120ms", |ms| (ms - 120.0).abs() < f64::EPSILON)
            .unwrap();
        assert!(response.assert("took 120ms").is_ok());
    }

    #[test]
    fn test_schema_valid_document() {
        let response = json_response(200, r#"{"id": 7, "name": "pen"}"#)
            .schema(PRODUCT_SCHEMA)
            .unwrap();

        assert!(response.is_schema_valid());
        assert!(response.schema_errors().is_empty());
        assert!(response.assert_schema().is_ok());
    }

    #[test]
    fn test_schema_invalid_document() {
        let response = json_response(200, r#"{"id": "seven"}"#)
            .schema(PRODUCT_SCHEMA)
            .unwrap();

        assert!(!response.is_schema_valid());
        assert!(!response.schema_errors().is_empty());

        let err = response.assert_schema().unwrap_err();
        assert_eq!(err.to_string(), "Schema Check Failed");

        // Skipping the schema leaves only the named checks.
        assert!(response.assert_all(false).is_ok());
        assert!(response.assert_all(true).is_err());
    }

    #[test]
    fn test_schema_over_array_body() {
        let schema = r#"{"type": "array", "items": {"type": "integer"}}"#;
        let response = json_response(200, "[1, 2, 3]").schema(schema).unwrap();
        assert!(response.is_schema_valid());
    }

    #[test]
    fn test_malformed_schema_is_config_error() {
        let err = json_response(200, "{}").schema("{not a schema").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidSchema { .. })));

        let err = json_response(200, "{}")
            .schema(r#"{"type": 12}"#)
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_retrieve_is_null_safe() {
        let response = json_response(200, r#"{"products": [{"name": "a"}, {"name": "b"}]}"#);

        let name = response.retrieve(|body| body["products"][1]["name"].as_str().map(str::to_string));
        assert_eq!(name.as_deref(), Some("b"));

        let missing: Option<i64> = response.retrieve(|body| body["products"][9]["id"].as_i64());
        assert_eq!(missing, None);

        let panicked: Option<i64> = response.retrieve(|_| panic!("boom"));
        assert_eq!(panicked, None);

        assert_eq!(response.retrieve_path("$.products[0].name"), Some(json!("a")));
        assert_eq!(response.retrieve_path("$.products[4].name"), None);
    }

    #[test]
    fn test_empty_body_is_absent() {
        let response = ResponseContext::from_parts(
            ResponseParts {
                status: 204,
                ..ResponseParts::default()
            },
            &ParserRegistry::new(),
        )
        .unwrap();

        assert!(response.parsed_body().is_none());
        assert!(response.retrieve_path("$.id").is_none());
    }

    #[test]
    fn test_unsupported_content_type_fails_construction() {
        let mut headers = NameValues::new();
        headers.add("Content-Type", "text/html");

        let err = ResponseContext::from_parts(
            ResponseParts {
                status: 200,
                headers,
                body: b"<html></html>".to_vec(),
                ..ResponseParts::default()
            },
            &ParserRegistry::new(),
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "(text/html) not supported");
    }

    #[test]
    fn test_xml_body_is_navigable() {
        let mut headers = NameValues::new();
        headers.add("Content-Type", "application/xml");

        let response = ResponseContext::from_parts(
            ResponseParts {
                status: 200,
                headers,
                body: br#"<user id="3"><name>Ana</name></user>"#.to_vec(),
                ..ResponseParts::default()
            },
            &ParserRegistry::new(),
        )
        .unwrap()
        .test_body("xml name", |body| body["user"]["name"] == "Ana")
        .unwrap();

        assert!(response.assert("xml name").is_ok());
        assert_eq!(response.retrieve_path("user.@id"), Some(json!("3")));
    }

    #[test]
    fn test_injected_parser_registry() {
        let registry = ParserRegistry::new();
        registry.register("csv", |body: &str| {
            Ok(Value::Array(body.lines().map(|line| json!(line)).collect()))
        });

        let mut headers = NameValues::new();
        headers.add("Content-Type", "text/csv");

        let response = ResponseContext::from_parts(
            ResponseParts {
                status: 200,
                headers,
                body: b"a\nb".to_vec(),
                ..ResponseParts::default()
            },
            &registry,
        )
        .unwrap();

        assert_eq!(response.parsed_body(), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_load_values() {
        let response = ResponseContext::from_parts(
            ResponseParts {
                status: 200,
                load_responses: vec![
                    LoadResponse::new(200, 10_000),
                    LoadResponse::new(200, 30_000),
                    LoadResponse::lost(),
                ],
                ..ResponseParts::default()
            },
            &ParserRegistry::new(),
        )
        .unwrap()
        .test_load("all calls", "total-call", |total| total == 3.0)
        .unwrap()
        .test_load("avg", "Average-TTL-Ms", |avg| avg == 20.0)
        .unwrap();

        assert!(response.assert_all(false).is_ok());
        assert_eq!(response.load_value("Total-Lost"), 1.0);
        assert_eq!(response.load_responses().len(), 3);
    }

    #[test]
    fn test_no_load_run_reads_zero() {
        let response = json_response(200, "{}");
        assert!(response.load_statistics().is_none());
        assert_eq!(response.load_value("Total-Call"), 0.0);
    }
}
