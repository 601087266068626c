//! # Módulo de Setup
//!
//! `SetupContext` accumulates everything about one logical HTTP call:
//! target, path, headers, query, cookies, body or form fields or files,
//! timeout and the transport handle.
//!
//! Setters consume and return the context so calls chain:
//!
//! ```ignore
//! let setup = RestAssured::given()
//!     .name("list users")
//!     .host("api.example.com")
//!     .uri("/users")
//!     .header("Accept", "application/json")
//!     .query("page", "2");
//! ```
//!
//! Nothing is validated here; URL resolution happens when an action is
//! selected (`when().get(..)`).

mod content;
mod values;

pub use content::{FileContent, HeaderType};
pub use values::NameValues;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::action::HttpActionContext;
use crate::config::ClientConfig;
use crate::errors::{ConfigError, Error, Result};
use crate::transport::{HttpTransport, ReqwestTransport};

type TransportCell = Arc<OnceCell<Arc<dyn HttpTransport>>>;

#[derive(Clone, Default)]
pub struct SetupContext {
    name: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    use_https: bool,
    uri: Option<String>,
    body: Option<String>,
    headers: NameValues,
    queries: NameValues,
    cookies: NameValues,
    params: Vec<(String, String)>,
    files: Vec<FileContent>,
    timeout: Option<Duration>,
    // Shared between clones so they reuse the same (possibly lazy) client.
    transport: TransportCell,
}

impl SetupContext {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Target
    // ------------------------------------------------------------------------

    /// Diagnostic label carried into log fields.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Default scheme becomes `https://` for hosts and URLs given without one.
    pub fn use_https(mut self) -> Self {
        self.use_https = true;
        self
    }

    /// Path appended to the host when no explicit URL is given.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    // ------------------------------------------------------------------------
    // Body
    // ------------------------------------------------------------------------

    /// Raw body, stored verbatim. Last write wins.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Body serialized to JSON text. Last write wins.
    pub fn json_body<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let text = serde_json::to_string(body).map_err(|e| ConfigError::BodySerialization {
            reason: e.to_string(),
        })?;
        self.body = Some(text);
        Ok(self)
    }

    /// Form field. Any form field makes the request form-encoded and the raw
    /// body is dropped. A repeated key keeps its first value.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if !self.params.iter().any(|(existing, _)| *existing == key) {
            self.params.push((key, value.into()));
        }
        self
    }

    pub fn params<I, K, V>(self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        params
            .into_iter()
            .fold(self, |setup, (key, value)| setup.param(key, value))
    }

    /// File attachment. Any file forces multipart encoding.
    pub fn file(
        mut self,
        file_name: impl Into<String>,
        field_name: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        self.files
            .push(FileContent::new(file_name, field_name, content_type, content));
        self
    }

    // ------------------------------------------------------------------------
    // Headers, query, cookies
    // ------------------------------------------------------------------------

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(key, value);
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.extend(headers);
        self
    }

    /// Adds `Authorization: Basic base64(user:password)`.
    pub fn basic_auth(self, user: &str, password: &str) -> Self {
        let token = STANDARD.encode(format!("{}:{}", user, password));
        self.header("Authorization", format!("Basic {}", token))
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.queries.add(key, value);
        self
    }

    pub fn queries<I, K, V>(mut self, queries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.queries.extend(queries);
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.add(name, value);
        self
    }

    pub fn cookies<I, K, V>(mut self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.cookies.extend(cookies);
        self
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    /// Overrides the transport's default call timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Uses `transport` for every call made from this context and its clones
    /// made afterwards.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Arc::new(OnceCell::with_value(transport));
        self
    }

    /// The assigned transport, or a default `ReqwestTransport` built from
    /// the environment on first use.
    pub fn get_transport(&self) -> Result<Arc<dyn HttpTransport>> {
        self.transport
            .get_or_try_init(|| {
                let transport = ReqwestTransport::new(ClientConfig::from_env())?;
                debug!("default transport created");
                Ok::<_, Error>(Arc::new(transport) as Arc<dyn HttpTransport>)
            })
            .cloned()
    }

    // ------------------------------------------------------------------------
    // Hand-off
    // ------------------------------------------------------------------------

    /// Moves this setup into an `HttpActionContext`.
    pub fn when(self) -> HttpActionContext {
        HttpActionContext::new(self)
    }

    /// Logs the accumulated state at debug level.
    pub fn debug(self) -> Self {
        debug!(
            name = self.name.as_deref().unwrap_or_default(),
            host = self.host.as_deref().unwrap_or_default(),
            uri = self.uri.as_deref().unwrap_or_default(),
            body = self.body.as_deref().unwrap_or_default(),
            headers = %self.headers,
            queries = %self.queries,
            cookies = %self.cookies,
            params = ?self.params,
            files = self.files.len(),
            "setup context"
        );
        self
    }

    // ------------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------------

    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn get_host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn get_port(&self) -> Option<u16> {
        self.port
    }

    pub fn is_https(&self) -> bool {
        self.use_https
    }

    pub fn get_uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn get_body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn get_headers(&self) -> &NameValues {
        &self.headers
    }

    pub fn get_queries(&self) -> &NameValues {
        &self.queries
    }

    pub fn get_cookies(&self) -> &NameValues {
        &self.cookies
    }

    pub fn get_params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn get_files(&self) -> &[FileContent] {
        &self.files
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn header_content_type(&self) -> Vec<String> {
        self.header_values(HeaderType::ContentType)
    }

    pub fn header_accept(&self) -> Vec<String> {
        self.header_values(HeaderType::Accept)
    }

    pub fn header_accept_encoding(&self) -> Vec<String> {
        self.header_values(HeaderType::AcceptEncoding)
    }

    pub fn header_accept_charset(&self) -> Vec<String> {
        self.header_values(HeaderType::AcceptCharset)
    }

    /// Every header except the four routed ones.
    pub fn header_for_everything_else(&self) -> NameValues {
        self.headers.without(&HeaderType::names())
    }

    // Comma separated values are split so each one lands in the slot on its own.
    fn header_values(&self, header: HeaderType) -> Vec<String> {
        self.headers
            .get_all(header.as_str())
            .iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Debug for SetupContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupContext")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_https", &self.use_https)
            .field("uri", &self.uri)
            .field("body", &self.body)
            .field("headers", &self.headers)
            .field("queries", &self.queries)
            .field("cookies", &self.cookies)
            .field("params", &self.params)
            .field("files", &self.files.len())
            .field("timeout", &self.timeout)
            .field("transport", &self.transport.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TransportRequest, TransportResponse};
    use crate::errors::TransportError;
    use async_trait::async_trait;
    use serde_json::json;

    struct NullTransport;

    #[async_trait]
    impl HttpTransport for NullTransport {
        async fn send(&self, _request: TransportRequest) -> std::result::Result<TransportResponse, TransportError> {
            Ok(TransportResponse {
                status: 204,
                headers: NameValues::new(),
                body: Vec::new(),
            })
        }
    }

    #[test]
    fn test_headers_accumulate() {
        let setup = SetupContext::new()
            .header("X-Tag", "a")
            .header("x-tag", "b")
            .headers(vec![("X-Other", "c")]);

        assert_eq!(setup.get_headers().get_all("X-TAG"), &["a".to_string(), "b".to_string()]);
        assert_eq!(setup.get_headers().len(), 3);
    }

    #[test]
    fn test_reserved_header_routing() {
        let setup = SetupContext::new()
            .header("Content-Type", "application/json")
            .header("accept", "application/json, text/xml")
            .header("Accept-Encoding", "gzip")
            .header("Accept-Charset", "utf-8")
            .header("Authorization", "Bearer t");

        assert_eq!(setup.header_content_type(), vec!["application/json"]);
        assert_eq!(setup.header_accept(), vec!["application/json", "text/xml"]);
        assert_eq!(setup.header_accept_encoding(), vec!["gzip"]);
        assert_eq!(setup.header_accept_charset(), vec!["utf-8"]);

        let rest = setup.header_for_everything_else();
        assert_eq!(rest.keys().collect::<Vec<_>>(), vec!["Authorization"]);
    }

    #[test]
    fn test_body_last_write_wins() {
        let setup = SetupContext::new()
            .body("raw")
            .json_body(&json!({"id": 1}))
            .unwrap();
        assert_eq!(setup.get_body(), Some(r#"{"id":1}"#));

        let setup = setup.body("again");
        assert_eq!(setup.get_body(), Some("again"));
    }

    #[test]
    fn test_param_keeps_first_value() {
        let setup = SetupContext::new()
            .param("a", "1")
            .param("a", "2")
            .params(vec![("b", "3")]);
        assert_eq!(
            setup.get_params(),
            &[("a".to_string(), "1".to_string()), ("b".to_string(), "3".to_string())]
        );
    }

    #[test]
    fn test_basic_auth_header() {
        let setup = SetupContext::new().basic_auth("user", "pass");
        assert_eq!(
            setup.get_headers().get_joined("authorization").as_deref(),
            Some("Basic dXNlcjpwYXNz")
        );
    }

    #[test]
    fn test_clone_is_deep_but_shares_transport() {
        let transport: Arc<dyn HttpTransport> = Arc::new(NullTransport);
        let original = SetupContext::new()
            .host("api.test")
            .query("a", "1")
            .transport(Arc::clone(&transport));

        let copy = original.clone().query("b", "2");

        assert_eq!(original.get_queries().len(), 1);
        assert_eq!(copy.get_queries().len(), 2);
        assert!(Arc::ptr_eq(
            &original.get_transport().unwrap(),
            &copy.get_transport().unwrap()
        ));
    }

    #[test]
    fn test_lazy_transport_is_created_once_and_shared_by_clones() {
        let original = SetupContext::new();
        let copy = original.clone();

        let first = original.get_transport().unwrap();
        let second = copy.get_transport().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
