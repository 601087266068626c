// Module: Transport
// Boundary between `ExecutionContext` and the HTTP client doing the actual I/O.

pub mod client;

use async_trait::async_trait;
use reqwest::Url;
use std::fmt;
use std::time::Duration;

use crate::errors::TransportError;
use crate::setup::{FileContent, NameValues};

pub use self::client::ReqwestTransport;

/// HTTP methods a request can be dispatched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// GET never carries a body.
    pub fn allows_body(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body selected for the wire request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Raw string typed with the first declared Content-Type.
    Text {
        content: String,
        content_type: Option<String>,
    },
    /// application/x-www-form-urlencoded fields.
    Form(Vec<(String, String)>),
    /// multipart/form-data with form fields carried as text parts.
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<FileContent>,
    },
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Fully resolved request handed to a transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub accept: Vec<String>,
    pub accept_encoding: Vec<String>,
    pub accept_charset: Vec<String>,
    /// Every other header, verbatim, repeats preserved.
    pub headers: NameValues,
    /// Single `Cookie` header value built from the cookie pairs.
    pub cookie: Option<String>,
    pub body: RequestBody,
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            accept: Vec::new(),
            accept_encoding: Vec::new(),
            accept_charset: Vec::new(),
            headers: NameValues::new(),
            cookie: None,
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    /// Header lines in send order: the routed slots first (joined by ", "),
    /// then the remaining headers one line per value, then `Cookie`.
    /// Content-Type is not included; it travels with the body.
    pub fn header_lines(&self) -> Vec<(String, String)> {
        let mut lines = Vec::new();

        let slots = [
            ("Accept", &self.accept),
            ("Accept-Encoding", &self.accept_encoding),
            ("Accept-Charset", &self.accept_charset),
        ];
        for (name, values) in slots {
            if !values.is_empty() {
                lines.push((name.to_string(), values.join(", ")));
            }
        }

        for (name, value) in self.headers.iter() {
            lines.push((name.to_string(), value.to_string()));
        }

        if let Some(cookie) = &self.cookie {
            lines.push(("Cookie".to_string(), cookie.clone()));
        }

        lines
    }
}

/// What came back from the wire.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: NameValues,
    pub body: Vec<u8>,
}

/// Contract for any HTTP client `ExecutionContext` can drive.
///
/// Implementations must decompress gzip/deflate bodies and must not manage
/// cookies themselves: cookies always arrive as an explicit header.
///
/// Requer Send + Sync porque o mesmo transporte é compartilhado entre
/// todos os workers de um teste de carga.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;

    /// Called before a load run so the transport keeps at least
    /// `connections` concurrent connections available.
    fn ensure_capacity(&self, _connections: usize) {}
}
