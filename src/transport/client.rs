use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

use super::{HttpMethod, HttpTransport, RequestBody, TransportRequest, TransportResponse};
use crate::config::ClientConfig;
use crate::errors::{TransportError, TransportErrorKind};
use crate::setup::{FileContent, NameValues};

/// Default transport backed by a pooled `reqwest::Client`.
///
/// gzip and deflate bodies are decompressed automatically and no cookie
/// store is attached, so the only cookies sent are the ones in the
/// request's `Cookie` header.
pub struct ReqwestTransport {
    pooled: RwLock<Pooled>,
}

struct Pooled {
    config: ClientConfig,
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let client = build_client(&config).map_err(|e| classify("", e))?;
        Ok(Self {
            pooled: RwLock::new(Pooled { config, client }),
        })
    }

    /// Transport configured from `RESTASSURED_*` environment variables.
    pub fn from_env() -> Result<Self, TransportError> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> ClientConfig {
        self.pooled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .config
            .clone()
    }

    fn client(&self) -> Client {
        // Client is reference counted internally; cloning shares the pool.
        self.pooled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .client
            .clone()
    }
}

fn build_client(config: &ClientConfig) -> reqwest::Result<Client> {
    let mut builder = Client::builder()
        .use_rustls_tls()
        .gzip(true)
        .deflate(true)
        .user_agent(config.user_agent.clone())
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .danger_accept_invalid_certs(config.accept_invalid_certs);

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }

    builder.build()
}

fn classify(url: &str, error: reqwest::Error) -> TransportError {
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_body() || error.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(url, kind, error.to_string())
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn multipart_form(
    url: &str,
    fields: Vec<(String, String)>,
    files: Vec<FileContent>,
) -> Result<Form, TransportError> {
    let mut form = Form::new();

    for (name, value) in fields {
        form = form.text(name, value);
    }

    for file in files {
        let part = Part::bytes(file.content)
            .file_name(file.file_name)
            .mime_str(&file.content_type)
            .map_err(|e| classify(url, e))?;
        form = form.part(file.field_name, part);
    }

    Ok(form)
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = request.url.to_string();
        let mut builder = self
            .client()
            .request(to_method(request.method), request.url.clone());

        for (name, value) in request.header_lines() {
            builder = builder.header(name, value);
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Text { content, content_type } => {
                let builder = builder.body(content);
                match content_type {
                    Some(content_type) => builder.header(CONTENT_TYPE, content_type),
                    None => builder,
                }
            }
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart { fields, files } => {
                builder.multipart(multipart_form(&url, fields, files)?)
            }
        };

        let response = builder.send().await.map_err(|e| classify(&url, e))?;
        let status = response.status().as_u16();
        let headers: NameValues = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(&url, e))?
            .to_vec();

        debug!(%url, status, bytes = body.len(), "transport call finished");

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }

    fn ensure_capacity(&self, connections: usize) {
        let current = self.config();
        if current.pool_max_idle_per_host >= connections {
            return;
        }

        let config = current.with_capacity(connections);
        match build_client(&config) {
            Ok(client) => {
                let mut pooled = self.pooled.write().unwrap_or_else(PoisonError::into_inner);
                *pooled = Pooled { config, client };
                debug!(connections, "transport pool resized for load run");
            }
            Err(e) => warn!(error = %e, connections, "could not resize transport pool, keeping current client"),
        }
    }
}
