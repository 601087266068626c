//! # Módulo de Execução
//!
//! `ExecutionContext` turns a setup context plus a selected action into
//! exactly one `ResponseContext`.
//!
//! - Single call: build the request, send it, time it, wrap it. Transport
//!   failures are returned as errors, never as assertion results.
//! - Load mode: run the load first (see [`load`]), then issue one more call
//!   whose response carries the load results.

mod load;
mod request;

use reqwest::Url;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

use crate::action::LoadSettings;
use crate::errors::Result;
use crate::response::{LoadResponse, ParserRegistry, ResponseContext, ResponseParts};
use crate::setup::SetupContext;
use crate::transport::{HttpMethod, HttpTransport, TransportRequest};

#[derive(Debug)]
pub struct ExecutionContext {
    setup: SetupContext,
    method: HttpMethod,
    url: Url,
    load: Option<LoadSettings>,
    parsers: Option<Arc<ParserRegistry>>,
}

impl ExecutionContext {
    pub fn new(setup: SetupContext, method: HttpMethod, url: Url, load: Option<LoadSettings>) -> Self {
        Self {
            setup,
            method,
            url,
            load,
            parsers: None,
        }
    }

    /// Parser registry used to build the response instead of the global one.
    pub fn with_parsers(mut self, parsers: Arc<ParserRegistry>) -> Self {
        self.parsers = Some(parsers);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Resolved URL, before the query pairs are merged in.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn load_settings(&self) -> Option<LoadSettings> {
        self.load
    }

    pub fn setup(&self) -> &SetupContext {
        &self.setup
    }

    /// The wire request `then()` would send, built without sending it.
    pub fn request(&self) -> Result<TransportRequest> {
        request::build_request(&self.setup, self.method, &self.url)
    }

    pub fn debug(self) -> Self {
        debug!(
            method = %self.method,
            url = %self.url,
            load = ?self.load,
            custom_parsers = self.parsers.is_some(),
            "execution context"
        );
        self
    }

    /// Dispatches the call (after the load run, when one was requested) and
    /// wraps the primary response.
    #[tracing::instrument(
        name = "dispatch",
        skip(self),
        fields(
            test_name = self.setup.get_name().unwrap_or_default(),
            method = %self.method,
            url = %self.url,
        )
    )]
    pub async fn then(self) -> Result<ResponseContext> {
        let request = self.request()?;
        let transport = self.setup.get_transport()?;

        let load_responses = match self.load {
            Some(settings) => self.run_load(&transport, &request, settings).await,
            None => Vec::new(),
        };

        let parts = send_primary(transport.as_ref(), request, load_responses).await?;

        let parsers = self.parsers.unwrap_or_else(ParserRegistry::global);
        ResponseContext::from_parts(parts, &parsers)
    }

    async fn run_load(
        &self,
        transport: &Arc<dyn HttpTransport>,
        request: &TransportRequest,
        settings: LoadSettings,
    ) -> Vec<LoadResponse> {
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            threads = settings.threads(),
            seconds = settings.duration().as_secs_f64(),
            "load run started"
        );

        load::run_load(Arc::clone(transport), request.clone(), settings)
            .instrument(tracing::info_span!("load_run", %run_id))
            .await
    }
}

async fn send_primary(
    transport: &dyn HttpTransport,
    request: TransportRequest,
    load_responses: Vec<LoadResponse>,
) -> Result<ResponseParts> {
    let started = Instant::now();
    let response = transport.send(request).await?;
    let elapsed = started.elapsed();

    info!(
        status = response.status,
        duration_ms = elapsed.as_millis() as u64,
        bytes = response.body.len(),
        "call completed"
    );

    Ok(ResponseParts {
        status: response.status,
        headers: response.headers,
        body: response.body,
        elapsed,
        load_responses,
    })
}
