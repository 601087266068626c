//! # Módulo de Telemetria
//!
//! Liga os eventos `tracing` da biblioteca a um destino: console e,
//! opcionalmente, um coletor OpenTelemetry (OTLP/gRPC).
//!
//! ## Para todos entenderem:
//!
//! A biblioteca sempre emite eventos (`debug!`, `info!`, ...) e spans
//! (`dispatch`, `load_run`). Sem um subscriber instalado, eles somem.
//! `init_telemetry` instala um:
//!
//! ```text
//! tracing ──► EnvFilter ──► fmt (console, compacto)
//!                       └─► OpenTelemetryLayer ──► OTLP (Jaeger, Tempo, ...)
//! ```
//!
//! Pode ser chamada em todo teste: só a primeira chamada instala algo.
//!
//! ## Configuração via variáveis de ambiente:
//!
//! | Variável                       | Padrão        |
//! |--------------------------------|---------------|
//! | `OTEL_SERVICE_NAME`            | `restassured` |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT`  | (sem OTLP)    |
//! | `OTEL_TRACES_SAMPLER_ARG`      | `1.0`         |
//! | `RESTASSURED_LOG`              | `info`        |
//!
//! ```ignore
//! #[tokio::test]
//! async fn lists_users() {
//!     telemetry::init_telemetry(TelemetryConfig::from_env()).ok();
//!     // ...
//! }
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::runtime::Tokio;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{trace as sdktrace, Resource};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Configuração do subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Nome do serviço nos traces exportados.
    pub service_name: String,

    /// Coletor OTLP (ex: "http://localhost:4317"). `None` = só console.
    pub otlp_endpoint: Option<String>,

    /// Taxa de sampling entre 0.0 e 1.0.
    pub sampling_ratio: f64,

    pub enable_console_logging: bool,

    /// Diretiva do `EnvFilter` (ex: "restassured=debug").
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "restassured".to_string(),
            otlp_endpoint: None,
            sampling_ratio: 1.0,
            enable_console_logging: true,
            log_filter: "info".to_string(),
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Mesma regra de `from_env`, com uma fonte de valores injetável.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup("OTEL_SERVICE_NAME").filter(|v| !v.trim().is_empty()) {
            config.service_name = name;
        }

        if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.trim().is_empty()) {
            config.otlp_endpoint = Some(endpoint);
        }

        if let Some(ratio) = lookup("OTEL_TRACES_SAMPLER_ARG").and_then(|v| v.parse::<f64>().ok()) {
            config.sampling_ratio = ratio.clamp(0.0, 1.0);
        }

        if let Some(filter) = lookup("RESTASSURED_LOG").filter(|v| !v.trim().is_empty()) {
            config.log_filter = filter;
        }

        config
    }
}

/// Instala o subscriber global.
///
/// Retorna `Ok(true)` quando esta chamada instalou o subscriber e
/// `Ok(false)` quando já havia um (desta função ou de outro código).
/// Com OTLP configurado, precisa rodar dentro de um runtime Tokio.
pub fn init_telemetry(config: TelemetryConfig) -> anyhow::Result<bool> {
    if INSTALLED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(false);
    }

    match install(&config) {
        Ok(installed) => {
            if !installed {
                INSTALLED.store(false, Ordering::SeqCst);
            }
            Ok(installed)
        }
        Err(e) => {
            INSTALLED.store(false, Ordering::SeqCst);
            Err(e)
        }
    }
}

fn install(config: &TelemetryConfig) -> anyhow::Result<bool> {
    let env_filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let otel_layer = match &config.otlp_endpoint {
        Some(endpoint) => Some(OpenTelemetryLayer::new(init_otlp_tracer(
            &config.service_name,
            endpoint,
            config.sampling_ratio,
        )?)),
        None => None,
    };

    let console_layer = config
        .enable_console_logging
        .then(|| tracing_subscriber::fmt::layer().compact());

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(console_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            service_name = %config.service_name,
            otlp = config.otlp_endpoint.as_deref().unwrap_or("disabled"),
            sampling_ratio = config.sampling_ratio,
            "telemetry initialized"
        );
    }

    Ok(installed)
}

fn init_otlp_tracer(service_name: &str, endpoint: &str, sampling_ratio: f64) -> anyhow::Result<Tracer> {
    let sampler = if sampling_ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if sampling_ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(sampling_ratio)
    };

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .build_span_exporter()?,
            Tokio,
        )
        .with_config(
            sdktrace::Config::default()
                .with_sampler(sampler)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    service_name.to_string(),
                )])),
        )
        .build();

    let tracer = tracer_provider.tracer(service_name.to_string());
    global::set_tracer_provider(tracer_provider);

    Ok(tracer)
}

/// Flush dos spans pendentes no exporter OTLP. Chame antes de sair.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
    tracing::info!("telemetry shut down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "restassured");
        assert!(config.otlp_endpoint.is_none());
        assert_eq!(config.sampling_ratio, 1.0);
        assert!(config.enable_console_logging);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_config_from_lookup() {
        let config = TelemetryConfig::from_lookup(lookup_from(&[
            ("OTEL_SERVICE_NAME", "checkout-suite"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317"),
            ("OTEL_TRACES_SAMPLER_ARG", "7.5"),
            ("RESTASSURED_LOG", "restassured=debug"),
        ]));

        assert_eq!(config.service_name, "checkout-suite");
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://collector:4317"));
        assert_eq!(config.sampling_ratio, 1.0);
        assert_eq!(config.log_filter, "restassured=debug");
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = TelemetryConfig::from_lookup(lookup_from(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "  "),
            ("OTEL_TRACES_SAMPLER_ARG", "half"),
        ]));
        assert_eq!(config, TelemetryConfig::default());
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = TelemetryConfig {
            enable_console_logging: false,
            ..TelemetryConfig::default()
        };

        init_telemetry(config.clone()).unwrap();
        assert!(!init_telemetry(config).unwrap());
    }
}
