//! # Módulo de Configuração
//!
//! Define os valores padrão do cliente HTTP usado quando o teste não
//! fornece um transporte próprio, e os padrões do modo de carga.
//!
//! ## Para todos entenderem:
//!
//! Todo teste precisa de um "cliente" para conversar com a API.
//! Se você não criar um, a biblioteca cria um com estas regras:
//!
//! | Opção                   | Padrão          | Variável de ambiente                  |
//! |-------------------------|-----------------|---------------------------------------|
//! | timeout                 | 100 s           | `RESTASSURED_TIMEOUT_SECS`            |
//! | connect_timeout         | 30 s            | `RESTASSURED_CONNECT_TIMEOUT_SECS`    |
//! | pool_max_idle_per_host  | 1               | `RESTASSURED_POOL_IDLE_PER_HOST`      |
//! | accept_invalid_certs    | false           | `RESTASSURED_ACCEPT_INVALID_CERTS`    |
//! | user_agent              | restassured/x.y | `RESTASSURED_USER_AGENT`              |
//!
//! Valores inválidos nas variáveis são ignorados (fica o padrão).

use std::time::Duration;

// ============================================================================
// PADRÕES DO MODO DE CARGA
// ============================================================================

/// Threads usadas quando o valor pedido é inválido (<= 0).
pub const DEFAULT_LOAD_THREADS: usize = 1;

/// Duração em segundos usada quando o valor pedido é inválido (<= 0).
pub const DEFAULT_LOAD_SECONDS: u64 = 60;

// ============================================================================
// PADRÕES DO CLIENTE
// ============================================================================

/// Timeout padrão de uma chamada.
pub const DEFAULT_TIMEOUT_SECS: u64 = 100;

/// Timeout padrão de conexão.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Conexões ociosas mantidas por host antes de um teste de carga
/// pedir mais.
pub const DEFAULT_POOL_IDLE_PER_HOST: usize = 1;

/// Configuração do transporte padrão (reqwest).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Timeout da chamada inteira. Pode ser sobrescrito por request.
    pub timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    /// Aceita certificados auto-assinados (ambientes de teste).
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            pool_max_idle_per_host: DEFAULT_POOL_IDLE_PER_HOST,
            accept_invalid_certs: false,
            user_agent: format!("restassured/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Cria a configuração a partir das variáveis de ambiente,
    /// partindo dos padrões.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Mesma regra de `from_env`, com uma fonte de valores injetável.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = lookup("RESTASSURED_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            // 0 desliga o timeout global.
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(secs) = lookup("RESTASSURED_CONNECT_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.connect_timeout = Duration::from_secs(secs);
        }

        if let Some(n) = lookup("RESTASSURED_POOL_IDLE_PER_HOST").and_then(|v| v.parse().ok()) {
            config.pool_max_idle_per_host = n;
        }

        if let Some(flag) = lookup("RESTASSURED_ACCEPT_INVALID_CERTS").and_then(|v| parse_flag(&v)) {
            config.accept_invalid_certs = flag;
        }

        if let Some(agent) = lookup("RESTASSURED_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            config.user_agent = agent;
        }

        config
    }

    /// Copia com pelo menos `connections` conexões ociosas por host.
    pub fn with_capacity(&self, connections: usize) -> Self {
        Self {
            pool_max_idle_per_host: self.pool_max_idle_per_host.max(connections),
            ..self.clone()
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
