//! # Módulo de Ação
//!
//! `HttpActionContext` binds a `SetupContext` to one HTTP method and resolves
//! the target URL. The transition is one way:
//!
//! ```text
//! Unconfigured --get/post/put/patch/delete--> ExecutionContext
//! ```
//!
//! Load mode is switched on here with `load(threads, seconds)`; bad values
//! clamp to the defaults instead of failing.

use reqwest::Url;
use std::time::Duration;
use tracing::debug;

use crate::config::{DEFAULT_LOAD_SECONDS, DEFAULT_LOAD_THREADS};
use crate::errors::{ConfigError, Result};
use crate::execution::ExecutionContext;
use crate::setup::SetupContext;
use crate::transport::HttpMethod;

/// Thread count and duration of a load run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSettings {
    threads: usize,
    duration: Duration,
}

impl LoadSettings {
    /// Values <= 0 fall back to 1 thread / 60 seconds.
    pub fn new(threads: i64, seconds: i64) -> Self {
        let threads = usize::try_from(threads)
            .ok()
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_LOAD_THREADS);
        let seconds = u64::try_from(seconds)
            .ok()
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_LOAD_SECONDS);

        Self {
            threads,
            duration: Duration::from_secs(seconds),
        }
    }

    /// Sub-second runs, for exercising the runner without waiting a full second.
    #[cfg(test)]
    pub(crate) fn with_duration(threads: usize, duration: Duration) -> Self {
        Self {
            threads: threads.max(1),
            duration,
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            threads: DEFAULT_LOAD_THREADS,
            duration: Duration::from_secs(DEFAULT_LOAD_SECONDS),
        }
    }
}

#[derive(Debug)]
pub struct HttpActionContext {
    setup: SetupContext,
    load: Option<LoadSettings>,
}

impl HttpActionContext {
    pub fn new(setup: SetupContext) -> Self {
        Self { setup, load: None }
    }

    /// Marks the call for concurrent dispatch: `threads` workers calling
    /// repeatedly for `seconds`.
    pub fn load(mut self, threads: i64, seconds: i64) -> Self {
        self.load = Some(LoadSettings::new(threads, seconds));
        self
    }

    pub fn load_settings(&self) -> Option<LoadSettings> {
        self.load
    }

    pub fn debug(self) -> Self {
        debug!(
            host = self.setup.get_host().unwrap_or_default(),
            path = self.setup.get_uri().unwrap_or_default(),
            load = ?self.load,
            "action context"
        );
        self
    }

    pub fn get(self, url: Option<&str>) -> Result<ExecutionContext> {
        self.select(HttpMethod::Get, url)
    }

    pub fn post(self, url: Option<&str>) -> Result<ExecutionContext> {
        self.select(HttpMethod::Post, url)
    }

    pub fn put(self, url: Option<&str>) -> Result<ExecutionContext> {
        self.select(HttpMethod::Put, url)
    }

    pub fn patch(self, url: Option<&str>) -> Result<ExecutionContext> {
        self.select(HttpMethod::Patch, url)
    }

    pub fn delete(self, url: Option<&str>) -> Result<ExecutionContext> {
        self.select(HttpMethod::Delete, url)
    }

    /// Resolves the URL for `method` and hands everything to `ExecutionContext`.
    pub fn select(self, method: HttpMethod, url: Option<&str>) -> Result<ExecutionContext> {
        let resolved = resolve_url(&self.setup, url)?;
        debug!(%method, url = %resolved, load = ?self.load, "action selected");
        Ok(ExecutionContext::new(self.setup, method, resolved, self.load))
    }
}

/// Explicit URL wins; otherwise host (plus port) joined with the path.
/// Either one gets `http://` (or `https://`) when it has no scheme.
pub(crate) fn resolve_url(setup: &SetupContext, url: Option<&str>) -> Result<Url> {
    let explicit = url.map(str::trim).filter(|u| !u.is_empty());
    let host = setup.get_host().map(str::trim).filter(|h| !h.is_empty());

    if let Some(url) = explicit {
        return parse_absolute(&fix_protocol(url, setup.is_https()));
    }

    let host = host.ok_or(ConfigError::MissingUrl)?;
    let mut base = parse_absolute(&fix_protocol(host, setup.is_https()))?;

    if let Some(port) = setup.get_port() {
        base.set_port(Some(port)).map_err(|_| ConfigError::InvalidUrl {
            url: base.to_string(),
            reason: format!("port {} cannot be set", port),
        })?;
    }

    match setup.get_uri().filter(|uri| !uri.is_empty()) {
        Some(uri) => base.join(uri).map_err(|e| {
            ConfigError::InvalidUrl {
                url: format!("{}{}", base, uri),
                reason: e.to_string(),
            }
            .into()
        }),
        None => Ok(base),
    }
}

fn fix_protocol(source: &str, use_https: bool) -> String {
    if source.starts_with("http://") || source.starts_with("https://") {
        source.to_string()
    } else {
        let scheme = if use_https { "https" } else { "http" };
        format!("{}://{}", scheme, source)
    }
}

fn parse_absolute(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !parsed.has_host() {
        return Err(ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: "no host".to_string(),
        }
        .into());
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn test_missing_url_and_host_fails() {
        let err = SetupContext::new().when().get(None).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingUrl)));
        assert_eq!(err.to_string(), "url must be provided");
    }

    #[test]
    fn test_empty_url_counts_as_missing() {
        let err = SetupContext::new().when().post(Some("  ")).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingUrl)));
    }

    #[test]
    fn test_explicit_url_without_scheme_defaults_to_http() {
        let url = resolve_url(&SetupContext::new(), Some("test.com/users")).unwrap();
        assert_eq!(url.as_str(), "http://test.com/users");
    }

    #[test]
    fn test_https_flag_changes_default_scheme() {
        let setup = SetupContext::new().use_https();
        let url = resolve_url(&setup, Some("test.com")).unwrap();
        assert_eq!(url.scheme(), "https");

        // An explicit scheme is never rewritten.
        let url = resolve_url(&setup, Some("http://test.com")).unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_host_and_path_are_combined() {
        let setup = SetupContext::new().host("api.test").port(8080).uri("/v1/users");
        let url = resolve_url(&setup, None).unwrap();
        assert_eq!(url.as_str(), "http://api.test:8080/v1/users");
    }

    #[test]
    fn test_explicit_url_wins_over_host() {
        let setup = SetupContext::new().host("api.test").uri("/ignored");
        let url = resolve_url(&setup, Some("https://other.test/x")).unwrap();
        assert_eq!(url.as_str(), "https://other.test/x");
    }

    #[test]
    fn test_unparseable_url_is_config_error() {
        let err = resolve_url(&SetupContext::new(), Some("http://exa mple.com")).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_load_settings_clamp_invalid_values() {
        let settings = LoadSettings::new(0, -5);
        assert_eq!(settings.threads(), 1);
        assert_eq!(settings.duration(), Duration::from_secs(60));

        let settings = LoadSettings::new(6, 10);
        assert_eq!(settings.threads(), 6);
        assert_eq!(settings.duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_marks_selector() {
        let action = SetupContext::new().host("api.test").when().load(-1, 0);
        assert_eq!(action.load_settings(), Some(LoadSettings::default()));

        let execution = action.get(None).unwrap();
        assert_eq!(execution.load_settings(), Some(LoadSettings::default()));
    }

    #[test]
    fn test_debug_keeps_selection() {
        let execution = SetupContext::new()
            .host("api.test")
            .when()
            .debug()
            .patch(Some("api.test/items/3"))
            .unwrap();
        assert_eq!(execution.method(), HttpMethod::Patch);
        assert_eq!(execution.url().as_str(), "http://api.test/items/3");
    }
}
