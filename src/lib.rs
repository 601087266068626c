//! # restassured
//!
//! Fluent builder for exercising HTTP APIs: declare a request, dispatch it
//! (optionally as a timed concurrent load run), then check the response
//! through named, deferred assertions.
//!
//! ```text
//! RestAssured::given()      SetupContext        host, path, headers, query, body...
//!     .when()               HttpActionContext   optional load(threads, seconds)
//!     .get(None)?           ExecutionContext    URL resolved, request ready
//!     .then().await?        ResponseContext     status, body, load statistics
//!     .test_status(..)?     named checks, evaluated now, reported on assert
//!     .assert_all(true)?
//! ```
//!
//! ```ignore
//! use restassured::RestAssured;
//!
//! let response = RestAssured::given()
//!     .name("list products")
//!     .host("api.example.com")
//!     .uri("/products")
//!     .header("Accept", "application/json")
//!     .query("page", "1")
//!     .when()
//!     .get(None)?
//!     .then()
//!     .await?
//!     .test_status("is ok", |status| status == 200)?
//!     .test_body("has products", |body| body["products"].as_array().map(|p| !p.is_empty()))?;
//!
//! response.assert_all(true)?;
//! ```

pub mod action;
pub mod config;
pub mod errors;
pub mod execution;
pub mod response;
pub mod setup;
pub mod telemetry;
pub mod transport;

pub use action::{HttpActionContext, LoadSettings};
pub use config::ClientConfig;
pub use errors::{AssertionError, ConfigError, Error, ErrorCode, Result, TransportError};
pub use execution::ExecutionContext;
pub use response::{
    LoadResponse, LoadStatistics, LoadValueType, ParserRegistry, ResponseContext, Verdict,
};
pub use setup::{FileContent, NameValues, SetupContext};
pub use telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
pub use transport::{HttpMethod, HttpTransport, ReqwestTransport};

use serde_json::Value;

/// Entry point.
pub struct RestAssured;

impl RestAssured {
    /// An empty `SetupContext`.
    pub fn given() -> SetupContext {
        SetupContext::new()
    }

    /// Registers a body parser in the process-wide registry for Content-Type
    /// values containing `token`. Register once, before any response is built.
    pub fn add_parser<F>(token: impl Into<String>, parser: F)
    where
        F: Fn(&str) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        ParserRegistry::global().register(token, parser);
    }
}
