//! # Runner de Carga
//!
//! Executa a mesma requisição repetidamente, com T workers em paralelo,
//! durante S segundos.
//!
//! ## Para todos entenderem:
//!
//! ```text
//! timer ──(S segundos)──► token.cancel()
//!
//! worker 1: chamada → resultado → chamada → resultado → ... → vê o token → sai
//! worker 2: chamada → resultado → ...                        → vê o token → sai
//! ...
//!            │
//!            ▼
//!      canal mpsc (só append) ──► Vec<LoadResponse> depois que todos saem
//! ```
//!
//! - O token só é olhado ENTRE chamadas: uma chamada em andamento nunca é
//!   interrompida.
//! - Cada worker faz pelo menos uma chamada.
//! - Erro ou pânico numa chamada vira um resultado "perdido" (status -1)
//!   e o worker continua.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::action::LoadSettings;
use crate::errors::ErrorCode;
use crate::response::LoadResponse;
use crate::transport::{HttpTransport, TransportRequest};

/// Runs `request` from `settings.threads()` workers until the duration
/// elapses and returns one result per call issued, in completion order.
pub(crate) async fn run_load(
    transport: Arc<dyn HttpTransport>,
    request: TransportRequest,
    settings: LoadSettings,
) -> Vec<LoadResponse> {
    let threads = settings.threads();
    let duration = settings.duration();

    transport.ensure_capacity(threads);

    let token = CancellationToken::new();
    let (results, mut received) = mpsc::unbounded_channel();

    let timer = tokio::spawn(stop_after(duration, token.clone()));

    let mut workers = JoinSet::new();
    for worker in 0..threads {
        workers.spawn(worker_loop(
            worker,
            Arc::clone(&transport),
            request.clone(),
            token.clone(),
            results.clone(),
        ));
    }
    // Só os workers seguram senders agora; o canal fecha quando todos saírem.
    drop(results);

    let mut issued = 0usize;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(calls) => issued += calls,
            Err(e) => warn!(code = %ErrorCode::INTERNAL_ERROR, error = %e, "load worker did not finish cleanly"),
        }
    }
    timer.abort();

    let mut responses = Vec::with_capacity(issued);
    while let Some(response) = received.recv().await {
        responses.push(response);
    }

    info!(
        threads,
        seconds = duration.as_secs_f64(),
        issued,
        collected = responses.len(),
        "load run finished"
    );

    responses
}

async fn stop_after(duration: Duration, token: CancellationToken) {
    tokio::time::sleep(duration).await;
    debug!("load duration elapsed, stopping workers");
    token.cancel();
}

/// Returns how many calls this worker issued.
async fn worker_loop(
    worker: usize,
    transport: Arc<dyn HttpTransport>,
    request: TransportRequest,
    token: CancellationToken,
    results: UnboundedSender<LoadResponse>,
) -> usize {
    let mut issued = 0usize;

    loop {
        let started = Instant::now();
        let call = AssertUnwindSafe(transport.send(request.clone()))
            .catch_unwind()
            .await;

        let response = match call {
            Ok(Ok(reply)) => LoadResponse::new(reply.status, elapsed_micros(started)),
            Ok(Err(e)) => {
                trace!(worker, error = %e, "load call lost");
                LoadResponse::lost()
            }
            Err(_) => {
                warn!(worker, "load call panicked, counted as lost");
                LoadResponse::lost()
            }
        };

        issued += 1;
        if results.send(response).is_err() {
            break;
        }

        if token.is_cancelled() {
            break;
        }
    }

    trace!(worker, issued, "load worker stopped");
    issued
}

fn elapsed_micros(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_micros()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{TransportError, TransportErrorKind};
    use crate::setup::NameValues;
    use crate::transport::{HttpMethod, TransportResponse};
    use async_trait::async_trait;
    use reqwest::Url;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers 200 after a short pause, counting every call.
    struct CountingTransport {
        calls: AtomicUsize,
        capacity: AtomicUsize,
        pause: Duration,
    }

    impl CountingTransport {
        fn new(pause: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                capacity: AtomicUsize::new(0),
                pause,
            }
        }
    }

    #[async_trait]
    impl HttpTransport for CountingTransport {
        async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.pause).await;
            Ok(TransportResponse {
                status: 200,
                headers: NameValues::new(),
                body: Vec::new(),
            })
        }

        fn ensure_capacity(&self, connections: usize) {
            self.capacity.store(connections, Ordering::SeqCst);
        }
    }

    /// Every third call fails, every fifth panics.
    struct FlakyTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for FlakyTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(2)).await;
            if n % 5 == 0 {
                panic!("stub transport exploded on call {}", n);
            }
            if n % 3 == 0 {
                return Err(TransportError::new(
                    request.url.as_str(),
                    TransportErrorKind::Connect,
                    "connection refused",
                ));
            }
            Ok(TransportResponse {
                status: 200,
                headers: NameValues::new(),
                body: Vec::new(),
            })
        }
    }

    fn request() -> TransportRequest {
        TransportRequest::new(HttpMethod::Get, Url::parse("http://load.test/").unwrap())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_result_per_issued_call() {
        let transport = Arc::new(CountingTransport::new(Duration::from_millis(5)));
        let settings = LoadSettings::with_duration(4, Duration::from_millis(200));

        let responses = run_load(transport.clone(), request(), settings).await;

        assert_eq!(responses.len(), transport.calls.load(Ordering::SeqCst));
        assert!(responses.len() >= 4);
        assert!(responses.iter().all(|r| r.status_code == 200 && r.elapsed_micros >= 0));
        assert_eq!(transport.capacity.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_each_worker_calls_at_least_once() {
        // Duration shorter than a single call.
        let transport = Arc::new(CountingTransport::new(Duration::from_millis(50)));
        let settings = LoadSettings::with_duration(3, Duration::from_millis(1));

        let responses = run_load(transport.clone(), request(), settings).await;

        assert_eq!(responses.len(), 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failures_and_panics_count_as_lost() {
        let transport = Arc::new(FlakyTransport {
            calls: AtomicUsize::new(0),
        });
        let settings = LoadSettings::with_duration(2, Duration::from_millis(150));

        let responses = run_load(transport.clone(), request(), settings).await;

        let issued = transport.calls.load(Ordering::SeqCst);
        assert_eq!(responses.len(), issued);
        assert!(issued >= 5);

        let lost = responses.iter().filter(|r| r.is_lost()).count();
        let succeeded = responses.iter().filter(|r| r.is_success()).count();
        assert!(lost > 0);
        assert_eq!(lost + succeeded, issued);
        assert!(responses.iter().filter(|r| r.is_lost()).all(|r| r.elapsed_micros == -1));
    }
}
