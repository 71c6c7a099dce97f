//! Per-connection request/response protocol for the back-end service.
//!
//! One request per connection: receive a framed message, validate it,
//! run the task body on the pool, send one framed response, close. Every
//! failure is confined to the connection; the process never dies because
//! of a single bad request.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use pagelens_core::messages::{ProcessingRequest, ProcessingResult};
use pagelens_core::wire::{WireCodec, WireError};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use super::pool::{TaskPool, TaskRunner};

/// Failures while servicing one connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("wire protocol failure: {0}")]
    Wire(#[from] WireError),

    #[error("response could not be serialized: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Services one accepted connection end to end.
///
/// Errors that escape the request handler are converted into a best-effort
/// error response; if that send fails too, the connection is abandoned and
/// the failure logged.
pub async fn serve_connection<S, R>(stream: S, peer: String, pool: Arc<TaskPool<R>>, max_frame_len: usize)
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: TaskRunner<Input = ProcessingRequest, Output = ProcessingResult>,
{
    let mut framed = Framed::new(stream, WireCodec::with_max_frame_len(max_frame_len));

    if let Err(err) = handle_request(&mut framed, &pool).await {
        warn!(peer = %peer, error = %err, "connection failed; sending best-effort error response");

        match serde_json::to_value(ProcessingResult::error(&err)) {
            Ok(body) => {
                if let Err(send_err) = framed.send(body).await {
                    warn!(peer = %peer, error = %send_err, "abandoning connection: error response undeliverable");
                }
            }
            Err(encode_err) => {
                warn!(peer = %peer, error = %encode_err, "abandoning connection: error response unserializable");
            }
        }
    }
}

async fn handle_request<S, R>(
    framed: &mut Framed<S, WireCodec>,
    pool: &TaskPool<R>,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: TaskRunner<Input = ProcessingRequest, Output = ProcessingResult>,
{
    let message = match framed.next().await {
        Some(frame) => frame?,
        None => {
            debug!("client closed without sending a request");
            return Ok(());
        }
    };

    let response = match validate_request(&message) {
        // Validation failures answer immediately without touching the pool.
        Err(reason) => ProcessingResult::error(reason),
        Ok(request) => match pool.submit(request).wait().await {
            Ok(result) => result,
            Err(task_err) => {
                warn!(error = %task_err, "processing task failed");
                ProcessingResult::error(format!("processing task failed: {task_err}"))
            }
        },
    };

    let body = serde_json::to_value(&response).map_err(ConnectionError::Encode)?;
    framed.send(body).await?;
    Ok(())
}

/// Applies the request schema: `url` must be present and non-empty.
fn validate_request(message: &Value) -> Result<ProcessingRequest, String> {
    let request: ProcessingRequest = serde_json::from_value(message.clone())
        .map_err(|_| "missing required field 'url' in request payload".to_string())?;

    if request.url.trim().is_empty() {
        return Err("field 'url' must not be empty".to_string());
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::io::AsyncWriteExt;

    use super::*;

    /// Counts task-body invocations; used to prove validation short-circuits
    /// the pool.
    struct CountingRunner {
        calls: Arc<AtomicUsize>,
    }

    impl TaskRunner for CountingRunner {
        type Input = ProcessingRequest;
        type Output = ProcessingResult;

        fn run(&mut self, request: ProcessingRequest) -> ProcessingResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ProcessingResult::Success {
                screenshot: "AAAA".to_string(),
                thumbnails: vec!["BBBB".to_string()],
                performance: pagelens_core::messages::PerformanceSummary {
                    load_time_ms: Some(1),
                    total_size_kb: Some(0.5),
                    num_requests: 1,
                },
            }
        }
    }

    fn counting_pool(calls: &Arc<AtomicUsize>) -> Arc<TaskPool<CountingRunner>> {
        let calls = Arc::clone(calls);
        Arc::new(
            TaskPool::start(2, move |_| CountingRunner {
                calls: Arc::clone(&calls),
            })
            .unwrap(),
        )
    }

    async fn exchange(
        pool: Arc<TaskPool<CountingRunner>>,
        request: Value,
    ) -> ProcessingResult {
        let (client, server) = tokio::io::duplex(64 * 1024);

        let server_task = tokio::spawn(serve_connection(
            server,
            "test-peer".to_string(),
            pool,
            pagelens_core::wire::DEFAULT_MAX_FRAME_LEN,
        ));

        let mut framed = Framed::new(client, WireCodec::default());
        framed.send(request).await.unwrap();
        let response = framed.next().await.unwrap().unwrap();
        server_task.await.unwrap();

        serde_json::from_value(response).unwrap()
    }

    #[tokio::test]
    async fn valid_request_runs_task_and_answers_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&calls);

        let result = exchange(pool, json!({"url": "https://example.com"})).await;
        assert!(result.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_url_answers_error_without_invoking_pool() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&calls);

        let result = exchange(pool, json!({"url": ""})).await;
        assert!(matches!(result, ProcessingResult::Error { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_url_answers_error_without_invoking_pool() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&calls);

        let result = exchange(pool, json!({"link": "https://example.com"})).await;
        assert!(matches!(result, ProcessingResult::Error { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_frame_gets_best_effort_error_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&calls);

        let (client, server) = tokio::io::duplex(64 * 1024);
        let server_task = tokio::spawn(serve_connection(
            server,
            "test-peer".to_string(),
            pool,
            pagelens_core::wire::DEFAULT_MAX_FRAME_LEN,
        ));

        // A frame whose body is not JSON.
        let mut client = client;
        let body = b"definitely not json";
        client
            .write_all(&u32::try_from(body.len()).unwrap().to_be_bytes())
            .await
            .unwrap();
        client.write_all(body).await.unwrap();

        let mut framed = Framed::new(client, WireCodec::default());
        let response = framed.next().await.unwrap().unwrap();
        server_task.await.unwrap();

        assert_eq!(response["status"], "error");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn client_hangup_without_request_is_quietly_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&calls);

        let (client, server) = tokio::io::duplex(1024);
        drop(client);

        serve_connection(
            server,
            "test-peer".to_string(),
            pool,
            pagelens_core::wire::DEFAULT_MAX_FRAME_LEN,
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
