//! Wire-protocol client for the back-end processing service.
//!
//! Opens one transient connection per call: connect, send the request
//! frame, receive the response frame, close. The whole exchange runs under
//! a single deadline so a hung back-end surfaces as a failure instead of a
//! hung front-end request.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pagelens_core::messages::{ProcessingRequest, ProcessingResult};
use pagelens_core::wire::{WireCodec, WireError};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

/// Failures of one back-end call.
///
/// Callers treat every variant identically — the response degrades to a
/// null processing field — but the variants keep the log lines precise.
#[derive(Debug, thiserror::Error)]
pub enum BackendCallError {
    #[error("could not connect to back-end at {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("back-end call exceeded its {timeout:?} deadline")]
    Timeout { timeout: Duration },

    #[error("wire protocol failure: {0}")]
    Wire(#[from] WireError),

    #[error("back-end closed the connection without responding")]
    ClosedEarly,

    #[error("back-end response did not match the expected schema: {0}")]
    Schema(#[source] serde_json::Error),
}

/// Performs one request/response exchange with the back-end.
///
/// # Errors
///
/// Returns [`BackendCallError`] on connection failure, deadline expiry,
/// framing errors, or a response outside the [`ProcessingResult`] schema.
pub async fn call_processing_service(
    addr: SocketAddr,
    request: &ProcessingRequest,
    timeout: Duration,
    max_frame_len: usize,
) -> Result<ProcessingResult, BackendCallError> {
    let exchange = async {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| BackendCallError::Connect { addr, source })?;
        let mut framed = Framed::new(stream, WireCodec::with_max_frame_len(max_frame_len));

        let payload = serde_json::to_value(request).map_err(BackendCallError::Schema)?;
        framed.send(payload).await?;

        let response = framed
            .next()
            .await
            .ok_or(BackendCallError::ClosedEarly)??;
        serde_json::from_value(response).map_err(BackendCallError::Schema)
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(BackendCallError::Timeout { timeout }),
    }
}
