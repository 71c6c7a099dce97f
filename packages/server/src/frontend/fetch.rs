//! Outbound page fetch collaborator.
//!
//! One long-lived `reqwest::Client` (owned by the app state) serves all
//! outbound fetches; each fetch carries its own timeout and fails fast
//! rather than hanging a request.

use std::time::Duration;

use pagelens_core::messages::FetchMeta;
use reqwest::header::CONTENT_TYPE;

/// Failures from the fetch collaborator.
///
/// Any of these is terminal for the request: the primary deliverable
/// (scraped data) cannot be produced, so the caller answers 502.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to fetch {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch of {url} timed out")]
    Timeout { url: String },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Fetches a page, returning its body and response metadata.
///
/// Non-2xx statuses are failures; redirects are followed by the client and
/// reported through `final_url`.
///
/// # Errors
///
/// Returns [`FetchError`] on connection failure, timeout, or a non-success
/// status.
pub async fn fetch_page(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<(String, FetchMeta), FetchError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|source| classify(url, source))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let meta = FetchMeta {
        status: status.as_u16(),
        content_type: response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        final_url: response.url().to_string(),
    };

    let body = response.text().await.map_err(|source| classify(url, source))?;
    Ok((body, meta))
}

fn classify(url: &str, source: reqwest::Error) -> FetchError {
    if source.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            source,
        }
    }
}
