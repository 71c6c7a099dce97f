//! The `/scrape` request pipeline.
//!
//! Per request: admit through the gate, fetch, extract, call the back-end,
//! assemble. Early exits: missing url (400) and fetch failure (502). A
//! back-end failure does not abort the pipeline; the response ships with a
//! null processing field.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pagelens_core::messages::{ProcessingRequest, ScrapeResult};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::AppState;
use crate::frontend::backend_client::call_processing_service;
use crate::frontend::extract::extract;
use crate::frontend::fetch::fetch_page;

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeQuery {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScrapeBody {
    url: Option<String>,
}

/// `GET /scrape?url=...`
pub async fn scrape_get_handler(
    State(state): State<AppState>,
    Query(query): Query<ScrapeQuery>,
) -> Response {
    run_scrape(state, query.url).await
}

/// `POST /scrape` — url from the query string or a JSON body.
///
/// A malformed JSON body is treated the same as an absent one: without a
/// usable url the request is rejected with 400.
pub async fn scrape_post_handler(
    State(state): State<AppState>,
    Query(query): Query<ScrapeQuery>,
    body: Result<Json<ScrapeBody>, JsonRejection>,
) -> Response {
    let url = query.url.or_else(|| body.ok().and_then(|Json(b)| b.url));
    run_scrape(state, url).await
}

async fn run_scrape(state: AppState, url: Option<String>) -> Response {
    let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "missing parameter 'url' (query ?url=... or JSON body {\"url\": ...})",
        );
    };

    let _in_flight = state.shutdown.in_flight_guard();

    // Fetch and extract while holding an admission slot; the slot bounds
    // concurrent outbound work and is released on every exit path.
    let slot = state.gate.admit().await;

    let (body, meta) =
        match fetch_page(&state.http, &url, state.config.fetch_timeout).await {
            Ok(fetched) => fetched,
            Err(err) => {
                drop(slot);
                warn!(url = %url, error = %err, "fetch failed");
                return error_response(StatusCode::BAD_GATEWAY, err);
            }
        };

    // Pure and non-blocking, so it runs inline under the same slot.
    let page = extract(&body);
    drop(slot);

    // The back-end call runs outside the gate: it costs no fetch capacity.
    let request = ProcessingRequest::new(url.as_str());
    let processing = match call_processing_service(
        state.config.backend_addr(),
        &request,
        state.config.backend_call_timeout,
        state.config.max_frame_len,
    )
    .await
    {
        Ok(result) => Some(result),
        Err(err) => {
            warn!(url = %url, error = %err, "back-end call failed; responding without processing data");
            None
        }
    };

    let result = ScrapeResult::assemble(url, page, processing, meta);
    (StatusCode::OK, Json(result)).into_response()
}

fn error_response(status: StatusCode, error: impl std::fmt::Display) -> Response {
    (
        status,
        Json(json!({
            "status": "error",
            "error": error.to_string(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::super::test_support::{spawn_stub_http_server, test_state};
    use super::*;
    use crate::backend::{BackendConfig, BackendModule};
    use crate::frontend::config::FrontendConfig;

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/scrape", get(scrape_get_handler).post(scrape_post_handler))
            .with_state(state)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Spawns a live back-end on an ephemeral port, returning its port and
    /// a stop handle.
    async fn spawn_backend() -> (u16, tokio::sync::oneshot::Sender<()>) {
        let mut module = BackendModule::new(BackendConfig {
            pool_size: 2,
            ..BackendConfig::default()
        })
        .unwrap();
        let bound = module.start().await.unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(module.serve(async move {
            let _ = stop_rx.await;
        }));

        (bound.port(), stop_tx)
    }

    #[tokio::test]
    async fn missing_url_is_rejected_with_400() {
        let state = test_state(FrontendConfig::default());

        let response = app(state)
            .oneshot(Request::builder().uri("/scrape").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().contains("url"));
    }

    #[tokio::test]
    async fn empty_url_is_rejected_with_400() {
        let state = test_state(FrontendConfig::default());

        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/scrape?url=")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unreachable_fetch_target_yields_502() {
        let state = test_state(FrontendConfig::default());

        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/scrape?url=http://127.0.0.1:1/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert!(body.get("scraping_data").is_none());
    }

    #[tokio::test]
    async fn backend_down_degrades_to_null_processing_data() {
        let page_addr =
            spawn_stub_http_server("200 OK", "<html><title>Page</title></html>").await;

        // Port 1 refuses connections: the back-end is down.
        let state = test_state(FrontendConfig {
            backend_port: 1,
            ..FrontendConfig::default()
        });

        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri(format!("/scrape?url=http://{page_addr}/"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert!(body["processing_data"].is_null());
        assert_eq!(body["scraping_data"]["title"], "Page");
    }

    #[tokio::test]
    async fn live_backend_populates_processing_data() {
        let page_addr = spawn_stub_http_server(
            "200 OK",
            "<html><title>Page</title><body><a href=\"/x\">x</a></body></html>",
        )
        .await;
        let (backend_port, _stop) = spawn_backend().await;

        let state = test_state(FrontendConfig {
            backend_port,
            ..FrontendConfig::default()
        });

        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri(format!("/scrape?url=http://{page_addr}/"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["processing_data"]["status"], "success");
        assert!(!body["processing_data"]["thumbnails"]
            .as_array()
            .unwrap()
            .is_empty());
        assert_eq!(body["scraping_data"]["links"][0], "/x");
        assert_eq!(body["extra_info"]["http_response"]["status"], 200);
    }

    #[tokio::test]
    async fn post_accepts_url_from_json_body() {
        let page_addr =
            spawn_stub_http_server("200 OK", "<html><title>Posted</title></html>").await;

        let state = test_state(FrontendConfig {
            backend_port: 1,
            ..FrontendConfig::default()
        });

        let payload = json!({"url": format!("http://{page_addr}/")});
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/scrape")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["scraping_data"]["title"], "Posted");
    }

    #[tokio::test]
    async fn post_with_malformed_json_is_rejected_with_400() {
        let state = test_state(FrontendConfig::default());

        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/scrape")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
