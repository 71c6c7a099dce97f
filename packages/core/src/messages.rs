//! Typed request/response schemas layered on top of the schema-less wire
//! framing.
//!
//! The framing layer moves opaque JSON values; these types are the contract
//! the two services apply at their protocol boundary, so internal code never
//! branches on raw untyped maps.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request sent by the front-end to the back-end processing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingRequest {
    pub url: String,
}

impl ProcessingRequest {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Result returned by the back-end for one processing request.
///
/// Tagged on `status`, producing `{"status":"success",...}` or
/// `{"status":"error","error":...}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProcessingResult {
    Success {
        /// Base64-encoded PNG of the rendered artifact.
        screenshot: String,
        /// Base64-encoded PNG thumbnails derived from the artifact.
        thumbnails: Vec<String>,
        performance: PerformanceSummary,
    },
    Error { error: String },
}

impl ProcessingResult {
    /// Builds the error variant from any displayable cause.
    #[must_use]
    pub fn error(cause: impl std::fmt::Display) -> Self {
        Self::Error {
            error: cause.to_string(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Fetch performance measured by the back-end task body.
///
/// The timing fields are `None` when the measurement request itself failed;
/// the task still reports success with this degraded shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub load_time_ms: Option<u64>,
    pub total_size_kb: Option<f64>,
    pub num_requests: u32,
}

impl PerformanceSummary {
    /// Shape reported when the measurement fetch failed outright.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            load_time_ms: None,
            total_size_kb: None,
            num_requests: 0,
        }
    }
}

/// Structured document produced by the extraction collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub title: Option<String>,
    pub links: Vec<String>,
    pub meta_tags: BTreeMap<String, String>,
    /// Heading counts keyed `h1`..`h6`.
    pub structure: BTreeMap<String, usize>,
    pub images_count: usize,
}

/// Raw metadata from the outbound fetch, echoed to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchMeta {
    pub status: u16,
    pub content_type: Option<String>,
    pub final_url: String,
}

/// Fetch metadata wrapper matching the response's `extra_info` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraInfo {
    pub http_response: FetchMeta,
}

/// The front-end's externally visible response for one scrape request.
///
/// `processing_data` serializes as JSON `null` when the back-end call
/// failed; back-end unavailability degrades the response, it does not fail
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub scraping_data: PageSummary,
    pub processing_data: Option<ProcessingResult>,
    pub extra_info: ExtraInfo,
}

impl ScrapeResult {
    /// Assembles the consolidated response, stamping the current time.
    #[must_use]
    pub fn assemble(
        url: impl Into<String>,
        scraping_data: PageSummary,
        processing_data: Option<ProcessingResult>,
        http_response: FetchMeta,
    ) -> Self {
        Self {
            url: url.into(),
            timestamp: Utc::now(),
            status: "success".to_string(),
            scraping_data,
            processing_data,
            extra_info: ExtraInfo { http_response },
        }
    }
}
