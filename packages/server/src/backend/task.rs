//! The CPU-bound task body: artifact rendering, thumbnail derivation, and
//! fetch performance measurement for one URL.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pagelens_core::messages::{PerformanceSummary, ProcessingRequest, ProcessingResult};
use tracing::debug;

use super::pool::TaskRunner;

/// Rendered artifact dimensions.
const CANVAS_WIDTH: u32 = 800;
const CANVAS_HEIGHT: u32 = 600;

/// Bounding boxes for the derived thumbnails, largest first.
const THUMBNAIL_SIZES: [(u32, u32); 2] = [(400, 300), (200, 150)];

/// Timeout for the performance-measurement fetch.
const MEASURE_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool runner executing the processing task body.
///
/// Stateless: every piece of input arrives in the [`ProcessingRequest`] and
/// every output leaves in the [`ProcessingResult`], keeping workers fully
/// isolated from each other.
#[derive(Debug, Default)]
pub struct ProcessingRunner;

impl TaskRunner for ProcessingRunner {
    type Input = ProcessingRequest;
    type Output = ProcessingResult;

    fn run(&mut self, request: ProcessingRequest) -> ProcessingResult {
        process_url(&request.url)
    }
}

/// Runs the full task body for one URL.
///
/// The performance fetch may fail without failing the task; artifact
/// encoding failures map to the error result.
#[must_use]
pub fn process_url(url: &str) -> ProcessingResult {
    let canvas = render_placeholder(url);

    let screenshot = match encode_png_base64(&canvas) {
        Ok(encoded) => encoded,
        Err(err) => return ProcessingResult::error(format!("failed to encode artifact: {err}")),
    };

    let thumbnails = match derive_thumbnails(&canvas) {
        Ok(thumbs) => thumbs,
        Err(err) => return ProcessingResult::error(format!("failed to encode thumbnail: {err}")),
    };

    let performance = measure_performance(url, MEASURE_TIMEOUT);

    ProcessingResult::Success {
        screenshot,
        thumbnails,
        performance,
    }
}

/// Synthesizes the placeholder artifact for a URL.
///
/// Deterministic: the same URL always renders the same image. Horizontal
/// color bands are derived from a hash of the URL so distinct URLs are
/// visually distinguishable.
#[must_use]
pub fn render_placeholder(url: &str) -> RgbImage {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    let seed = hasher.finish();

    let bands: Vec<Rgb<u8>> = (0..4u32)
        .map(|band| {
            let bytes = seed.rotate_left(band * 16).to_be_bytes();
            Rgb([bytes[5], bytes[6], bytes[7]])
        })
        .collect();

    let band_count = u32::try_from(bands.len()).unwrap_or(1);
    let band_height = CANVAS_HEIGHT / band_count;
    RgbImage::from_fn(CANVAS_WIDTH, CANVAS_HEIGHT, |x, y| {
        let band = ((y / band_height) as usize).min(bands.len() - 1);
        let Rgb([r, g, b]) = bands[band];
        // Fade each band horizontally so the image is not flat color.
        let fade = u8::try_from(x * 64 / CANVAS_WIDTH).unwrap_or(63);
        Rgb([r.wrapping_add(fade), g.wrapping_add(fade), b.wrapping_add(fade)])
    })
}

/// Derives aspect-preserving thumbnails from the rendered artifact.
///
/// # Errors
///
/// Returns an error if PNG encoding fails.
pub fn derive_thumbnails(canvas: &RgbImage) -> Result<Vec<String>, image::ImageError> {
    let full = DynamicImage::ImageRgb8(canvas.clone());

    THUMBNAIL_SIZES
        .iter()
        .map(|&(width, height)| {
            let thumb = full.thumbnail(width, height);
            encode_png_base64(&thumb.to_rgb8())
        })
        .collect()
}

fn encode_png_base64(img: &RgbImage) -> Result<String, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(BASE64.encode(buf.into_inner()))
}

/// Measures load time and transfer size with a single streaming GET.
///
/// A failed measurement degrades to the `unavailable` shape rather than
/// failing the task; the artifact and thumbnails are still delivered.
#[must_use]
pub fn measure_performance(url: &str, timeout: Duration) -> PerformanceSummary {
    let started = Instant::now();

    let outcome = (|| -> anyhow::Result<u64> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        let mut response = client.get(url).send()?.error_for_status()?;
        // Stream the body to a sink; only the byte count matters.
        let total = std::io::copy(&mut response, &mut std::io::sink())?;
        Ok(total)
    })();

    match outcome {
        Ok(total_bytes) => {
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            #[allow(clippy::cast_precision_loss)]
            let size_kb = (total_bytes as f64 / 1024.0 * 100.0).round() / 100.0;
            PerformanceSummary {
                load_time_ms: Some(elapsed_ms),
                total_size_kb: Some(size_kb),
                num_requests: 1,
            }
        }
        Err(err) => {
            debug!(url, error = %err, "performance measurement failed");
            PerformanceSummary::unavailable()
        }
    }
}
