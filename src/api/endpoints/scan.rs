//! `POST /scan`: multipart upload of one label photo.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use uuid::Uuid;

use crate::api::error::{error_chain, ApiError};
use crate::api::types::{ApiContext, ScanResponse};
use crate::pipeline::extraction::ScanError;

/// Multipart field carrying the image.
const IMAGE_FIELD: &str = "image";

/// Run the configured scanner over the uploaded image.
///
/// The scan itself is CPU-bound and blocking, so it runs on the blocking
/// pool. A panicking scan surfaces as a 500; the server keeps serving.
pub async fn scan(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ScanResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Rejected non-multipart scan request: {e}");
        ApiError::MissingImage
    })?;
    let image = read_image_field(&mut multipart).await?;

    let scan_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "scan",
        %scan_id,
        engine = ctx.scanner.name(),
        image_bytes = image.len()
    );

    let scanner = ctx.scanner.clone();
    let task_span = span.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let _guard = task_span.enter();
        scanner.scan(&image)
    })
    .await
    .unwrap_or_else(|e| Err(ScanError::TaskFailed(e.to_string())));

    match outcome {
        Ok(result) => Ok(Json(ScanResponse::ok(result))),
        Err(e) => {
            span.in_scope(|| tracing::error!(error = %error_chain(&e), "Scan failed"));
            Err(e.into())
        }
    }
}

/// Bytes of the first non-empty `image` field. Other fields are ignored.
async fn read_image_field(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read image data: {e}")))?;
        if !bytes.is_empty() {
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::MissingImage)
}
