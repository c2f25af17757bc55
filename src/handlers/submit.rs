use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;

use crate::client::ClientKey;
use crate::error::ProxyError;
use crate::metrics::{RATE_LIMITED_TOTAL, SUBMISSIONS_TOTAL};
use crate::models::UploadedImage;
use crate::normalizer::normalize_blocking;
use crate::rate_limit::RateDecision;
use crate::state::AppState;
use crate::upstream::IMAGE_FIELD;

// Pull the first `image` field; it only counts as a file when it has a filename
async fn take_image(mut multipart: Multipart) -> Result<UploadedImage, ProxyError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            return Err(ProxyError::NoImage);
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?.to_vec();

        return Ok(UploadedImage {
            bytes,
            content_type,
            file_name,
        });
    }
    Err(ProxyError::NoImage)
}

// POST /api/bugsubmit
//
// Order: rate limit, then file check, then resize, then forward. A request
// without a file still spends a slot.
pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ProxyError> {
    SUBMISSIONS_TOTAL.inc();

    let client = ClientKey::from_headers(&headers);
    if client.is_unknown() {
        tracing::debug!("no forwarded address, using the shared anonymous bucket");
    }
    match state.rate_limiter.check(&client) {
        RateDecision::Allowed { remaining } => {
            tracing::debug!(%client, remaining, "upload admitted");
        }
        RateDecision::Limited { retry_after_ms } => {
            RATE_LIMITED_TOTAL.inc();
            tracing::info!(%client, retry_after_ms, "upload rate limited");
            return Err(ProxyError::RateLimited {
                retry_after: Duration::from_millis(retry_after_ms.max(0) as u64),
            });
        }
    }

    // not a multipart body at all means there is no file either
    let multipart = multipart.map_err(|_| ProxyError::NoImage)?;
    let upload = take_image(multipart).await?;
    tracing::info!(
        %client,
        file_name = %upload.file_name,
        bytes = upload.bytes.len(),
        "image received"
    );

    let resized = normalize_blocking(upload, state.resize_width).await?;

    let relay = state
        .classifier
        .predict(resized)
        .await
        .map_err(ProxyError::Predict)?;

    Ok((relay.status, Json(relay.body)).into_response())
}
