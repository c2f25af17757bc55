use axum::{
    http::{StatusCode, header},
    response::IntoResponse,
};
use prometheus::{Encoder, TEXT_FORMAT, TextEncoder};

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, [(header::CONTENT_TYPE, TEXT_FORMAT)], Vec::new());
    }
    (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], buffer)
}
