use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::ProxyError;
use crate::state::AppState;

// GET /api/species - stateless passthrough, not rate limited
pub async fn species_handler(State(state): State<Arc<AppState>>) -> Result<Response, ProxyError> {
    let relay = state
        .classifier
        .species()
        .await
        .map_err(ProxyError::Species)?;

    Ok((relay.status, Json(relay.body)).into_response())
}
