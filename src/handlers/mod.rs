mod health;
mod metrics;
mod species;
mod submit;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;

use crate::state::AppState;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use species::species_handler;
pub use submit::submit_handler;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/species", get(species_handler))
        .route("/api/bugsubmit", post(submit_handler))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state)
}
