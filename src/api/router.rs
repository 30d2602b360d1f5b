//! Scan service router.
//!
//! Layers (outermost → innermost): CORS → request tracing → body limit.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::pipeline::extraction::preprocess::MAX_IMAGE_BYTES;
use crate::pipeline::extraction::LabelScanner;

/// Request body limit: one image plus multipart framing.
pub const MAX_BODY_BYTES: usize = MAX_IMAGE_BYTES + 1024 * 1024;

/// Build the router around a shared scanner.
pub fn scan_router(scanner: Arc<dyn LabelScanner>) -> Router {
    Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/scan", post(endpoints::scan::scan))
        .with_state(ApiContext::new(scanner))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
