//! Shared types for the HTTP layer.

use std::sync::Arc;

use serde::Serialize;

use crate::pipeline::extraction::{LabelScanner, ScanResult};

/// Shared state for all routes. Cloned per request; the scanner is shared.
#[derive(Clone)]
pub struct ApiContext {
    pub scanner: Arc<dyn LabelScanner>,
}

impl ApiContext {
    pub fn new(scanner: Arc<dyn LabelScanner>) -> Self {
        Self { scanner }
    }
}

/// `{success: true, device, shipping, raw_text}`.
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: ScanResult,
}

impl ScanResponse {
    pub fn ok(result: ScanResult) -> Self {
        Self {
            success: true,
            result,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
