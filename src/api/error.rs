//! API error types rendered as `{success: false, error}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::extraction::ScanError;

/// Failure body. `success` is always false.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No image")]
    MissingImage,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::MissingImage => (StatusCode::BAD_REQUEST, "No image".to_string()),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            ApiError::Internal(detail) => {
                // Callers log the failure with request context.
                tracing::debug!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error: message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        ApiError::Internal(error_chain(&err))
    }
}

/// `outer: inner: innermost`, for logs.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn missing_image_returns_400() {
        let response = ApiError::MissingImage.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"success": false, "error": "No image"})
        );
    }

    #[tokio::test]
    async fn bad_request_returns_400_with_detail() {
        let response = ApiError::BadRequest("Invalid multipart body".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid multipart body");
    }

    #[tokio::test]
    async fn internal_returns_500_and_hides_detail() {
        let response = ApiError::Internal("tessdata missing".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "An internal error occurred");
    }

    #[test]
    fn internal_error_is_not_logged_at_error_level() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tracing_subscriber::layer::{Context, SubscriberExt};
        use tracing_subscriber::Layer;

        #[derive(Default)]
        struct LevelCounts {
            error: AtomicUsize,
            debug: AtomicUsize,
        }
        struct Counter(Arc<LevelCounts>);
        impl<S: tracing::Subscriber> Layer<S> for Counter {
            fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                match *event.metadata().level() {
                    tracing::Level::ERROR => self.0.error.fetch_add(1, Ordering::SeqCst),
                    tracing::Level::DEBUG => self.0.debug.fetch_add(1, Ordering::SeqCst),
                    _ => 0,
                };
            }
        }

        let counts = Arc::new(LevelCounts::default());
        let subscriber = tracing_subscriber::registry().with(Counter(counts.clone()));
        tracing::subscriber::with_default(subscriber, || {
            let _ = ApiError::Internal("engine crashed".into()).into_response();
        });
        assert_eq!(counts.error.load(Ordering::SeqCst), 0);
        assert_eq!(counts.debug.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scan_error_maps_to_internal() {
        let api_err: ApiError = ScanError::OcrProcessing("engine crashed".into()).into();
        assert!(matches!(api_err, ApiError::Internal(ref d) if d.contains("engine crashed")));
    }

    #[test]
    fn error_chain_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = crate::config::ConfigError::ProfileRead {
            path: "/etc/profile.json".into(),
            source: io,
        };
        let chain = error_chain(&err);
        assert!(chain.starts_with("Cannot read extraction profile /etc/profile.json"));
        assert_eq!(chain.matches("no such file").count(), 1);
    }
}
