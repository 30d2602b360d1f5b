pub mod api;
pub mod config;
pub mod pipeline;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use config::{ConfigError, EngineKind, ServiceConfig};
use pipeline::extraction::vision_ocr::{GeminiClient, VisionError, VisionLabelReader};
use pipeline::extraction::{LabelScanner, ScanError, VisionLabelScanner};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scanner(#[from] ScanError),

    #[error("Local OCR requested but this build has no OCR engine (enable the `tesseract` feature)")]
    OcrUnavailable,

    #[error("Cannot start async runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("{0}")]
    Server(String),
}

impl From<VisionError> for StartupError {
    fn from(err: VisionError) -> Self {
        StartupError::Scanner(ScanError::Vision(err))
    }
}

/// Process entry point: logging, configuration, scanner, then serve until
/// Ctrl-C/SIGTERM.
pub fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = ServiceConfig::from_env()?;
    tracing::info!(
        addr = %config.socket_addr(),
        engine = ?config.engine,
        passes = ?config.passes,
        "Configuration loaded"
    );

    // Built before the runtime and held past it: the vision client owns a
    // blocking HTTP client, which must not be dropped on a runtime thread.
    let scanner = build_scanner(&config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config, scanner.clone()))?;
    drop(runtime);
    drop(scanner);

    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}

async fn serve(config: ServiceConfig, scanner: Arc<dyn LabelScanner>) -> Result<(), StartupError> {
    let mut server = api::start_scan_server(config.socket_addr(), scanner)
        .await
        .map_err(StartupError::Server)?;

    api::server::shutdown_signal().await;
    server.shutdown();
    server.stopped().await;
    Ok(())
}

/// Build the one scanner this process serves with.
pub fn build_scanner(config: &ServiceConfig) -> Result<Arc<dyn LabelScanner>, StartupError> {
    match config.engine {
        EngineKind::Vision => {
            let api_key = config
                .gemini_api_key
                .as_deref()
                .ok_or(VisionError::MissingApiKey)?;
            let client = GeminiClient::new(api_key, &config.gemini_model, config::VISION_TIMEOUT_SECS)?;
            tracing::info!(model = %config.gemini_model, "Using vision model scanner");
            Ok(Arc::new(VisionLabelScanner::new(VisionLabelReader::new(
                Arc::new(client),
            ))))
        }
        EngineKind::Ocr => build_ocr_scanner(config),
    }
}

#[cfg(feature = "tesseract")]
fn build_ocr_scanner(config: &ServiceConfig) -> Result<Arc<dyn LabelScanner>, StartupError> {
    use pipeline::extraction::{OcrLabelScanner, TesseractOcr};

    let profile = config.load_profile()?;
    let engine = TesseractOcr::new(config.tessdata_dir.as_deref())?;
    Ok(Arc::new(
        OcrLabelScanner::new(Arc::new(engine), config.passes).with_profile(profile),
    ))
}

#[cfg(not(feature = "tesseract"))]
fn build_ocr_scanner(config: &ServiceConfig) -> Result<Arc<dyn LabelScanner>, StartupError> {
    // Still validate the profile so a bad file is reported first.
    config.load_profile()?;
    Err(StartupError::OcrUnavailable)
}
