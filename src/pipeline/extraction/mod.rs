pub mod types;
pub mod sanitize;
pub mod preprocess;
pub mod ocr;
pub mod vision_ocr;
pub mod orchestrator;

pub use types::*;
pub use sanitize::*;
pub use preprocess::*;
pub use ocr::*;
pub use orchestrator::*;

use std::path::PathBuf;

use thiserror::Error;

use vision_ocr::VisionError;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("OCR engine initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),

    #[error("Vision model error: {0}")]
    Vision(#[from] VisionError),

    #[error("Scan task failed: {0}")]
    TaskFailed(String),
}
