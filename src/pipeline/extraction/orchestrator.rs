use std::str::FromStr;
use std::sync::Arc;

use super::preprocess::{prepare_passes, PassConfig};
use super::types::{spans_to_text, OcrEngine, ScanResult};
use super::vision_ocr::VisionLabelReader;
use super::ScanError;
use crate::pipeline::fields::{assemble_scan, ExtractionProfile, PassTexts};

/// Length of the text preview logged per OCR pass.
const PREVIEW_CHARS: usize = 150;

/// Turns one label photo into a `ScanResult`.
///
/// Exactly one implementation is built at start-up and shared behind an
/// `Arc`; `scan` is blocking and runs on the blocking thread pool.
pub trait LabelScanner: Send + Sync {
    fn name(&self) -> &'static str;

    fn scan(&self, image_bytes: &[u8]) -> Result<ScanResult, ScanError>;
}

/// How many OCR passes the local engine runs per image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Whole frame only.
    Single,
    /// Whole frame plus the enhanced bottom half.
    Dual,
}

impl FromStr for PassMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "dual" => Ok(Self::Dual),
            other => Err(format!("unknown pass mode '{other}' (expected single or dual)")),
        }
    }
}

// ──────────────────────────────────────────────
// Local OCR
// ──────────────────────────────────────────────

/// Local OCR engine plus the field heuristics.
pub struct OcrLabelScanner {
    engine: Arc<dyn OcrEngine>,
    mode: PassMode,
    pass_config: PassConfig,
    profile: ExtractionProfile,
}

impl OcrLabelScanner {
    pub fn new(engine: Arc<dyn OcrEngine>, mode: PassMode) -> Self {
        Self {
            engine,
            mode,
            pass_config: PassConfig::default(),
            profile: ExtractionProfile::default(),
        }
    }

    pub fn with_profile(mut self, profile: ExtractionProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_pass_config(mut self, pass_config: PassConfig) -> Self {
        self.pass_config = pass_config;
        self
    }

    fn run_pass(&self, pass: &'static str, png: &[u8]) -> Result<String, ScanError> {
        let spans = self.engine.recognize(png)?;
        let text = spans_to_text(&spans);
        tracing::debug!(
            pass,
            spans = spans.len(),
            text_len = text.len(),
            preview = %preview(&text),
            "OCR pass complete"
        );
        Ok(text)
    }
}

impl LabelScanner for OcrLabelScanner {
    fn name(&self) -> &'static str {
        self.engine.name()
    }

    fn scan(&self, image_bytes: &[u8]) -> Result<ScanResult, ScanError> {
        let start = std::time::Instant::now();
        let passes = prepare_passes(image_bytes, self.mode == PassMode::Dual, &self.pass_config)?;

        let full = self.run_pass("full", &passes.full_png)?;
        let bottom = passes
            .bottom_png
            .as_deref()
            .map(|png| self.run_pass("bottom", png))
            .transpose()?;

        let result = assemble_scan(&PassTexts { full, bottom }, &self.profile);
        tracing::info!(
            engine = self.engine.name(),
            mode = ?self.mode,
            elapsed_ms = %start.elapsed().as_millis(),
            "Label scanned"
        );
        Ok(result)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

// ──────────────────────────────────────────────
// Vision LLM
// ──────────────────────────────────────────────

/// Hosted vision model reading the fields directly.
pub struct VisionLabelScanner {
    reader: VisionLabelReader,
}

impl VisionLabelScanner {
    pub fn new(reader: VisionLabelReader) -> Self {
        Self { reader }
    }
}

impl LabelScanner for VisionLabelScanner {
    fn name(&self) -> &'static str {
        "vision"
    }

    fn scan(&self, image_bytes: &[u8]) -> Result<ScanResult, ScanError> {
        self.reader.read_label(image_bytes)
    }
}
