use std::collections::VecDeque;
use std::sync::Mutex;

use super::types::{BoundingBox, OcrEngine, OcrSpan};
use super::ScanError;

/// Tesseract via libtesseract. Only available with the `tesseract` feature.
///
/// The language model is loaded once in `new` and the handle is reused by
/// every `recognize` call; calls are serialized on it.
#[cfg(feature = "tesseract")]
pub struct TesseractOcr {
    handle: EngineSlot<tesseract::Tesseract>,
}

#[cfg(feature = "tesseract")]
impl TesseractOcr {
    /// `tessdata_dir = None` uses libtesseract's compiled-in default location.
    pub fn new(tessdata_dir: Option<&std::path::Path>) -> Result<Self, ScanError> {
        const LANG: &str = "eng";

        let datapath = match tessdata_dir {
            Some(dir) => {
                if !dir.join("eng.traineddata").exists() {
                    return Err(ScanError::TessdataNotFound(dir.to_path_buf()));
                }
                let dir = dir
                    .to_str()
                    .ok_or_else(|| ScanError::OcrInit("Invalid tessdata path".into()))?;
                Some(dir.to_string())
            }
            None => None,
        };

        let handle = EngineSlot::new(move || {
            tesseract::Tesseract::new(datapath.as_deref(), Some(LANG))
                .map_err(|e| ScanError::OcrInit(format!("{e:?}")))
        })?;
        tracing::info!(tessdata = ?tessdata_dir, lang = LANG, "Tesseract OCR engine ready");
        Ok(Self { handle })
    }
}

#[cfg(feature = "tesseract")]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image_png: &[u8]) -> Result<Vec<OcrSpan>, ScanError> {
        let tsv = self.handle.run(|tess| {
            let mut tess = tess
                .set_image_from_mem(image_png)
                .map_err(|e| ScanError::OcrProcessing(format!("{e:?}")))?
                .recognize()
                .map_err(|e| ScanError::OcrProcessing(format!("{e:?}")))?;
            let tsv = tess
                .get_tsv_text(0)
                .map_err(|e| ScanError::OcrProcessing(format!("{e:?}")))?;
            Ok((tess, tsv))
        })?;
        Ok(parse_tsv_spans(&tsv))
    }
}

/// A long-lived engine handle behind a lock.
///
/// Engine calls that consume the handle take it out and hand it back. A
/// handle lost to a failed call is rebuilt on the next use.
#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
pub(crate) struct EngineSlot<T> {
    handle: Mutex<Option<T>>,
    init: Box<dyn Fn() -> Result<T, ScanError> + Send + Sync>,
}

#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
impl<T> EngineSlot<T> {
    /// Build the first handle now, so a broken install fails at start-up.
    pub(crate) fn new(
        init: impl Fn() -> Result<T, ScanError> + Send + Sync + 'static,
    ) -> Result<Self, ScanError> {
        let handle = init()?;
        Ok(Self {
            handle: Mutex::new(Some(handle)),
            init: Box::new(init),
        })
    }

    pub(crate) fn run<R>(
        &self,
        job: impl FnOnce(T) -> Result<(T, R), ScanError>,
    ) -> Result<R, ScanError> {
        let mut slot = self
            .handle
            .lock()
            .map_err(|_| ScanError::OcrProcessing("OCR engine lock poisoned".into()))?;
        let handle = match slot.take() {
            Some(handle) => handle,
            None => {
                tracing::warn!("Rebuilding OCR engine handle after a failed call");
                (self.init)()?
            }
        };
        let (handle, output) = job(handle)?;
        *slot = Some(handle);
        Ok(output)
    }
}

/// Scripted OCR engine for tests.
///
/// Each `recognize` call pops the next scripted result; once the script is
/// exhausted every call returns the fallback text.
pub struct MockOcrEngine {
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
}

impl MockOcrEngine {
    /// Every call returns `text`.
    pub fn new(text: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: text.to_string(),
        }
    }

    /// Calls return `texts` in order (full pass first, then bottom pass).
    pub fn scripted(texts: &[&str]) -> Self {
        Self {
            script: Mutex::new(texts.iter().map(|t| Ok(t.to_string())).collect()),
            fallback: String::new(),
        }
    }

    /// The first call fails with `OcrProcessing(message)`.
    pub fn failing(message: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([Err(message.to_string())])),
            fallback: String::new(),
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn recognize(&self, _image_png: &[u8]) -> Result<Vec<OcrSpan>, ScanError> {
        let next = self
            .script
            .lock()
            .map_err(|_| ScanError::OcrProcessing("mock script poisoned".into()))?
            .pop_front();
        let text = match next {
            Some(Ok(text)) => text,
            Some(Err(message)) => return Err(ScanError::OcrProcessing(message)),
            None => self.fallback.clone(),
        };
        Ok(text.split_whitespace().map(OcrSpan::text_only).collect())
    }
}

/// Parse Tesseract TSV output into word spans.
/// TSV columns: level page_num block_num par_num line_num word_num left top width height conf text
/// Level 5 = individual word entries. Confidence is 0-100, scaled to 0.0-1.0.
#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
fn parse_tsv_spans(tsv: &str) -> Vec<OcrSpan> {
    let mut spans = Vec::new();

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        if fields[0].parse::<i32>().ok() != Some(5) {
            continue;
        }

        // Tesseract 5 reports fractional confidence; 4.x reports integers.
        let conf: f32 = match fields[10].parse() {
            Ok(c) => c,
            Err(_) => continue,
        };

        let word = fields[11].trim();
        if word.is_empty() {
            continue;
        }

        // -1 means no confidence assigned
        let confidence = if conf < 0.0 { 0.0 } else { conf / 100.0 };

        spans.push(OcrSpan {
            text: word.to_string(),
            confidence,
            bounding_box: parse_bounding_box(fields[6], fields[7], fields[8], fields[9]),
        });
    }

    spans
}

/// None if any coordinate fails to parse.
#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
fn parse_bounding_box(left: &str, top: &str, width: &str, height: &str) -> Option<BoundingBox> {
    Some(BoundingBox {
        x: left.parse().ok()?,
        y: top.parse().ok()?,
        width: width.parse().ok()?,
        height: height.parse().ok()?,
    })
}
