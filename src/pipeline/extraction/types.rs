use serde::{Deserialize, Serialize};

use super::ScanError;

/// One recognized text span from an OCR pass, in reading order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrSpan {
    pub text: String,
    pub confidence: f32,
    pub bounding_box: Option<BoundingBox>,
}

impl OcrSpan {
    /// Span with no geometry (mocks, vision output).
    pub fn text_only(text: &str) -> Self {
        Self {
            text: text.to_string(),
            confidence: 1.0,
            bounding_box: None,
        }
    }
}

/// Pixel-space bounding box of a span, relative to the image that was recognized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Join span texts with single spaces. This is the text every extractor consumes.
pub fn spans_to_text(spans: &[OcrSpan]) -> String {
    spans
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Local OCR engine abstraction (allows mocking for tests).
///
/// Built once at process start and shared read-only across requests.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Recognize text in a PNG-encoded image.
    fn recognize(&self, image_png: &[u8]) -> Result<Vec<OcrSpan>, ScanError>;
}

/// Device fields read from a sticker. All optional, independently populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imei: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Network lock, e.g. "Verizon", "Unlocked". Serialized as `carrier`.
    #[serde(rename = "carrier", skip_serializing_if = "Option::is_none")]
    pub carrier_lock: Option<String>,
}

/// Shipping fields read from a label.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

impl ShippingRecord {
    pub fn apply_location(&mut self, location: LocationCandidate) {
        self.city = Some(location.city);
        self.state = Some(location.state);
        self.zip = Some(location.zip);
    }
}

/// A `CITY ST 12345` triple found in label text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocationCandidate {
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Everything one scan produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScanResult {
    pub device: DeviceRecord,
    pub shipping: ShippingRecord,
    pub raw_text: String,
}
