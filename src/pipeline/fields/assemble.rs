//! Per-field source selection across OCR passes, and result assembly.
//!
//! Source policy:
//! - IMEI: bottom-half pass first (stickers sit low and need the upscale), then full.
//! - serial, model, storage, color, carrier lock: full + bottom concatenated.
//! - tracking, service, recipient, street, location: full pass only.

use tracing::info;

use super::device::{
    extract_carrier_device, extract_color, extract_imei, extract_model, extract_serial,
    extract_storage,
};
use super::profile::ExtractionProfile;
use super::shipping::{
    extract_address, extract_location, extract_recipient, extract_shipping_service,
    extract_tracking,
};
use crate::pipeline::extraction::sanitize::normalize_label_text;
use crate::pipeline::extraction::types::{DeviceRecord, ScanResult, ShippingRecord};

/// Text recovered from one image, one entry per OCR pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassTexts {
    /// Whole frame.
    pub full: String,
    /// Lower half, upscaled and thresholded. `None` in single-pass mode.
    pub bottom: Option<String>,
}

impl PassTexts {
    pub fn single(full: impl Into<String>) -> Self {
        Self {
            full: full.into(),
            bottom: None,
        }
    }

    pub fn dual(full: impl Into<String>, bottom: impl Into<String>) -> Self {
        Self {
            full: full.into(),
            bottom: Some(bottom.into()),
        }
    }

    /// Full text followed by bottom text, space separated.
    pub fn combined(&self) -> String {
        match &self.bottom {
            Some(bottom) => format!("{} {}", self.full, bottom),
            None => self.full.clone(),
        }
    }
}

/// Run every extractor against its preferred source and package the result.
pub fn assemble_scan(texts: &PassTexts, profile: &ExtractionProfile) -> ScanResult {
    let full = normalize_label_text(&texts.full);
    let bottom = texts.bottom.as_deref().map(normalize_label_text);
    let combined = normalize_label_text(&texts.combined());

    let device = DeviceRecord {
        imei: bottom
            .as_deref()
            .and_then(extract_imei)
            .or_else(|| extract_imei(&full)),
        serial: extract_serial(&combined),
        model: extract_model(&combined),
        storage: extract_storage(&combined),
        color: extract_color(&combined),
        carrier_lock: extract_carrier_device(&combined),
    };

    let (tracking_number, carrier) = match extract_tracking(&full) {
        Some((number, carrier)) => (Some(number), Some(carrier.to_string())),
        None => (None, None),
    };
    let mut shipping = ShippingRecord {
        tracking_number,
        carrier,
        service: extract_shipping_service(&full),
        recipient_name: extract_recipient(&full, profile),
        street_address: extract_address(&full, profile),
        ..Default::default()
    };
    if let Some(location) = extract_location(&full, profile) {
        shipping.apply_location(location);
    }

    log_fields(&device, &shipping);

    ScanResult {
        device,
        shipping,
        raw_text: texts.full.clone(),
    }
}

fn log_fields(device: &DeviceRecord, shipping: &ShippingRecord) {
    let fields = [
        ("imei", &device.imei),
        ("serial", &device.serial),
        ("model", &device.model),
        ("storage", &device.storage),
        ("color", &device.color),
        ("device_carrier", &device.carrier_lock),
        ("tracking_number", &shipping.tracking_number),
        ("carrier", &shipping.carrier),
        ("service", &shipping.service),
        ("recipient_name", &shipping.recipient_name),
        ("street_address", &shipping.street_address),
        ("city", &shipping.city),
        ("state", &shipping.state),
        ("zip", &shipping.zip),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            info!(field, value = %value, "Field extracted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ExtractionProfile {
        ExtractionProfile::default()
    }

    #[test]
    fn label_and_sticker_end_to_end() {
        let texts = PassTexts::single(
            "SHIP TO JOHN SMITH 123 MAIN ST MIAMI FL 33101 IMEI:123456789012345",
        );
        let result = assemble_scan(&texts, &profile());

        assert_eq!(result.device.imei.as_deref(), Some("123456789012345"));
        assert_eq!(
            result.shipping,
            ShippingRecord {
                recipient_name: Some("JOHN SMITH".into()),
                street_address: Some("123 MAIN ST".into()),
                city: Some("MIAMI".into()),
                state: Some("FL".into()),
                zip: Some("33101".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn imei_prefers_bottom_pass() {
        let texts = PassTexts::dual("IMEI: 351111111111111", "IMEI: 352222222222222");
        let result = assemble_scan(&texts, &profile());
        assert_eq!(result.device.imei.as_deref(), Some("352222222222222"));
    }

    #[test]
    fn imei_falls_back_to_full_pass() {
        let texts = PassTexts::dual("IMEI: 351111111111111", "blurry sticker");
        let result = assemble_scan(&texts, &profile());
        assert_eq!(result.device.imei.as_deref(), Some("351111111111111"));
    }

    #[test]
    fn device_fields_read_from_both_passes() {
        let texts = PassTexts::dual("Apple, iPhone 14 Pro", "256GB Space Gray S/N F2LXK0ABCD12");
        let result = assemble_scan(&texts, &profile());
        assert_eq!(result.device.model.as_deref(), Some("iPhone 14 Pro"));
        assert_eq!(result.device.storage.as_deref(), Some("256GB"));
        assert_eq!(result.device.color.as_deref(), Some("Space Gray"));
        assert_eq!(result.device.serial.as_deref(), Some("F2LXK0ABCD12"));
    }

    #[test]
    fn shipping_fields_ignore_bottom_pass() {
        let texts = PassTexts::dual(
            "UPS GROUND",
            "1Z999AA10123456784 SHIP TO JOHN SMITH 123 MAIN ST MIAMI FL 33101",
        );
        let result = assemble_scan(&texts, &profile());
        assert_eq!(result.shipping.service.as_deref(), Some("UPS Ground"));
        assert_eq!(result.shipping.tracking_number, None);
        assert_eq!(result.shipping.recipient_name, None);
        assert_eq!(result.shipping.street_address, None);
        assert_eq!(result.shipping.city, None);
    }

    #[test]
    fn tracking_sets_carrier_tag() {
        let texts = PassTexts::single("1Z 999 AA1 0123456784");
        let result = assemble_scan(&texts, &profile());
        assert_eq!(result.shipping.tracking_number.as_deref(), Some("1Z999AA10123456784"));
        assert_eq!(result.shipping.carrier.as_deref(), Some("UPS"));
    }

    #[test]
    fn raw_text_is_full_pass() {
        let texts = PassTexts::dual("full  text", "bottom");
        assert_eq!(assemble_scan(&texts, &profile()).raw_text, "full  text");
    }

    #[test]
    fn combined_joins_with_space() {
        assert_eq!(PassTexts::dual("a", "b").combined(), "a b");
        assert_eq!(PassTexts::single("a").combined(), "a");
    }

    #[test]
    fn assembly_is_deterministic() {
        let texts = PassTexts::dual(
            "UDEAL INC 100 HUDSON ST EAST MEADOW NY 11554 SHIP TO JOHN SMITH 123 MAIN ST MIAMI FL 33101",
            "IMEI 355260780990629 Midnight",
        );
        let first = assemble_scan(&texts, &profile());
        for _ in 0..3 {
            assert_eq!(assemble_scan(&texts, &profile()), first);
        }
        assert_eq!(first.shipping.street_address.as_deref(), Some("123 MAIN ST"));
        assert_eq!(first.shipping.city.as_deref(), Some("MIAMI"));
    }
}
