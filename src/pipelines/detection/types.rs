// SPDX-License-Identifier: GPL-3.0-only

//! Core types for barcode detection results

use crate::render::Rect;
use serde::{Deserialize, Serialize};

/// Barcode symbology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BarcodeFormat {
    Qr,
    Aztec,
    Codabar,
    Code39,
    Code93,
    Code128,
    DataMatrix,
    Ean8,
    Ean13,
    Itf,
    Pdf417,
    UpcA,
    UpcE,
}

impl BarcodeFormat {
    pub fn name(&self) -> &'static str {
        match self {
            BarcodeFormat::Qr => "qr",
            BarcodeFormat::Aztec => "aztec",
            BarcodeFormat::Codabar => "codabar",
            BarcodeFormat::Code39 => "code39",
            BarcodeFormat::Code93 => "code93",
            BarcodeFormat::Code128 => "code128",
            BarcodeFormat::DataMatrix => "dataMatrix",
            BarcodeFormat::Ean8 => "ean8",
            BarcodeFormat::Ean13 => "ean13",
            BarcodeFormat::Itf => "itf",
            BarcodeFormat::Pdf417 => "pdf417",
            BarcodeFormat::UpcA => "upcA",
            BarcodeFormat::UpcE => "upcE",
        }
    }
}

impl std::str::FromStr for BarcodeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.to_lowercase().as_str() {
            "qr" | "qrcode" | "qr_code" => BarcodeFormat::Qr,
            "aztec" => BarcodeFormat::Aztec,
            "codabar" => BarcodeFormat::Codabar,
            "code39" => BarcodeFormat::Code39,
            "code93" => BarcodeFormat::Code93,
            "code128" => BarcodeFormat::Code128,
            "datamatrix" | "data_matrix" => BarcodeFormat::DataMatrix,
            "ean8" => BarcodeFormat::Ean8,
            "ean13" => BarcodeFormat::Ean13,
            "itf" => BarcodeFormat::Itf,
            "pdf417" => BarcodeFormat::Pdf417,
            "upca" => BarcodeFormat::UpcA,
            "upce" => BarcodeFormat::UpcE,
            other => return Err(format!("unknown barcode type '{}'", other)),
        };
        Ok(format)
    }
}

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions,
/// in sensor orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FrameRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a frame region from pixel coordinates
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let fw = frame_width.max(1) as f64;
        let fh = frame_height.max(1) as f64;
        Self {
            x: x as f64 / fw,
            y: y as f64 / fh,
            width: width as f64 / fw,
            height: height as f64 / fh,
        }
    }
}

/// A decoded symbol in frame space, before mapping to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub value: String,
    pub format: BarcodeFormat,
    pub region: FrameRegion,
}

/// `barcodeDetected` event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeEvent {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_value: Option<String>,
    #[serde(rename = "type")]
    pub format: BarcodeFormat,
    /// Bounding box in the caller's display coordinates
    pub bounding_rect: Rect,
}

impl BarcodeEvent {
    pub fn new(raw: RawDetection, bounding_rect: Rect) -> Self {
        let display_value = printable(&raw.value);
        Self {
            display_value: (display_value != raw.value).then_some(display_value),
            value: raw.value,
            format: raw.format,
            bounding_rect,
        }
    }
}

/// Replace control characters (other than whitespace) for display
fn printable(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_control() && !c.is_whitespace() {
                '\u{FFFD}'
            } else {
                c
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_type_field() {
        let raw = RawDetection {
            value: "hello".into(),
            format: BarcodeFormat::Qr,
            region: FrameRegion::new(0.0, 0.0, 0.5, 0.5),
        };
        let event = BarcodeEvent::new(raw, Rect::new(1.0, 2.0, 3.0, 4.0));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "qr");
        assert_eq!(json["boundingRect"]["width"], 3.0);
        assert!(json.get("displayValue").is_none());
    }

    #[test]
    fn test_display_value_only_when_different() {
        let raw = RawDetection {
            value: "abc\u{1d}def\n".into(),
            format: BarcodeFormat::DataMatrix,
            region: FrameRegion::new(0.0, 0.0, 0.1, 0.1),
        };
        let event = BarcodeEvent::new(raw, Rect::default());
        assert_eq!(event.display_value.as_deref(), Some("abc\u{FFFD}def"));
    }

    #[test]
    fn test_format_round_trip_names() {
        for name in ["qr", "ean13", "dataMatrix", "upcE"] {
            let format: BarcodeFormat = name.parse().unwrap();
            assert_eq!(format.name(), name);
        }
    }
}
