use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ModelError;

/// Label returned by the health and disease classifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub diagnosis: String,
}

/// One grain from the single-grain analyzer.
///
/// The analyzer's field set varies by model version (length, width, volume,
/// weight, calories, protein, ...), so fields are kept as an open map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrainRecord {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl GrainRecord {
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleGrainReport {
    pub grains: Vec<GrainRecord>,
}

impl SingleGrainReport {
    pub fn first_grain(&self) -> Option<&GrainRecord> {
        self.grains.first()
    }
}

/// Nutrient totals for a multi-grain photo, keyed by nutrient name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiGrainNutrition {
    #[serde(flatten)]
    pub totals: Map<String, Value>,
}

impl MultiGrainNutrition {
    pub fn number(&self, key: &str) -> Option<f64> {
        self.totals.get(key).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineReport {
    pub grain_count: u64,
    #[serde(default)]
    pub grain_type: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<f64>,
    #[serde(default)]
    pub total_weight: Option<f64>,
    /// Base64 JPEG with the detected grain outlines drawn in.
    #[serde(default)]
    pub outlined_image: Option<String>,
}

impl OutlineReport {
    pub fn outlined_image_bytes(&self) -> Result<Option<Vec<u8>>, ModelError> {
        let Some(encoded) = self.outlined_image.as_deref() else { return Ok(None) };
        // tolerate a data URL prefix
        let payload = encoded
            .split_once(";base64,")
            .map_or(encoded, |(_, data)| data)
            .trim();
        STANDARD
            .decode(payload)
            .map(Some)
            .map_err(|e| ModelError::Decode(format!("outlined_image is not valid base64: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn grain_record_keeps_open_fields() {
        let report: SingleGrainReport =
            serde_json::from_value(json!({"grains": [{"grain": 1, "calories": 12.5}]})).unwrap();
        let first = report.first_grain().unwrap();
        assert_eq!(first.number("calories"), Some(12.5));
        assert_eq!(first.number("grain"), Some(1.0));
        assert_eq!(first.number("missing"), None);
    }

    #[test]
    fn outline_image_decodes_plain_and_data_url() {
        let mut report = OutlineReport {
            grain_count: 3,
            grain_type: Some("Basmati".into()),
            aspect_ratio: Some(3.1),
            total_weight: Some(0.06),
            outlined_image: Some(STANDARD.encode(b"jpeg")),
        };
        assert_eq!(report.outlined_image_bytes().unwrap().unwrap(), b"jpeg");

        report.outlined_image = Some(format!("data:image/jpeg;base64,{}", STANDARD.encode(b"xy")));
        assert_eq!(report.outlined_image_bytes().unwrap().unwrap(), b"xy");

        report.outlined_image = Some("***".into());
        assert!(matches!(report.outlined_image_bytes(), Err(ModelError::Decode(_))));

        report.outlined_image = None;
        assert_eq!(report.outlined_image_bytes().unwrap(), None);
    }

    #[test]
    fn outline_requires_grain_count() {
        let parsed: Result<OutlineReport, _> = serde_json::from_value(json!({"grain_type": "x"}));
        assert!(parsed.is_err());
    }
}
