use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// The detector labels that take part in collision analysis.
///
/// Filtering happens before the analyzer, never after: the analyzer only ever
/// sees labels from this set.
pub const VEHICLE_CLASSES: [&str; 4] = ["CAR", "TRUCK", "BUS", "MOTORBIKE"];

/// One detected object: pixel-space box, upper-cased class label, and a
/// confidence in `[0, 1]`. Read-only downstream of the detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            label: label.into().to_uppercase(),
            confidence,
        }
    }

    pub fn is_vehicle(&self) -> bool {
        VEHICLE_CLASSES.contains(&self.label.as_str())
    }
}

/// Round a raw model score up to two decimals, the way scores are reported
/// everywhere (stream labels, detection endpoint, event sinks).
pub fn round_confidence(raw: f32) -> f32 {
    (raw * 100.0).ceil() / 100.0
}

/// Confidence as a two-decimal f64 for JSON output. Serializing the f32
/// directly would print its full binary expansion ("0.9100000262...").
pub fn json_confidence(confidence: f32) -> f64 {
    (confidence as f64 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(label: &str) -> Detection {
        let bbox = BoundingBox { x1: 0, y1: 0, x2: 10, y2: 10 };
        Detection::new(bbox, label, 0.9)
    }

    #[test]
    fn labels_are_normalized_to_upper_case() {
        assert_eq!(boxed("car").label, "CAR");
        assert_eq!(boxed("Truck").label, "TRUCK");
    }

    #[test]
    fn vehicle_membership_is_exact() {
        assert!(boxed("car").is_vehicle());
        assert!(boxed("BUS").is_vehicle());
        assert!(boxed("motorbike").is_vehicle());
        assert!(!boxed("person").is_vehicle());
        assert!(!boxed("bicycle").is_vehicle());
        assert!(!boxed("train").is_vehicle());
    }

    #[test]
    fn json_confidence_prints_clean_two_decimal_values() {
        assert_eq!(serde_json::json!(json_confidence(0.91)).to_string(), "0.91");
        assert_eq!(serde_json::json!(json_confidence(1.0)).to_string(), "1.0");
    }

    #[test]
    fn confidence_rounds_up_to_two_decimals() {
        assert_eq!(round_confidence(0.905), 0.91);
        assert_eq!(round_confidence(0.9012), 0.91);
        assert_eq!(round_confidence(0.91), 0.91);
        assert_eq!(round_confidence(0.0), 0.0);
        assert_eq!(round_confidence(1.0), 1.0);
    }
}
