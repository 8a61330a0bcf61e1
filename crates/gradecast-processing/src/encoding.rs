//! Label encoding for text columns.
//!
//! Each distinct label gets the next unused integer code in order of first
//! occurrence, starting at 0. Encoders are fitted fresh on every
//! preprocessing run; there is no incremental vocabulary.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Map from column name to the encoder fitted on that column.
pub type EncoderMap = BTreeMap<String, LabelEncoder>;

/// A fitted bidirectional label/code table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LabelEncoder {
    classes: Vec<String>,
    codes: HashMap<String, usize>,
}

impl LabelEncoder {
    /// Fit an encoder on a sequence of labels.
    pub fn fit<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut encoder = Self::default();
        for label in labels {
            if !encoder.codes.contains_key(label) {
                encoder.codes.insert(label.to_string(), encoder.classes.len());
                encoder.classes.push(label.to_string());
            }
        }
        encoder
    }

    /// Fit on `labels` and return the code of every label.
    pub fn fit_transform(labels: &[String]) -> (Self, Vec<usize>) {
        let encoder = Self::fit(labels.iter().map(String::as_str));
        let codes = labels
            .iter()
            .filter_map(|label| encoder.encode(label))
            .collect();
        (encoder, codes)
    }

    /// Code of a label, `None` for labels not seen during fitting.
    pub fn encode(&self, label: &str) -> Option<usize> {
        self.codes.get(label).copied()
    }

    /// Label of a code, `None` for codes outside the fitted range.
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    /// Labels in code order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the encoder has no labels.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl From<Vec<String>> for LabelEncoder {
    fn from(classes: Vec<String>) -> Self {
        Self::fit(classes.iter().map(String::as_str))
    }
}

impl From<LabelEncoder> for Vec<String> {
    fn from(encoder: LabelEncoder) -> Self {
        encoder.classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_codes_follow_first_occurrence() {
        let (encoder, codes) = LabelEncoder::fit_transform(&labels(&["b", "a", "b", "c"]));

        assert_eq!(codes, vec![0, 1, 0, 2]);
        assert_eq!(encoder.encode("b"), Some(0));
        assert_eq!(encoder.encode("a"), Some(1));
        assert_eq!(encoder.encode("c"), Some(2));
        assert_eq!(encoder.classes(), &labels(&["b", "a", "c"])[..]);
    }

    #[test]
    fn test_refit_is_deterministic() {
        let input = labels(&["b", "a", "b", "c"]);
        let (first, _) = LabelEncoder::fit_transform(&input);
        let (second, _) = LabelEncoder::fit_transform(&input);
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_and_unknown_labels() {
        let encoder = LabelEncoder::fit(["x", "y"]);
        assert_eq!(encoder.decode(1), Some("y"));
        assert_eq!(encoder.decode(2), None);
        assert_eq!(encoder.encode("z"), None);
        assert_eq!(encoder.len(), 2);
        assert!(!encoder.is_empty());
    }

    #[test]
    fn test_serializes_as_class_list() {
        let encoder = LabelEncoder::fit(["math", "art"]);
        let json = serde_json::to_string(&encoder).unwrap();
        assert_eq!(json, r#"["math","art"]"#);

        let back: LabelEncoder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, encoder);
    }
}
