//! Ordered class label set
//!
//! The position of a label in the file is the class id used by the model's
//! output vector, so the order is fixed once loaded.

use crate::error::{CropDxError, Result};
use std::path::Path;

/// Separator between plant and condition in `Plant___Condition` labels
const PLANT_CONDITION_SEPARATOR: &str = "___";

/// Immutable, ordered list of class labels
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassLabels {
    labels: Vec<String>,
}

/// A label split into its display parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelParts {
    pub display: String,
    pub plant: String,
    pub condition: String,
    pub is_healthy: bool,
}

impl ClassLabels {
    /// Build from an in-memory list
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(CropDxError::invalid_config("Class label set is empty"));
        }
        Ok(Self { labels })
    }

    /// Load one label per non-empty line
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CropDxError::invalid_config(format!(
                "Failed to read class labels '{}': {e}",
                path.display()
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse label file content
    pub fn parse(content: &str) -> Result<Self> {
        let labels = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(labels)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// First `n` labels, for info endpoints
    #[must_use]
    pub fn preview(&self, n: usize) -> Vec<String> {
        self.labels.iter().take(n).cloned().collect()
    }

    /// Fail with `LabelMismatch` unless the model emits exactly one score per label
    pub fn ensure_matches(&self, output_classes: usize) -> Result<()> {
        if output_classes == self.labels.len() {
            Ok(())
        } else {
            Err(CropDxError::LabelMismatch {
                outputs: output_classes,
                labels: self.labels.len(),
            })
        }
    }
}

/// Split a raw label into display parts
///
/// `Tomato___Late_blight` becomes plant `Tomato`, condition `Late blight`.
/// Labels without the separator keep the whole text as plant and condition.
#[must_use]
pub fn humanize(raw: &str) -> LabelParts {
    let clean = |s: &str| s.replace('_', " ").split_whitespace().collect::<Vec<_>>().join(" ");

    match raw.split_once(PLANT_CONDITION_SEPARATOR) {
        Some((plant, condition)) => {
            let plant = clean(plant);
            let condition = clean(condition);
            let is_healthy = condition.eq_ignore_ascii_case("healthy");
            LabelParts {
                display: format!("{plant} - {condition}"),
                plant,
                condition,
                is_healthy,
            }
        },
        None => {
            let display = clean(raw);
            let is_healthy = display.to_ascii_lowercase().contains("healthy");
            LabelParts {
                plant: display.clone(),
                condition: display.clone(),
                display,
                is_healthy,
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_lines() {
        let labels = ClassLabels::parse("Apple___healthy\n\n  Tomato___Late_blight  \n").unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get(1), Some("Tomato___Late_blight"));
        assert_eq!(labels.get(2), None);
    }

    #[test]
    fn test_empty_label_file_rejected() {
        assert!(ClassLabels::parse("\n \n").is_err());
    }

    #[test]
    fn test_ensure_matches() {
        let labels = ClassLabels::parse("a\nb\nc").unwrap();
        assert!(labels.ensure_matches(3).is_ok());
        let err = labels.ensure_matches(4).unwrap_err();
        assert!(matches!(
            err,
            CropDxError::LabelMismatch {
                outputs: 4,
                labels: 3
            }
        ));
    }

    #[test]
    fn test_humanize_plant_village_labels() {
        let parts = humanize("Tomato___Late_blight");
        assert_eq!(parts.display, "Tomato - Late blight");
        assert_eq!(parts.plant, "Tomato");
        assert_eq!(parts.condition, "Late blight");
        assert!(!parts.is_healthy);

        let parts = humanize("Corn_(maize)___healthy");
        assert_eq!(parts.display, "Corn (maize) - healthy");
        assert!(parts.is_healthy);
    }

    #[test]
    fn test_humanize_plain_label() {
        let parts = humanize("leaf_spot");
        assert_eq!(parts.display, "leaf spot");
        assert_eq!(parts.plant, "leaf spot");
        assert!(!parts.is_healthy);
    }
}
