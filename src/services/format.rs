//! Response formatting service
//!
//! Turns a raw probability vector into ranked, human-readable predictions.

use crate::{
    config::clamp_top_n,
    error::Result,
    labels::{humanize, ClassLabels},
    types::{ClassPrediction, PredictionResult},
};

/// Service for ranking and labeling model outputs
pub struct ResponseFormatter;

impl ResponseFormatter {
    /// Rank classes by descending probability and keep the top `top_n`
    ///
    /// `top_n` is clamped to `1..=10` and to the number of classes. Ties keep
    /// the lower class index first.
    ///
    /// # Arguments
    /// * `probabilities` - One score per class, in label order
    /// * `labels` - Class labels loaded alongside the model
    /// * `top_n` - Requested number of ranked classes
    ///
    /// # Errors
    /// - `LabelMismatch` when the vector length differs from the label count
    pub fn format(
        probabilities: &[f32],
        labels: &ClassLabels,
        top_n: usize,
    ) -> Result<PredictionResult> {
        labels.ensure_matches(probabilities.len())?;

        let mut order: Vec<usize> = (0..probabilities.len()).collect();
        // Stable sort, so equal scores stay in index order
        order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));

        let predictions = order
            .into_iter()
            .take(clamp_top_n(top_n))
            .enumerate()
            .filter_map(|(position, class_index)| {
                let raw_label = labels.get(class_index)?;
                let parts = humanize(raw_label);
                Some(ClassPrediction {
                    rank: position + 1,
                    class_index,
                    label: parts.display,
                    raw_label: raw_label.to_string(),
                    plant: parts.plant,
                    condition: parts.condition,
                    is_healthy: parts.is_healthy,
                    confidence: probabilities[class_index],
                })
            })
            .collect();

        Ok(PredictionResult { predictions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CropDxError;

    fn labels() -> ClassLabels {
        ClassLabels::parse(
            "Apple___Apple_scab\nApple___healthy\nTomato___Late_blight\nTomato___healthy\n",
        )
        .unwrap()
    }

    #[test]
    fn test_ranks_by_descending_confidence() {
        let result = ResponseFormatter::format(&[0.1, 0.2, 0.6, 0.1], &labels(), 3).unwrap();

        assert_eq!(result.len(), 3);
        let top = result.top_prediction().unwrap();
        assert_eq!(top.rank, 1);
        assert_eq!(top.class_index, 2);
        assert_eq!(top.label, "Tomato - Late blight");
        assert_eq!(top.raw_label, "Tomato___Late_blight");
        assert!(!top.is_healthy);
        assert!((top.confidence - 0.6).abs() < f32::EPSILON);

        let ranks: Vec<usize> = result.predictions.iter().map(|p| p.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_ties_keep_index_order() {
        let result = ResponseFormatter::format(&[0.1, 0.2, 0.6, 0.1], &labels(), 4).unwrap();
        let order: Vec<usize> = result.predictions.iter().map(|p| p.class_index).collect();
        assert_eq!(order, vec![2, 1, 0, 3]);
    }

    #[test]
    fn test_top_n_clamped_to_class_count() {
        let result = ResponseFormatter::format(&[0.25; 4], &labels(), 10).unwrap();
        assert_eq!(result.len(), 4);

        let result = ResponseFormatter::format(&[0.25; 4], &labels(), 0).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_top_n_never_exceeds_ten() {
        let many = ClassLabels::new((0..38).map(|i| format!("class_{i}")).collect()).unwrap();
        let probabilities = vec![1.0 / 38.0; 38];
        let result = ResponseFormatter::format(&probabilities, &many, 50).unwrap();
        assert_eq!(result.len(), 10);
    }

    #[test]
    fn test_length_mismatch() {
        let err = ResponseFormatter::format(&[0.5, 0.5], &labels(), 3).unwrap_err();
        assert!(matches!(
            err,
            CropDxError::LabelMismatch {
                outputs: 2,
                labels: 4
            }
        ));
    }
}
