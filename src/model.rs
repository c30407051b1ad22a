use image::DynamicImage;

/// Trait for image classifiers that can be served by the scoring endpoint.
///
/// A classifier is loaded once and then only read: `classify` takes `&self`
/// so the same instance answers every request.
pub trait Classifier {
    /// The error type that can be returned during inference.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Classifies a decoded image.
    fn classify(&self, image: &DynamicImage) -> Result<Classification, Self::Error>;
}

/// Output of a classifier for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Name of the predicted class.
    pub label: String,
    /// Index of the predicted class in `probabilities`.
    pub index: usize,
    /// Confidence for every known class.
    pub probabilities: Vec<f32>,
}

impl Classification {
    /// Picks the most probable class.
    ///
    /// Returns `None` when there are no scores or a score has no label.
    pub fn from_probabilities(labels: &[String], probabilities: Vec<f32>) -> Option<Self> {
        let (index, _) = probabilities
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))?;
        let label = labels.get(index)?.clone();
        Some(Self {
            label,
            index,
            probabilities,
        })
    }

    /// Confidence of the predicted class, `None` if `index` is out of range.
    pub fn confidence(&self) -> Option<f32> {
        self.probabilities.get(self.index).copied()
    }
}

/// Normalizes raw scores into probabilities.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        ["water_bottle", "milk_bottle", "wine_bottle"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_from_probabilities_picks_argmax() {
        let c = Classification::from_probabilities(&labels(), vec![0.1, 0.7, 0.2]).unwrap();
        assert_eq!(c.label, "milk_bottle");
        assert_eq!(c.index, 1);
        assert_eq!(c.confidence(), Some(0.7));
    }

    #[test]
    fn test_from_probabilities_without_scores() {
        assert!(Classification::from_probabilities(&labels(), vec![]).is_none());
    }

    #[test]
    fn test_from_probabilities_with_unlabelled_winner() {
        assert!(Classification::from_probabilities(&labels(), vec![0.0, 0.0, 0.0, 1.0]).is_none());
    }

    #[test]
    fn test_softmax() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(p[2] > p[1] && p[1] > p[0]);

        let uniform = softmax(&[5.0, 5.0]);
        assert!((uniform[0] - 0.5).abs() < 1e-6);
    }
}
