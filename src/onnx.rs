//! Image classifier backed by an ONNX model.
//!
//! The model must take a single `[1, 3, S, S]` f32 tensor in NCHW layout,
//! normalized with the ImageNet mean and standard deviation, and return one
//! score per class. Class names are read from a text file, one per line, in
//! output order.

use crate::{
    error::{InitializationError, OnnxError},
    model::{Classification, Classifier, softmax},
};
use image::{DynamicImage, GenericImageView, RgbImage, imageops};
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Side of the square input most ImageNet classifiers expect.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Where and how to load an [`OnnxClassifier`].
#[derive(Clone, Debug)]
pub struct OnnxConfig {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    /// Side of the square model input.
    pub input_size: u32,
    /// Whether the model returns raw logits that still need a softmax.
    pub apply_softmax: bool,
}

impl OnnxConfig {
    pub fn new(model_path: impl Into<PathBuf>, labels_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            labels_path: labels_path.into(),
            input_size: DEFAULT_INPUT_SIZE,
            apply_softmax: false,
        }
    }
}

pub struct OnnxClassifier {
    plan: OnnxPlan,
    labels: Vec<String>,
    input_size: u32,
    apply_softmax: bool,
}

impl OnnxClassifier {
    /// Loads the label set and the model, then optimizes the model for a
    /// fixed input shape.
    pub fn load(config: &OnnxConfig) -> Result<Self, InitializationError> {
        let labels = read_labels(&config.labels_path)?;

        std::fs::metadata(&config.model_path).map_err(|source| InitializationError::Unavailable {
            path: config.model_path.clone(),
            source,
        })?;

        let size = config.input_size as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(&config.model_path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, 3, size, size]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| InitializationError::Model(e.to_string()))?;

        log::info!(
            "Loaded {} with {} labels",
            config.model_path.display(),
            labels.len()
        );

        Ok(Self {
            plan,
            labels,
            input_size: config.input_size,
            apply_softmax: config.apply_softmax,
        })
    }
}

impl Classifier for OnnxClassifier {
    type Error = OnnxError;

    fn classify(&self, image: &DynamicImage) -> Result<Classification, Self::Error> {
        let input = preprocess(image, self.input_size);
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| OnnxError::Execution(e.to_string()))?;

        let output = outputs
            .first()
            .ok_or_else(|| OnnxError::Execution("model returned no outputs".to_string()))?;
        let scores: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| OnnxError::Execution(e.to_string()))?
            .iter()
            .copied()
            .collect();

        postprocess(&self.labels, scores, self.apply_softmax)
    }
}

/// Turns raw model scores into a classification: one score per label,
/// optionally normalized, then the most probable class.
pub(crate) fn postprocess(
    labels: &[String],
    scores: Vec<f32>,
    apply_softmax: bool,
) -> Result<Classification, OnnxError> {
    if scores.len() != labels.len() {
        return Err(OnnxError::LabelMismatch {
            expected: labels.len(),
            actual: scores.len(),
        });
    }

    let probabilities = if apply_softmax {
        softmax(&scores)
    } else {
        scores
    };

    Classification::from_probabilities(labels, probabilities)
        .ok_or_else(|| OnnxError::Execution("model returned no scores".to_string()))
}

/// Reads class names, one per line, skipping blank lines.
pub fn read_labels(path: &Path) -> Result<Vec<String>, InitializationError> {
    let content =
        std::fs::read_to_string(path).map_err(|source| InitializationError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;

    let labels: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if labels.is_empty() {
        return Err(InitializationError::Labels(format!(
            "{} contains no labels",
            path.display()
        )));
    }
    Ok(labels)
}

/// Fits the image into a `size`×`size` square, keeping the aspect ratio and
/// padding with black, then normalizes it into a `[1, 3, size, size]` tensor.
pub(crate) fn preprocess(image: &DynamicImage, size: u32) -> Tensor {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = if width > height {
        (size, (size * height / width).max(1))
    } else {
        ((size * width / height).max(1), size)
    };

    let resized = image
        .resize_exact(new_width, new_height, imageops::FilterType::Triangle)
        .to_rgb8();

    let mut canvas = RgbImage::new(size, size);
    let pad_x = (size - new_width) / 2;
    let pad_y = (size - new_height) / 2;
    imageops::replace(&mut canvas, &resized, i64::from(pad_x), i64::from(pad_y));

    let side = size as usize;
    tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        let value = canvas.get_pixel(x as u32, y as u32)[c];
        (f32::from(value) / 255.0 - MEAN[c]) / STD[c]
    })
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_read_labels_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "water_bottle\n\n  milk_bottle \n").unwrap();

        assert_eq!(read_labels(&path).unwrap(), ["water_bottle", "milk_bottle"]);
    }

    #[test]
    fn test_read_labels_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "\n \n").unwrap();

        assert!(matches!(read_labels(&path), Err(InitializationError::Labels(_))));
    }

    #[test]
    fn test_load_without_model_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let labels = dir.path().join("labels.txt");
        std::fs::write(&labels, "a\nb\n").unwrap();

        let config = OnnxConfig::new(dir.path().join("model.onnx"), labels);
        let err = OnnxClassifier::load(&config).err().unwrap();
        assert!(matches!(err, InitializationError::Unavailable { .. }));
    }

    #[test]
    fn test_load_without_labels_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = OnnxConfig::new(dir.path().join("model.onnx"), dir.path().join("labels.txt"));
        let err = OnnxClassifier::load(&config).err().unwrap();
        assert!(matches!(err, InitializationError::Unavailable { .. }));
    }

    #[test]
    fn test_load_rejects_garbage_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.onnx");
        let labels = dir.path().join("labels.txt");
        std::fs::write(&model, b"this is not a protobuf graph").unwrap();
        std::fs::write(&labels, "a\n").unwrap();

        let err = OnnxClassifier::load(&OnnxConfig::new(model, labels)).err().unwrap();
        assert!(matches!(err, InitializationError::Model(_)));
    }

    fn bottles() -> Vec<String> {
        vec!["water_bottle".to_string(), "milk_bottle".to_string()]
    }

    #[test]
    fn test_postprocess_rejects_label_mismatch() {
        let err = postprocess(&bottles(), vec![0.1, 0.2, 0.7], false).unwrap_err();
        assert!(matches!(
            err,
            OnnxError::LabelMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_postprocess_keeps_probabilities_without_softmax() {
        let c = postprocess(&bottles(), vec![0.8, 0.2], false).unwrap();
        assert_eq!(c.label, "water_bottle");
        assert_eq!(c.probabilities, [0.8, 0.2]);
    }

    #[test]
    fn test_postprocess_applies_softmax_to_logits() {
        let c = postprocess(&bottles(), vec![-1.0, 3.0], true).unwrap();
        assert_eq!(c.label, "milk_bottle");
        assert!((c.probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-6);

        let p = c.confidence().unwrap();
        assert!(p > 0.98 && p < 1.0);
    }

    #[test]
    fn test_postprocess_without_scores() {
        let err = postprocess(&[], vec![], true).unwrap_err();
        assert!(matches!(err, OnnxError::Execution(_)));
    }

    #[test]
    fn test_preprocess_pads_and_normalizes() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([255, 255, 255])));
        let tensor = preprocess(&white, 8);
        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);

        let view = tensor.to_array_view::<f32>().unwrap();
        // top rows are padding, middle rows are image
        let pad = view[[0, 0, 0, 0]];
        let body = view[[0, 0, 4, 4]];
        assert!((pad - (0.0 - MEAN[0]) / STD[0]).abs() < 1e-5);
        assert!((body - (1.0 - MEAN[0]) / STD[0]).abs() < 1e-5);
    }
}
