// file: inference.rs
// desc: Code to run model inference and label the class probabilities

use std::collections::BTreeMap;

use burn::tensor::{Tensor, backend::Backend};

use crate::error::{Error, Result};
use crate::image::{IMAGE_SIZE, InputImage};
use crate::model::{Model, NUM_CLASSES};

/// Digit label ("0".."9") to predicted probability.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelScores {
    scores: BTreeMap<String, f32>,
}

impl LabelScores {
    /// Pairs class index `i` with label `i.to_string()`.
    pub fn from_probabilities(probs: &[f32]) -> Result<Self> {
        if probs.len() != NUM_CLASSES {
            return Err(Error::ShapeMismatch {
                expected: format!("{NUM_CLASSES} class scores"),
                actual: format!("{} class scores", probs.len()),
            });
        }

        let scores = probs
            .iter()
            .enumerate()
            .map(|(class, &p)| (class.to_string(), p))
            .collect();

        Ok(Self { scores })
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.scores.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Entries in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.scores.iter().map(|(label, &p)| (label.as_str(), p))
    }

    /// The `n` highest scores, descending. Ties keep label order.
    pub fn top(&self, n: usize) -> Vec<(&str, f32)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }

    pub fn best(&self) -> Option<(&str, f32)> {
        self.top(1).into_iter().next()
    }
}

/// Normalized `[1, 1, 28, 28]` tensor; pixel `(x, y)` lands at `[0, 0, y, x]`.
///
/// With one channel this is the same buffer as the NHWC `[1, 28, 28, 1]` layout.
pub fn to_input_tensor<B: Backend>(image: &InputImage, device: &B::Device) -> Tensor<B, 4> {
    Tensor::<B, 1>::from_floats(image.normalized().as_slice(), device)
        .reshape([1, 1, IMAGE_SIZE, IMAGE_SIZE])
}

/// Runs the classifier on a drawn digit.
///
/// `None` means nothing has been drawn yet and yields `Ok(None)`.
pub fn recognize_digit<B: Backend>(
    model: &Model<B>,
    image: Option<&InputImage>,
) -> Result<Option<LabelScores>> {
    let Some(image) = image else {
        return Ok(None);
    };

    let input = to_input_tensor::<B>(image, &model.device());

    let probs = model
        .infer(input)
        .into_data()
        .to_vec::<f32>()
        .map_err(|err| Error::Inference {
            reason: format!("{err:?}"),
        })?;

    LabelScores::from_probabilities(&probs).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn model() -> Model<TestBackend> {
        Model::new(&Default::default())
    }

    fn stroke_image() -> InputImage {
        let mut image = InputImage::blank();
        for y in 4..24 {
            image.paint(14, y);
        }
        image
    }

    #[test]
    fn no_image_gives_empty_result() {
        let result = recognize_digit(&model(), None).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn blank_image_scores_every_digit() {
        let scores = recognize_digit(&model(), Some(&InputImage::blank()))
            .unwrap()
            .unwrap();

        assert_eq!(scores.len(), 10);
        let labels: Vec<_> = scores.iter().map(|(label, _)| label.to_string()).collect();
        let expected: Vec<_> = (0..10).map(|d| d.to_string()).collect();
        assert_eq!(labels, expected);
        assert!(scores.iter().all(|(_, p)| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn scores_sum_to_one() {
        let scores = recognize_digit(&model(), Some(&stroke_image()))
            .unwrap()
            .unwrap();

        let total: f32 = scores.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-4, "total was {total}");
    }

    #[test]
    fn repeated_calls_are_identical() {
        let model = model();
        let image = stroke_image();

        let first = recognize_digit(&model, Some(&image)).unwrap();
        let second = recognize_digit(&model, Some(&image)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn input_tensor_keeps_pixel_position() {
        let mut data = vec![0u8; IMAGE_SIZE * IMAGE_SIZE];
        data[IMAGE_SIZE + 3] = 255; // x = 3, y = 1
        let image = InputImage::from_pixels(data).unwrap();

        let tensor = to_input_tensor::<TestBackend>(&image, &Default::default());

        assert_eq!(tensor.dims(), [1, 1, IMAGE_SIZE, IMAGE_SIZE]);
        let inked = tensor.clone().slice([0..1, 0..1, 1..2, 3..4]).into_scalar();
        assert_eq!(inked, 1.0);
        let transposed = tensor.clone().slice([0..1, 0..1, 3..4, 1..2]).into_scalar();
        assert_eq!(transposed, 0.0);
        assert_eq!(tensor.sum().into_scalar(), 1.0);
    }

    #[test]
    fn labels_follow_class_index() {
        let mut probs = [0.01f32; 10];
        probs[7] = 0.91;
        let scores = LabelScores::from_probabilities(&probs).unwrap();

        assert_eq!(scores.get("7"), Some(0.91));
        assert_eq!(scores.get("0"), Some(0.01));
        assert_eq!(scores.get("10"), None);
        assert_eq!(scores.best(), Some(("7", 0.91)));
    }

    #[test]
    fn wrong_number_of_scores_is_rejected() {
        let err = LabelScores::from_probabilities(&[0.5, 0.5]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn top_ranks_descending_and_truncates() {
        let probs = [0.05, 0.3, 0.05, 0.0, 0.1, 0.0, 0.4, 0.0, 0.1, 0.0];
        let scores = LabelScores::from_probabilities(&probs).unwrap();

        let top = scores.top(4);
        assert_eq!(top, vec![("6", 0.4), ("1", 0.3), ("4", 0.1), ("8", 0.1)]);
        assert_eq!(scores.top(20).len(), 10);
    }
}
