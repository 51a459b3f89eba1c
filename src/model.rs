// file: model.rs
// desc: CNN digit classifier and weight loading

use burn::{
    module::Module,
    nn::{
        Linear, LinearConfig, Relu,
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
    tensor::{Tensor, activation::softmax, backend::Backend},
};

use crate::error::{Error, Result};

pub const NUM_CLASSES: usize = 10;

// 28 -> conv 26 -> pool 13 -> conv 11 -> pool 5
const FLAT_FEATURES: usize = 64 * 5 * 5;
const HIDDEN: usize = 128;

/// Two conv/pool blocks followed by a two-layer classifier head.
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    activation: Relu,
}

impl<B: Backend> Model<B> {
    /// Freshly initialized (untrained) weights.
    pub fn new(device: &B::Device) -> Self {
        Self {
            conv1: Conv2dConfig::new([1, 32], [3, 3]).init(device),
            conv2: Conv2dConfig::new([32, 64], [3, 3]).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1: LinearConfig::new(FLAT_FEATURES, HIDDEN).init(device),
            fc2: LinearConfig::new(HIDDEN, NUM_CLASSES).init(device),
            activation: Relu::new(),
        }
    }

    /// Input `[batch, 1, 28, 28]`, output logits `[batch, 10]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(input);
        let x = self.activation.forward(x);
        let x = self.pool.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool.forward(x);

        let [batch, channels, height, width] = x.dims();
        let x = x.reshape([batch, channels * height * width]);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);
        self.fc2.forward(x)
    }

    /// Device the weights live on.
    pub fn device(&self) -> B::Device {
        self.fc2.weight.val().device()
    }

    /// Class probabilities `[batch, 10]`, each row summing to one.
    pub fn infer(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(input), 1)
    }
}

/// Decodes a named MessagePack full-precision record into a new model.
///
/// Malformed bytes are reported as `Error::ModelDecode`, never a panic.
pub fn load_model<B: Backend>(bytes: Vec<u8>, device: &B::Device) -> Result<Model<B>> {
    let record: ModelRecord<B> = NamedMpkBytesRecorder::<FullPrecisionSettings>::default()
        .load(bytes, device)
        .map_err(|err| Error::ModelDecode {
            reason: format!("{err:?}"),
        })?;

    Ok(Model::new(device).load_record(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn input(device: &<TestBackend as Backend>::Device, value: f32) -> Tensor<TestBackend, 4> {
        Tensor::<TestBackend, 4>::ones([1, 1, 28, 28], device).mul_scalar(value)
    }

    #[test]
    fn forward_produces_one_logit_per_class() {
        let device = Default::default();
        let model = Model::<TestBackend>::new(&device);

        let output = model.forward(input(&device, 0.5));

        assert_eq!(output.dims(), [1, NUM_CLASSES]);
    }

    #[test]
    fn infer_returns_probability_distribution() {
        let device = Default::default();
        let model = Model::<TestBackend>::new(&device);

        let probs = model
            .infer(input(&device, 1.0))
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        assert_eq!(probs.len(), NUM_CLASSES);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn load_model_restores_encoded_weights() {
        let device = Default::default();
        let model = Model::<TestBackend>::new(&device);
        let expected = model
            .infer(input(&device, 0.3))
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        let bytes = NamedMpkBytesRecorder::<FullPrecisionSettings>::default()
            .record(model.into_record(), ())
            .unwrap();
        let loaded = load_model::<TestBackend>(bytes, &device).unwrap();
        let actual = loaded
            .infer(input(&device, 0.3))
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        assert_eq!(expected, actual);
    }

    #[test]
    fn load_model_rejects_garbage() {
        let device = Default::default();
        let result = load_model::<TestBackend>(vec![1, 2, 3], &device);

        assert!(matches!(result, Err(Error::ModelDecode { .. })));
    }

    #[test]
    fn load_model_rejects_html_page() {
        // a dev server answering a missing file with its index page
        let device = Default::default();
        let page = b"<!DOCTYPE html><html><body></body></html>".to_vec();
        let result = load_model::<TestBackend>(page, &device);

        assert!(matches!(result, Err(Error::ModelDecode { .. })));
    }

    #[test]
    fn model_reports_its_device() {
        let device = Default::default();
        let model = Model::<TestBackend>::new(&device);

        assert_eq!(model.device(), device);
    }
}
