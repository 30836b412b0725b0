//! A small convolutional network over image batches.
//!
//! ```text
//! input ─► conv3×3(16) ─► ReLU ─► maxpool2 ─► conv3×3(32) ─► ReLU ─► maxpool2
//!       ─► flatten ─► linear(64) ─► ReLU ─► linear(K)
//! ```
//!
//! Convolutions use "same" padding. Pooling pads odd edges, so 7×7 pools to
//! 4×4 and every geometry from 1×1 up trains.

use burn::backend::Autodiff;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use ndarray::ArrayView4;

use crate::error::{PipelineError, Result};
use crate::tensor::ImageShape;

/// CPU backend for inference and persisted models.
pub type InferenceBackend = NdArray<f32>;

/// [`InferenceBackend`] with automatic differentiation, used while training.
pub type TrainingBackend = Autodiff<InferenceBackend>;

const CONV1_FILTERS: usize = 16;
const CONV2_FILTERS: usize = 32;
const HIDDEN_UNITS: usize = 64;
const KERNEL: usize = 3;

/// The CPU device shared by both backends.
pub fn device() -> <InferenceBackend as Backend>::Device {
    Default::default()
}

fn conv<B: Backend>(in_channels: usize, filters: usize, device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, filters], [KERNEL, KERNEL])
        .with_padding(PaddingConfig2d::Same)
        .init(device)
}

/// 2×2 max pool, stride 2. An odd edge gets one cell of padding so it is
/// rounded up instead of dropped.
fn pool(height: usize, width: usize) -> MaxPool2d {
    MaxPool2dConfig::new([2, 2])
        .with_strides([2, 2])
        .with_padding(PaddingConfig2d::Explicit(height % 2, width % 2))
        .init()
}

#[derive(Module, Debug)]
pub struct SmallCnn<B: Backend> {
    conv1: Conv2d<B>,
    pool1: MaxPool2d,
    conv2: Conv2d<B>,
    pool2: MaxPool2d,
    hidden: Linear<B>,
    output: Linear<B>,
    activation: Relu,
    height: usize,
    width: usize,
    channels: usize,
    num_classes: usize,
}

impl<B: Backend> SmallCnn<B> {
    pub fn new(input: ImageShape, num_classes: usize, device: &B::Device) -> Self {
        let (h1, w1) = (input.height.div_ceil(2), input.width.div_ceil(2));
        let (h2, w2) = (h1.div_ceil(2), w1.div_ceil(2));
        Self {
            conv1: conv(input.channels, CONV1_FILTERS, device),
            pool1: pool(input.height, input.width),
            conv2: conv(CONV1_FILTERS, CONV2_FILTERS, device),
            pool2: pool(h1, w1),
            hidden: LinearConfig::new(h2 * w2 * CONV2_FILTERS, HIDDEN_UNITS).init(device),
            output: LinearConfig::new(HIDDEN_UNITS, num_classes).init(device),
            activation: Relu::new(),
            height: input.height,
            width: input.width,
            channels: input.channels,
            num_classes,
        }
    }

    pub fn input_shape(&self) -> ImageShape {
        ImageShape::new(self.height, self.width, self.channels)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Logits for an `(N, C, H, W)` batch.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.pool1.forward(self.activation.forward(x));
        let x = self.conv2.forward(x);
        let x = self.pool2.forward(self.activation.forward(x));

        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.activation.forward(self.hidden.forward(x));
        self.output.forward(x)
    }

    /// Move `(N, H, W, C)` images onto `device` in the `(N, C, H, W)` order the
    /// convolutions expect.
    pub fn to_input(&self, images: ArrayView4<f32>, device: &B::Device) -> Result<Tensor<B, 4>> {
        let (n, h, w, c) = images.dim();
        if ImageShape::new(h, w, c) != self.input_shape() {
            return Err(PipelineError::Shape { columns: h * w * c });
        }
        let values: Vec<f32> = images.iter().copied().collect();
        Ok(Tensor::<B, 4>::from_data(TensorData::new(values, [n, h, w, c]), device).permute([0, 3, 1, 2]))
    }

    /// Index of the most likely class for every image.
    pub fn predict_indices(&self, images: ArrayView4<f32>, device: &B::Device) -> Result<Vec<usize>> {
        Ok(argmax(self.forward(self.to_input(images, device)?)))
    }

    /// Class probabilities, one row per image.
    pub fn predict_proba(&self, images: ArrayView4<f32>, device: &B::Device) -> Result<Tensor<B, 2>> {
        Ok(softmax(self.forward(self.to_input(images, device)?), 1))
    }
}

/// Row-wise index of the largest logit.
pub fn argmax<B: Backend>(logits: Tensor<B, 2>) -> Vec<usize> {
    logits
        .argmax(1)
        .into_data()
        .iter::<i64>()
        .map(|i| i as usize)
        .collect()
}
