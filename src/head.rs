use alloc::format;

use burn::{
    module::Module,
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Linear, LinearConfig,
    },
    tensor::{backend::Backend, Device, Tensor},
};

use crate::{ResNetError, Result};

/// Classification head: global average pooling followed by a linear layer.
///
/// Outputs raw class scores (logits).
#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
}

impl<B: Backend> ClassifierHead<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
        let [batch, channels, height, width] = input.dims();
        if channels != self.in_features() || batch == 0 || height == 0 || width == 0 {
            return Err(ResNetError::ShapeMismatch(format!(
                "classifier head expects {} input features, got input of shape \
                 [{batch}, {channels}, {height}, {width}]",
                self.in_features()
            )));
        }

        // Average pooling [B, C, H, W] -> [B, C, 1, 1]
        let out = self.avgpool.forward(input);
        // Reshape [B, C, 1, 1] -> [B, C]
        let out: Tensor<B, 2> = out.flatten(1, 3);

        Ok(self.fc.forward(out))
    }

    pub fn in_features(&self) -> usize {
        let [d_input, _d_output] = self.fc.weight.dims();
        d_input
    }

    pub fn num_classes(&self) -> usize {
        let [_d_input, d_output] = self.fc.weight.dims();
        d_output
    }

    pub fn device(&self) -> Device<B> {
        self.fc.weight.device()
    }
}

/// [Classifier head](ClassifierHead) configuration.
pub struct ClassifierHeadConfig {
    avgpool: AdaptiveAvgPool2dConfig,
    fc: LinearConfig,
}

impl ClassifierHeadConfig {
    /// Create a new instance of the classifier head [config](ClassifierHeadConfig).
    pub fn new(in_features: usize, num_classes: usize) -> Self {
        Self {
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]),
            fc: LinearConfig::new(in_features, num_classes),
        }
    }

    /// Initialize a new [classifier head](ClassifierHead) module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ClassifierHead<B> {
        ClassifierHead {
            avgpool: self.avgpool.init(),
            fc: self.fc.init(device),
        }
    }
}
