use alloc::format;

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Device, Tensor},
};

use crate::{block::CONV_INITIALIZER, error::check_input_dims, ResNetError, Result};

/// Smallest input height and width the stem accepts.
pub const MIN_INPUT_SIZE: usize = 8;

/// Input stem: 7x7 conv, batch norm, ReLU and 3x3 max pooling.
///
/// Reduces the input resolution by a factor of 4.
#[derive(Module, Debug)]
pub struct ConvStem<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
    maxpool: MaxPool2d,
}

impl<B: Backend> ConvStem<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        let dims = input.dims();
        check_input_dims("stem", dims, self.in_channels())?;

        let [_, _, height, width] = dims;
        if height < MIN_INPUT_SIZE || width < MIN_INPUT_SIZE {
            return Err(ResNetError::ShapeMismatch(format!(
                "stem expects inputs of at least {MIN_INPUT_SIZE}x{MIN_INPUT_SIZE}, \
                 got {height}x{width}"
            )));
        }

        let out = self.conv.forward(input);
        let out = self.bn.forward(out);
        let out = self.relu.forward(out);

        Ok(self.maxpool.forward(out))
    }

    pub fn in_channels(&self) -> usize {
        let [_, in_channels, _, _] = self.conv.weight.dims();
        in_channels
    }

    pub fn out_channels(&self) -> usize {
        let [out_channels, _, _, _] = self.conv.weight.dims();
        out_channels
    }
}

/// [Input stem](ConvStem) configuration.
pub struct ConvStemConfig {
    conv: Conv2dConfig,
    bn: BatchNormConfig,
    maxpool: MaxPool2dConfig,
}

impl ConvStemConfig {
    /// Create a new instance of the input stem [config](ConvStemConfig).
    pub fn new(in_channels: usize, out_channels: usize) -> Self {
        // 7x7 conv, /2
        let conv = Conv2dConfig::new([in_channels, out_channels], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .with_initializer(CONV_INITIALIZER);
        let bn = BatchNormConfig::new(out_channels);

        // 3x3 maxpool, /2
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1));

        Self { conv, bn, maxpool }
    }

    /// Initialize a new [input stem](ConvStem) module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ConvStem<B> {
        ConvStem {
            conv: self.conv.init(device),
            bn: self.bn.init(device),
            relu: Relu::new(),
            maxpool: self.maxpool.init(),
        }
    }
}
