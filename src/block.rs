use alloc::{format, vec::Vec};
use core::f64::consts::SQRT_2;

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Device, Tensor},
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{check_input_dims, ResNetError, Result};

/// Initializer for every convolution that feeds a ReLU.
pub(crate) const CONV_INITIALIZER: Initializer = Initializer::KaimingNormal {
    gain: SQRT_2, // recommended value for ReLU
    fan_out_only: true,
};

/// Shortcut path of a [residual block](ResidualBlock) configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortcutConfig {
    /// The input is added as-is.
    Identity,
    /// The input goes through a 1x1 conv + batch norm before being added.
    Projection,
}

impl ShortcutConfig {
    /// Shortcut required for a block mapping `in_channels` to `out_channels` with `stride`.
    pub fn required(in_channels: usize, out_channels: usize, stride: usize) -> Self {
        if stride != 1 || in_channels != out_channels {
            Self::Projection
        } else {
            Self::Identity
        }
    }
}

/// [Residual block](ResidualBlock) configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualBlockConfig {
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    shortcut: ShortcutConfig,
}

impl ResidualBlockConfig {
    /// Create a new instance of the residual block [config](ResidualBlockConfig).
    ///
    /// The shortcut is a projection whenever the block changes the resolution or the
    /// number of channels.
    pub fn new(in_channels: usize, out_channels: usize, stride: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            stride,
            shortcut: ShortcutConfig::required(in_channels, out_channels, stride),
        }
    }

    /// Force a specific shortcut. Rejected by [`validate`](Self::validate) if the shapes
    /// on both sides of the addition would not match.
    pub fn with_shortcut(mut self, shortcut: ShortcutConfig) -> Self {
        self.shortcut = shortcut;
        self
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn shortcut(&self) -> ShortcutConfig {
        self.shortcut
    }

    pub fn requires_projection(&self) -> bool {
        self.shortcut == ShortcutConfig::Projection
    }

    pub fn validate(&self) -> Result<()> {
        if self.in_channels == 0 || self.out_channels == 0 {
            return Err(ResNetError::ConfigurationError(format!(
                "residual block channels must be non-zero, got {} -> {}",
                self.in_channels, self.out_channels
            )));
        }
        if self.stride == 0 {
            return Err(ResNetError::ConfigurationError(
                "residual block stride must be non-zero".into(),
            ));
        }

        let required = ShortcutConfig::required(self.in_channels, self.out_channels, self.stride);
        if self.shortcut != required {
            return Err(ResNetError::ConfigurationError(format!(
                "residual block {} -> {} with stride {} requires a {:?} shortcut, got {:?}",
                self.in_channels, self.out_channels, self.stride, required, self.shortcut
            )));
        }

        Ok(())
    }

    /// Initialize a new [residual block](ResidualBlock) module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Result<ResidualBlock<B>> {
        self.validate()?;

        // conv3x3, carries the block stride
        let conv1 = Conv2dConfig::new([self.in_channels, self.out_channels], [3, 3])
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(CONV_INITIALIZER)
            .init(device);
        let bn1 = BatchNormConfig::new(self.out_channels).init(device);
        // conv3x3
        let conv2 = Conv2dConfig::new([self.out_channels, self.out_channels], [3, 3])
            .with_stride([1, 1])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(CONV_INITIALIZER)
            .init(device);
        let bn2 = BatchNormConfig::new(self.out_channels).init(device);

        let shortcut = match self.shortcut {
            ShortcutConfig::Identity => Shortcut::Identity(Identity {}),
            ShortcutConfig::Projection => Shortcut::Projection(
                DownsampleConfig::new(self.in_channels, self.out_channels, self.stride)
                    .init(device),
            ),
        };

        Ok(ResidualBlock {
            conv1,
            bn1,
            relu: Relu::new(),
            conv2,
            bn2,
            shortcut,
        })
    }
}

/// ResNet basic residual block implementation.
/// Derived from [torchivision.models.resnet.BasicBlock](https://github.com/pytorch/vision/blob/main/torchvision/models/resnet.py)
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    relu: Relu,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    shortcut: Shortcut<B>,
}

impl<B: Backend> ResidualBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        check_input_dims("residual block", input.dims(), self.in_channels())?;

        let identity = input.clone();

        // Conv block
        let out = self.conv1.forward(input);
        let out = self.bn1.forward(out);
        let out = self.relu.forward(out);
        let out = self.conv2.forward(out);
        let out = self.bn2.forward(out);

        // Skip connection
        let out = out + self.shortcut.forward(identity);

        // Activation, only once the skip connection has been added
        Ok(self.relu.forward(out))
    }

    pub fn in_channels(&self) -> usize {
        let [_, in_channels, _, _] = self.conv1.weight.dims();
        in_channels
    }

    pub fn out_channels(&self) -> usize {
        let [out_channels, _, _, _] = self.conv2.weight.dims();
        out_channels
    }

    pub fn shortcut(&self) -> &Shortcut<B> {
        &self.shortcut
    }
}

/// Stateless pass-through module.
#[derive(Module, Clone, Debug, Default)]
pub struct Identity {}

impl Identity {
    pub fn forward<B: Backend, const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        input
    }
}

/// Residual block skip connection.
#[derive(Module, Debug)]
pub enum Shortcut<B: Backend> {
    Identity(Identity),
    Projection(Downsample<B>),
}

impl<B: Backend> Shortcut<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Shortcut::Identity(identity) => identity.forward(input),
            Shortcut::Projection(downsample) => downsample.forward(input),
        }
    }

    pub fn is_projection(&self) -> bool {
        matches!(self, Shortcut::Projection(_))
    }
}

/// Downsample layer applies a 1x1 conv to reduce the resolution [H, W] and adjust the number of channels.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(input);
        self.bn.forward(out)
    }
}

/// [Downsample](Downsample) configuration.
struct DownsampleConfig {
    conv: Conv2dConfig,
    bn: BatchNormConfig,
}

impl DownsampleConfig {
    fn new(in_channels: usize, out_channels: usize, stride: usize) -> Self {
        // conv1x1 (default padding = valid)
        let conv = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(0, 0))
            .with_bias(false)
            .with_initializer(CONV_INITIALIZER);
        let bn = BatchNormConfig::new(out_channels);

        Self { conv, bn }
    }

    fn init<B: Backend>(&self, device: &Device<B>) -> Downsample<B> {
        Downsample {
            conv: self.conv.init(device),
            bn: self.bn.init(device),
        }
    }
}

/// [Layer block](LayerBlock) configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerBlockConfig {
    num_blocks: usize,
    in_channels: usize,
    out_channels: usize,
    stride: usize,
}

impl LayerBlockConfig {
    /// Create a new instance of the layer block [config](LayerBlockConfig).
    pub fn new(num_blocks: usize, in_channels: usize, out_channels: usize, stride: usize) -> Self {
        Self {
            num_blocks,
            in_channels,
            out_channels,
            stride,
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Ordered residual block configs of the layer.
    ///
    /// Only the first block changes the resolution and the number of channels, every
    /// following block maps `out_channels` to itself with a stride of 1.
    pub fn units(&self) -> Vec<ResidualBlockConfig> {
        (0..self.num_blocks)
            .map(|b| {
                if b == 0 {
                    ResidualBlockConfig::new(self.in_channels, self.out_channels, self.stride)
                } else {
                    ResidualBlockConfig::new(self.out_channels, self.out_channels, 1)
                }
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_blocks == 0 {
            return Err(ResNetError::ConfigurationError(
                "layer block must contain at least one residual block".into(),
            ));
        }

        self.units().iter().try_for_each(ResidualBlockConfig::validate)
    }

    /// Initialize a new [layer block](LayerBlock) module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Result<LayerBlock<B>> {
        self.validate()?;

        debug!(
            "Initializing layer block: {} blocks, {} -> {} channels, stride {}",
            self.num_blocks, self.in_channels, self.out_channels, self.stride
        );

        let blocks = self
            .units()
            .iter()
            .enumerate()
            .map(|(b, unit)| {
                debug!(
                    "  block {b}: {} -> {} channels, stride {}, {:?} shortcut",
                    unit.in_channels, unit.out_channels, unit.stride, unit.shortcut
                );
                unit.init(device)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(LayerBlock { blocks })
    }
}

/// Collection of sequential residual blocks.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> LayerBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        self.blocks
            .iter()
            .try_fold(input, |out, block| block.forward(out))
    }

    pub fn blocks(&self) -> &[ResidualBlock<B>] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
