use alloc::{format, vec::Vec};

use burn::{
    config::Config,
    module::Module,
    tensor::{backend::Backend, Device, Tensor},
};
use log::{debug, trace};

use crate::{
    block::{LayerBlock, LayerBlockConfig},
    head::{ClassifierHead, ClassifierHeadConfig},
    stem::{ConvStem, ConvStemConfig},
    ResNetError,
};

/// Number of channels of the input images (RGB).
pub const INPUT_CHANNELS: usize = 3;
/// Number of channels produced by the input stem.
pub const STEM_CHANNELS: usize = 64;
/// Output channels of each residual layer.
pub const STAGE_CHANNELS: [usize; 4] = [64, 128, 256, 512];
/// Stride of the first block of each residual layer.
pub const STAGE_STRIDES: [usize; 4] = [1, 2, 2, 2];

// ResNet residual layer block configs
pub const RESNET18_BLOCKS: [usize; 4] = [2, 2, 2, 2];
pub const RESNET34_BLOCKS: [usize; 4] = [3, 4, 6, 3];

/// ResNet implementation.
/// Derived from [torchivision.models.resnet.ResNet](https://github.com/pytorch/vision/blob/main/torchvision/models/resnet.py)
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    stem: ConvStem<B>,
    layer1: LayerBlock<B>,
    layer2: LayerBlock<B>,
    layer3: LayerBlock<B>,
    layer4: LayerBlock<B>,
    head: ClassifierHead<B>,
}

impl<B: Backend> ResNet<B> {
    /// Compute the class scores `[batch, num_classes]` of a `[batch, 3, height, width]` input.
    pub fn forward(&self, input: Tensor<B, 4>) -> crate::Result<Tensor<B, 2>> {
        // First block
        let out = self.stem.forward(input)?;
        trace!("stem output: {:?}", out.dims());

        // Residual blocks
        let out = self.layer1.forward(out)?;
        trace!("layer1 output: {:?}", out.dims());
        let out = self.layer2.forward(out)?;
        trace!("layer2 output: {:?}", out.dims());
        let out = self.layer3.forward(out)?;
        trace!("layer3 output: {:?}", out.dims());
        let out = self.layer4.forward(out)?;
        trace!("layer4 output: {:?}", out.dims());

        self.head.forward(out)
    }

    /// ResNet-18 from [`Deep Residual Learning for Image Recognition`](https://arxiv.org/abs/1512.03385).
    ///
    /// # Arguments
    ///
    /// * `num_classes`: Number of output classes of the model.
    /// * `device` - Device to create the module on.
    ///
    /// # Returns
    ///
    /// A ResNet-18 module.
    pub fn resnet18(num_classes: usize, device: &Device<B>) -> crate::Result<Self> {
        ResNetConfig::resnet18(num_classes).init(device)
    }

    /// ResNet-34 from [`Deep Residual Learning for Image Recognition`](https://arxiv.org/abs/1512.03385).
    ///
    /// # Arguments
    ///
    /// * `num_classes`: Number of output classes of the model.
    /// * `device` - Device to create the module on.
    ///
    /// # Returns
    ///
    /// A ResNet-34 module.
    pub fn resnet34(num_classes: usize, device: &Device<B>) -> crate::Result<Self> {
        ResNetConfig::resnet34(num_classes).init(device)
    }

    /// Re-initialize the last layer with the specified number of output classes.
    pub fn with_classes(mut self, num_classes: usize) -> crate::Result<Self> {
        check_num_classes(num_classes)?;

        let device = self.head.device();
        self.head = ClassifierHeadConfig::new(self.head.in_features(), num_classes).init(&device);

        Ok(self)
    }

    pub fn num_classes(&self) -> usize {
        self.head.num_classes()
    }

    /// Residual layers, in forward order.
    pub fn layers(&self) -> [&LayerBlock<B>; 4] {
        [&self.layer1, &self.layer2, &self.layer3, &self.layer4]
    }
}

/// [ResNet](ResNet) configuration.
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Number of residual blocks in each of the four layers.
    pub blocks: Vec<usize>,
    /// Number of output classes.
    pub num_classes: usize,
}

impl ResNetConfig {
    pub fn resnet18(num_classes: usize) -> Self {
        Self::new(RESNET18_BLOCKS.to_vec(), num_classes)
    }

    pub fn resnet34(num_classes: usize) -> Self {
        Self::new(RESNET34_BLOCKS.to_vec(), num_classes)
    }

    /// Residual layer configs, in forward order.
    ///
    /// Each layer takes the channels of the previous one (or of the stem) as input.
    pub fn stages(&self) -> crate::Result<[LayerBlockConfig; 4]> {
        let blocks: [usize; 4] = self.blocks.as_slice().try_into().map_err(|_| {
            ResNetError::ConfigurationError(format!(
                "ResNet expects 4 residual layers, got {}",
                self.blocks.len()
            ))
        })?;

        Ok(core::array::from_fn(|i| {
            let in_channels = if i == 0 {
                STEM_CHANNELS
            } else {
                STAGE_CHANNELS[i - 1]
            };
            LayerBlockConfig::new(blocks[i], in_channels, STAGE_CHANNELS[i], STAGE_STRIDES[i])
        }))
    }

    pub fn validate(&self) -> crate::Result<()> {
        check_num_classes(self.num_classes)?;
        self.stages()?
            .iter()
            .try_for_each(LayerBlockConfig::validate)
    }

    /// Initialize a new [ResNet](ResNet) module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> crate::Result<ResNet<B>> {
        check_num_classes(self.num_classes)?;
        let [layer1, layer2, layer3, layer4] = self.stages()?;

        debug!(
            "Initializing ResNet with blocks {:?} and {} classes",
            self.blocks, self.num_classes
        );

        Ok(ResNet {
            stem: ConvStemConfig::new(INPUT_CHANNELS, STEM_CHANNELS).init(device),
            layer1: layer1.init(device)?,
            layer2: layer2.init(device)?,
            layer3: layer3.init(device)?,
            layer4: layer4.init(device)?,
            head: ClassifierHeadConfig::new(layer4.out_channels(), self.num_classes).init(device),
        })
    }
}

fn check_num_classes(num_classes: usize) -> crate::Result<()> {
    if num_classes == 0 {
        return Err(ResNetError::ConfigurationError(
            "number of classes must be non-zero".into(),
        ));
    }

    Ok(())
}
