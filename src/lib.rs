#![cfg_attr(not(feature = "std"), no_std)]
//! ResNet-34 image classifier for Burn.
//!
//! The network is assembled from plain configuration descriptors:
//! a [`ResNetConfig`] expands into four [stage](LayerBlockConfig) descriptors, each of
//! which expands into an ordered list of [residual unit](ResidualBlockConfig) descriptors.
//!
//! # Example
//!
//! ```ignore
//! use burn::backend::NdArray;
//! use resnet34_burn::ResNet;
//!
//! let device = Default::default();
//! let model = ResNet::<NdArray>::resnet34(1000, &device)?;
//! let scores = model.forward(images)?; // [batch, 1000]
//! ```
mod block;
mod error;
mod head;
mod resnet;
mod stem;

pub use block::*;
pub use error::*;
pub use head::*;
pub use resnet::*;
pub use stem::*;

extern crate alloc;
