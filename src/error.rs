use alloc::{format, string::String};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResNetError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

pub type Result<T> = core::result::Result<T, ResNetError>;

/// Check that a `[batch, channels, height, width]` input matches the channel count a
/// component was built for and has a non-empty spatial extent.
pub(crate) fn check_input_dims(
    component: &str,
    [batch, channels, height, width]: [usize; 4],
    expected_channels: usize,
) -> Result<()> {
    if channels != expected_channels {
        return Err(ResNetError::ShapeMismatch(format!(
            "{component} expects {expected_channels} input channels, got input of shape \
             [{batch}, {channels}, {height}, {width}]"
        )));
    }
    if batch == 0 || height == 0 || width == 0 {
        return Err(ResNetError::ShapeMismatch(format!(
            "{component} got an empty input of shape [{batch}, {channels}, {height}, {width}]"
        )));
    }

    Ok(())
}
