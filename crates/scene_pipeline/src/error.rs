//! Pipeline-level errors
//!
//! Only setup can fail. A running cull or sort pass never returns an error;
//! anything unexpected during a frame goes to the injected
//! [`ErrorReporter`](crate::render::ErrorReporter) instead.

use crate::config::ConfigError;
use crate::scene::SceneError;
use thiserror::Error;

/// Errors raised while building pipeline components
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage was constructed with a negative surface count
    #[error("The number of surfaces must be zero or greater, but {0} was supplied")]
    NegativeSurfaceCount(i32),

    /// The performance monitor was given an empty or inverted frame-rate window
    #[error("Invalid frame rate range: min {min} fps must be positive and not exceed max {max} fps")]
    InvalidFrameRateRange {
        /// Requested lower bound
        min: f32,
        /// Requested upper bound
        max: f32,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scene graph error
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}

/// Most surfaces a stage preallocates for; buffers still grow past this
const MAX_SURFACE_SCALE: usize = 16;

/// Convert a surface count hint into a buffer scale factor in
/// `1..=MAX_SURFACE_SCALE`
fn surface_scale(num_surfaces: i32) -> Result<usize, PipelineError> {
    if num_surfaces < 0 {
        return Err(PipelineError::NegativeSurfaceCount(num_surfaces));
    }
    Ok(usize::try_from(num_surfaces)
        .unwrap_or(1)
        .clamp(1, MAX_SURFACE_SCALE))
}

/// Preallocation for `capacity` items per surface
pub(crate) fn scaled_capacity(capacity: usize, num_surfaces: i32) -> Result<usize, PipelineError> {
    Ok(capacity.saturating_mul(surface_scale(num_surfaces)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_scale_is_capped() {
        assert_eq!(surface_scale(0).unwrap(), 1);
        assert_eq!(surface_scale(4).unwrap(), 4);
        assert_eq!(surface_scale(100_000).unwrap(), MAX_SURFACE_SCALE);
        assert_eq!(scaled_capacity(usize::MAX, 2).unwrap(), usize::MAX);
        assert!(matches!(surface_scale(-1), Err(PipelineError::NegativeSurfaceCount(-1))));
    }
}
