//! # Pipeline Configuration
//!
//! Options recognised by the cull/sort pipeline. Everything except the
//! surface count only affects buffer sizing or which stage variant is built;
//! none of it changes the semantics of a pass.

use super::{Config, ConfigError};
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Which cull stage a pipeline is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CullStrategy {
    /// View-frustum culling with global light extraction
    #[default]
    Frustum,
    /// Everything is visible
    Null,
}

/// Which sort stage a pipeline is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortStrategy {
    /// Input order, full state bracket per record
    Null,
    /// State-bucket sort with differential emission
    #[default]
    State,
    /// Opaque first, transparent records bracketed afterwards
    SimpleTransparency,
}

/// Frame-rate window used by the performance monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Average frame rate below which listeners are asked to downgrade
    pub min_fps: f32,
    /// Average frame rate above which listeners are asked to upgrade
    pub max_fps: f32,
    /// Frames averaged per evaluation
    pub sample_frames: u32,
    /// Evaluation windows skipped after any quality change
    pub cooldown_samples: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            min_fps: 30.0,
            max_fps: 58.0,
            sample_frames: 30,
            cooldown_samples: 1,
        }
    }
}

impl PerformanceConfig {
    /// Validate the frame-rate window
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.min_fps > 0.0 && self.max_fps >= self.min_fps) {
            return Err(PipelineError::InvalidFrameRateRange {
                min: self.min_fps,
                max: self.max_fps,
            });
        }
        if self.sample_frames == 0 {
            return Err(ConfigError::InvalidValue {
                field: "performance.sample_frames",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// # Pipeline Configuration
///
/// Top-level configuration for building a [`crate::render::RenderPipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Expected number of render surfaces; scales buffer preallocation
    pub surface_count: i32,
    /// Scan visible shapes for render-to-texture targets
    pub offscreen_check: bool,
    /// Cull stage variant
    pub cull: CullStrategy,
    /// Sort stage variant
    pub sort: SortStrategy,
    /// Cull output records preallocated per surface
    pub record_capacity: usize,
    /// Records added whenever the cull output fills up
    pub record_growth: usize,
    /// Instructions preallocated per surface
    pub instruction_capacity: usize,
    /// Instructions added whenever the instruction stream fills up
    pub instruction_growth: usize,
    /// Log filter for the application to hand to
    /// `foundation::logging::init_with_filter`. The pipeline never installs a
    /// logger itself.
    pub log_level: String,
    /// Performance monitor settings
    pub performance: PerformanceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            surface_count: 1,
            offscreen_check: true,
            cull: CullStrategy::default(),
            sort: SortStrategy::default(),
            record_capacity: 512,
            record_growth: 256,
            instruction_capacity: 4096,
            instruction_growth: 1024,
            log_level: "info".to_string(),
            performance: PerformanceConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Set the surface count hint
    pub fn with_surface_count(mut self, surfaces: i32) -> Self {
        self.surface_count = surfaces;
        self
    }

    /// Select the cull stage variant
    pub fn with_cull(mut self, cull: CullStrategy) -> Self {
        self.cull = cull;
        self
    }

    /// Select the sort stage variant
    pub fn with_sort(mut self, sort: SortStrategy) -> Self {
        self.sort = sort;
        self
    }

    /// Enable or disable the offscreen texture scan
    pub fn with_offscreen_check(mut self, enabled: bool) -> Self {
        self.offscreen_check = enabled;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.surface_count < 0 {
            return Err(PipelineError::NegativeSurfaceCount(self.surface_count));
        }
        if self.record_growth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "record_growth",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.instruction_growth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "instruction_growth",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        self.performance.validate()
    }
}

impl Config for PipelineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_negative_surface_count_rejected() {
        let err = PipelineConfig::default()
            .with_surface_count(-2)
            .validate()
            .unwrap_err();
        assert!(matches!(err, PipelineError::NegativeSurfaceCount(-2)));
        assert!(err.to_string().contains("-2"));
    }

    #[test]
    fn test_inverted_frame_rate_rejected() {
        let mut config = PipelineConfig::default();
        config.performance.min_fps = 60.0;
        config.performance.max_fps = 30.0;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidFrameRateRange { .. })
        ));
    }

    #[test]
    fn test_toml_round_trip_with_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            surface_count = 3
            sort = "SimpleTransparency"

            [performance]
            min_fps = 20.0
            "#,
        )
        .unwrap();

        assert_eq!(config.surface_count, 3);
        assert_eq!(config.sort, SortStrategy::SimpleTransparency);
        assert_eq!(config.cull, CullStrategy::Frustum);
        assert_eq!(config.performance.sample_frames, 30);

        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_ron_parse() {
        let config =
            PipelineConfig::from_ron_str("(cull: Null, offscreen_check: false)").unwrap();
        assert_eq!(config.cull, CullStrategy::Null);
        assert!(!config.offscreen_check);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = PipelineConfig::default()
            .save_to_file("pipeline.yaml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
