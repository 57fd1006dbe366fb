//! Scoped effect leaves: lights, clip planes and fog
//!
//! Effects apply to the subtree of the group that declares them. Lights may
//! instead be marked global-only, in which case they are collected for the
//! whole pass and distributed after traversal.

use crate::foundation::math::{Vec3, Vec4};
use crate::scene::bounds::AABB;

/// Light source variants
#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    /// Uniform light from every direction
    Ambient,
    /// Parallel rays along a direction
    Directional {
        /// Direction the light travels, in the light's local frame
        direction: Vec3,
    },
    /// Omnidirectional point source
    Point {
        /// Position in the light's local frame
        position: Vec3,
        /// Constant, linear and quadratic attenuation
        attenuation: Vec3,
    },
    /// Cone-shaped source
    Spot {
        /// Position in the light's local frame
        position: Vec3,
        /// Cone axis
        direction: Vec3,
        /// Half angle of the cone in radians
        cutoff: f32,
    },
}

/// A light leaf
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Kind of light
    pub kind: LightKind,
    /// Linear RGB colour
    pub color: Vec3,
    /// Scalar intensity
    pub intensity: f32,
    /// Disabled lights are skipped by culling
    pub enabled: bool,
    /// Applies scene-wide instead of to the declaring subtree
    pub global_only: bool,
    /// Region the light influences, in the light's frame. `None` means
    /// everywhere.
    pub effect_bounds: Option<AABB>,
}

impl Light {
    /// Create an enabled, scoped light with white colour
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            enabled: true,
            global_only: false,
            effect_bounds: None,
        }
    }

    /// Create a directional light
    pub fn directional(direction: Vec3) -> Self {
        Self::new(LightKind::Directional { direction })
    }

    /// Create a point light with no attenuation
    pub fn point(position: Vec3) -> Self {
        Self::new(LightKind::Point {
            position,
            attenuation: Vec3::new(1.0, 0.0, 0.0),
        })
    }

    /// Mark the light as applying to the whole scene
    pub fn with_global_only(mut self, global_only: bool) -> Self {
        self.global_only = global_only;
        self
    }

    /// Limit the light's influence to a region
    pub fn with_effect_bounds(mut self, bounds: AABB) -> Self {
        self.effect_bounds = Some(bounds);
        self
    }

    /// Enable or disable the light
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set colour and intensity
    pub fn with_color(mut self, color: Vec3, intensity: f32) -> Self {
        self.color = color;
        self.intensity = intensity;
        self
    }
}

/// A user clip plane. Geometry on the negative side is removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPlane {
    /// Plane equation `(a, b, c, d)` in the plane's local frame
    pub equation: Vec4,
    /// Disabled planes are skipped by culling
    pub enabled: bool,
}

impl ClipPlane {
    /// Create an enabled clip plane
    pub fn new(equation: Vec4) -> Self {
        Self { equation, enabled: true }
    }
}

/// Fog falloff
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FogMode {
    /// Linear ramp between two eye distances
    Linear {
        /// Distance where fog starts
        start: f32,
        /// Distance of full fog
        end: f32,
    },
    /// Exponential falloff
    Exponential {
        /// Density factor
        density: f32,
    },
}

/// A fog leaf
#[derive(Debug, Clone, PartialEq)]
pub struct Fog {
    /// Falloff model
    pub mode: FogMode,
    /// Linear RGB colour
    pub color: Vec3,
    /// Disabled fog is skipped by culling
    pub enabled: bool,
    /// Only usable as environment fog; ignored inside the scene graph
    pub global_only: bool,
}

impl Fog {
    /// Create enabled, local fog
    pub fn new(mode: FogMode, color: Vec3) -> Self {
        Self {
            mode,
            color,
            enabled: true,
            global_only: false,
        }
    }

    /// Mark the fog as environment-only
    pub fn with_global_only(mut self, global_only: bool) -> Self {
        self.global_only = global_only;
        self
    }
}
