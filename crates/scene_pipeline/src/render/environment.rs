//! Per-frame view parameters shared by the cull and sort stages

use std::sync::Arc;

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::scene::bounds::Frustum;
use crate::scene::effects::Fog;

/// Pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Width over height, or 1.0 for a degenerate viewport
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Projection type of the current view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// Perspective projection
    #[default]
    Perspective,
    /// Parallel projection
    Orthographic,
}

/// Which eye a stereo pass renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StereoEye {
    /// Mono rendering
    #[default]
    None,
    /// Left eye pass
    Left,
    /// Right eye pass
    Right,
}

/// Snapshot of everything a pass needs to know about the view
#[derive(Debug, Clone)]
pub struct EnvironmentData {
    /// Target viewport
    pub viewport: Viewport,
    /// Optional scissor rectangle
    pub scissor: Option<Viewport>,
    /// Projection type
    pub projection: Projection,
    /// Projection matrix
    pub projection_matrix: Mat4,
    /// World to eye transform
    pub view_matrix: Mat4,
    /// World-space frustum derived from the two matrices
    pub frustum: Frustum,
    /// Eye offset for stereo passes
    pub eye_offset: Vec3,
    /// Stereo eye being rendered
    pub stereo: StereoEye,
    /// Clear colour
    pub background: Vec4,
    /// Scene-wide fog
    pub fog: Option<Arc<Fog>>,
    /// Render layer this pass draws
    pub layer: u32,
}

impl EnvironmentData {
    /// Create a mono environment and derive its frustum
    pub fn new(viewport: Viewport, projection_matrix: Mat4, view_matrix: Mat4) -> Self {
        Self {
            viewport,
            scissor: None,
            projection: Projection::Perspective,
            frustum: Frustum::from_matrix(&(projection_matrix * view_matrix)),
            projection_matrix,
            view_matrix,
            eye_offset: Vec3::zeros(),
            stereo: StereoEye::None,
            background: Vec4::new(0.0, 0.0, 0.0, 1.0),
            fog: None,
            layer: 0,
        }
    }

    /// Set the projection type
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Set scene-wide fog
    pub fn with_fog(mut self, fog: Arc<Fog>) -> Self {
        self.fog = Some(fog);
        self
    }

    /// Configure a stereo pass
    pub fn with_stereo(mut self, eye: StereoEye, eye_offset: Vec3) -> Self {
        self.stereo = eye;
        self.eye_offset = eye_offset;
        self
    }

    /// Replace the view matrix and recompute the frustum
    pub fn set_view(&mut self, view_matrix: Mat4) {
        self.view_matrix = view_matrix;
        self.frustum = Frustum::from_matrix(&(self.projection_matrix * view_matrix));
    }

    /// Combined projection and view transform
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }
}
