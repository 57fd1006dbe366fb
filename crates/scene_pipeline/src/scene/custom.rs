//! Extension points for nodes that decide their own culling or rendering

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::foundation::math::Mat4;
use crate::render::EnvironmentData;
use crate::scene::bounds::Frustum;
use crate::scene::node::NodeId;

/// Opaque per-frame payload a custom renderable hands to its backend
pub type CustomData = Arc<dyn Any + Send + Sync>;

/// What the cull stage knows when it asks a custom node to cull itself
#[derive(Debug, Clone, Copy)]
pub struct CustomCullRequest<'a> {
    /// Per-frame view parameters
    pub environment: &'a EnvironmentData,
    /// Accumulated world transform at the custom node
    pub world_transform: &'a Mat4,
    /// World-space view frustum
    pub frustum: &'a Frustum,
}

/// Children and optional extra transform chosen by a custom node
#[derive(Debug, Default)]
pub struct CustomCullOutput {
    /// Children to traverse this frame
    pub children: Vec<NodeId>,
    /// Transform applied on top of the current one before the children
    pub local_transform: Option<Mat4>,
}

impl CustomCullOutput {
    /// Empty the output for reuse
    pub fn clear(&mut self) {
        self.children.clear();
        self.local_transform = None;
    }
}

/// A group that picks its own visible children each frame (LOD switches,
/// portals, billboards and the like).
pub trait CustomCullable: Send + Sync {
    /// Fill `output` with the children to traverse.
    ///
    /// `output` is a scratch buffer owned by the cull stage and is cleared
    /// before the call. It may be overwritten by nested custom nodes, so the
    /// stage copies the children out before recursing.
    fn cull(&self, request: &CustomCullRequest<'_>, output: &mut CustomCullOutput);
}

/// Geometry that knows how to draw itself
pub trait CustomRenderable: Send + Sync {
    /// Whether this geometry must be drawn in the transparent pass
    fn is_transparent(&self) -> bool;

    /// Prepare per-frame data. Returning `None` marks the geometry as not
    /// visible this frame.
    fn process_cull(&self, world_transform: &Mat4, environment: &EnvironmentData) -> Option<CustomData>;
}

impl fmt::Debug for dyn CustomCullable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomCullable")
    }
}

impl fmt::Debug for dyn CustomRenderable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomRenderable")
    }
}
