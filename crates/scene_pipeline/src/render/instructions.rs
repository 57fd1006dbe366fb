//! Backend-facing instruction stream produced by the sort stages
//!
//! A stream is a flat list of [`RenderOp`]s. Every stateful `Start*` op has
//! exactly one matching `Stop*` later in the same stream. Light and clip-plane
//! brackets carry an id so a backend can key per-effect resources (light
//! slots, clip units) without re-deriving them.

use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::foundation::math::MatrixSnapshot;
use crate::scene::appearance::{Geometry, ShaderArguments, ShaderProgram, StateComponent, Texture};
use crate::scene::custom::{CustomData, CustomRenderable};
use crate::scene::effects::{ClipPlane, Fog, Light};

/// One backend operation
#[derive(Debug, Clone)]
pub enum RenderOp {
    /// Enable a light
    StartLight {
        /// Light to enable
        light: Arc<Light>,
        /// Column-major world transform of the light
        transform: MatrixSnapshot,
        /// Correlation id, repeated on the matching stop
        id: u32,
    },
    /// Disable a light
    StopLight {
        /// Light to disable
        light: Arc<Light>,
        /// Id of the matching start
        id: u32,
    },
    /// Enable a clip plane
    StartClipPlane {
        /// Plane to enable
        clip: Arc<ClipPlane>,
        /// Column-major world transform of the plane
        transform: MatrixSnapshot,
        /// Correlation id, repeated on the matching stop
        id: u32,
    },
    /// Disable a clip plane
    StopClipPlane {
        /// Plane to disable
        clip: Arc<ClipPlane>,
        /// Id of the matching start
        id: u32,
    },
    /// Enable local fog
    StartFog(Arc<Fog>),
    /// Disable local fog
    StopFog(Arc<Fog>),
    /// Apply a state component
    StartState(StateComponent),
    /// Revert a state component
    StopState(StateComponent),
    /// Bind a shader program
    StartShaderProgram(Arc<ShaderProgram>),
    /// Unbind a shader program
    StopShaderProgram(Arc<ShaderProgram>),
    /// Upload uniform values for the bound program
    SetShaderArgs(Arc<ShaderArguments>),
    /// Bind a texture to a unit
    StartTexture {
        /// Texture unit
        unit: usize,
        /// Texture to bind
        texture: Arc<Texture>,
    },
    /// Unbind a texture unit
    StopTexture {
        /// Texture unit
        unit: usize,
        /// Texture that was bound
        texture: Arc<Texture>,
    },
    /// Everything until the matching stop is transparent
    StartTransparent,
    /// End of the transparent section
    StopTransparent,
    /// Enter screen-space rendering
    StartRender {
        /// Reduced 2D transform
        transform: MatrixSnapshot,
    },
    /// Leave screen-space rendering
    StopRender,
    /// Draw 3D geometry
    RenderGeometry {
        /// Geometry to draw
        geometry: Arc<Geometry>,
        /// Column-major world transform
        transform: MatrixSnapshot,
    },
    /// Draw 2D geometry inside a start/stop render bracket
    RenderGeometry2D {
        /// Geometry to draw
        geometry: Arc<Geometry>,
        /// Reduced 2D transform
        transform: MatrixSnapshot,
    },
    /// Let a custom renderable draw itself
    RenderCustom {
        /// Renderable
        renderable: Arc<dyn CustomRenderable>,
        /// Payload from the cull pass
        data: Option<CustomData>,
        /// Column-major world transform
        transform: MatrixSnapshot,
    },
}

/// Discriminant of a [`RenderOp`], for quick inspection of streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OpTag {
    StartLight,
    StopLight,
    StartClipPlane,
    StopClipPlane,
    StartFog,
    StopFog,
    StartState,
    StopState,
    StartShaderProgram,
    StopShaderProgram,
    SetShaderArgs,
    StartTexture,
    StopTexture,
    StartTransparent,
    StopTransparent,
    StartRender,
    StopRender,
    RenderGeometry,
    RenderGeometry2D,
    RenderCustom,
}

impl RenderOp {
    /// Tag of this op
    pub fn tag(&self) -> OpTag {
        match self {
            Self::StartLight { .. } => OpTag::StartLight,
            Self::StopLight { .. } => OpTag::StopLight,
            Self::StartClipPlane { .. } => OpTag::StartClipPlane,
            Self::StopClipPlane { .. } => OpTag::StopClipPlane,
            Self::StartFog(_) => OpTag::StartFog,
            Self::StopFog(_) => OpTag::StopFog,
            Self::StartState(_) => OpTag::StartState,
            Self::StopState(_) => OpTag::StopState,
            Self::StartShaderProgram(_) => OpTag::StartShaderProgram,
            Self::StopShaderProgram(_) => OpTag::StopShaderProgram,
            Self::SetShaderArgs(_) => OpTag::SetShaderArgs,
            Self::StartTexture { .. } => OpTag::StartTexture,
            Self::StopTexture { .. } => OpTag::StopTexture,
            Self::StartTransparent => OpTag::StartTransparent,
            Self::StopTransparent => OpTag::StopTransparent,
            Self::StartRender { .. } => OpTag::StartRender,
            Self::StopRender => OpTag::StopRender,
            Self::RenderGeometry { .. } => OpTag::RenderGeometry,
            Self::RenderGeometry2D { .. } => OpTag::RenderGeometry2D,
            Self::RenderCustom { .. } => OpTag::RenderCustom,
        }
    }

    /// Whether this op draws something
    pub fn is_render(&self) -> bool {
        matches!(
            self.tag(),
            OpTag::RenderGeometry | OpTag::RenderGeometry2D | OpTag::RenderCustom
        )
    }
}

/// The stream reached its current capacity
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Instruction stream is full at {0} operations")]
pub struct StreamFull(pub usize);

/// Growable instruction buffer with an explicit capacity limit.
///
/// Pushing past the limit fails instead of reallocating, so a sort stage can
/// roll back to the start of the record it was emitting, grow the stream and
/// emit the record again.
#[derive(Debug)]
pub struct InstructionStream {
    ops: Vec<RenderOp>,
    limit: usize,
    increment: usize,
}

impl InstructionStream {
    /// Create a stream holding up to `capacity` ops before it must grow
    pub fn new(capacity: usize, increment: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
            limit: capacity,
            increment: increment.max(1),
        }
    }

    /// Append an op if there is room
    pub fn try_push(&mut self, op: RenderOp) -> Result<(), StreamFull> {
        if self.ops.len() >= self.limit {
            return Err(StreamFull(self.limit));
        }
        self.ops.push(op);
        Ok(())
    }

    /// Raise the limit by the growth increment
    pub fn grow(&mut self) {
        let new_limit = self.limit + self.increment;
        debug!("Growing instruction stream from {} to {} operations", self.limit, new_limit);
        self.ops.reserve(new_limit - self.ops.len());
        self.limit = new_limit;
    }

    /// Drop every op after `len`
    pub fn truncate(&mut self, len: usize) {
        self.ops.truncate(len);
    }

    /// Drop every op, keeping the capacity
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Number of ops written
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Current limit
    pub fn capacity(&self) -> usize {
        self.limit
    }

    /// Written ops
    pub fn as_slice(&self) -> &[RenderOp] {
        &self.ops
    }

    /// Tags of the written ops
    pub fn tags(&self) -> Vec<OpTag> {
        self.ops.iter().map(RenderOp::tag).collect()
    }
}

/// Per-pass source of light and clip-plane correlation ids
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    /// Issue a fresh id
    pub fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }

    /// Start again from zero
    pub fn reset(&mut self) {
        self.next = 0;
    }

    /// Number of ids issued since the last reset
    pub fn issued(&self) -> u32 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_fails_at_limit_then_grows() {
        let mut stream = InstructionStream::new(2, 3);
        stream.try_push(RenderOp::StartTransparent).unwrap();
        stream.try_push(RenderOp::StopRender).unwrap();
        assert_eq!(stream.try_push(RenderOp::StopTransparent), Err(StreamFull(2)));

        stream.truncate(1);
        stream.grow();
        assert_eq!(stream.capacity(), 5);
        stream.try_push(RenderOp::StopTransparent).unwrap();
        assert_eq!(stream.tags(), vec![OpTag::StartTransparent, OpTag::StopTransparent]);
    }

    #[test]
    fn test_id_allocator_is_monotonic_per_pass() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.allocate(), 0);
        assert_eq!(ids.allocate(), 1);
        assert_eq!(ids.issued(), 2);
        ids.reset();
        assert_eq!(ids.allocate(), 0);
    }
}
