//! Scene node variants
//!
//! Nodes live in a [`SceneGraph`](super::SceneGraph) arena and refer to each
//! other by [`NodeId`]. A node may be the child of any number of parents, so
//! the graph is a DAG; the traversal keeps all of its state on its own stacks
//! and simply revisits shared subtrees.

use std::sync::Arc;

use slotmap::new_key_type;

use crate::foundation::math::Mat4;
use crate::scene::appearance::{Appearance, AppearanceOverride, Geometry};
use crate::scene::bounds::AABB;
use crate::scene::custom::{CustomCullable, CustomRenderable};
use crate::scene::effects::{ClipPlane, Fog, Light};

new_key_type! {
    /// Handle to a node in a [`SceneGraph`](super::SceneGraph)
    pub struct NodeId;
}

/// Plain grouping node
#[derive(Debug, Clone, Default)]
pub struct GroupNode {
    /// Children in traversal order
    pub children: Vec<NodeId>,
    /// Bounds of all children; `None` means unknown and always tested
    /// per child
    pub bounds: Option<AABB>,
}

/// Group whose children are placed by a local transform
#[derive(Debug, Clone)]
pub struct TransformNode {
    /// Local transform applied on top of the parent's
    pub matrix: Mat4,
    /// Children in traversal order
    pub children: Vec<NodeId>,
    /// Bounds of all children, in the children's frame
    pub bounds: Option<AABB>,
}

/// Pass-through wrapper around at most one child (shared node instancing)
#[derive(Debug, Clone, Default)]
pub struct SingleNode {
    /// Wrapped child
    pub child: Option<NodeId>,
}

/// Node that picks its own children each frame
#[derive(Clone)]
pub struct CustomNode {
    /// Culling callback
    pub cullable: Arc<dyn CustomCullable>,
    /// Bounds of everything the node may produce
    pub bounds: Option<AABB>,
}

impl std::fmt::Debug for CustomNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomNode")
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

/// What a shape draws
#[derive(Debug, Clone)]
pub enum ShapeGeometry {
    /// Regular vertex geometry
    Standard(Arc<Geometry>),
    /// Geometry that renders itself
    Custom(Arc<dyn CustomRenderable>),
}

impl ShapeGeometry {
    /// Transparency reported by the geometry itself
    pub fn has_transparency(&self) -> bool {
        match self {
            Self::Standard(geometry) => geometry.has_transparency,
            Self::Custom(custom) => custom.is_transparent(),
        }
    }
}

/// Drawable leaf
#[derive(Debug, Clone)]
pub struct ShapeNode {
    /// Geometry to draw; a shape without geometry draws nothing
    pub geometry: Option<ShapeGeometry>,
    /// Visual state
    pub appearance: Option<Arc<Appearance>>,
    /// Bounds in the shape's frame
    pub bounds: Option<AABB>,
    /// Invisible shapes never reach the cull output
    pub visible: bool,
    /// Rendered in the screen-space 2D pass
    pub is_2d: bool,
}

impl ShapeNode {
    /// Visible 3D shape with standard geometry
    pub fn new(geometry: Arc<Geometry>, appearance: Option<Arc<Appearance>>) -> Self {
        Self {
            geometry: Some(ShapeGeometry::Standard(geometry)),
            appearance,
            bounds: None,
            visible: true,
            is_2d: false,
        }
    }

    /// Visible 3D shape with custom geometry
    pub fn custom(renderable: Arc<dyn CustomRenderable>, appearance: Option<Arc<Appearance>>) -> Self {
        Self {
            geometry: Some(ShapeGeometry::Custom(renderable)),
            appearance,
            bounds: None,
            visible: true,
            is_2d: false,
        }
    }

    /// Set the bounds
    pub fn with_bounds(mut self, bounds: AABB) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Show or hide the shape
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Move the shape into the 2D pass
    pub fn with_2d(mut self, is_2d: bool) -> Self {
        self.is_2d = is_2d;
        self
    }
}

/// Leaf payloads
#[derive(Debug, Clone)]
pub enum LeafNode {
    /// Drawable
    Shape(ShapeNode),
    /// Light source
    Light(Arc<Light>),
    /// User clip plane
    ClipPlane(Arc<ClipPlane>),
    /// Local fog
    Fog(Arc<Fog>),
    /// Appearance override
    Override(Arc<AppearanceOverride>),
}

/// A scene graph node, resolved by a single match during traversal
#[derive(Debug, Clone)]
pub enum Node {
    /// Plain group
    Group(GroupNode),
    /// Group with a local transform
    Transform(TransformNode),
    /// Pass-through wrapper
    Single(SingleNode),
    /// Self-culling group
    Custom(CustomNode),
    /// Leaf
    Leaf(LeafNode),
}

impl Node {
    /// Children of group-like nodes
    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::Group(group) => &group.children,
            Node::Transform(transform) => &transform.children,
            Node::Single(single) => single.child.as_slice(),
            Node::Custom(_) | Node::Leaf(_) => &[],
        }
    }

    /// Declared bounds of the node
    pub fn bounds(&self) -> Option<AABB> {
        match self {
            Node::Group(group) => group.bounds,
            Node::Transform(transform) => transform.bounds,
            Node::Custom(custom) => custom.bounds,
            Node::Leaf(LeafNode::Shape(shape)) => shape.bounds,
            Node::Single(_) | Node::Leaf(_) => None,
        }
    }
}
