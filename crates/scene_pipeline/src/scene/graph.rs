//! Arena-backed scene graph
//!
//! The application owns the graph and mutates it only between frames. The
//! cull stages borrow it immutably for the duration of one pass.

use std::sync::Arc;

use slotmap::SlotMap;
use thiserror::Error;

use crate::foundation::math::Mat4;
use crate::scene::appearance::AppearanceOverride;
use crate::scene::bounds::{merge_bounds, AABB};
use crate::scene::custom::CustomCullable;
use crate::scene::effects::{ClipPlane, Fog, Light};
use crate::scene::node::{
    CustomNode, GroupNode, LeafNode, Node, NodeId, ShapeNode, SingleNode, TransformNode,
};

/// Scene graph construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The handle does not refer to a live node
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeId),

    /// Children can only be attached to groups, transforms and single nodes
    #[error("Node {0:?} cannot hold children")]
    NotAGroup(NodeId),
}

/// Scene graph arena
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, Node>,
}

impl SceneGraph {
    /// Create an empty scene graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node and return its handle
    pub fn insert(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    /// Add an empty group
    pub fn add_group(&mut self) -> NodeId {
        self.insert(Node::Group(GroupNode::default()))
    }

    /// Add an empty transform group
    pub fn add_transform(&mut self, matrix: Mat4) -> NodeId {
        self.insert(Node::Transform(TransformNode {
            matrix,
            children: Vec::new(),
            bounds: None,
        }))
    }

    /// Add a pass-through wrapper around `child`
    pub fn add_single(&mut self, child: Option<NodeId>) -> NodeId {
        self.insert(Node::Single(SingleNode { child }))
    }

    /// Add a self-culling node
    pub fn add_custom(&mut self, cullable: Arc<dyn CustomCullable>, bounds: Option<AABB>) -> NodeId {
        self.insert(Node::Custom(CustomNode { cullable, bounds }))
    }

    /// Add a shape leaf
    pub fn add_shape(&mut self, shape: ShapeNode) -> NodeId {
        self.insert(Node::Leaf(LeafNode::Shape(shape)))
    }

    /// Add a light leaf
    pub fn add_light(&mut self, light: Arc<Light>) -> NodeId {
        self.insert(Node::Leaf(LeafNode::Light(light)))
    }

    /// Add a clip plane leaf
    pub fn add_clip_plane(&mut self, clip: Arc<ClipPlane>) -> NodeId {
        self.insert(Node::Leaf(LeafNode::ClipPlane(clip)))
    }

    /// Add a fog leaf
    pub fn add_fog(&mut self, fog: Arc<Fog>) -> NodeId {
        self.insert(Node::Leaf(LeafNode::Fog(fog)))
    }

    /// Add an appearance override leaf
    pub fn add_override(&mut self, appearance_override: Arc<AppearanceOverride>) -> NodeId {
        self.insert(Node::Leaf(LeafNode::Override(appearance_override)))
    }

    /// Append `child` to `parent`. The same child may be attached to several
    /// parents. A single node's existing child is replaced.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        if !self.nodes.contains_key(child) {
            return Err(SceneError::UnknownNode(child));
        }
        match self.nodes.get_mut(parent) {
            Some(Node::Group(group)) => group.children.push(child),
            Some(Node::Transform(transform)) => transform.children.push(child),
            Some(Node::Single(single)) => single.child = Some(child),
            Some(_) => return Err(SceneError::NotAGroup(parent)),
            None => return Err(SceneError::UnknownNode(parent)),
        }
        Ok(())
    }

    /// Look up a node
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Look up a node for modification
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Recompute group and transform bounds below `root`, bottom-up.
    ///
    /// Returns the bounds of `root` as seen from its parent's frame. Shape
    /// and custom-node bounds are taken as declared.
    pub fn compute_bounds(&mut self, root: NodeId) -> Option<AABB> {
        let (children, matrix) = match self.nodes.get(root)? {
            Node::Group(group) => (group.children.clone(), None),
            Node::Transform(transform) => (transform.children.clone(), Some(transform.matrix)),
            Node::Single(single) => {
                return single.child.and_then(|child| self.compute_bounds(child));
            }
            Node::Custom(custom) => return custom.bounds,
            Node::Leaf(LeafNode::Shape(shape)) => return shape.bounds,
            Node::Leaf(_) => return None,
        };

        let bounds = children
            .iter()
            .fold(None, |acc, &child| merge_bounds(acc, self.compute_bounds(child)));

        match self.nodes.get_mut(root) {
            Some(Node::Group(group)) => group.bounds = bounds,
            Some(Node::Transform(transform)) => transform.bounds = bounds,
            _ => {}
        }

        match (bounds, matrix) {
            (Some(b), Some(m)) => Some(b.transformed(&m)),
            (b, _) => b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::appearance::Geometry;
    use approx::assert_relative_eq;

    fn unit_shape() -> ShapeNode {
        ShapeNode::new(Arc::new(Geometry::new("box", 36)), None)
            .with_bounds(AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)))
    }

    #[test]
    fn test_add_child_rejects_leaf_parent() {
        let mut graph = SceneGraph::new();
        let shape = graph.add_shape(unit_shape());
        let other = graph.add_shape(unit_shape());
        assert_eq!(graph.add_child(shape, other), Err(SceneError::NotAGroup(shape)));
    }

    #[test]
    fn test_shared_child_under_two_parents() {
        let mut graph = SceneGraph::new();
        let root = graph.add_group();
        let a = graph.add_group();
        let shape = graph.add_shape(unit_shape());
        graph.add_child(root, a).unwrap();
        graph.add_child(root, shape).unwrap();
        graph.add_child(a, shape).unwrap();

        assert_eq!(graph.get(root).unwrap().children(), &[a, shape]);
        assert_eq!(graph.get(a).unwrap().children(), &[shape]);
    }

    #[test]
    fn test_compute_bounds_through_transform() {
        let mut graph = SceneGraph::new();
        let root = graph.add_group();
        let moved = graph.add_transform(Mat4::new_translation(&Vec3::new(10.0, 0.0, 0.0)));
        let shape = graph.add_shape(unit_shape());
        graph.add_child(root, moved).unwrap();
        graph.add_child(moved, shape).unwrap();

        let bounds = graph.compute_bounds(root).unwrap();
        assert_relative_eq!(bounds.min.x, 9.0);
        assert_relative_eq!(bounds.max.x, 11.0);

        // the transform group keeps bounds in its children's frame
        assert_relative_eq!(graph.get(moved).unwrap().bounds().unwrap().max.x, 1.0);
    }
}
