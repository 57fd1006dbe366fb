//! Render-to-texture target discovery
//!
//! When a visible shape samples a texture rendered from another sub-scene,
//! that sub-scene has to be drawn first. The scanner lists every such target
//! once, with targets used inside a sub-scene ahead of the target that
//! renders it.

use std::sync::Arc;

use crate::scene::appearance::{Appearance, OffscreenTexture};
use crate::scene::graph::SceneGraph;
use crate::scene::node::{LeafNode, Node, NodeId};

#[derive(Debug, Default)]
pub(crate) struct OffscreenScanner {
    visiting: Vec<usize>,
    pending: Vec<NodeId>,
}

fn address(target: &Arc<OffscreenTexture>) -> usize {
    Arc::as_ptr(target) as usize
}

impl OffscreenScanner {
    pub fn clear(&mut self) {
        self.visiting.clear();
        self.pending.clear();
    }

    /// Register every offscreen target `appearance` samples
    pub fn register(&mut self, graph: &SceneGraph, appearance: &Appearance, out: &mut Vec<Arc<OffscreenTexture>>) {
        for texture in appearance.textures.iter().flatten() {
            if let Some(target) = texture.offscreen_target() {
                self.register_target(graph, target, out);
            }
        }
    }

    fn register_target(&mut self, graph: &SceneGraph, target: &Arc<OffscreenTexture>, out: &mut Vec<Arc<OffscreenTexture>>) {
        let key = address(target);
        // already listed, or a target that (indirectly) samples itself
        if out.iter().any(|known| address(known) == key) || self.visiting.contains(&key) {
            return;
        }
        self.visiting.push(key);

        for appearance in self.sub_scene_appearances(graph, target.root) {
            self.register(graph, &appearance, out);
        }

        self.visiting.pop();
        out.push(Arc::clone(target));
    }

    /// Every appearance reachable below `root`, including override appearances
    fn sub_scene_appearances(&mut self, graph: &SceneGraph, root: NodeId) -> Vec<Arc<Appearance>> {
        let base = self.pending.len();
        self.pending.push(root);
        let mut found = Vec::new();

        while self.pending.len() > base {
            let Some(id) = self.pending.pop() else { break };
            match graph.get(id) {
                Some(Node::Leaf(LeafNode::Shape(shape))) => found.extend(shape.appearance.clone()),
                Some(Node::Leaf(LeafNode::Override(over))) => found.push(Arc::clone(&over.appearance)),
                Some(node) => self.pending.extend_from_slice(node.children()),
                None => {}
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::appearance::{Geometry, Texture};
    use crate::scene::node::ShapeNode;

    fn textured(target: &Arc<OffscreenTexture>) -> Arc<Appearance> {
        Arc::new(Appearance {
            textures: vec![Some(Arc::new(Texture::offscreen(Arc::clone(target))))],
            ..Appearance::default()
        })
    }

    fn target(name: &str, root: NodeId) -> Arc<OffscreenTexture> {
        Arc::new(OffscreenTexture {
            name: name.to_string(),
            root,
            size: (64, 64),
            repaint_required: true,
        })
    }

    #[test]
    fn test_nested_targets_listed_first_and_once() {
        let mut graph = SceneGraph::new();
        let inner_root = graph.add_group();
        let inner = target("inner", inner_root);

        let outer_root = graph.add_group();
        let mirror = graph.add_shape(ShapeNode::new(Arc::new(Geometry::new("quad", 4)), Some(textured(&inner))));
        graph.add_child(outer_root, mirror).unwrap();
        let outer = target("outer", outer_root);

        let mut scanner = OffscreenScanner::default();
        let mut out = Vec::new();
        scanner.register(&graph, &textured(&outer), &mut out);
        scanner.register(&graph, &textured(&inner), &mut out);

        let names: Vec<_> = out.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["inner", "outer"]);
    }

    #[test]
    fn test_self_referencing_target_terminates() {
        let mut graph = SceneGraph::new();
        let root = graph.add_group();
        let portal = target("portal", root);
        let shape = graph.add_shape(ShapeNode::new(Arc::new(Geometry::new("quad", 4)), Some(textured(&portal))));
        graph.add_child(root, shape).unwrap();

        let mut scanner = OffscreenScanner::default();
        let mut out = Vec::new();
        scanner.register(&graph, &textured(&portal), &mut out);
        assert_eq!(out.len(), 1);
    }
}
