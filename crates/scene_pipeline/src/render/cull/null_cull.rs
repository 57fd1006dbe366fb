//! Cull stage without visibility testing
//!
//! Every visible shape reachable from the root is emitted. Global-only lights
//! are scoped like any other light, custom nodes are skipped and appearance
//! overrides are ignored, which leaves only the stack bookkeeping. Useful as
//! a baseline when checking the frustum stage.

use std::sync::Arc;

use log::trace;

use crate::error::{scaled_capacity, PipelineError};
use crate::render::cull::offscreen::OffscreenScanner;
use crate::render::cull::{resolve_single, CullStage, EffectPolicy, StackDepths, TraversalState};
use crate::render::cull_output::CullResults;
use crate::render::environment::EnvironmentData;
use crate::render::pipeline::TerminateFlag;
use crate::render::reporter::{ErrorReporter, LogErrorReporter};
use crate::scene::graph::SceneGraph;
use crate::scene::node::{LeafNode, Node, NodeId, ShapeGeometry};

const RECORD_CAPACITY: usize = 512;
const RECORD_GROWTH: usize = 256;

const POLICY: EffectPolicy = EffectPolicy {
    collect_global_lights: false,
    overrides: false,
};

/// Cull stage that treats everything as visible
pub struct NullCullStage {
    state: TraversalState,
    results: CullResults,
    scanner: OffscreenScanner,
    reporter: Arc<dyn ErrorReporter>,
    terminate: TerminateFlag,
    offscreen_check: bool,
}

impl NullCullStage {
    /// Create a stage sized for `num_surfaces` render surfaces
    pub fn new(num_surfaces: i32) -> Result<Self, PipelineError> {
        Self::with_capacity(num_surfaces, RECORD_CAPACITY, RECORD_GROWTH)
    }

    /// Create a stage with explicit per-surface record preallocation
    pub fn with_capacity(num_surfaces: i32, capacity: usize, growth: usize) -> Result<Self, PipelineError> {
        let capacity = scaled_capacity(capacity, num_surfaces)?;
        Ok(Self {
            state: TraversalState::new(),
            results: CullResults::new(capacity, growth),
            scanner: OffscreenScanner::default(),
            reporter: Arc::new(LogErrorReporter),
            terminate: TerminateFlag::default(),
            offscreen_check: true,
        })
    }

    fn terminated(&mut self) -> bool {
        if self.terminate.is_set() {
            self.results.terminated = true;
        }
        self.results.terminated
    }

    fn cull_node(&mut self, graph: &SceneGraph, env: &EnvironmentData, id: NodeId) -> usize {
        if self.terminated() {
            return 0;
        }
        let Some(id) = resolve_single(graph, id) else {
            return 0;
        };
        let Some(node) = graph.get(id) else {
            self.reporter.warning(&format!("Cull skipped unknown node {id:?}"));
            return 0;
        };

        match node {
            Node::Group(group) => self.cull_group(graph, env, &group.children),
            Node::Transform(transform) => {
                self.state.push_local(&transform.matrix);
                let count = self.cull_group(graph, env, &transform.children);
                self.state.transforms.pop();
                count
            }
            Node::Leaf(LeafNode::Shape(shape)) if shape.visible => {
                let custom_data = match &shape.geometry {
                    Some(ShapeGeometry::Custom(renderable)) => {
                        renderable.process_cull(&self.state.current_transform(), env)
                    }
                    _ => None,
                };
                let appearance = self.state.emit_shape(&mut self.results, id, shape, custom_data);
                if self.offscreen_check {
                    if let Some(appearance) = appearance {
                        self.scanner.register(graph, &appearance, &mut self.results.offscreen);
                    }
                }
                1
            }
            Node::Custom(_) | Node::Single(_) | Node::Leaf(_) => 0,
        }
    }

    fn cull_group(&mut self, graph: &SceneGraph, env: &EnvironmentData, children: &[NodeId]) -> usize {
        if self.terminated() {
            return 0;
        }
        let pushes = self.state.push_effects(graph, children, &mut self.results, POLICY);

        let mut count = 0;
        for &child in children {
            if self.terminated() {
                break;
            }
            count += self.cull_node(graph, env, child);
        }

        self.state.pop_effects(pushes);
        count
    }
}

impl CullStage for NullCullStage {
    fn cull(&mut self, graph: &SceneGraph, root: NodeId, environment: &EnvironmentData) -> &mut CullResults {
        self.results.begin();
        self.state.begin();
        self.scanner.clear();

        let visible = self.cull_node(graph, environment, root);
        if !self.terminated() {
            self.state.end();
        }
        trace!("Null cull emitted {} records", visible);
        &mut self.results
    }

    fn results(&self) -> &CullResults {
        &self.results
    }

    fn set_error_reporter(&mut self, reporter: Arc<dyn ErrorReporter>) {
        self.reporter = reporter;
    }

    fn set_terminate_flag(&mut self, flag: TerminateFlag) {
        self.terminate = flag;
    }

    fn set_offscreen_check_enabled(&mut self, enabled: bool) {
        self.offscreen_check = enabled;
    }

    fn stack_depths(&self) -> StackDepths {
        self.state.depths()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::render::environment::Viewport;
    use crate::scene::appearance::Geometry;
    use crate::scene::effects::Light;
    use crate::scene::node::ShapeNode;

    #[test]
    fn test_global_light_is_scoped_like_a_local_one() {
        let mut graph = SceneGraph::new();
        let root = graph.add_group();
        let lit = graph.add_group();
        let sun = graph.add_light(Arc::new(Light::directional(Vec3::new(0.0, -1.0, 0.0)).with_global_only(true)));
        let inside = graph.add_shape(ShapeNode::new(Arc::new(Geometry::new("a", 3)), None));
        let outside = graph.add_shape(ShapeNode::new(Arc::new(Geometry::new("b", 3)), None));
        graph.add_child(root, lit).unwrap();
        graph.add_child(root, outside).unwrap();
        graph.add_child(lit, sun).unwrap();
        graph.add_child(lit, inside).unwrap();

        let env = EnvironmentData::new(Viewport::new(0, 0, 4, 4), Mat4::identity(), Mat4::identity());
        let mut stage = NullCullStage::new(0).unwrap();
        let results = stage.cull(&graph, root, &env);

        assert!(results.global_lights.is_empty());
        assert_eq!(results.records()[0].lights.len(), 1);
        assert!(results.records()[1].lights.is_empty());
        assert!(stage.stack_depths().is_empty());
    }
}
