//! View-frustum cull stage

use std::sync::Arc;

use log::trace;

use crate::error::{scaled_capacity, PipelineError};
use crate::render::cull::offscreen::OffscreenScanner;
use crate::render::cull::{resolve_single, CullStage, EffectPolicy, StackDepths, TraversalState};
use crate::render::cull_output::CullResults;
use crate::render::environment::EnvironmentData;
use crate::render::pipeline::TerminateFlag;
use crate::render::reporter::{ErrorReporter, LogErrorReporter};
use crate::scene::bounds::{FrustumTest, AABB};
use crate::scene::custom::{CustomCullOutput, CustomCullRequest};
use crate::scene::graph::SceneGraph;
use crate::scene::node::{CustomNode, LeafNode, Node, NodeId, ShapeGeometry, ShapeNode};

const RECORD_CAPACITY: usize = 512;
const RECORD_GROWTH: usize = 256;

const POLICY: EffectPolicy = EffectPolicy {
    collect_global_lights: true,
    overrides: true,
};

/// Cull stage that prunes subtrees whose bounds fall outside the view
/// frustum.
///
/// Once a group tests fully inside, nothing below it is tested again.
/// Global-only lights are collected for the whole pass and handed to every
/// visible 3D record after traversal.
pub struct FrustumCullStage {
    state: TraversalState,
    results: CullResults,
    scanner: OffscreenScanner,
    custom_output: CustomCullOutput,
    reporter: Arc<dyn ErrorReporter>,
    terminate: TerminateFlag,
    offscreen_check: bool,
}

impl FrustumCullStage {
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
            custom_output: CustomCullOutput::default(),
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

    /// Classify bounds declared in the current frame. Unknown bounds count
    /// as partially visible.
    fn classify(&self, env: &EnvironmentData, bounds: Option<AABB>) -> FrustumTest {
        bounds.map_or(FrustumTest::Partial, |b| env.frustum.classify(&self.state.world_bounds(&b)))
    }

    fn cull_node(&mut self, graph: &SceneGraph, env: &EnvironmentData, id: NodeId, all_in: bool) -> usize {
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
            Node::Group(group) => self.cull_group(graph, env, &group.children, group.bounds, all_in),
            Node::Transform(transform) => {
                self.state.push_local(&transform.matrix);
                let count = self.cull_group(graph, env, &transform.children, transform.bounds, all_in);
                self.state.transforms.pop();
                count
            }
            Node::Custom(custom) => self.cull_custom(graph, env, custom, all_in),
            Node::Leaf(LeafNode::Shape(shape)) => self.cull_shape(graph, env, id, shape, all_in),
            // effect leaves are picked up by their parent group
            Node::Single(_) | Node::Leaf(_) => 0,
        }
    }

    fn cull_group(
        &mut self,
        graph: &SceneGraph,
        env: &EnvironmentData,
        children: &[NodeId],
        bounds: Option<AABB>,
        mut all_in: bool,
    ) -> usize {
        if self.terminated() {
            return 0;
        }
        let pushes = self.state.push_effects(graph, children, &mut self.results, POLICY);

        if !all_in {
            match self.classify(env, bounds) {
                FrustumTest::AllOut => {
                    self.state.pop_effects(pushes);
                    return 0;
                }
                FrustumTest::AllIn => all_in = true,
                FrustumTest::Partial => {}
            }
        }

        let mut count = 0;
        for &child in children {
            if self.terminated() {
                break;
            }
            count += self.cull_node(graph, env, child, all_in);
        }

        self.state.pop_effects(pushes);
        count
    }

    fn cull_custom(&mut self, graph: &SceneGraph, env: &EnvironmentData, custom: &CustomNode, mut all_in: bool) -> usize {
        if !all_in {
            match self.classify(env, custom.bounds) {
                FrustumTest::AllOut => return 0,
                FrustumTest::AllIn => all_in = true,
                FrustumTest::Partial => {}
            }
        }

        let world = self.state.current_transform();
        self.custom_output.clear();
        let request = CustomCullRequest {
            environment: env,
            world_transform: &world,
            frustum: &env.frustum,
        };
        custom.cullable.cull(&request, &mut self.custom_output);

        // the scratch output is reused by nested custom nodes
        let children = self.custom_output.children.clone();
        let local = self.custom_output.local_transform;

        if let Some(matrix) = &local {
            self.state.push_local(matrix);
        }
        let count = self.cull_group(graph, env, &children, None, all_in);
        if local.is_some() {
            self.state.transforms.pop();
        }
        count
    }

    fn cull_shape(&mut self, graph: &SceneGraph, env: &EnvironmentData, id: NodeId, shape: &ShapeNode, all_in: bool) -> usize {
        if !shape.visible {
            return 0;
        }
        if !shape.is_2d && !all_in && self.classify(env, shape.bounds) == FrustumTest::AllOut {
            return 0;
        }

        let custom_data = match &shape.geometry {
            Some(ShapeGeometry::Custom(renderable)) => {
                match renderable.process_cull(&self.state.current_transform(), env) {
                    Some(data) => Some(data),
                    None => return 0,
                }
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
}

impl CullStage for FrustumCullStage {
    fn cull(&mut self, graph: &SceneGraph, root: NodeId, environment: &EnvironmentData) -> &mut CullResults {
        self.results.begin();
        self.state.begin();
        self.scanner.clear();

        let visible = self.cull_node(graph, environment, root, false);

        if !self.terminated() {
            self.state.end();
            self.results.distribute_global_lights();
        }
        trace!(
            "Frustum cull emitted {} records, {} global lights, {} offscreen targets",
            visible,
            self.results.global_lights.len() + self.results.bounded_global_lights.len(),
            self.results.offscreen.len()
        );
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
