//! Cull stages
//!
//! A cull stage walks the scene graph once per pass and produces one
//! [`CullOutputRecord`](crate::render::CullOutputRecord) per visible shape.
//! While descending it keeps stacks of the active transform, lights, clip
//! planes, fog and appearance overrides. Every push made at a group is popped
//! before the traversal leaves that group, so effects never leak to
//! siblings.

mod frustum_cull;
mod null_cull;
mod offscreen;

pub use frustum_cull::FrustumCullStage;
pub use null_cull::NullCullStage;

use std::sync::Arc;

use crate::foundation::collections::StateStack;
use crate::foundation::math::{reduce_to_2d, to_column_major, Mat4};
use crate::render::cull_output::CullResults;
use crate::render::environment::EnvironmentData;
use crate::render::pipeline::TerminateFlag;
use crate::render::reporter::ErrorReporter;
use crate::render::visual_details::{ClipDetails, LightDetails};
use crate::scene::appearance::{Appearance, AppearanceOverride};
use crate::scene::bounds::AABB;
use crate::scene::custom::CustomData;
use crate::scene::effects::Fog;
use crate::scene::graph::SceneGraph;
use crate::scene::node::{LeafNode, Node, NodeId, ShapeNode};

const STACK_CAPACITY: usize = 16;
const STACK_GROWTH: usize = 16;

/// Depth of every traversal stack, for checking push/pop symmetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackDepths {
    /// Transform stack
    pub transforms: usize,
    /// Local light stack
    pub lights: usize,
    /// Clip plane stack
    pub clip_planes: usize,
    /// Local fog stack
    pub fogs: usize,
    /// Appearance override stack
    pub overrides: usize,
}

impl StackDepths {
    /// Every stack is empty
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Scene graph traversal producing visible records
pub trait CullStage: Send {
    /// Run one pass from `root`. The returned results stay valid until the
    /// next call.
    fn cull(&mut self, graph: &SceneGraph, root: NodeId, environment: &EnvironmentData) -> &mut CullResults;

    /// Results of the last pass
    fn results(&self) -> &CullResults;

    /// Replace the reporter used for non-fatal problems
    fn set_error_reporter(&mut self, reporter: Arc<dyn ErrorReporter>);

    /// Share a cancellation flag with the stage
    fn set_terminate_flag(&mut self, flag: TerminateFlag);

    /// Toggle the render-to-texture target scan
    fn set_offscreen_check_enabled(&mut self, enabled: bool);

    /// Current depth of the traversal stacks
    fn stack_depths(&self) -> StackDepths;
}

/// A local light with its effect bounds already in world space
#[derive(Debug, Clone)]
pub(crate) struct ScopedLight {
    pub details: LightDetails,
    pub effect_bounds: Option<AABB>,
}

/// What one group pushed, so exactly that much is popped again
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ScopePushes {
    lights: usize,
    clip_planes: usize,
    fog: bool,
    appearance_override: bool,
}

/// How a stage treats effect leaves it finds at a group
#[derive(Debug, Clone, Copy)]
pub(crate) struct EffectPolicy {
    /// Send global-only lights to the pass-wide lists instead of the stack
    pub collect_global_lights: bool,
    /// Honour appearance overrides
    pub overrides: bool,
}

/// An override merged with one shape appearance, kept while it is in use
#[derive(Debug)]
struct MergedAppearance {
    source: Arc<AppearanceOverride>,
    local: Option<Arc<Appearance>>,
    merged: Arc<Appearance>,
    used: bool,
}

impl MergedAppearance {
    fn matches(&self, source: &Arc<AppearanceOverride>, local: Option<&Arc<Appearance>>) -> bool {
        let same_local = match (self.local.as_ref(), local) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_local && Arc::ptr_eq(&self.source, source)
    }
}

/// Stacks shared by both cull stages
#[derive(Debug)]
pub(crate) struct TraversalState {
    pub transforms: StateStack<Mat4>,
    pub lights: StateStack<ScopedLight>,
    pub clip_planes: StateStack<ClipDetails>,
    pub fogs: StateStack<Arc<Fog>>,
    pub overrides: StateStack<Arc<AppearanceOverride>>,
    merged: Vec<MergedAppearance>,
}

impl TraversalState {
    pub fn new() -> Self {
        Self {
            transforms: StateStack::new(STACK_CAPACITY, STACK_GROWTH),
            lights: StateStack::new(STACK_CAPACITY, STACK_GROWTH),
            clip_planes: StateStack::new(STACK_CAPACITY, STACK_GROWTH),
            fogs: StateStack::new(STACK_CAPACITY, STACK_GROWTH),
            overrides: StateStack::new(STACK_CAPACITY, STACK_GROWTH),
            merged: Vec::new(),
        }
    }

    /// Drop leftovers from an aborted pass and seed the identity transform
    pub fn begin(&mut self) {
        self.transforms.clear();
        self.lights.clear();
        self.clip_planes.clear();
        self.fogs.clear();
        self.overrides.clear();
        // merges nobody drew with last pass are released
        self.merged.retain_mut(|entry| std::mem::replace(&mut entry.used, false));
        self.transforms.push(Mat4::identity());
    }

    /// Pop the identity transform seeded by [`TraversalState::begin`]
    pub fn end(&mut self) {
        self.transforms.pop();
    }

    pub fn depths(&self) -> StackDepths {
        StackDepths {
            transforms: self.transforms.depth(),
            lights: self.lights.depth(),
            clip_planes: self.clip_planes.depth(),
            fogs: self.fogs.depth(),
            overrides: self.overrides.depth(),
        }
    }

    pub fn current_transform(&self) -> Mat4 {
        self.transforms.top().copied().unwrap_or_else(Mat4::identity)
    }

    /// Push `parent * local` as the new current transform
    pub fn push_local(&mut self, local: &Mat4) {
        let world = self.current_transform() * local;
        self.transforms.push(world);
    }

    /// World-space version of bounds declared in the current frame
    pub fn world_bounds(&self, bounds: &AABB) -> AABB {
        bounds.transformed(&self.current_transform())
    }

    /// Scan the direct children of a group for effect leaves and push them.
    ///
    /// Only the first enabled local fog and the first enabled override found
    /// at one level are used. An override is not pushed while the enclosing
    /// one is marked to win over lower overrides.
    pub fn push_effects(
        &mut self,
        graph: &SceneGraph,
        children: &[NodeId],
        results: &mut CullResults,
        policy: EffectPolicy,
    ) -> ScopePushes {
        let mut pushes = ScopePushes::default();
        let transform = self.current_transform();

        for &child in children {
            let Some(Node::Leaf(leaf)) = graph.get(child) else {
                continue;
            };
            match leaf {
                LeafNode::Light(light) if light.enabled => {
                    let details = LightDetails::new(Arc::clone(light), to_column_major(&transform));
                    let effect_bounds = light.effect_bounds.map(|b| b.transformed(&transform));
                    if light.global_only && policy.collect_global_lights {
                        // a shared subtree reached twice under one transform
                        // contributes its global lights once
                        match effect_bounds {
                            None => {
                                if !results.global_lights.iter().any(|known| known.same_as(&details)) {
                                    results.global_lights.push(details);
                                }
                            }
                            Some(bounds) => {
                                if !results.bounded_global_lights.iter().any(|(known, _)| known.same_as(&details)) {
                                    results.bounded_global_lights.push((details, bounds));
                                }
                            }
                        }
                    } else {
                        self.lights.push(ScopedLight { details, effect_bounds });
                        pushes.lights += 1;
                    }
                }
                LeafNode::ClipPlane(clip) if clip.enabled => {
                    self.clip_planes
                        .push(ClipDetails::new(Arc::clone(clip), to_column_major(&transform)));
                    pushes.clip_planes += 1;
                }
                LeafNode::Fog(fog) if fog.enabled && !fog.global_only && !pushes.fog => {
                    self.fogs.push(Arc::clone(fog));
                    pushes.fog = true;
                }
                LeafNode::Override(over) if policy.overrides && over.enabled && !pushes.appearance_override => {
                    let blocked = self.overrides.top().is_some_and(|top| top.override_lower);
                    if !blocked {
                        self.overrides.push(Arc::clone(over));
                        pushes.appearance_override = true;
                    }
                }
                _ => {}
            }
        }
        pushes
    }

    /// Undo exactly what [`TraversalState::push_effects`] pushed
    pub fn pop_effects(&mut self, pushes: ScopePushes) {
        self.lights.pop_n(pushes.lights);
        self.clip_planes.pop_n(pushes.clip_planes);
        if pushes.fog {
            self.fogs.pop();
        }
        if pushes.appearance_override {
            self.overrides.pop();
        }
    }

    /// Appearance a shape is drawn with once the active override is applied
    fn effective_appearance(&mut self, shape: &ShapeNode) -> Option<Arc<Appearance>> {
        let over = match self.overrides.top() {
            None => return shape.appearance.clone(),
            Some(over) if !over.use_local_appearance => return Some(Arc::clone(&over.appearance)),
            Some(over) => Arc::clone(over),
        };
        Some(self.merged_appearance(&over, shape.appearance.as_ref()))
    }

    /// Merge `over` with `local` once and hand out the same `Arc` afterwards
    fn merged_appearance(&mut self, over: &Arc<AppearanceOverride>, local: Option<&Arc<Appearance>>) -> Arc<Appearance> {
        if let Some(entry) = self.merged.iter_mut().find(|entry| entry.matches(over, local)) {
            entry.used = true;
            return Arc::clone(&entry.merged);
        }
        let merged = Arc::new(Appearance::merged(&over.appearance, local.map(|app| &**app), true));
        self.merged.push(MergedAppearance {
            source: Arc::clone(over),
            local: local.cloned(),
            merged: Arc::clone(&merged),
            used: true,
        });
        merged
    }

    /// Write a record for `shape` using the current stack contents.
    ///
    /// 3D shapes get every clip plane, the local fog and only the local
    /// lights whose effect bounds reach the shape. 2D shapes get a reduced
    /// transform and no effects. Returns the appearance the record was given.
    pub fn emit_shape(
        &mut self,
        results: &mut CullResults,
        node: NodeId,
        shape: &ShapeNode,
        custom_data: Option<CustomData>,
    ) -> Option<Arc<Appearance>> {
        let world = self.current_transform();
        let appearance = self.effective_appearance(shape);

        let record = results.records.next_slot();
        record.reset();
        record.node = Some(node);
        record.geometry = shape.geometry.clone();
        record.appearance = appearance.clone();
        record.custom_data = custom_data;
        record.bounds = shape.bounds.map(|b| b.transformed(&world));
        record.is_2d = shape.is_2d;

        if shape.is_2d {
            record.transform = reduce_to_2d(&world);
            return appearance;
        }

        record.transform = to_column_major(&world);
        let shape_bounds = record.bounds;
        record.lights.extend(
            self.lights
                .as_slice()
                .iter()
                .filter(|light| match (light.effect_bounds, shape_bounds) {
                    (Some(effect), Some(bounds)) => effect.intersects(&bounds),
                    _ => true,
                })
                .map(|light| light.details.clone()),
        );
        record.clip_planes.extend(self.clip_planes.as_slice().iter().cloned());
        record.fog = self.fogs.top().cloned();
        appearance
    }
}

/// Follow a chain of pass-through wrappers to the first real node
pub(crate) fn resolve_single(graph: &SceneGraph, mut id: NodeId) -> Option<NodeId> {
    loop {
        match graph.get(id)? {
            Node::Single(single) => id = single.child?,
            _ => return Some(id),
        }
    }
}
