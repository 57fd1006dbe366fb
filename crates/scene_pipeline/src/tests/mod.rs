//! Scene-level tests exercising cull and sort stages together


use std::sync::{Arc, Mutex};

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::render::{EnvironmentData, ErrorReporter, InstructionReceiver, OpTag, RenderOp, Viewport};
use crate::scene::{Geometry, ShapeNode, AABB};

/// Camera at +10 on Z looking at the origin, 90 degree field of view
pub(crate) fn camera() -> EnvironmentData {
    EnvironmentData::new(
        Viewport::new(0, 0, 800, 800),
        Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 100.0),
        Mat4::look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), Vec3::y()),
    )
}

pub(crate) fn unit_bounds() -> AABB {
    AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0))
}

pub(crate) fn box_shape(name: &str) -> ShapeNode {
    ShapeNode::new(Arc::new(Geometry::new(name, 36)), None).with_bounds(unit_bounds())
}

/// Reporter that keeps every message
#[derive(Default)]
pub(crate) struct CollectingReporter {
    pub warnings: Mutex<Vec<String>>,
}

impl ErrorReporter for CollectingReporter {
    fn warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}

/// Receiver that keeps the tags of the last stream
#[derive(Default, Clone)]
pub(crate) struct CollectingReceiver {
    pub tags: Arc<Mutex<Vec<OpTag>>>,
    pub frames: Arc<Mutex<usize>>,
}

impl InstructionReceiver for CollectingReceiver {
    fn receive(&mut self, instructions: &[RenderOp], _environment: &EnvironmentData) {
        *self.tags.lock().unwrap() = instructions.iter().map(RenderOp::tag).collect();
        *self.frames.lock().unwrap() += 1;
    }
}

/// Light and clip-plane ids are started once, stopped once later, and never
/// reused while active
pub(crate) fn assert_ids_paired(ops: &[RenderOp]) {
    let mut active_lights: Vec<u32> = Vec::new();
    let mut active_clips: Vec<u32> = Vec::new();
    let mut seen: Vec<u32> = Vec::new();

    for op in ops {
        match op {
            RenderOp::StartLight { id, .. } => {
                assert!(!seen.contains(id), "light id {id} started twice");
                seen.push(*id);
                active_lights.push(*id);
            }
            RenderOp::StartClipPlane { id, .. } => {
                assert!(!seen.contains(id), "clip id {id} started twice");
                seen.push(*id);
                active_clips.push(*id);
            }
            RenderOp::StopLight { id, .. } => {
                let position = active_lights.iter().position(|a| a == id);
                assert!(position.is_some(), "light id {id} stopped while inactive");
                active_lights.retain(|a| a != id);
            }
            RenderOp::StopClipPlane { id, .. } => {
                let position = active_clips.iter().position(|a| a == id);
                assert!(position.is_some(), "clip id {id} stopped while inactive");
                active_clips.retain(|a| a != id);
            }
            _ => {}
        }
    }
    assert!(active_lights.is_empty(), "lights left on: {active_lights:?}");
    assert!(active_clips.is_empty(), "clips left on: {active_clips:?}");
}

pub(crate) fn count(tags: &[OpTag], tag: OpTag) -> usize {
    tags.iter().filter(|t| **t == tag).count()
}
