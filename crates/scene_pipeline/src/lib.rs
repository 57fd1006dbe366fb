//! # Scene Pipeline
//!
//! The cull → sort → instruction pipeline of a retained-mode 3D scene graph
//! renderer.
//!
//! ## Features
//!
//! - **Arena Scene Graph**: shared subtrees (DAG) addressed by `NodeId`
//! - **Frustum Culling**: hierarchical bounds tests with scoped lights, clip
//!   planes, fog and appearance overrides
//! - **Global Lights**: scene-wide lights collected during traversal and
//!   distributed afterwards
//! - **State Sorting**: records grouped by shared state, emitted as minimal
//!   start/stop deltas
//! - **Transparency Pass**: transparent records bracketed after opaque ones
//! - **Backend Agnostic**: output is a flat stream of `RenderOp`s
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_pipeline::prelude::*;
//! use std::sync::Arc;
//!
//! struct PrintReceiver;
//!
//! impl InstructionReceiver for PrintReceiver {
//!     fn receive(&mut self, instructions: &[RenderOp], _environment: &EnvironmentData) {
//!         for op in instructions {
//!             println!("{:?}", op.tag());
//!         }
//!     }
//! }
//!
//! fn main() -> Result<(), PipelineError> {
//!     let mut graph = SceneGraph::new();
//!     let root = graph.add_group();
//!     let shape = graph.add_shape(ShapeNode::new(Arc::new(Geometry::new("cube", 36)), None));
//!     graph.add_child(root, shape)?;
//!
//!     let environment = EnvironmentData::new(
//!         Viewport::new(0, 0, 1280, 720),
//!         Mat4::perspective(constants::QUARTER_PI, 16.0 / 9.0, 0.1, 100.0),
//!         Mat4::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y()),
//!     );
//!
//!     let config = PipelineConfig::default();
//!     scene_pipeline::foundation::logging::init_with_filter(&config.log_level);
//!     let mut pipeline = RenderPipeline::from_config(&config, Box::new(PrintReceiver))?;
//!     let stats = pipeline.render_frame(&graph, root, &environment);
//!     println!("{} records, {} instructions", stats.records, stats.instructions);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod error;
pub mod foundation;
pub mod render;
pub mod scene;

#[cfg(test)]
mod tests;

pub use error::PipelineError;

/// Common imports for pipeline users
pub mod prelude {
    pub use crate::{
        config::{Config, CullStrategy, PipelineConfig, SortStrategy},
        error::PipelineError,
        foundation::math::{constants, Mat4, Mat4Ext, Vec3, Vec4},
        render::{
            CullOutputRecord, CullStage, EnvironmentData, ErrorReporter, FrustumCullStage, InstructionReceiver,
            InstructionStream, NullCullStage, NullSortStage, OpTag, PerformanceListener, PerformanceMonitor,
            RenderOp, RenderPipeline, SimpleTransparencySortStage, SortStage, StateSortStage, TerminateFlag,
            Viewport,
        },
        scene::{
            Appearance, AppearanceOverride, ClipPlane, Fog, FogMode, Geometry, Light, Material, NodeId,
            SceneGraph, ShapeNode, AABB,
        },
    };
}
