//! Sort stages
//!
//! A sort stage turns the records of one cull pass into an
//! [`InstructionStream`]. All variants share the overflow handling: the
//! stream refuses pushes past its limit, the stage rolls back to the start
//! of the record it was emitting, grows the stream and emits that record
//! again.

mod null_sort;
mod state_sort;
mod transparency_sort;

pub use null_sort::NullSortStage;
pub use state_sort::StateSortStage;
pub use transparency_sort::SimpleTransparencySortStage;

use std::sync::Arc;

use log::debug;

use crate::render::cull_output::CullOutputRecord;
use crate::render::environment::EnvironmentData;
use crate::render::instructions::{IdAllocator, InstructionStream, RenderOp, StreamFull};
use crate::render::pipeline::TerminateFlag;
use crate::render::reporter::ErrorReporter;
use crate::scene::appearance::StateComponent;
use crate::scene::node::ShapeGeometry;

const STREAM_CAPACITY: usize = 4096;
const STREAM_GROWTH: usize = 1024;

/// Converts cull output into backend instructions
pub trait SortStage: Send {
    /// Emit instructions for `records`. Stages may reorder the records in
    /// place. The returned stream stays valid until the next call.
    fn sort(&mut self, records: &mut [CullOutputRecord], environment: &EnvironmentData) -> &InstructionStream;

    /// Stream produced by the last pass
    fn instructions(&self) -> &InstructionStream;

    /// Replace the reporter used for non-fatal problems
    fn set_error_reporter(&mut self, reporter: Arc<dyn ErrorReporter>);

    /// Share a cancellation flag with the stage
    fn set_terminate_flag(&mut self, flag: TerminateFlag);
}

/// Run `emit` until it fits in the stream.
///
/// `state` is everything `emit` mutates besides the stream. It is saved into
/// `checkpoint` first and restored from it after every overflow, so a retry
/// starts from exactly the state the first attempt saw.
pub(crate) fn emit_with_retry<S, F>(stream: &mut InstructionStream, state: &mut S, checkpoint: &mut S, mut emit: F)
where
    S: Clone,
    F: FnMut(&mut InstructionStream, &mut S) -> Result<(), StreamFull>,
{
    let mark = stream.len();
    checkpoint.clone_from(state);
    while let Err(StreamFull(limit)) = emit(stream, state) {
        debug!("Instruction stream overflowed at {} operations, retrying record", limit);
        stream.truncate(mark);
        state.clone_from(checkpoint);
        stream.grow();
    }
}

/// Records without geometry cannot be drawn; report and skip them
pub(crate) fn is_drawable(record: &CullOutputRecord, reporter: &dyn ErrorReporter) -> bool {
    if record.geometry.is_some() {
        return true;
    }
    reporter.warning(&format!(
        "Sort skipped record without a recognised renderable (node {:?})",
        record.node
    ));
    false
}

/// Emit the draw call for a record
pub(crate) fn push_render(stream: &mut InstructionStream, record: &CullOutputRecord) -> Result<(), StreamFull> {
    let op = match &record.geometry {
        Some(ShapeGeometry::Standard(geometry)) if record.is_2d => RenderOp::RenderGeometry2D {
            geometry: Arc::clone(geometry),
            transform: record.transform,
        },
        Some(ShapeGeometry::Standard(geometry)) => RenderOp::RenderGeometry {
            geometry: Arc::clone(geometry),
            transform: record.transform,
        },
        Some(ShapeGeometry::Custom(renderable)) => RenderOp::RenderCustom {
            renderable: Arc::clone(renderable),
            data: record.custom_data.clone(),
            transform: record.transform,
        },
        None => return Ok(()),
    };
    stream.try_push(op)
}

/// Ids issued for the record currently being bracketed
#[derive(Debug, Default)]
pub(crate) struct BracketIds {
    lights: Vec<u32>,
    clip_planes: Vec<u32>,
}

/// Emit one record with its own complete bracket of state.
///
/// Lights and clip planes get fresh ids and are stopped in reverse order
/// with the ids they were started with.
pub(crate) fn push_bracketed(
    stream: &mut InstructionStream,
    ids: &mut IdAllocator,
    scratch: &mut BracketIds,
    record: &CullOutputRecord,
) -> Result<(), StreamFull> {
    scratch.lights.clear();
    scratch.clip_planes.clear();

    for light in &record.lights {
        let id = ids.allocate();
        scratch.lights.push(id);
        stream.try_push(RenderOp::StartLight {
            light: Arc::clone(&light.renderable),
            transform: light.transform,
            id,
        })?;
    }
    for clip in &record.clip_planes {
        let id = ids.allocate();
        scratch.clip_planes.push(id);
        stream.try_push(RenderOp::StartClipPlane {
            clip: Arc::clone(&clip.renderable),
            transform: clip.transform,
            id,
        })?;
    }
    if let Some(fog) = &record.fog {
        stream.try_push(RenderOp::StartFog(Arc::clone(fog)))?;
    }

    if record.is_2d {
        stream.try_push(RenderOp::StartRender {
            transform: record.transform,
        })?;
        push_render(stream, record)?;
        stream.try_push(RenderOp::StopRender)?;
    } else if let Some(appearance) = &record.appearance {
        let state = StateComponent::Appearance(Arc::clone(appearance));
        stream.try_push(RenderOp::StartState(state.clone()))?;
        push_render(stream, record)?;
        stream.try_push(RenderOp::StopState(state))?;
    } else {
        push_render(stream, record)?;
    }

    if let Some(fog) = &record.fog {
        stream.try_push(RenderOp::StopFog(Arc::clone(fog)))?;
    }
    for (clip, &id) in record.clip_planes.iter().zip(&scratch.clip_planes).rev() {
        stream.try_push(RenderOp::StopClipPlane {
            clip: Arc::clone(&clip.renderable),
            id,
        })?;
    }
    for (light, &id) in record.lights.iter().zip(&scratch.lights).rev() {
        stream.try_push(RenderOp::StopLight {
            light: Arc::clone(&light.renderable),
            id,
        })?;
    }
    Ok(())
}
