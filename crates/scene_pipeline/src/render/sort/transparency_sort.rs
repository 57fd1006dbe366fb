//! Opaque-then-transparent sort stage

use std::sync::Arc;

use log::trace;

use crate::error::{scaled_capacity, PipelineError};
use crate::render::cull_output::CullOutputRecord;
use crate::render::environment::EnvironmentData;
use crate::render::instructions::{IdAllocator, InstructionStream, RenderOp};
use crate::render::pipeline::TerminateFlag;
use crate::render::reporter::{ErrorReporter, LogErrorReporter};
use crate::render::sort::{
    emit_with_retry, is_drawable, push_bracketed, BracketIds, SortStage, STREAM_CAPACITY, STREAM_GROWTH,
};
use crate::scene::node::ShapeGeometry;

/// Whether a record has to be drawn in the transparent pass.
///
/// An appearance that declares material, blending or textures decides on
/// its own. Otherwise the geometry's own flag is used. Custom geometry is
/// always asked directly.
pub fn is_transparent(record: &CullOutputRecord) -> bool {
    match (&record.geometry, &record.appearance) {
        (Some(ShapeGeometry::Custom(renderable)), _) => renderable.is_transparent(),
        (_, Some(appearance)) if appearance.has_transparency_info() => appearance.is_transparent(),
        (Some(geometry), _) => geometry.has_transparency(),
        (None, _) => false,
    }
}

/// Emits opaque records as they come and transparent records afterwards,
/// wrapped in a single transparent bracket. No state is shared between
/// records.
pub struct SimpleTransparencySortStage {
    stream: InstructionStream,
    ids: IdAllocator,
    ids_checkpoint: IdAllocator,
    scratch: BracketIds,
    transparent: Vec<usize>,
    reporter: Arc<dyn ErrorReporter>,
    terminate: TerminateFlag,
}

impl SimpleTransparencySortStage {
    /// Create a stage sized for `num_surfaces` render surfaces
    pub fn new(num_surfaces: i32) -> Result<Self, PipelineError> {
        Self::with_capacity(num_surfaces, STREAM_CAPACITY, STREAM_GROWTH)
    }

    /// Create a stage with explicit per-surface stream preallocation
    pub fn with_capacity(num_surfaces: i32, capacity: usize, growth: usize) -> Result<Self, PipelineError> {
        let capacity = scaled_capacity(capacity, num_surfaces)?;
        Ok(Self {
            stream: InstructionStream::new(capacity, growth),
            ids: IdAllocator::default(),
            ids_checkpoint: IdAllocator::default(),
            scratch: BracketIds::default(),
            transparent: Vec::new(),
            reporter: Arc::new(LogErrorReporter),
            terminate: TerminateFlag::default(),
        })
    }

    fn emit(&mut self, record: &CullOutputRecord) {
        let scratch = &mut self.scratch;
        emit_with_retry(&mut self.stream, &mut self.ids, &mut self.ids_checkpoint, |stream, ids| {
            push_bracketed(stream, ids, scratch, record)
        });
    }

    fn emit_marker(&mut self, op: &RenderOp) {
        emit_with_retry(&mut self.stream, &mut self.ids, &mut self.ids_checkpoint, |stream, _| {
            stream.try_push(op.clone())
        });
    }
}

impl SortStage for SimpleTransparencySortStage {
    fn sort(&mut self, records: &mut [CullOutputRecord], _environment: &EnvironmentData) -> &InstructionStream {
        self.stream.clear();
        self.ids.reset();
        self.transparent.clear();

        for (index, record) in records.iter().enumerate() {
            if self.terminate.is_set() {
                return &self.stream;
            }
            if !is_drawable(record, self.reporter.as_ref()) {
                continue;
            }
            if is_transparent(record) {
                self.transparent.push(index);
            } else {
                self.emit(record);
            }
        }

        if !self.transparent.is_empty() {
            self.emit_marker(&RenderOp::StartTransparent);
            let transparent = std::mem::take(&mut self.transparent);
            for &index in &transparent {
                if self.terminate.is_set() {
                    break;
                }
                self.emit(&records[index]);
            }
            self.transparent = transparent;
            self.emit_marker(&RenderOp::StopTransparent);
        }

        trace!(
            "Transparency sort emitted {} operations, {} of {} records transparent",
            self.stream.len(),
            self.transparent.len(),
            records.len()
        );
        &self.stream
    }

    fn instructions(&self) -> &InstructionStream {
        &self.stream
    }

    fn set_error_reporter(&mut self, reporter: Arc<dyn ErrorReporter>) {
        self.reporter = reporter;
    }

    fn set_terminate_flag(&mut self, flag: TerminateFlag) {
        self.terminate = flag;
    }
}
