//! Sort stage that keeps the cull order

use std::sync::Arc;

use log::trace;

use crate::error::{scaled_capacity, PipelineError};
use crate::render::cull_output::CullOutputRecord;
use crate::render::environment::EnvironmentData;
use crate::render::instructions::{IdAllocator, InstructionStream};
use crate::render::pipeline::TerminateFlag;
use crate::render::reporter::{ErrorReporter, LogErrorReporter};
use crate::render::sort::{
    emit_with_retry, is_drawable, push_bracketed, BracketIds, SortStage, STREAM_CAPACITY, STREAM_GROWTH,
};

/// Emits every record in input order inside its own complete state bracket.
/// Nothing is shared between records, so the stream is large but trivially
/// correct.
pub struct NullSortStage {
    stream: InstructionStream,
    ids: IdAllocator,
    ids_checkpoint: IdAllocator,
    scratch: BracketIds,
    reporter: Arc<dyn ErrorReporter>,
    terminate: TerminateFlag,
}

impl NullSortStage {
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
            reporter: Arc::new(LogErrorReporter),
            terminate: TerminateFlag::default(),
        })
    }
}

impl SortStage for NullSortStage {
    fn sort(&mut self, records: &mut [CullOutputRecord], _environment: &EnvironmentData) -> &InstructionStream {
        self.stream.clear();
        self.ids.reset();

        for record in records.iter() {
            if self.terminate.is_set() {
                break;
            }
            if !is_drawable(record, self.reporter.as_ref()) {
                continue;
            }
            let scratch = &mut self.scratch;
            emit_with_retry(&mut self.stream, &mut self.ids, &mut self.ids_checkpoint, |stream, ids| {
                push_bracketed(stream, ids, scratch, record)
            });
        }

        trace!("Null sort emitted {} operations for {} records", self.stream.len(), records.len());
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
