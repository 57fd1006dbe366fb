//! Cull → sort → receiver glue

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, trace};

use crate::config::{CullStrategy, PipelineConfig, SortStrategy};
use crate::error::PipelineError;
use crate::foundation::time::Stopwatch;
use crate::render::cull::{CullStage, FrustumCullStage, NullCullStage};
use crate::render::environment::EnvironmentData;
use crate::render::instructions::RenderOp;
use crate::render::reporter::ErrorReporter;
use crate::render::sort::{NullSortStage, SimpleTransparencySortStage, SortStage, StateSortStage};
use crate::scene::graph::SceneGraph;
use crate::scene::node::NodeId;

/// Cooperative cancellation shared between a pipeline and its stages.
///
/// Once set, running passes unwind promptly and leave partial output.
#[derive(Debug, Clone, Default)]
pub struct TerminateFlag(Arc<AtomicBool>);

impl TerminateFlag {
    /// Create a cleared flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every pass sharing this flag to stop
    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check whether a stop was requested
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Allow passes to run again
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Consumer of a finished instruction stream, usually a backend device
pub trait InstructionReceiver: Send {
    /// Handle the instructions of one pass
    fn receive(&mut self, instructions: &[RenderOp], environment: &EnvironmentData);
}

/// What one frame produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Visible records
    pub records: usize,
    /// Instructions handed to the receiver
    pub instructions: usize,
    /// Render-to-texture targets found
    pub offscreen_targets: usize,
    /// Time spent culling
    pub cull_time: Duration,
    /// Time spent sorting
    pub sort_time: Duration,
    /// The frame was aborted and nothing reached the receiver
    pub terminated: bool,
}

/// One cull stage, one sort stage and a receiver, run once per frame
pub struct RenderPipeline {
    cull: Box<dyn CullStage>,
    sort: Box<dyn SortStage>,
    receiver: Box<dyn InstructionReceiver>,
    terminate: TerminateFlag,
}

impl RenderPipeline {
    /// Assemble a pipeline from existing stages. The stages are given the
    /// pipeline's terminate flag.
    pub fn new(
        mut cull: Box<dyn CullStage>,
        mut sort: Box<dyn SortStage>,
        receiver: Box<dyn InstructionReceiver>,
    ) -> Self {
        let terminate = TerminateFlag::new();
        cull.set_terminate_flag(terminate.clone());
        sort.set_terminate_flag(terminate.clone());
        Self {
            cull,
            sort,
            receiver,
            terminate,
        }
    }

    /// Build the stages a configuration asks for
    pub fn from_config(config: &PipelineConfig, receiver: Box<dyn InstructionReceiver>) -> Result<Self, PipelineError> {
        config.validate()?;
        let surfaces = config.surface_count;

        let mut cull: Box<dyn CullStage> = match config.cull {
            CullStrategy::Frustum => Box::new(FrustumCullStage::with_capacity(
                surfaces,
                config.record_capacity,
                config.record_growth,
            )?),
            CullStrategy::Null => Box::new(NullCullStage::with_capacity(
                surfaces,
                config.record_capacity,
                config.record_growth,
            )?),
        };
        cull.set_offscreen_check_enabled(config.offscreen_check);

        let (capacity, growth) = (config.instruction_capacity, config.instruction_growth);
        let sort: Box<dyn SortStage> = match config.sort {
            SortStrategy::Null => Box::new(NullSortStage::with_capacity(surfaces, capacity, growth)?),
            SortStrategy::State => Box::new(StateSortStage::with_capacity(surfaces, capacity, growth)?),
            SortStrategy::SimpleTransparency => Box::new(SimpleTransparencySortStage::with_capacity(
                surfaces, capacity, growth,
            )?),
        };

        info!(
            "Render pipeline ready: {:?} cull, {:?} sort, {} surface(s)",
            config.cull, config.sort, surfaces
        );
        Ok(Self::new(cull, sort, receiver))
    }

    /// Flag that aborts running passes when set
    pub fn terminate_flag(&self) -> TerminateFlag {
        self.terminate.clone()
    }

    /// Route non-fatal problems of both stages to `reporter`
    pub fn set_error_reporter(&mut self, reporter: Arc<dyn ErrorReporter>) {
        self.cull.set_error_reporter(Arc::clone(&reporter));
        self.sort.set_error_reporter(reporter);
    }

    /// Cull stage, for inspecting the last pass
    pub fn cull_stage(&self) -> &dyn CullStage {
        self.cull.as_ref()
    }

    /// Sort stage, for inspecting the last pass
    pub fn sort_stage(&self) -> &dyn SortStage {
        self.sort.as_ref()
    }

    /// Cull `root`, sort the result and hand it to the receiver
    pub fn render_frame(&mut self, graph: &SceneGraph, root: NodeId, environment: &EnvironmentData) -> PipelineStats {
        let mut stats = PipelineStats::default();

        let mut watch = Stopwatch::start_new();
        let results = self.cull.cull(graph, root, environment);
        stats.cull_time = watch.stop();
        stats.records = results.records.len();
        stats.offscreen_targets = results.offscreen.len();

        if results.terminated {
            stats.terminated = true;
            return stats;
        }

        watch.reset();
        watch.start();
        let stream = self.sort.sort(results.records.as_mut_slice(), environment);
        stats.sort_time = watch.stop();
        stats.instructions = stream.len();

        if self.terminate.is_set() {
            stats.terminated = true;
            return stats;
        }

        self.receiver.receive(stream.as_slice(), environment);
        trace!(
            "Frame: {} records, {} instructions, cull {:?}, sort {:?}",
            stats.records,
            stats.instructions,
            stats.cull_time,
            stats.sort_time
        );
        stats
    }
}
