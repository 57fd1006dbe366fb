//! Render pipeline: cull stages, sort stages and the instruction stream
//!
//! ```text
//! SceneGraph ──cull──▶ CullResults ──sort──▶ InstructionStream ──▶ InstructionReceiver
//! ```
//!
//! Each stage owns its working buffers and reuses them frame to frame. A
//! stage instance runs one pass at a time; use one pipeline per surface to
//! render surfaces in parallel.

pub mod cull;
pub mod cull_output;
pub mod environment;
pub mod instructions;
pub mod performance;
pub mod pipeline;
pub mod reporter;
pub mod sort;
pub mod visual_details;

pub use cull::{CullStage, FrustumCullStage, NullCullStage, StackDepths};
pub use cull_output::{CullOutputRecord, CullResults};
pub use environment::{EnvironmentData, Projection, StereoEye, Viewport};
pub use instructions::{IdAllocator, InstructionStream, OpTag, RenderOp, StreamFull};
pub use performance::{ListenerId, PerformanceListener, PerformanceMonitor, QualityChange};
pub use pipeline::{InstructionReceiver, PipelineStats, RenderPipeline, TerminateFlag};
pub use reporter::{ErrorReporter, LogErrorReporter};
pub use sort::{NullSortStage, SimpleTransparencySortStage, SortStage, StateSortStage};
pub use visual_details::{ClipDetails, LightDetails, VisualDetails};
