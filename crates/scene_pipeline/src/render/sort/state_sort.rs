//! State-minimising sort stage
//!
//! Records are first ordered so that records sharing state objects sit next
//! to each other. Emission then tracks the state currently active on the
//! backend and only emits the difference to what the next record needs. At
//! the end of the stream everything still active is stopped.

use std::cmp::Ordering;
use std::sync::Arc;

use log::trace;

use crate::error::{scaled_capacity, PipelineError};
use crate::render::cull_output::CullOutputRecord;
use crate::render::environment::EnvironmentData;
use crate::render::instructions::{IdAllocator, InstructionStream, RenderOp, StreamFull};
use crate::render::pipeline::TerminateFlag;
use crate::render::reporter::{ErrorReporter, LogErrorReporter};
use crate::render::sort::{
    emit_with_retry, is_drawable, push_render, SortStage, STREAM_CAPACITY, STREAM_GROWTH,
};
use crate::render::visual_details::{ClipDetails, LightDetails, VisualDetails};
use crate::scene::appearance::{
    Appearance, AttributeKind, ShaderArguments, ShaderProgram, StateComponent, Texture,
};
use crate::scene::effects::Fog;

const ATTRIBUTE_COUNT: usize = AttributeKind::ALL.len();

fn address<T: ?Sized>(value: Option<&Arc<T>>) -> usize {
    value.map_or(0, |v| Arc::as_ptr(v).cast::<()>() as usize)
}

fn same<T: ?Sized>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Total order clustering records with identical state.
///
/// 3D records come before 2D ones; inside each group records are ordered by
/// shader, then textures, then attribute identities.
fn compare_state(a: &CullOutputRecord, b: &CullOutputRecord) -> Ordering {
    fn attribute_keys(appearance: Option<&Arc<Appearance>>) -> impl Iterator<Item = usize> + '_ {
        AttributeKind::ALL.into_iter().map(move |kind| {
            appearance
                .and_then(|app| app.attribute(kind))
                .map_or(0, |component| component.address())
        })
    }
    fn texture_keys(appearance: Option<&Arc<Appearance>>) -> impl Iterator<Item = usize> + '_ {
        appearance
            .into_iter()
            .flat_map(|app| app.textures.iter())
            .map(|texture| address(texture.as_ref()))
    }

    let (app_a, app_b) = (a.appearance.as_ref(), b.appearance.as_ref());
    a.is_2d
        .cmp(&b.is_2d)
        .then_with(|| {
            address(app_a.and_then(|app| app.shader.as_ref()))
                .cmp(&address(app_b.and_then(|app| app.shader.as_ref())))
        })
        .then_with(|| texture_keys(app_a).cmp(texture_keys(app_b)))
        .then_with(|| attribute_keys(app_a).cmp(attribute_keys(app_b)))
}

/// State the backend currently has active
#[derive(Debug, Default)]
struct ActiveState {
    lights: Vec<(LightDetails, u32)>,
    clip_planes: Vec<(ClipDetails, u32)>,
    fog: Option<Arc<Fog>>,
    shader: Option<Arc<ShaderProgram>>,
    shader_args: Option<Arc<ShaderArguments>>,
    textures: Vec<Option<Arc<Texture>>>,
    attributes: [Option<StateComponent>; ATTRIBUTE_COUNT],
    ids: IdAllocator,
}

impl Clone for ActiveState {
    fn clone(&self) -> Self {
        Self {
            lights: self.lights.clone(),
            clip_planes: self.clip_planes.clone(),
            fog: self.fog.clone(),
            shader: self.shader.clone(),
            shader_args: self.shader_args.clone(),
            textures: self.textures.clone(),
            attributes: self.attributes.clone(),
            ids: self.ids,
        }
    }

    // reuses the vectors of the checkpoint on every record
    fn clone_from(&mut self, source: &Self) {
        self.lights.clone_from(&source.lights);
        self.clip_planes.clone_from(&source.clip_planes);
        self.fog.clone_from(&source.fog);
        self.shader.clone_from(&source.shader);
        self.shader_args.clone_from(&source.shader_args);
        self.textures.clone_from(&source.textures);
        self.attributes.clone_from(&source.attributes);
        self.ids = source.ids;
    }
}

/// Bring an active effect list in line with what a record needs.
///
/// Effects present in both stay on. Removed ones are stopped newest first,
/// then new ones are started with fresh ids.
fn diff_effects<T>(
    stream: &mut InstructionStream,
    ids: &mut IdAllocator,
    active: &mut Vec<(VisualDetails<T>, u32)>,
    wanted: &[VisualDetails<T>],
    start: impl Fn(&VisualDetails<T>, u32) -> RenderOp,
    stop: impl Fn(&VisualDetails<T>, u32) -> RenderOp,
) -> Result<(), StreamFull> {
    let unchanged = active.len() == wanted.len()
        && active.iter().zip(wanted).all(|((current, _), next)| current.same_as(next));
    if unchanged {
        return Ok(());
    }

    let mut index = active.len();
    while index > 0 {
        index -= 1;
        if !wanted.iter().any(|next| next.same_as(&active[index].0)) {
            let (details, id) = active.remove(index);
            stream.try_push(stop(&details, id))?;
        }
    }

    for next in wanted {
        if !active.iter().any(|(current, _)| current.same_as(next)) {
            let id = ids.allocate();
            stream.try_push(start(next, id))?;
            active.push((next.clone(), id));
        }
    }
    Ok(())
}

impl ActiveState {
    fn apply_effects(&mut self, stream: &mut InstructionStream, record: &CullOutputRecord) -> Result<(), StreamFull> {
        diff_effects(
            stream,
            &mut self.ids,
            &mut self.lights,
            &record.lights,
            |light, id| RenderOp::StartLight {
                light: Arc::clone(&light.renderable),
                transform: light.transform,
                id,
            },
            |light, id| RenderOp::StopLight {
                light: Arc::clone(&light.renderable),
                id,
            },
        )?;
        diff_effects(
            stream,
            &mut self.ids,
            &mut self.clip_planes,
            &record.clip_planes,
            |clip, id| RenderOp::StartClipPlane {
                clip: Arc::clone(&clip.renderable),
                transform: clip.transform,
                id,
            },
            |clip, id| RenderOp::StopClipPlane {
                clip: Arc::clone(&clip.renderable),
                id,
            },
        )?;

        if !same(self.fog.as_ref(), record.fog.as_ref()) {
            if let Some(fog) = self.fog.take() {
                stream.try_push(RenderOp::StopFog(fog))?;
            }
            if let Some(fog) = &record.fog {
                stream.try_push(RenderOp::StartFog(Arc::clone(fog)))?;
                self.fog = Some(Arc::clone(fog));
            }
        }
        Ok(())
    }

    fn apply_appearance(&mut self, stream: &mut InstructionStream, appearance: Option<&Appearance>) -> Result<(), StreamFull> {
        let shader = appearance.and_then(|app| app.shader.as_ref());
        if !same(self.shader.as_ref(), shader) {
            // arguments belong to the program they were sent to
            self.shader_args = None;
            if let Some(current) = self.shader.take() {
                stream.try_push(RenderOp::StopShaderProgram(current))?;
            }
            if let Some(next) = shader {
                stream.try_push(RenderOp::StartShaderProgram(Arc::clone(next)))?;
                self.shader = Some(Arc::clone(next));
            }
        }

        let args = appearance.and_then(|app| app.shader_args.as_ref());
        if !same(self.shader_args.as_ref(), args) {
            if let Some(next) = args {
                stream.try_push(RenderOp::SetShaderArgs(Arc::clone(next)))?;
            }
            self.shader_args = args.cloned();
        }

        let wanted: &[Option<Arc<Texture>>] = appearance.map_or(&[][..], |app| app.textures.as_slice());
        let units = self.textures.len().max(wanted.len());
        self.textures.resize(units, None);
        for unit in 0..units {
            let next = wanted.get(unit).and_then(Option::as_ref);
            if same(self.textures[unit].as_ref(), next) {
                continue;
            }
            if let Some(texture) = self.textures[unit].take() {
                stream.try_push(RenderOp::StopTexture { unit, texture })?;
            }
            if let Some(texture) = next {
                stream.try_push(RenderOp::StartTexture {
                    unit,
                    texture: Arc::clone(texture),
                })?;
                self.textures[unit] = Some(Arc::clone(texture));
            }
        }

        for kind in AttributeKind::ALL {
            let next = appearance.and_then(|app| app.attribute(kind));
            let slot = &mut self.attributes[kind.index()];
            let unchanged = match (slot.as_ref(), next.as_ref()) {
                (Some(current), Some(next)) => current.same_as(next),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                continue;
            }
            if let Some(current) = slot.take() {
                stream.try_push(RenderOp::StopState(current))?;
            }
            if let Some(next) = next {
                stream.try_push(RenderOp::StartState(next.clone()))?;
                *slot = Some(next);
            }
        }
        Ok(())
    }

    fn emit(&mut self, stream: &mut InstructionStream, record: &CullOutputRecord) -> Result<(), StreamFull> {
        self.apply_effects(stream, record)?;
        self.apply_appearance(stream, record.appearance.as_deref())?;

        if record.is_2d {
            stream.try_push(RenderOp::StartRender {
                transform: record.transform,
            })?;
            push_render(stream, record)?;
            stream.try_push(RenderOp::StopRender)
        } else {
            push_render(stream, record)
        }
    }

    /// Stop everything still active
    fn finish(&mut self, stream: &mut InstructionStream) -> Result<(), StreamFull> {
        while let Some((light, id)) = self.lights.pop() {
            stream.try_push(RenderOp::StopLight {
                light: light.renderable,
                id,
            })?;
        }
        while let Some((clip, id)) = self.clip_planes.pop() {
            stream.try_push(RenderOp::StopClipPlane {
                clip: clip.renderable,
                id,
            })?;
        }
        if let Some(fog) = self.fog.take() {
            stream.try_push(RenderOp::StopFog(fog))?;
        }
        for slot in self.attributes.iter_mut().rev() {
            if let Some(current) = slot.take() {
                stream.try_push(RenderOp::StopState(current))?;
            }
        }
        for (unit, slot) in self.textures.iter_mut().enumerate().rev() {
            if let Some(texture) = slot.take() {
                stream.try_push(RenderOp::StopTexture { unit, texture })?;
            }
        }
        self.shader_args = None;
        if let Some(shader) = self.shader.take() {
            stream.try_push(RenderOp::StopShaderProgram(shader))?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.lights.clear();
        self.clip_planes.clear();
        self.fog = None;
        self.shader = None;
        self.shader_args = None;
        self.textures.clear();
        self.attributes = Default::default();
        self.ids.reset();
    }
}

/// Sort stage that groups records by state and emits only state changes
pub struct StateSortStage {
    stream: InstructionStream,
    active: ActiveState,
    checkpoint: ActiveState,
    reporter: Arc<dyn ErrorReporter>,
    terminate: TerminateFlag,
}

impl StateSortStage {
    /// Create a stage sized for `num_surfaces` render surfaces
    pub fn new(num_surfaces: i32) -> Result<Self, PipelineError> {
        Self::with_capacity(num_surfaces, STREAM_CAPACITY, STREAM_GROWTH)
    }

    /// Create a stage with explicit per-surface stream preallocation
    pub fn with_capacity(num_surfaces: i32, capacity: usize, growth: usize) -> Result<Self, PipelineError> {
        let capacity = scaled_capacity(capacity, num_surfaces)?;
        Ok(Self {
            stream: InstructionStream::new(capacity, growth),
            active: ActiveState::default(),
            checkpoint: ActiveState::default(),
            reporter: Arc::new(LogErrorReporter),
            terminate: TerminateFlag::default(),
        })
    }
}

impl SortStage for StateSortStage {
    fn sort(&mut self, records: &mut [CullOutputRecord], _environment: &EnvironmentData) -> &InstructionStream {
        self.stream.clear();
        self.active.reset();

        records.sort_by(compare_state);

        for record in records.iter() {
            if self.terminate.is_set() {
                return &self.stream;
            }
            if !is_drawable(record, self.reporter.as_ref()) {
                continue;
            }
            emit_with_retry(&mut self.stream, &mut self.active, &mut self.checkpoint, |stream, active| {
                active.emit(stream, record)
            });
        }

        emit_with_retry(&mut self.stream, &mut self.active, &mut self.checkpoint, |stream, active| {
            active.finish(stream)
        });

        trace!("State sort emitted {} operations for {} records", self.stream.len(), records.len());
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
