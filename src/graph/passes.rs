//! Pass Runtime
//!
//! A compiled frame graph is an ordered list of [`ScenePass`] variants,
//! one per pass source, tagged by the input type the pass consumes. Per
//! frame, each pass executes in four steps:
//!
//! 1. *start*: acquire the pass's targets;
//! 2. *update draw objects*: stream per-object data into clones of the
//!    per-object root-argument templates, leasing const-buffer and vertex
//!    memory from the frame arenas;
//! 3. *set up render state*: bind PSO, viewport, scissor, targets and
//!    the pass-local and pass-global root arguments;
//! 4. *draw*: per object, bind its arguments and issue the draw.
//!
//! The variant set is closed; dispatch is an exhaustive match.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::rhi::device::CommandList;
use crate::rhi::registry::{BufferKey, BufferRegistry};
use crate::rhi::types::{InputLayout, PipelineId, PrimitiveTopology, RootSignatureId, Viewport};
use crate::utils::hashing::HashedName;

use super::frame::FrameMemory;
use super::rootsig::RootArg;

/// Input type a pass consumes. Doubles as the key of the per-object
/// global-resource template table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassInput {
    Ui,
    Static,
    Dynamic,
    Particles,
}

impl PassInput {
    /// Number of input types (size of per-input tables).
    pub const COUNT: usize = 4;

    /// Stable index into per-input tables.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            PassInput::Ui => 0,
            PassInput::Static => 1,
            PassInput::Dynamic => 2,
            PassInput::Particles => 3,
        }
    }
}

/// Compiled parameters a pass variant is initialized with.
#[derive(Debug, Clone, PartialEq)]
pub struct PassParameters {
    pub name: String,
    pub input: PassInput,
    pub topology: PrimitiveTopology,
    pub viewport: Viewport,
    pub color_target: HashedName,
    pub depth_target: HashedName,
    pub input_layout: InputLayout,
    pub pipeline: PipelineId,
    pub root_signature: RootSignatureId,
    /// Local + PerPass arguments, bound once per pass.
    pub pass_local: Vec<RootArg>,
    /// Local + PerObject template, cloned per draw object.
    pub per_object_local_template: Vec<RootArg>,
    /// Indices into `FrameGraph::passes_global_res`.
    pub pass_global_indices: SmallVec<[usize; 8]>,
    /// Indices into the input type's per-object global template table.
    pub per_object_global_indices_template: SmallVec<[usize; 8]>,
}

/// Source of one draw object's vertex data.
#[derive(Debug, Clone)]
pub enum VertexSource {
    /// Bytes streamed into the frame's vertex arena (UI glyphs, particles,
    /// re-packed dynamic geometry).
    Streamed(Vec<u8>),
    /// Geometry already resident in the buffer registry.
    Resident(BufferKey),
}

/// One object submitted to a pass this frame.
#[derive(Debug, Clone)]
pub struct DrawObject {
    /// Per-object const-buffer payloads, keyed by const-buffer name hash.
    pub const_data: FxHashMap<u32, Vec<u8>>,
    pub vertices: VertexSource,
    pub vertex_count: u32,
}

/// Draw-call lists of the current frame, one per input type.
#[derive(Debug)]
pub struct FrameDrawLists {
    pub per_input: [Vec<DrawObject>; PassInput::COUNT],
}

impl Default for FrameDrawLists {
    fn default() -> Self {
        Self {
            per_input: std::array::from_fn(|_| Vec::new()),
        }
    }
}

impl FrameDrawLists {
    #[must_use]
    pub fn input(&self, input: PassInput) -> &[DrawObject] {
        &self.per_input[input.index()]
    }

    /// Queues one object for every pass consuming `input` this frame.
    pub fn push(&mut self, input: PassInput, object: DrawObject) {
        self.per_input[input.index()].push(object);
    }
}

/// Everything a pass needs while executing one frame.
pub struct JobContext<'a> {
    pub registry: &'a mut BufferRegistry,
    pub memory: &'a mut FrameMemory,
    pub draw_lists: &'a FrameDrawLists,
    /// Flat pool of Global PerPass arguments, shared by all passes.
    pub passes_global_res: &'a [RootArg],
    /// Per-input-type pools of Global PerObject argument templates.
    pub obj_global_res_template: &'a [Vec<RootArg>; PassInput::COUNT],
    /// Central descriptor lookup: resource name hash → heap index.
    pub descriptors: &'a FxHashMap<u32, u32>,
    /// Current draw-area size in pixels.
    pub draw_area: (u32, u32),
}

// ============================================================================
// Pass variants
// ============================================================================

/// The frame graph's pass variant.
#[derive(Debug)]
pub enum ScenePass {
    Ui(UiPass),
    Static(StaticPass),
    Dynamic(DynamicPass),
    Particles(ParticlesPass),
}

impl ScenePass {
    /// Emplaces the variant matching the parameters' input type.
    #[must_use]
    pub fn init(params: PassParameters) -> Self {
        match params.input {
            PassInput::Ui => ScenePass::Ui(UiPass {
                core: PassCore::new(params),
            }),
            PassInput::Static => ScenePass::Static(StaticPass {
                core: PassCore::new(params),
            }),
            PassInput::Dynamic => ScenePass::Dynamic(DynamicPass {
                core: PassCore::new(params),
            }),
            PassInput::Particles => ScenePass::Particles(ParticlesPass {
                core: PassCore::new(params),
            }),
        }
    }

    #[must_use]
    pub fn core(&self) -> &PassCore {
        match self {
            ScenePass::Ui(p) => &p.core,
            ScenePass::Static(p) => &p.core,
            ScenePass::Dynamic(p) => &p.core,
            ScenePass::Particles(p) => &p.core,
        }
    }

    #[must_use]
    pub fn core_mut(&mut self) -> &mut PassCore {
        match self {
            ScenePass::Ui(p) => &mut p.core,
            ScenePass::Static(p) => &mut p.core,
            ScenePass::Dynamic(p) => &mut p.core,
            ScenePass::Particles(p) => &mut p.core,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.core().params.name
    }

    /// Runs the pass for one frame.
    pub fn execute(&mut self, ctx: &mut JobContext<'_>, cmd: &mut dyn CommandList) {
        match self {
            ScenePass::Ui(p) => p.execute(ctx, cmd),
            ScenePass::Static(p) => p.execute(ctx, cmd),
            ScenePass::Dynamic(p) => p.execute(ctx, cmd),
            ScenePass::Particles(p) => p.execute(ctx, cmd),
        }
    }
}

/// UI pass: every object streams freshly packed vertex data.
#[derive(Debug)]
pub struct UiPass {
    pub core: PassCore,
}

impl UiPass {
    fn execute(&mut self, ctx: &mut JobContext<'_>, cmd: &mut dyn CommandList) {
        self.core.start(cmd);
        self.core.update_draw_objects(ctx, StreamPolicy::StreamedOnly);
        self.core.set_up_render_state(ctx, cmd);
        self.core.draw(ctx, cmd);
        cmd.end_pass();
    }
}

/// Static geometry pass: vertex data is resident, only const data streams.
#[derive(Debug)]
pub struct StaticPass {
    pub core: PassCore,
}

impl StaticPass {
    fn execute(&mut self, ctx: &mut JobContext<'_>, cmd: &mut dyn CommandList) {
        self.core.start(cmd);
        self.core.update_draw_objects(ctx, StreamPolicy::ResidentOnly);
        self.core.set_up_render_state(ctx, cmd);
        self.core.draw(ctx, cmd);
        cmd.end_pass();
    }
}

/// Dynamic entity pass: geometry may be resident or re-streamed per frame.
#[derive(Debug)]
pub struct DynamicPass {
    pub core: PassCore,
}

impl DynamicPass {
    fn execute(&mut self, ctx: &mut JobContext<'_>, cmd: &mut dyn CommandList) {
        self.core.start(cmd);
        self.core.update_draw_objects(ctx, StreamPolicy::Either);
        self.core.set_up_render_state(ctx, cmd);
        self.core.draw(ctx, cmd);
        cmd.end_pass();
    }
}

/// Particle pass: point sprites streamed per frame.
#[derive(Debug)]
pub struct ParticlesPass {
    pub core: PassCore,
}

impl ParticlesPass {
    fn execute(&mut self, ctx: &mut JobContext<'_>, cmd: &mut dyn CommandList) {
        self.core.start(cmd);
        self.core.update_draw_objects(ctx, StreamPolicy::StreamedOnly);
        self.core.set_up_render_state(ctx, cmd);
        self.core.draw(ctx, cmd);
        cmd.end_pass();
    }
}

// ============================================================================
// Shared pass body
// ============================================================================

/// Which vertex sources a pass variant accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamPolicy {
    StreamedOnly,
    ResidentOnly,
    Either,
}

/// One object's materialized bindings for the current frame.
#[derive(Debug)]
pub struct ObjectBinding {
    pub args: Vec<RootArg>,
    pub vertex_buffer: BufferKey,
    pub vertex_offset: u64,
    pub vertex_count: u32,
}

/// State shared by all pass variants.
#[derive(Debug)]
pub struct PassCore {
    pub params: PassParameters,
    /// Rebuilt each frame by `update_draw_objects`.
    frame_objects: Vec<ObjectBinding>,
}

impl PassCore {
    #[must_use]
    pub fn new(params: PassParameters) -> Self {
        Self {
            params,
            frame_objects: Vec::new(),
        }
    }

    /// Materialized object bindings of the last executed frame.
    #[must_use]
    pub fn frame_objects(&self) -> &[ObjectBinding] {
        &self.frame_objects
    }

    fn start(&self, cmd: &mut dyn CommandList) {
        cmd.begin_pass(
            self.params.color_target.hash(),
            self.params.depth_target.hash(),
            &self.params.name,
        );
    }

    fn update_draw_objects(&mut self, ctx: &mut JobContext<'_>, policy: StreamPolicy) {
        self.frame_objects.clear();
        let objects = ctx.draw_lists.input(self.params.input);
        self.frame_objects.reserve(objects.len());

        let global_templates = &ctx.obj_global_res_template[self.params.input.index()];

        for object in objects {
            let vertex = match (&object.vertices, policy) {
                (VertexSource::Streamed(bytes), StreamPolicy::StreamedOnly | StreamPolicy::Either) => {
                    let lease = ctx.memory.alloc_vertices(ctx.registry, bytes, &self.params.name);
                    Some((lease.buffer, lease.offset))
                }
                (VertexSource::Resident(key), StreamPolicy::ResidentOnly | StreamPolicy::Either) => {
                    Some((*key, 0))
                }
                _ => {
                    log::warn!(
                        "pass '{}': draw object with unsupported vertex source, skipped",
                        self.params.name
                    );
                    None
                }
            };
            let Some((vertex_buffer, vertex_offset)) = vertex else {
                continue;
            };

            let mut args = Vec::with_capacity(
                self.params.per_object_local_template.len()
                    + self.params.per_object_global_indices_template.len(),
            );
            for template in &self.params.per_object_local_template {
                args.push(materialize_object_arg(template, object, ctx, &self.params.name));
            }
            for &index in &self.params.per_object_global_indices_template {
                args.push(materialize_object_arg(
                    &global_templates[index],
                    object,
                    ctx,
                    &self.params.name,
                ));
            }

            self.frame_objects.push(ObjectBinding {
                args,
                vertex_buffer,
                vertex_offset,
                vertex_count: object.vertex_count,
            });
        }
    }

    fn set_up_render_state(&self, ctx: &JobContext<'_>, cmd: &mut dyn CommandList) {
        cmd.set_pipeline(self.params.pipeline);
        cmd.set_root_signature(self.params.root_signature);
        cmd.set_topology(self.params.topology);
        cmd.set_viewport(self.params.viewport);
        cmd.set_scissor(0, 0, ctx.draw_area.0, ctx.draw_area.1);

        for arg in &self.params.pass_local {
            bind_arg(arg, ctx.registry, cmd, &self.params.name);
        }
        for &index in &self.params.pass_global_indices {
            bind_arg(&ctx.passes_global_res[index], ctx.registry, cmd, &self.params.name);
        }
    }

    fn draw(&self, ctx: &JobContext<'_>, cmd: &mut dyn CommandList) {
        let stride = self.params.input_layout.slot_stride(0);
        for object in &self.frame_objects {
            for arg in &object.args {
                bind_arg(arg, ctx.registry, cmd, &self.params.name);
            }
            let size = u64::from(stride) * u64::from(object.vertex_count);
            cmd.set_vertex_buffer(0, object.vertex_buffer, stride, size);
            cmd.draw(object.vertex_count, 0);
        }
    }
}

/// Clones a per-object template argument and fills it from the object's
/// streamed const data and the central descriptor lookup.
fn materialize_object_arg(
    template: &RootArg,
    object: &DrawObject,
    ctx: &mut JobContext<'_>,
    pass_name: &str,
) -> RootArg {
    let mut arg = template.clone();
    if let RootArg::ConstBufferView(cbv) = &mut arg {
        match object.const_data.get(&cbv.name.hash()) {
            Some(data) if data.len() as u32 == cbv.size => {
                let lease = ctx.memory.alloc_object_const(ctx.registry, data, pass_name);
                cbv.buffer = Some(lease.buffer);
                cbv.buffer_offset = lease.offset;
            }
            Some(data) => {
                log::warn!(
                    "pass '{pass_name}': object data for '{}' is {} bytes, expected {}",
                    cbv.name,
                    data.len(),
                    cbv.size
                );
            }
            None => {
                log::warn!(
                    "pass '{pass_name}': object supplies no data for const buffer '{}'",
                    cbv.name
                );
            }
        }
    } else {
        arg.resolve_descriptors(ctx.descriptors);
    }
    arg
}

/// Binds one root argument if it is valid; unbound arguments are skipped
/// with a warning rather than poisoning the command stream.
fn bind_arg(
    arg: &RootArg,
    registry: &BufferRegistry,
    cmd: &mut dyn CommandList,
    pass_name: &str,
) {
    match arg {
        RootArg::ConstBufferView(cbv) => match cbv.buffer {
            Some(buffer) if registry.is_live(buffer) => {
                cmd.set_root_cbv(cbv.bind_index, buffer, cbv.buffer_offset);
            }
            _ => {
                log::warn!(
                    "pass '{pass_name}': const buffer '{}' is not bound, skipping",
                    cbv.name
                );
            }
        },
        RootArg::DescTable(table) => {
            match table.entities.first().and_then(|e| e.descriptor_index) {
                Some(first_descriptor) => cmd.set_root_table(table.bind_index, first_descriptor),
                None => {
                    log::warn!(
                        "pass '{pass_name}': descriptor table at root index {} is not \
                         fully resolved, skipping",
                        table.bind_index
                    );
                }
            }
        }
    }
}
