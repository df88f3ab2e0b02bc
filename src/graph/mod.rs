//! Frame Graph
//!
//! The compiled frame graph: an ordered sequence of typed passes plus the
//! two central argument tables global arguments were deduplicated into,
//! `passes_global_res` (Global PerPass, flat) and `obj_global_res_template`
//! (Global PerObject, one pool per input type). Passes reference both by
//! index only.

pub mod builder;
pub mod frame;
pub mod passes;
pub mod pipeline;
pub mod resources;
pub mod rootsig;
pub mod watcher;

use rustc_hash::FxHashMap;

use crate::rhi::device::CommandList;
use crate::rhi::registry::{BufferKey, BufferRegistry};

pub use builder::FrameGraphBuilder;
pub use frame::{BufferLease, FrameMemory};
pub use passes::{
    DrawObject, FrameDrawLists, JobContext, PassInput, PassParameters, ScenePass, VertexSource,
};
pub use resources::{BindFrequency, ResourceScope};
pub use rootsig::RootArg;
pub use watcher::FrameGraphWatcher;

/// Interface consumed from the enclosing renderer.
pub trait RendererHost {
    /// Blocks until every in-flight frame's fence has completed.
    fn flush_all_frames(&mut self);

    /// Current draw-area size in pixels.
    fn draw_area_size(&self) -> (u32, u32);
}

/// A built frame graph.
#[derive(Debug)]
pub struct FrameGraph {
    /// Passes in execution order.
    pub(crate) passes: Vec<ScenePass>,
    /// Flat pool of Global PerPass arguments.
    pub passes_global_res: Vec<RootArg>,
    /// Per-input-type pools of Global PerObject argument templates.
    pub obj_global_res_template: [Vec<RootArg>; PassInput::COUNT],
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            passes_global_res: Vec::new(),
            obj_global_res_template: std::array::from_fn(|_| Vec::new()),
        }
    }

    #[must_use]
    pub fn passes(&self) -> &[ScenePass] {
        &self.passes
    }

    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Binds a buffer to the Global PerPass const-buffer argument named
    /// `name_hash`. Returns whether an argument was found.
    pub fn bind_pass_global_cbv(&mut self, name_hash: u32, buffer: BufferKey, offset: u64) -> bool {
        for arg in &mut self.passes_global_res {
            if let RootArg::ConstBufferView(cbv) = arg {
                if cbv.name.hash() == name_hash {
                    cbv.buffer = Some(buffer);
                    cbv.buffer_offset = offset;
                    return true;
                }
            }
        }
        false
    }

    /// Binds a buffer to the Local PerPass const-buffer argument named
    /// `name_hash` of the pass at `pass_index`. Returns whether an
    /// argument was found.
    pub fn bind_pass_local_cbv(
        &mut self,
        pass_index: usize,
        name_hash: u32,
        buffer: BufferKey,
        offset: u64,
    ) -> bool {
        let Some(pass) = self.passes.get_mut(pass_index) else {
            return false;
        };
        for arg in &mut pass.core_mut().params.pass_local {
            if let RootArg::ConstBufferView(cbv) = arg {
                if cbv.name.hash() == name_hash {
                    cbv.buffer = Some(buffer);
                    cbv.buffer_offset = offset;
                    return true;
                }
            }
        }
        false
    }

    /// Resolves every pass-frequency descriptor table (the pass-local
    /// and pass-global pools) against the central descriptor lookup.
    /// Per-object tables resolve per draw object during
    /// `update_draw_objects` instead.
    pub fn resolve_pass_descriptors(&mut self, descriptors: &FxHashMap<u32, u32>) {
        for arg in &mut self.passes_global_res {
            arg.resolve_descriptors(descriptors);
        }
        for pass in &mut self.passes {
            for arg in &mut pass.core_mut().params.pass_local {
                arg.resolve_descriptors(descriptors);
            }
        }
    }

    /// Executes every pass in frame-graph order, recording into `cmd`.
    pub fn execute_frame(
        &mut self,
        registry: &mut BufferRegistry,
        memory: &mut FrameMemory,
        draw_lists: &FrameDrawLists,
        descriptors: &FxHashMap<u32, u32>,
        draw_area: (u32, u32),
        cmd: &mut dyn CommandList,
    ) {
        self.resolve_pass_descriptors(descriptors);

        let Self {
            passes,
            passes_global_res,
            obj_global_res_template,
        } = self;

        for pass in passes {
            let mut ctx = JobContext {
                registry: &mut *registry,
                memory: &mut *memory,
                draw_lists,
                passes_global_res: &*passes_global_res,
                obj_global_res_template: &*obj_global_res_template,
                descriptors,
                draw_area,
            };
            pass.execute(&mut ctx, cmd);
        }
    }

    /// Structural equality: pass order, argument indices and templates,
    /// global pools. Device object ids are excluded because two builds of
    /// the same sources hand out fresh ids for identical structure.
    #[must_use]
    pub fn structure_eq(&self, other: &FrameGraph) -> bool {
        self.passes.len() == other.passes.len()
            && self.passes_global_res == other.passes_global_res
            && self.obj_global_res_template == other.obj_global_res_template
            && self.passes.iter().zip(&other.passes).all(|(a, b)| {
                let (a, b) = (&a.core().params, &b.core().params);
                a.name == b.name
                    && a.input == b.input
                    && a.topology == b.topology
                    && a.viewport == b.viewport
                    && a.color_target == b.color_target
                    && a.depth_target == b.depth_target
                    && a.input_layout == b.input_layout
                    && a.pass_local == b.pass_local
                    && a.per_object_local_template == b.per_object_local_template
                    && a.pass_global_indices == b.pass_global_indices
                    && a.per_object_global_indices_template
                        == b.per_object_global_indices_template
            })
    }
}
