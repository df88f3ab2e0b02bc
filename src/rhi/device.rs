//! Device Abstraction
//!
//! Traits for the two driver objects the core talks to: the device
//! (object creation and shader compilation) and a command list (per-frame
//! recording). Both are implemented by the native backend outside this
//! crate and by [`NullDevice`](super::null::NullDevice) for headless use.

use super::registry::BufferKey;
use super::types::{
    GraphicsPipelineDesc, PipelineId, PrimitiveTopology, RootSignatureId, ShaderBlob, ShaderStage,
    Viewport,
};

/// Object creation and shader compilation.
///
/// Error strings carry the driver / compiler diagnostics verbatim; callers
/// wrap them into the crate error type with pass context attached.
pub trait RenderDevice {
    /// Compiles `source` for `stage` with the stage's `_5_1` profile.
    fn compile_shader(
        &self,
        stage: ShaderStage,
        source: &str,
        debug_name: &str,
    ) -> std::result::Result<ShaderBlob, String>;

    /// Creates a root signature from the serialized form embedded in a
    /// compiled shader blob.
    fn create_root_signature(
        &self,
        blob: &ShaderBlob,
        debug_name: &str,
    ) -> std::result::Result<RootSignatureId, String>;

    /// Creates a graphics pipeline state object.
    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        debug_name: &str,
    ) -> std::result::Result<PipelineId, String>;
}

/// Per-frame command recording.
///
/// The pass runtime records through this trait in a fixed shape: `begin_pass`,
/// state setup, per-object root-argument binds, draws, `end_pass`.
pub trait CommandList {
    /// Acquires the pass's targets (identified by name hash) and performs
    /// any required transitions.
    fn begin_pass(&mut self, color_target: u32, depth_target: u32, debug_name: &str);

    fn set_pipeline(&mut self, pipeline: PipelineId);

    fn set_root_signature(&mut self, root_signature: RootSignatureId);

    fn set_topology(&mut self, topology: PrimitiveTopology);

    fn set_viewport(&mut self, viewport: Viewport);

    fn set_scissor(&mut self, x: u32, y: u32, width: u32, height: u32);

    /// Binds an inline CBV root argument.
    fn set_root_cbv(&mut self, bind_index: u32, buffer: BufferKey, offset: u64);

    /// Binds a descriptor-table root argument by its first heap index.
    fn set_root_table(&mut self, bind_index: u32, first_descriptor: u32);

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferKey, stride: u32, size: u64);

    fn draw(&mut self, vertex_count: u32, first_vertex: u32);

    fn end_pass(&mut self);
}
