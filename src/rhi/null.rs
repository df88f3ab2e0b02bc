//! Headless Null Backend
//!
//! Implements [`RenderDevice`] and [`CommandList`] without touching a GPU.
//! Every created object and recorded command is kept so tests (and
//! headless tools) can inspect exactly what the frame path produced.
//!
//! Shader "compilation" validates that the source is non-empty and does
//! not contain an `#error` directive, then returns the source bytes as
//! the blob. That is enough to exercise the whole pipeline-compiler path,
//! including its failure branches.

use parking_lot::Mutex;

use super::device::{CommandList, RenderDevice};
use super::registry::BufferKey;
use super::types::{
    GraphicsPipelineDesc, PipelineId, PrimitiveTopology, RootSignatureId, ShaderBlob, ShaderStage,
    Viewport,
};

/// Record of one shader compilation performed through the null device.
#[derive(Debug, Clone)]
pub struct CompiledShaderRecord {
    pub stage: ShaderStage,
    pub source: String,
    pub debug_name: String,
}

/// Headless device. Thread-safe; object ids are handed out sequentially.
#[derive(Default)]
pub struct NullDevice {
    inner: Mutex<NullDeviceState>,
}

#[derive(Default)]
struct NullDeviceState {
    shaders: Vec<CompiledShaderRecord>,
    root_signatures: Vec<String>,
    pipelines: Vec<(GraphicsPipelineDesc, String)>,
}

impl NullDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All shader compilations, in order.
    #[must_use]
    pub fn compiled_shaders(&self) -> Vec<CompiledShaderRecord> {
        self.inner.lock().shaders.clone()
    }

    /// Debug names of created root signatures, in creation order.
    #[must_use]
    pub fn root_signature_names(&self) -> Vec<String> {
        self.inner.lock().root_signatures.clone()
    }

    /// Created pipelines with their debug names, in creation order.
    #[must_use]
    pub fn pipelines(&self) -> Vec<(GraphicsPipelineDesc, String)> {
        self.inner.lock().pipelines.clone()
    }
}

impl RenderDevice for NullDevice {
    fn compile_shader(
        &self,
        stage: ShaderStage,
        source: &str,
        debug_name: &str,
    ) -> std::result::Result<ShaderBlob, String> {
        if source.trim().is_empty() {
            return Err(format!("{}: empty shader source", stage.profile()));
        }
        if let Some(pos) = source.find("#error") {
            let message: String = source[pos..].lines().next().unwrap_or("#error").to_string();
            return Err(format!("{}: {message}", stage.profile()));
        }
        let mut state = self.inner.lock();
        state.shaders.push(CompiledShaderRecord {
            stage,
            source: source.to_string(),
            debug_name: debug_name.to_string(),
        });
        Ok(ShaderBlob {
            stage,
            bytes: source.as_bytes().to_vec(),
        })
    }

    fn create_root_signature(
        &self,
        blob: &ShaderBlob,
        debug_name: &str,
    ) -> std::result::Result<RootSignatureId, String> {
        if blob.bytes.is_empty() {
            return Err("empty shader blob has no embedded root signature".to_string());
        }
        let mut state = self.inner.lock();
        state.root_signatures.push(debug_name.to_string());
        Ok(RootSignatureId(state.root_signatures.len() as u32 - 1))
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        debug_name: &str,
    ) -> std::result::Result<PipelineId, String> {
        if desc.vs.bytes.is_empty() {
            return Err("pipeline without a vertex shader".to_string());
        }
        let mut state = self.inner.lock();
        state.pipelines.push((desc.clone(), debug_name.to_string()));
        Ok(PipelineId(state.pipelines.len() as u32 - 1))
    }
}

// ============================================================================
// Recording Command List
// ============================================================================

/// One recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginPass {
        color_target: u32,
        depth_target: u32,
        debug_name: String,
    },
    SetPipeline(PipelineId),
    SetRootSignature(RootSignatureId),
    SetTopology(PrimitiveTopology),
    SetViewport(Viewport),
    SetScissor {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    SetRootCbv {
        bind_index: u32,
        buffer: BufferKey,
        offset: u64,
    },
    SetRootTable {
        bind_index: u32,
        first_descriptor: u32,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: BufferKey,
        stride: u32,
        size: u64,
    },
    Draw {
        vertex_count: u32,
        first_vertex: u32,
    },
    EndPass,
}

/// Command list that stores every call for later inspection.
#[derive(Default)]
pub struct RecordingCommandList {
    pub commands: Vec<RecordedCommand>,
}

impl RecordingCommandList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandList for RecordingCommandList {
    fn begin_pass(&mut self, color_target: u32, depth_target: u32, debug_name: &str) {
        self.commands.push(RecordedCommand::BeginPass {
            color_target,
            depth_target,
            debug_name: debug_name.to_string(),
        });
    }

    fn set_pipeline(&mut self, pipeline: PipelineId) {
        self.commands.push(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_root_signature(&mut self, root_signature: RootSignatureId) {
        self.commands
            .push(RecordedCommand::SetRootSignature(root_signature));
    }

    fn set_topology(&mut self, topology: PrimitiveTopology) {
        self.commands.push(RecordedCommand::SetTopology(topology));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(RecordedCommand::SetViewport(viewport));
    }

    fn set_scissor(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.commands.push(RecordedCommand::SetScissor {
            x,
            y,
            width,
            height,
        });
    }

    fn set_root_cbv(&mut self, bind_index: u32, buffer: BufferKey, offset: u64) {
        self.commands.push(RecordedCommand::SetRootCbv {
            bind_index,
            buffer,
            offset,
        });
    }

    fn set_root_table(&mut self, bind_index: u32, first_descriptor: u32) {
        self.commands.push(RecordedCommand::SetRootTable {
            bind_index,
            first_descriptor,
        });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferKey, stride: u32, size: u64) {
        self.commands.push(RecordedCommand::SetVertexBuffer {
            slot,
            buffer,
            stride,
            size,
        });
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) {
        self.commands.push(RecordedCommand::Draw {
            vertex_count,
            first_vertex,
        });
    }

    fn end_pass(&mut self) {
        self.commands.push(RecordedCommand::EndPass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_rejects_error_directive() {
        let device = NullDevice::new();
        let err = device
            .compile_shader(ShaderStage::Ps, "#error broken\n", "test")
            .unwrap_err();
        assert!(err.contains("#error broken"));
    }

    #[test]
    fn object_ids_are_sequential() {
        let device = NullDevice::new();
        let blob = device
            .compile_shader(ShaderStage::Vs, "float4 main() : SV_Position { return 0; }", "a")
            .unwrap();
        let rs0 = device.create_root_signature(&blob, "a").unwrap();
        let rs1 = device.create_root_signature(&blob, "b").unwrap();
        assert_eq!(rs0, RootSignatureId(0));
        assert_eq!(rs1, RootSignatureId(1));
    }
}
