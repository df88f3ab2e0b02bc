//! Pipeline State Types
//!
//! Plain-data descriptions of GPU pipeline state, decoupled from any
//! concrete driver. The pipeline compiler fills these in; a
//! [`RenderDevice`](super::device::RenderDevice) implementation lowers
//! them to native objects.

/// Shader stage of one compiled blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vs,
    Gs,
    Ps,
}

impl ShaderStage {
    /// Compilation profile for this stage.
    #[must_use]
    pub fn profile(self) -> &'static str {
        match self {
            ShaderStage::Vs => "vs_5_1",
            ShaderStage::Gs => "gs_5_1",
            ShaderStage::Ps => "ps_5_1",
        }
    }
}

/// Draw-time primitive topology.
///
/// Each topology token in a pass source yields both this draw-time value
/// and the coarser [`PrimitiveTopologyType`] stored in the PSO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    TriangleList,
    TriangleStrip,
}

impl PrimitiveTopology {
    /// The PSO-level topology class.
    #[must_use]
    pub fn topology_type(self) -> PrimitiveTopologyType {
        match self {
            PrimitiveTopology::PointList => PrimitiveTopologyType::Point,
            PrimitiveTopology::LineList => PrimitiveTopologyType::Line,
            PrimitiveTopology::TriangleList | PrimitiveTopology::TriangleStrip => {
                PrimitiveTopologyType::Triangle
            }
        }
    }
}

/// PSO-level topology class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopologyType {
    Point,
    Line,
    Triangle,
}

/// Blend factor for the single color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    InvSrcAlpha,
}

/// Color-target blend state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub enabled: bool,
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            src: BlendFactor::One,
            dst: BlendFactor::Zero,
        }
    }
}

/// Texel / vertex-element format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    R32Float,
    Rg32Float,
    Rgb32Float,
    Rgba32Float,
    R32Sint,
    Rg32Sint,
    Rgba32Sint,
    Rgba8Unorm,
    D24UnormS8Uint,
}

/// Viewport in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One element of a vertex input layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputElement {
    /// Shader semantic the element binds to.
    pub semantic: String,
    pub format: Format,
    /// Input slot (vertex buffer index).
    pub slot: u32,
    /// Byte offset inside the slot, accumulated in declaration order.
    pub byte_offset: u32,
}

/// Vertex input layout of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InputLayout {
    pub elements: Vec<InputElement>,
}

impl InputLayout {
    /// Total stride of one slot in bytes.
    #[must_use]
    pub fn slot_stride(&self, slot: u32) -> u32 {
        self.elements
            .iter()
            .filter(|e| e.slot == slot)
            .map(|e| e.byte_offset + format_byte_size(e.format))
            .max()
            .unwrap_or(0)
    }
}

/// Byte size of one element of `format`.
#[must_use]
pub fn format_byte_size(format: Format) -> u32 {
    match format {
        Format::R32Float | Format::R32Sint | Format::Rgba8Unorm | Format::D24UnormS8Uint => 4,
        Format::Rg32Float | Format::Rg32Sint => 8,
        Format::Rgb32Float => 12,
        Format::Rgba32Float | Format::Rgba32Sint => 16,
    }
}

/// A compiled shader blob.
///
/// The blob embeds the serialized root signature the shader was compiled
/// against; [`RenderDevice::create_root_signature`] consumes it.
///
/// [`RenderDevice::create_root_signature`]: super::device::RenderDevice::create_root_signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBlob {
    pub stage: ShaderStage,
    pub bytes: Vec<u8>,
}

/// Opaque root-signature object id handed out by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootSignatureId(pub u32);

/// Opaque pipeline-state object id handed out by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(pub u32);

/// Full description of a graphics pipeline, assembled by the pipeline
/// compiler from the pass source and its compiled shaders.
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    pub root_signature: RootSignatureId,
    pub vs: ShaderBlob,
    pub gs: Option<ShaderBlob>,
    pub ps: Option<ShaderBlob>,
    pub input_layout: InputLayout,
    pub topology_type: PrimitiveTopologyType,
    pub color_format: Format,
    pub depth_format: Format,
    pub blend: BlendState,
    pub depth_write: bool,
    pub viewport: Viewport,
}
