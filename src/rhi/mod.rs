//! Render Hardware Interface
//!
//! The native 3D-API driver (device, queues, swap chain, command lists,
//! descriptor heaps) is an external collaborator. This module defines the
//! interface the core consumes from it: shader compilation, root-signature
//! and pipeline creation, command recording, and a central buffer registry
//! that owns GPU buffer handles on the driver's behalf.
//!
//! [`null::NullDevice`] is a headless implementation used by the test
//! suite and for running the frame path without a GPU.

pub mod device;
pub mod null;
pub mod registry;
pub mod types;

pub use device::{CommandList, RenderDevice};
pub use null::{NullDevice, RecordedCommand, RecordingCommandList};
pub use registry::{BufferKey, BufferRegistry};
pub use types::{
    BlendFactor, BlendState, Format, GraphicsPipelineDesc, InputElement, InputLayout, PipelineId,
    PrimitiveTopology, PrimitiveTopologyType, RootSignatureId, ShaderBlob, ShaderStage, Viewport,
};
