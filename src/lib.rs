//! Cinder: data-driven renderer core and diffuse-indirect light baker.
//!
//! Two tightly coupled subsystems:
//!
//! - the **frame-graph compiler & runtime**: PEG-grammar-driven pass
//!   sources are parsed, validated, compiled into shader blobs, root
//!   signatures, input layouts and PSOs, and assembled into an ordered
//!   sequence of typed passes that per-frame execution binds and draws;
//! - the **light baker**: an offline Monte-Carlo path tracer emitting
//!   diffuse-indirect irradiance probes as order-3 spherical-harmonic
//!   coefficients, per PVS cluster or for the camera's cluster only,
//!   with a textual baked-data format.
//!
//! The native 3D API, the BSP loader and the outer renderer shell are
//! external collaborators, consumed through the traits in [`rhi`],
//! [`baker::scene`] and [`graph`].

pub mod baker;
pub mod config;
pub mod errors;
pub mod frontend;
pub mod graph;
pub mod rhi;
pub mod utils;

pub use baker::{
    BakerSettings, BakingData, BakingMode, DiffuseProbe, LightBaker, LightSamplingFlags,
};
pub use config::RendererConfig;
pub use errors::{CinderError, Result};
pub use graph::{
    FrameDrawLists, FrameGraph, FrameGraphBuilder, FrameGraphWatcher, FrameMemory, JobContext,
    PassInput, RendererHost, RootArg, ScenePass,
};
pub use rhi::{BufferRegistry, CommandList, NullDevice, RecordingCommandList, RenderDevice};
pub use utils::hashing::name_hash;
