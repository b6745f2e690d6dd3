//! Real-time shadow rendering engine with runtime-selectable
//! filtering techniques.
//!
//! The crate owns the GPU side of shadow rendering: resource
//! lifecycle, one lit pipeline per technique (hard mapping, PCF,
//! PCSS, VSM), per-frame multi-pass orchestration, and the
//! visibility algorithms. Windowing, input, and asset loading stay
//! with the host, which hands in a configured `wgpu::Device`, a color
//! target, per-frame matrices, and a validated [`ShadowParams`].
//!
//! A frame runs shadow capture, an optional separable blur for VSM,
//! then the lit pass, all inside one submission so each pass reads
//! the previous pass's output without explicit fences. Technique,
//! sampling parameters, and map resolution can change between any two
//! frames without restarting the loop.

pub mod error;
pub mod gpu;
pub mod mesh;
pub mod shadows;
pub mod stats;

pub use error::{RenderError, RenderResult};
pub use mesh::{Material, Mesh, MeshDraw, Vertex};
pub use shadows::{
    BlurMode, FrameInputs, FrameReport, FrameState, ShadowParams, ShadowRenderer, ShadowTechnique,
};
pub use stats::FrameTimings;
