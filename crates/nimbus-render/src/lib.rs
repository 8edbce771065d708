//! wgpu plumbing for Nimbus: headless device setup, render targets and the
//! allocation seam, fullscreen pass helpers, shader assembly, and the
//! per-frame pass graph.

pub mod binding;
pub mod depth;
pub mod fullscreen;
pub mod gpu;
pub mod graph;
pub mod shader;
pub mod target;

pub use binding::{
    create_linear_sampler, depth_texture_entry, sampler_entry, texture_entry, uniform_entry,
};
pub use depth::DepthBuffer;
pub use fullscreen::{
    FULLSCREEN_VS_WGSL, FullscreenAttachment, FullscreenPipelineDesc,
    PREMULTIPLIED_TRANSMITTANCE_BLEND, PixelRect, create_fullscreen_pipeline, opaque_target,
    run_fullscreen_pass,
};
pub use gpu::{GpuCapabilities, GpuContext, GpuContextError, init_gpu_context_blocking};
pub use graph::{
    ExecutedPass, FrameGraph, GraphError, PassBuilder, PassHandle, QueueHint, ResourceHandle,
};
pub use shader::{ShaderLibrary, compose_wgsl};
pub use target::{DeviceAllocator, RenderTarget, TargetAllocator, TargetDesc, div_round_up};
