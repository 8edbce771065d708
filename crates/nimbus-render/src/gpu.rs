//! Headless GPU device initialization.
//!
//! Provides [`GpuContext`] which owns the wgpu instance, adapter, device and
//! queue, plus [`GpuCapabilities`] describing the optional features the cloud
//! passes can take advantage of.

/// Error type for GPU context initialization failures.
#[derive(Debug, thiserror::Error)]
pub enum GpuContextError {
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device.
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
}

/// Optional device capabilities relevant to pass scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpuCapabilities {
    /// A queue separate from the main queue accepts compute work.
    pub async_compute_queue: bool,
    /// Fragment and compute shaders may write storage textures.
    pub storage_textures: bool,
}

impl GpuCapabilities {
    /// Derive capabilities from an adapter's downlevel flags.
    ///
    /// wgpu exposes a single queue per device, so `async_compute_queue` is
    /// always false.
    pub fn from_adapter(adapter: &wgpu::Adapter) -> Self {
        Self::from_downlevel(adapter.get_downlevel_capabilities().flags)
    }

    fn from_downlevel(flags: wgpu::DownlevelFlags) -> Self {
        Self {
            async_compute_queue: false,
            storage_textures: flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
                && flags.contains(wgpu::DownlevelFlags::FRAGMENT_WRITABLE_STORAGE),
        }
    }
}

/// Owns all GPU state for offscreen rendering.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub capabilities: GpuCapabilities,
}

impl GpuContext {
    /// Initialize the GPU asynchronously without a presentation surface.
    pub async fn new() -> Result<Self, GpuContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(_) => return Err(GpuContextError::NoAdapter),
        };

        let info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("nimbus-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let capabilities = GpuCapabilities::from_adapter(&adapter);
        log::debug!("GPU capabilities: {capabilities:?}");

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            capabilities,
        })
    }
}

/// Initialize the GPU synchronously using `pollster`.
pub fn init_gpu_context_blocking() -> Result<GpuContext, GpuContextError> {
    pollster::block_on(GpuContext::new())
}
