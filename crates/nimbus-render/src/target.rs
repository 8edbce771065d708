//! Offscreen render targets and the allocation seam used by persistent
//! per-view state.
//!
//! Persistent state objects never call `device.create_texture` directly; they
//! go through a [`TargetAllocator`] so the number of allocations can be
//! observed and the state machines can be exercised without a GPU.

/// Description of a 2D render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
    pub sample_count: u32,
}

impl TargetDesc {
    /// Usage for targets written by a render pass and sampled later.
    pub const ATTACHMENT_SAMPLED: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
        .union(wgpu::TextureUsages::TEXTURE_BINDING);

    /// Single-sampled, render-and-sample target with the given format.
    pub fn new(label: &'static str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            label,
            width: width.max(1),
            height: height.max(1),
            format,
            usage: Self::ATTACHMENT_SAMPLED,
            sample_count: 1,
        }
    }

    /// Add extra usage flags.
    pub fn with_usage(mut self, usage: wgpu::TextureUsages) -> Self {
        self.usage |= usage;
        self
    }

    /// `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether a compute or fragment shader may write this target as storage.
    pub fn supports_storage_writes(&self) -> bool {
        self.usage.contains(wgpu::TextureUsages::STORAGE_BINDING)
    }
}

/// A GPU texture with its default view.
#[derive(Debug)]
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub desc: TargetDesc,
}

impl RenderTarget {
    /// Create a target directly on the device.
    pub fn new(device: &wgpu::Device, desc: &TargetDesc) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: desc.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            desc: *desc,
        }
    }

    /// `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        self.desc.size()
    }
}

/// Creates render targets on behalf of persistent state objects.
pub trait TargetAllocator {
    /// Handle to an allocated target.
    type Target;

    /// Allocate a new target matching `desc`.
    fn allocate(&mut self, desc: &TargetDesc) -> Self::Target;
}

/// [`TargetAllocator`] backed by a wgpu device.
pub struct DeviceAllocator<'d> {
    device: &'d wgpu::Device,
    allocations: usize,
}

impl<'d> DeviceAllocator<'d> {
    pub fn new(device: &'d wgpu::Device) -> Self {
        Self {
            device,
            allocations: 0,
        }
    }

    /// Number of textures created through this allocator.
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}

impl TargetAllocator for DeviceAllocator<'_> {
    type Target = RenderTarget;

    fn allocate(&mut self, desc: &TargetDesc) -> RenderTarget {
        self.allocations += 1;
        log::debug!(
            "Allocating target '{}' {}x{} {:?}",
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );
        RenderTarget::new(self.device, desc)
    }
}

/// Divide rounding up; the divisor is clamped to at least 1.
pub fn div_round_up(value: u32, divisor: u32) -> u32 {
    value.div_ceil(divisor.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_device() -> Option<wgpu::Device> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .ok()?;
            let (device, _queue) = adapter
                .request_device(&wgpu::DeviceDescriptor::default())
                .await
                .ok()?;
            Some(device)
        })
    }

    #[test]
    fn test_div_round_up() {
        assert_eq!(div_round_up(1920, 4), 480);
        assert_eq!(div_round_up(1081, 2), 541);
        assert_eq!(div_round_up(1, 4), 1);
        assert_eq!(div_round_up(0, 4), 0);
        assert_eq!(div_round_up(7, 0), 7);
    }

    #[test]
    fn test_desc_clamps_zero_size() {
        let desc = TargetDesc::new("t", 0, 0, wgpu::TextureFormat::Rgba16Float);
        assert_eq!(desc.size(), (1, 1));
    }

    #[test]
    fn test_desc_default_usage_and_storage() {
        let desc = TargetDesc::new("t", 8, 8, wgpu::TextureFormat::Rgba16Float);
        assert!(desc.usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(desc.usage.contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(!desc.supports_storage_writes());
        let storage = desc.with_usage(wgpu::TextureUsages::STORAGE_BINDING);
        assert!(storage.supports_storage_writes());
    }

    #[test]
    fn test_device_allocator_counts() {
        let Some(device) = create_test_device() else {
            return;
        };
        let mut allocator = DeviceAllocator::new(&device);
        let desc = TargetDesc::new("t", 64, 32, wgpu::TextureFormat::Rgba16Float);
        let target = allocator.allocate(&desc);
        assert_eq!(allocator.allocations(), 1);
        assert_eq!(target.size(), (64, 32));
        assert_eq!(target.texture.format(), wgpu::TextureFormat::Rgba16Float);
    }
}
