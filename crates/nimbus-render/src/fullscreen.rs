//! Fullscreen-triangle pipelines and passes.
//!
//! Every cloud pass is a single triangle covering the target, with per-pass
//! fragment entry points. Shader modules must contain [`FULLSCREEN_VS_WGSL`]
//! (or an equivalent `vs_fullscreen` entry point).

/// Vertex stage shared by all fullscreen passes.
pub const FULLSCREEN_VS_WGSL: &str = r#"
struct FullscreenOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) idx: u32) -> FullscreenOutput {
    let uv = vec2<f32>(f32((idx << 1u) & 2u), f32(idx & 2u));
    var out: FullscreenOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}
"#;

/// Additive blend used for premultiplied color over a transmittance-scaled
/// destination: `dest = src + dest * src_alpha`.
pub const PREMULTIPLIED_TRANSMITTANCE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::SrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Screen-space rectangle in target pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Clip to a target of the given size. Returns `None` if nothing remains.
    pub fn clipped_to(&self, width: u32, height: u32) -> Option<Self> {
        let x1 = (self.x.saturating_add(self.width)).min(width);
        let y1 = (self.y.saturating_add(self.height)).min(height);
        if self.x >= x1 || self.y >= y1 {
            return None;
        }
        Some(Self {
            x: self.x,
            y: self.y,
            width: x1 - self.x,
            height: y1 - self.y,
        })
    }
}

/// Description of a fullscreen render pipeline.
pub struct FullscreenPipelineDesc<'a> {
    pub label: &'a str,
    pub shader: &'a wgpu::ShaderModule,
    pub layout: &'a wgpu::PipelineLayout,
    pub fragment_entry: &'a str,
    pub targets: &'a [Option<wgpu::ColorTargetState>],
}

/// Create a fullscreen render pipeline with the given fragment entry point.
pub fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    desc: &FullscreenPipelineDesc<'_>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(desc.layout),
        vertex: wgpu::VertexState {
            module: desc.shader,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: desc.shader,
            entry_point: Some(desc.fragment_entry),
            targets: desc.targets,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}

/// Color target state without blending.
pub fn opaque_target(format: wgpu::TextureFormat) -> Option<wgpu::ColorTargetState> {
    Some(wgpu::ColorTargetState {
        format,
        blend: None,
        write_mask: wgpu::ColorWrites::ALL,
    })
}

/// One color attachment of a fullscreen pass.
pub struct FullscreenAttachment<'a> {
    pub view: &'a wgpu::TextureView,
    pub load: wgpu::LoadOp<wgpu::Color>,
}

/// Record a single fullscreen draw.
///
/// When `rect` is given the viewport and scissor are restricted to it.
pub fn run_fullscreen_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bind_groups: &[&wgpu::BindGroup],
    attachments: &[FullscreenAttachment<'_>],
    rect: Option<PixelRect>,
) {
    let color_attachments: Vec<_> = attachments
        .iter()
        .map(|attachment| {
            Some(wgpu::RenderPassColorAttachment {
                view: attachment.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: attachment.load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })
        })
        .collect();

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &color_attachments,
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });
    if let Some(rect) = rect {
        pass.set_viewport(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
            0.0,
            1.0,
        );
        pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
    }
    pass.set_pipeline(pipeline);
    for (index, bind_group) in bind_groups.iter().enumerate() {
        pass.set_bind_group(index as u32, *bind_group, &[]);
    }
    pass.draw(0..3, 0..1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_is_premultiplied_transmittance() {
        let blend = PREMULTIPLIED_TRANSMITTANCE_BLEND;
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(blend.color.operation, wgpu::BlendOperation::Add);
        // Destination alpha is preserved.
        assert_eq!(blend.alpha.src_factor, wgpu::BlendFactor::Zero);
        assert_eq!(blend.alpha.dst_factor, wgpu::BlendFactor::One);
    }

    #[test]
    fn test_fullscreen_triangle_covers_clip_space() {
        // Mirror of vs_fullscreen on the CPU.
        let corners: Vec<(f32, f32)> = (0u32..3)
            .map(|idx| {
                let u = ((idx << 1) & 2) as f32;
                let v = (idx & 2) as f32;
                (u * 2.0 - 1.0, v * 2.0 - 1.0)
            })
            .collect();
        assert_eq!(corners, vec![(-1.0, -1.0), (3.0, -1.0), (-1.0, 3.0)]);
    }

    #[test]
    fn test_rect_clipping() {
        let rect = PixelRect {
            x: 100,
            y: 50,
            width: 300,
            height: 300,
        };
        assert_eq!(
            rect.clipped_to(256, 256),
            Some(PixelRect {
                x: 100,
                y: 50,
                width: 156,
                height: 206
            })
        );
        assert_eq!(rect.clipped_to(100, 256), None);
        assert_eq!(
            PixelRect::from_size(64, 64).clipped_to(64, 64),
            Some(PixelRect::from_size(64, 64))
        );
    }

    #[test]
    fn test_vertex_source_declares_entry_point() {
        assert!(FULLSCREEN_VS_WGSL.contains("fn vs_fullscreen"));
    }
}
