//! Offscreen scene the demo composites clouds over.

use glam::{Mat4, UVec2, Vec3};
use nimbus_render::{DepthBuffer, RenderTarget, TargetDesc};

/// HDR format of the scene color target.
pub const SCENE_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

const SKY_COLOR: wgpu::Color = wgpu::Color {
    r: 0.32,
    g: 0.52,
    b: 0.86,
    a: 1.0,
};

/// Scene color and depth with nothing rendered but the sky.
pub struct OffscreenScene {
    pub color: RenderTarget,
    pub depth: DepthBuffer,
    pub size: UVec2,
}

impl OffscreenScene {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let color = RenderTarget::new(
            device,
            &TargetDesc::new("scene-color", width, height, SCENE_COLOR_FORMAT).with_usage(
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            ),
        );
        let depth = DepthBuffer::new(device, width, height);
        Self {
            color,
            depth,
            size: UVec2::new(width, height),
        }
    }

    /// Record the sky clear and the far-plane depth clear.
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder) {
        drop(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene-color-clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.color.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(SKY_COLOR),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        }));
        self.depth.clear(encoder);
    }
}

/// Camera flying a slow circle above the ground, in meters.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub radius: f32,
    pub altitude: f32,
    /// Radians per frame.
    pub speed: f32,
    pub fov_y: f32,
    angle: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            radius: 2_000.0,
            altitude: 1_200.0,
            speed: 0.01,
            fov_y: 60f32.to_radians(),
            angle: 0.0,
        }
    }
}

impl OrbitCamera {
    pub fn advance(&mut self) {
        self.angle += self.speed;
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(
            self.radius * self.angle.cos(),
            self.altitude,
            self.radius * self.angle.sin(),
        )
    }

    /// Looks along the orbit tangent, pitched up toward the cloud layer.
    pub fn forward(&self) -> Vec3 {
        Vec3::new(-self.angle.sin(), 0.35, self.angle.cos()).normalize()
    }

    /// Reverse-Z, infinite far plane.
    pub fn view_proj(&self, size: UVec2) -> Mat4 {
        let aspect = size.x.max(1) as f32 / size.y.max(1) as f32;
        let projection = Mat4::perspective_infinite_reverse_rh(self.fov_y, aspect, 0.5);
        let view = Mat4::look_to_rh(self.position(), self.forward(), Vec3::Y);
        projection * view
    }
}

/// Sun travel direction, slowly sweeping in azimuth.
pub fn sun_direction(frame: u64) -> Vec3 {
    let azimuth = 0.6 + frame as f32 * 0.002;
    Vec3::new(azimuth.cos() * 0.5, -0.8, azimuth.sin() * 0.5).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_stays_at_altitude() {
        let mut camera = OrbitCamera::default();
        for _ in 0..10 {
            camera.advance();
            assert_eq!(camera.position().y, 1_200.0);
            let position = camera.position();
            let horizontal = glam::Vec2::new(position.x, position.z).length();
            assert!((horizontal - 2_000.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_camera_projects_forward_point() {
        let camera = OrbitCamera::default();
        let size = UVec2::new(1280, 720);
        let target = camera.position() + camera.forward() * 100.0;
        let clip = camera.view_proj(size) * target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4);
        assert!(ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_sun_points_down() {
        for frame in [0, 100, 10_000] {
            let direction = sun_direction(frame);
            assert!(direction.y < 0.0);
            assert!((direction.length() - 1.0).abs() < 1e-5);
        }
    }
}
