//! GPU helpers shared by the pass tests: device setup, texture upload and
//! readback.

use half::f16;
use nimbus_render::{RenderTarget, TargetDesc};

pub(crate) fn create_test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .ok()?;
        adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .ok()
    })
}

/// A render-and-sample target that can also be uploaded to and read back.
pub(crate) fn test_target(
    device: &wgpu::Device,
    label: &'static str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> RenderTarget {
    RenderTarget::new(
        device,
        &TargetDesc::new(label, width, height, format)
            .with_usage(wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST),
    )
}

/// (channels, bytes per channel) of the formats the cloud passes use.
fn channel_layout(format: wgpu::TextureFormat) -> (usize, usize) {
    match format {
        wgpu::TextureFormat::Rgba16Float => (4, 2),
        wgpu::TextureFormat::Rg16Float => (2, 2),
        wgpu::TextureFormat::R32Float => (1, 4),
        other => panic!("no test layout for {other:?}"),
    }
}

fn encode(format: wgpu::TextureFormat, values: &[f32]) -> Vec<u8> {
    match channel_layout(format).1 {
        2 => values
            .iter()
            .flat_map(|&v| f16::from_f32(v).to_le_bytes())
            .collect(),
        _ => values.iter().flat_map(|&v| v.to_le_bytes()).collect(),
    }
}

fn decode(format: wgpu::TextureFormat, bytes: &[u8]) -> Vec<f32> {
    match channel_layout(format).1 {
        2 => bytes
            .chunks_exact(2)
            .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect(),
        _ => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

/// Upload row-major channel values, `width * height * channels` of them.
pub(crate) fn upload(queue: &wgpu::Queue, target: &RenderTarget, values: &[f32]) {
    let (width, height) = target.size();
    let (channels, channel_bytes) = channel_layout(target.desc.format);
    assert_eq!(values.len(), (width * height) as usize * channels);
    queue.write_texture(
        target.texture.as_image_copy(),
        &encode(target.desc.format, values),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * (channels * channel_bytes) as u32),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

/// Fill every texel with the same channel values.
pub(crate) fn fill(queue: &wgpu::Queue, target: &RenderTarget, texel: &[f32]) {
    let (width, height) = target.size();
    let values: Vec<f32> = (0..width * height)
        .flat_map(|_| texel.iter().copied())
        .collect();
    upload(queue, target, &values);
}

/// Copy the target back to the CPU as row-major channel values.
pub(crate) fn read_back(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    target: &RenderTarget,
) -> Vec<f32> {
    let (width, height) = target.size();
    let (channels, channel_bytes) = channel_layout(target.desc.format);
    let unpadded = width * (channels * channel_bytes) as u32;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("test-readback"),
        size: u64::from(padded * height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&Default::default());
    encoder.copy_texture_to_buffer(
        target.texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit([encoder.finish()]);

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::PollType::Wait {
        submission_index: None,
        timeout: None,
    });
    rx.recv()
        .expect("map callback dropped")
        .expect("readback mapping failed");

    let mapped = slice.get_mapped_range();
    let values = (0..height)
        .flat_map(|row| {
            let start = (row * padded) as usize;
            decode(
                target.desc.format,
                &mapped[start..start + unpadded as usize],
            )
        })
        .collect();
    drop(mapped);
    buffer.unmap();
    values
}

/// Channel values of texel `(x, y)` in a readback of a `width`-wide target.
pub(crate) fn texel(values: &[f32], width: u32, channels: usize, x: u32, y: u32) -> &[f32] {
    let start = (y * width + x) as usize * channels;
    &values[start..start + channels]
}
