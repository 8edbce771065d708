//! Shader module assembly and caching.
//!
//! Pass shaders are built from several WGSL fragments (the fullscreen vertex
//! stage, shared uniform declarations, a pluggable medium function, the pass
//! body). [`ShaderLibrary`] concatenates the fragments once and caches the
//! resulting module by name.

use std::{collections::HashMap, sync::Arc};

use log::{debug, info};
use wgpu::{ShaderModuleDescriptor, ShaderSource};

/// Concatenate WGSL fragments, each on its own line block.
pub fn compose_wgsl(parts: &[&str]) -> String {
    let mut source = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for part in parts {
        source.push_str(part);
        if !part.ends_with('\n') {
            source.push('\n');
        }
    }
    source
}

/// Registry of compiled shader modules keyed by name.
#[derive(Default)]
pub struct ShaderLibrary {
    modules: HashMap<String, Arc<wgpu::ShaderModule>>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `parts` into a module named `name`, or return the cached one.
    pub fn get_or_compile(
        &mut self,
        device: &wgpu::Device,
        name: &str,
        parts: &[&str],
    ) -> Arc<wgpu::ShaderModule> {
        if let Some(module) = self.modules.get(name) {
            return module.clone();
        }
        debug!("Compiling shader '{}' from {} fragments", name, parts.len());
        let source = compose_wgsl(parts);
        let module = Arc::new(device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(source.into()),
        }));
        self.modules.insert(name.to_string(), module.clone());
        info!("Loaded shader '{}'", name);
        module
    }

    pub fn get(&self, name: &str) -> Option<Arc<wgpu::ShaderModule>> {
        self.modules.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fullscreen::FULLSCREEN_VS_WGSL;

    const FRAGMENT: &str = r#"
@fragment
fn fs_main(in: FullscreenOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.uv, 0.0, 1.0);
}"#;

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
    fn test_compose_separates_parts() {
        let source = compose_wgsl(&["const A: f32 = 1.0;", "const B: f32 = 2.0;\n"]);
        assert_eq!(source, "const A: f32 = 1.0;\nconst B: f32 = 2.0;\n");
    }

    #[test]
    fn test_compose_empty() {
        assert!(compose_wgsl(&[]).is_empty());
    }

    #[test]
    fn test_library_starts_empty() {
        let library = ShaderLibrary::new();
        assert!(library.is_empty());
        assert!(library.get("missing").is_none());
    }

    #[test]
    fn test_cache_returns_same_module() {
        let Some(device) = create_test_device() else {
            return;
        };
        let mut library = ShaderLibrary::new();
        let a = library.get_or_compile(&device, "fs", &[FULLSCREEN_VS_WGSL, FRAGMENT]);
        let b = library.get_or_compile(&device, "fs", &[FULLSCREEN_VS_WGSL, FRAGMENT]);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(library.len(), 1);
    }
}
