//! Headless demo that renders a few frames of temporally amortized clouds.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p nimbus-demo -- --frames 32 --mode 2` to render 32
//! frames with a full-resolution reconstruction over a quarter-resolution trace.

mod scene;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use nimbus_clouds::{
    CloudFormats, CloudRenderError, CloudRenderer, CloudSettings, LightId, LightKind,
    LightMapInputs, SlabMedium, SunLight, ViewFrameReport, ViewId, ViewInputs, ViewTarget,
};
use nimbus_config::{CliArgs, Config};
use nimbus_render::{GpuContext, GpuContextError, init_gpu_context_blocking};
use tracing::{debug, error, info, warn};

use crate::scene::{OffscreenScene, OrbitCamera, SCENE_COLOR_FORMAT, sun_direction};

const MAIN_VIEW: ViewId = ViewId(0);
const SUN_LIGHT: LightId = LightId(0);
const SKY_LIGHT: LightId = LightId(1);

/// Frames between checks of `config.ron` for edits.
const RELOAD_INTERVAL: u32 = 8;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("GPU initialization failed: {0}")]
    Gpu(#[from] GpuContextError),
    #[error(transparent)]
    Render(#[from] CloudRenderError),
}

#[derive(Debug, Default)]
struct RunStats {
    frames: u32,
    history_frames: u32,
    passes: usize,
    allocations: usize,
}

impl RunStats {
    fn record(&mut self, report: &ViewFrameReport, light_passes: usize) {
        self.frames += 1;
        if report.history_valid {
            self.history_frames += 1;
        }
        self.passes += report.passes.len() + light_passes;
        self.allocations += report.allocations;
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args
        .config
        .clone()
        .or_else(|| Config::default_dir().ok())
        .unwrap_or_else(|| PathBuf::from("nimbus"));

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    nimbus_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));
    info!("Config directory: {}", config_dir.display());

    match run(&args, &config_dir, config) {
        Ok(stats) => {
            info!(
                "Rendered {} frames: {} with history, {} passes, {} target allocations",
                stats.frames, stats.history_frames, stats.passes, stats.allocations
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs, config_dir: &Path, mut config: Config) -> Result<RunStats, DemoError> {
    let GpuContext {
        device,
        queue,
        capabilities,
        ..
    } = init_gpu_context_blocking()?;

    let scene = OffscreenScene::new(&device, config.window.width, config.window.height);
    let mut renderer = CloudRenderer::new(
        &device,
        &queue,
        CloudFormats {
            scene_color: SCENE_COLOR_FORMAT,
            water_color: SCENE_COLOR_FORMAT,
        },
        CloudSettings::from_config(&config),
        &SlabMedium::default(),
        capabilities,
    );
    info!(
        "Rendering {} frames at {}x{}, mode {}",
        args.frames, scene.size.x, scene.size.y, config.clouds.mode
    );

    let mut camera = OrbitCamera::default();
    let mut stats = RunStats::default();
    for index in 0..args.frames {
        if index > 0 && index % RELOAD_INTERVAL == 0 {
            reload_config(&mut renderer, &queue, config_dir, &mut config, args);
        }

        let frame = renderer.begin_frame();
        let _span = tracing::info_span!("frame", frame).entered();
        let sun = SunLight {
            direction: sun_direction(frame),
            ..SunLight::default()
        };
        let camera_position = camera.position();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("nimbus-frame"),
        });
        scene.clear(&mut encoder);

        let mut light_passes = 0;
        for (light_id, kind, direction) in [
            (SUN_LIGHT, LightKind::Shadow, sun.direction),
            (SKY_LIGHT, LightKind::SkyAo, glam::Vec3::NEG_Y),
        ] {
            let passes = renderer.render_light_maps(
                &device,
                &queue,
                &mut encoder,
                light_id,
                &LightMapInputs {
                    kind,
                    direction,
                    camera_position,
                },
            )?;
            light_passes += passes.len();
        }

        let report = renderer.render_view(
            &device,
            &queue,
            &mut encoder,
            MAIN_VIEW,
            &ViewInputs {
                resolution: scene.size,
                view_proj: camera.view_proj(scene.size),
                camera_position,
                scene_depth: &scene.depth.view,
                target: ViewTarget::Scene {
                    color: &scene.color.view,
                },
                sun,
                shadow_light: Some(SUN_LIGHT),
                sky_light: Some(SKY_LIGHT),
            },
        )?;
        queue.submit(Some(encoder.finish()));

        debug!(
            "View frame {} offset {:?} variant {:?} on {:?}: {:?}",
            report.frame_id,
            report.dither_offset,
            report.variant,
            report.tracing_queue,
            report.passes.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
        );
        stats.record(&report, light_passes);
        camera.advance();
    }

    Ok(stats)
}

/// Pick up edits to `config.ron` between frames.
fn reload_config(
    renderer: &mut CloudRenderer,
    queue: &wgpu::Queue,
    config_dir: &Path,
    config: &mut Config,
    args: &CliArgs,
) {
    match config.reload(config_dir) {
        Ok(Some(mut updated)) => {
            updated.apply_cli_overrides(args);
            if updated != *config {
                info!("Config changed on disk, updating cloud settings");
                renderer.update_settings(queue, CloudSettings::from_config(&updated));
                *config = updated;
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Config reload failed: {e}"),
    }
}
