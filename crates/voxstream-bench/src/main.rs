use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use voxstream_bench::report::{self, Report};
use voxstream_bench::runner;
use voxstream_bench::scenes;
use voxstream_cache::{load_config_from_str, CacheConfig, CpuAtlasBackend};
use voxstream_gpu::{GpuLookupBuffer, WgpuAtlasBackend};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut frame_count = 240u32;
    let mut seed = 1u64;
    let mut use_gpu = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = args.get(i).map(PathBuf::from);
            }
            "--output" => {
                i += 1;
                output_path = args.get(i).map(PathBuf::from);
            }
            "--frames" => {
                i += 1;
                frame_count = args
                    .get(i)
                    .and_then(|v| v.parse().ok())
                    .expect("invalid --frames value");
            }
            "--seed" => {
                i += 1;
                seed = args
                    .get(i)
                    .and_then(|v| v.parse().ok())
                    .expect("invalid --seed value");
            }
            "--gpu" => use_gpu = true,
            "--help" | "-h" => {
                eprintln!("Usage: bench-runner [OPTIONS]");
                eprintln!("  --config <path>   Cache configuration (RON)");
                eprintln!("  --output <path>   Save results as JSON");
                eprintln!("  --frames <n>      Frames per scene (default: 240)");
                eprintln!("  --seed <n>        Fetch latency seed (default: 1)");
                eprintln!("  --gpu             Upload atlases through wgpu instead of host memory");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => {
            let source = std::fs::read_to_string(&path).unwrap_or_else(|e| {
                eprintln!("Failed to read {}: {}", path.display(), e);
                process::exit(1);
            });
            load_config_from_str(&source).unwrap_or_else(|e| {
                eprintln!("{}: {}", path.display(), e);
                process::exit(1);
            })
        }
        None => CacheConfig::default(),
    };

    let scene_configs = scenes::standard_scenes(frame_count);
    let mut results = Vec::new();

    if use_gpu {
        log::info!("Initializing GPU...");
        let (device, queue) = create_device();
        let lookup = GpuLookupBuffer::new(&device, config.address_space().capacity());
        for scene in &scene_configs {
            let backend = WgpuAtlasBackend::new(device.clone(), queue.clone());
            let result = runner::run_scene(scene, &config, backend, seed, |manager| {
                lookup.upload(&queue, manager.lookup_table());
                queue.submit(std::iter::empty());
            });
            match result {
                Ok(r) => results.push(r),
                Err(e) => log::error!("Scene '{}' failed: {}", scene.name, e),
            }
        }
        let _ = device.poll(wgpu::Maintain::Wait);
    } else {
        for scene in &scene_configs {
            match runner::run_scene(scene, &config, CpuAtlasBackend, seed, |_| {}) {
                Ok(r) => results.push(r),
                Err(e) => log::error!("Scene '{}' failed: {}", scene.name, e),
            }
        }
    }

    println!("\n## Streaming Cache Results\n");
    println!("{}", report::format_markdown(&results));

    if let Some(ref path) = output_path {
        let report = Report {
            seed,
            backend: if use_gpu { "wgpu" } else { "cpu" }.to_string(),
            results,
        };
        if let Err(e) = report::save_report(path, &report) {
            log::error!("Failed to save report to {}: {}", path.display(), e);
            process::exit(1);
        }
        log::info!("Saved report to {}", path.display());
    }
}

/// Initialize wgpu natively. Blocks on async adapter request.
fn create_device() -> (Arc<wgpu::Device>, Arc<wgpu::Queue>) {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .expect("no suitable GPU adapter found");

    log::info!("Bench adapter: {}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("bench-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
        },
        None,
    ))
    .expect("failed to create device");

    (Arc::new(device), Arc::new(queue))
}
