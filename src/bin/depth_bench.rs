//! depth_bench - Benchmark a monocular depth model on a camera or image folder.
//!
//! Values not given on the command line, in the config file or in the
//! environment are asked for on the console.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use depth_bench::config::InputMode;
use depth_bench::prompt::{complete_with_defaults, print_config, Prompter};
use depth_bench::ui::{format_duration, Ui};
use depth_bench::{
    run_camera, run_images, BenchConfig, CameraSource, DepthPipeline, Device, EngineConfig,
    FrameSink, InferEngine, NullSink, PreviewSink,
};

#[derive(Parser, Debug)]
#[command(
    name = "depth_bench",
    about = "Benchmark depth estimation on a camera feed or an image folder"
)]
struct Args {
    /// Model file (.onnx) or stub://<name> for the synthetic backend
    #[arg(long, value_name = "PATH")]
    model: Option<String>,

    /// Folder searched for models when --model is not given
    #[arg(long, value_name = "DIR")]
    model_root: Option<PathBuf>,

    /// Folder of input images
    #[arg(long, value_name = "DIR", conflicts_with = "camera")]
    input: Option<PathBuf>,

    /// Use the camera instead of an image folder
    #[arg(long)]
    camera: bool,

    /// Camera device path (or stub://<name>)
    #[arg(long, value_name = "PATH")]
    camera_device: Option<String>,

    /// Model input width, rounded down to a multiple of 32
    #[arg(long)]
    width: Option<u32>,

    /// Model input height, rounded down to a multiple of 32
    #[arg(long)]
    height: Option<u32>,

    /// Inference device (cpu|gpu|vpu)
    #[arg(long, value_name = "DEVICE")]
    device: Option<String>,

    /// Folder depth maps are written to
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Folder for the compiled model cache manifest
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Stop the camera loop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Milliseconds each image stays on the preview
    #[arg(long, value_name = "MS")]
    dwell_ms: Option<u64>,

    /// Preview image path (default <output>/preview.png)
    #[arg(long, value_name = "PATH", conflicts_with = "no_preview")]
    preview: Option<PathBuf>,

    /// Do not write preview frames
    #[arg(long)]
    no_preview: bool,

    /// Never prompt; use defaults for anything unset
    #[arg(long)]
    non_interactive: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

impl Args {
    fn apply(&self, config: &mut BenchConfig) -> Result<()> {
        if let Some(model) = &self.model {
            config.model_path = Some(model.clone());
        }
        if let Some(root) = &self.model_root {
            config.model_root = root.clone();
        }
        if self.camera {
            config.input = Some(InputMode::Camera);
        } else if let Some(input) = &self.input {
            config.input = Some(InputMode::Folder(input.clone()));
        }
        if let Some(camera) = &self.camera_device {
            config.camera.device = camera.clone();
        }
        if let Some(width) = self.width {
            config.width = Some(width);
        }
        if let Some(height) = self.height {
            config.height = Some(height);
        }
        if let Some(device) = &self.device {
            config.device = Some(
                device
                    .parse::<Device>()
                    .map_err(|_| anyhow!("--device must be one of cpu, gpu, vpu"))?,
            );
        }
        if let Some(output) = &self.output {
            config.output_folder = output.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        if let Some(max) = self.max_frames {
            if max == 0 {
                return Err(anyhow!("--max-frames must be greater than zero"));
            }
            config.max_frames = Some(max);
        }
        if let Some(ms) = self.dwell_ms {
            config.image_dwell = Duration::from_millis(ms);
        }
        if let Some(preview) = &self.preview {
            config.preview_path = Some(preview.clone());
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut config = {
        let _stage = ui.stage("Load configuration");
        let mut config = BenchConfig::load()?;
        args.apply(&mut config)?;
        config
    };
    if args.non_interactive {
        complete_with_defaults(&mut config)?;
    } else {
        let stdin = io::stdin();
        Prompter::new(stdin.lock(), io::stdout()).complete(&mut config)?;
    }

    let shape = config.shape()?;
    print_config(io::stdout(), &config, &shape)?;

    let model_path = config
        .model_path
        .clone()
        .ok_or_else(|| anyhow!("no model selected"))?;
    let engine = {
        let _stage = ui.stage("Load model");
        InferEngine::new(EngineConfig {
            model_path: model_path.clone(),
            cache_dir: config.cache_dir.clone(),
            device: config.device.unwrap_or(Device::Cpu),
            shape,
        })?
    };
    let mut pipeline = DepthPipeline::new(engine, config.normalization.clone());

    let input = config.input.clone().unwrap_or(InputMode::Camera);
    let dwell = match input {
        InputMode::Camera => Duration::ZERO,
        InputMode::Folder(_) => config.image_dwell,
    };
    let mut sink: Box<dyn FrameSink> = if args.no_preview {
        Box::new(NullSink)
    } else {
        Box::new(PreviewSink::new(config.preview_path(), dwell)?)
    };

    let stats = match &input {
        InputMode::Camera => {
            let stop = Arc::new(AtomicBool::new(false));
            let handler_stop = Arc::clone(&stop);
            ctrlc::set_handler(move || {
                handler_stop.store(true, Ordering::SeqCst);
            })
            .context("error setting Ctrl-C handler")?;

            let mut source = CameraSource::new(config.camera.clone())?;
            log::info!("depth_bench running on camera {} (Ctrl-C to stop)", config.camera.device);
            let _stage = ui.stage("Camera loop");
            run_camera(
                &mut pipeline,
                &mut source,
                sink.as_mut(),
                &stop,
                config.max_frames,
            )?
        }
        InputMode::Folder(folder) => {
            let _stage = ui.stage("Process images");
            let progress = ui.progress();
            let stats = run_images(
                &mut pipeline,
                folder,
                &config.output_folder,
                sink.as_mut(),
                &progress,
            )?;
            progress.finish_and_clear();
            stats
        }
    };

    let engine = pipeline.engine();
    println!();
    println!("benchmark summary:");
    println!("  model: {}", model_path);
    println!("  backend: {} on {}", engine.backend_name(), engine.device());
    println!("  input shape: {}", engine.shape());
    println!("  compile time: {}", format_duration(engine.compile_time()));
    println!("{stats}");
    if !stats.outputs.is_empty() {
        println!(
            "  {} depth maps written to {}",
            stats.outputs.len(),
            config.output_folder.display()
        );
    }
    Ok(())
}
