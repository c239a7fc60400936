use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod display;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Wildlife camera watch driver")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 0.5)]
    threshold: f32,
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 480)]
    height: u32,
    #[arg(long, default_value = "detections")]
    save_folder: PathBuf,
    /// Stop after this many displayed frames
    #[arg(long)]
    ticks: Option<usize>,
    /// End the camera stream after this many frames
    #[arg(long)]
    frames: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Replay detections from a YAML scenario instead of random ones
    #[arg(long)]
    scenario: Option<PathBuf>,
    #[arg(long)]
    animal_probability: Option<f64>,
    #[arg(long)]
    general_probability: Option<f64>,
    /// Audio player command line, e.g. "aplay -q"
    #[arg(long)]
    player: Option<String>,
    /// Drive session timing from frame count at this rate instead of wall time
    #[arg(long)]
    simulated_fps: Option<f64>,
    /// Save the last annotated frame on exit; format follows the extension
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<WorkflowConfig> {
        let mut config = match &self.workflow {
            Some(path) => WorkflowConfig::load(path)?,
            None => WorkflowConfig::from_args(
                self.threshold,
                self.width,
                self.height,
                self.save_folder.clone(),
            ),
        };

        if let Some(ticks) = self.ticks {
            config.display.max_ticks = Some(ticks);
        }
        if let Some(frames) = self.frames {
            config.camera.max_frames = Some(frames);
        }
        if let Some(seed) = self.seed {
            config.camera.seed = seed;
            config.detectors.seed = seed;
        }
        if self.scenario.is_some() {
            config.detectors.scenario = self.scenario;
        }
        if let Some(p) = self.animal_probability {
            config.detectors.animal_probability = p;
        }
        if let Some(p) = self.general_probability {
            config.detectors.general_probability = p;
        }
        if self.player.is_some() {
            config.player = self.player;
        }
        if self.simulated_fps.is_some() {
            config.camera.simulated_fps = self.simulated_fps;
        }
        if self.snapshot.is_some() {
            config.display.snapshot = self.snapshot;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Raises `flag` on Ctrl+C. The pipeline notices on its next frame or failed read.
fn watch_ctrl_c(flag: Arc<AtomicBool>) -> anyhow::Result<()> {
    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for signal handling")?;
    thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            runtime.block_on(async {
                match signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Ctrl+C received, stopping");
                        flag.store(true, Ordering::SeqCst);
                    }
                    Err(err) => warn!("awaiting Ctrl+C failed: {}", err),
                }
            })
        })
        .context("spawning signal thread")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Args::parse().into_config()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    watch_ctrl_c(Arc::clone(&shutdown))?;

    let runner = Runner::new(config);
    let snapshot = runner.execute(shutdown)?;

    info!(
        "detections logged to {}",
        runner.config().pipeline.log_path().display()
    );
    println!("{}", snapshot.to_json()?);
    Ok(())
}
