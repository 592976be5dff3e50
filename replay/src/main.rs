use anyhow::Context;
use clap::Parser;
use generator::scenario::{ScenarioConfig, SyntheticScenario};
use gui_bridge::bridge::{default_bind_address, GuiBridge};
use gui_bridge::model::SyncSnapshot;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::frames::ImageFrames;
use workflow::runner::{PlaybackResult, Runner};

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Radar / imagery sync replay driver")]
struct Args {
    /// Replay radar files against a manifest of extracted frame images
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Replay a seeded synthetic storm scenario
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Radar segment JSON files
    #[arg(long, num_args = 1..)]
    radar: Vec<PathBuf>,
    /// Imagery manifest JSON
    #[arg(long)]
    manifest: Option<PathBuf>,
    /// Directory holding the frame images
    #[arg(long)]
    frames_dir: Option<PathBuf>,
    #[arg(long, default_value_t = 32)]
    grid_size: usize,
    #[arg(long, default_value_t = 3)]
    trail: usize,
    #[arg(long, default_value_t = 7)]
    seed: u64,
    #[arg(long, default_value_t = default_bind_address())]
    bind: SocketAddr,
    /// Keep the HTTP bridge alive for the presentation layer
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(
            args.radar,
            args.manifest,
            args.frames_dir,
            args.grid_size,
            args.trail,
        )
    };

    let runner = Runner::new(workflow_config.clone());
    let gui_bridge = GuiBridge::new(Arc::new(runner.clone()), args.bind);

    if args.offline {
        let files = workflow_config.load_radar_files()?;
        let manifest = workflow_config.load_manifest()?;
        let mut frames = ImageFrames::new(workflow_config.frames_root());
        let result = runner.play(&files, manifest, &mut frames)?;
        print_result("Offline run", &result);
        gui_bridge.publish(&SyncSnapshot::from_playback("offline", &result))?;
        gui_bridge.publish_status("Offline sync results ready.");
        append_report(&workflow_config.report_path, "offline", &result)?;
    }
    if args.synthetic {
        let scenario_config = ScenarioConfig {
            seed: args.seed,
            ..Default::default()
        }
        .aligned_with(&workflow_config.sync);
        let mut scenario = SyntheticScenario::generate(&scenario_config)?;
        let result = runner.play(&scenario.files, scenario.manifest.clone(), &mut scenario.frames)?;
        print_result("Synthetic run", &result);
        gui_bridge.publish(&SyncSnapshot::from_playback("synthetic", &result))?;
        append_report(&workflow_config.report_path, "synthetic", &result)?;
    }
    if args.serve {
        gui_bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}

fn print_result(label: &str, result: &PlaybackResult) {
    let mean = result
        .mean_match_percent
        .map(|m| format!("{m:.1}%"))
        .unwrap_or_else(|| "-".into());
    println!(
        "{} -> compared {}, skipped {}, history {}, mean match {}",
        label,
        result.compared,
        result.skipped,
        result.history.len(),
        mean
    );
    if let Some(range) = &result.summary.radar_range {
        println!("radar range {} .. {}", range.start_local, range.end_local);
    }
    if let Some(slices) = &result.summary.slices {
        for rejected in &slices.rejected {
            println!("rejected {}: {}", rejected.file, rejected.reason);
        }
    }
}

fn append_report(path: &Path, mode: &str, result: &PlaybackResult) -> anyhow::Result<()> {
    let line = serde_json::to_string(&serde_json::json!({
        "mode": mode,
        "compared": result.compared,
        "skipped": result.skipped,
        "history": result.history.len(),
        "mean_match_percent": result.mean_match_percent,
        "common_used_frames": result.summary.common_used_frames,
        "metrics": result.summary.metrics,
    }))
    .context("encoding run report")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening report {}", path.display()))?;
    writeln!(file, "{line}").context("writing run report")?;
    Ok(())
}
